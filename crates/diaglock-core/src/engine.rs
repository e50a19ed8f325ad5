//! Allow/deny decisions for the diagnostic command interface.

use crate::policy::{BuildProfile, CarrierVariant, Opcode};
use crate::state::{LockCell, LockState};
use diaglock_provider::BoardInfo;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Combines lock state, board identity and the policy table.
///
/// Every query reads a single snapshot of the lock state and cannot fail; an
/// answer of `false` is the only negative outcome.
#[derive(Debug)]
pub struct DecisionEngine<B> {
    state: Arc<LockCell>,
    board: B,
    profile: BuildProfile,
    factory_exemption: bool,
    fallback_reported: AtomicBool,
}

impl<B> DecisionEngine<B>
where
    B: BoardInfo,
{
    /// `factory_exemption` is ignored on profiles that never grant it.
    pub fn new(
        state: Arc<LockCell>,
        board: B,
        profile: BuildProfile,
        factory_exemption: bool,
    ) -> Self {
        Self {
            state,
            board,
            profile,
            factory_exemption: factory_exemption && profile.allows_factory_exemption(),
            fallback_reported: AtomicBool::new(false),
        }
    }

    pub fn profile(&self) -> BuildProfile {
        self.profile
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn lock_state(&self) -> LockState {
        self.state.get()
    }

    /// True while a factory boot bypasses the lock.
    ///
    /// Sprint devices never get the bypass, whatever the profile.
    pub fn factory_exempt(&self) -> bool {
        self.factory_exemption && self.board.factory_boot() && !self.board.operator().is_sprint()
    }

    /// Whether the interface is open as a whole.
    pub fn is_unlocked_or_factory_exempt(&self) -> bool {
        if self.factory_exempt() {
            return true;
        }
        self.state.get().is_unlocked()
    }

    /// Variant whose allow-list applies to the next query.
    pub fn carrier_variant(&self) -> CarrierVariant {
        self.profile.resolve_variant(&self.board)
    }

    /// Classify a single opcode. A missing opcode is always denied.
    pub fn is_command_allowed(&self, opcode: Option<Opcode>) -> bool {
        let Some(opcode) = opcode else {
            return false;
        };

        if self.is_unlocked_or_factory_exempt() {
            return true;
        }

        let variant = self.carrier_variant();
        debug!("diag lock: classifying {opcode} for carrier variant {variant}");
        if variant.is_fallback() && !self.fallback_reported.swap(true, Ordering::Relaxed) {
            warn!("diag lock: no allow-list for {variant}; falling back to the default list");
        }
        variant.allow_list().contains(opcode)
    }

    /// Whether a query has already fallen back to the default allow-list.
    pub fn fallback_reported(&self) -> bool {
        self.fallback_reported.load(Ordering::Relaxed)
    }

    /// Classify a raw command packet by its first byte.
    pub fn is_packet_allowed(&self, packet: Option<&[u8]>) -> bool {
        self.is_command_allowed(packet.and_then(Opcode::from_packet))
    }
}
