//! Owning component for the diag lock.
//!
//! `DiagLockService::boot` is the single place where the lock state is
//! created and seeded. After it returns, the state is only reachable through
//! the engine (read), the `diag_enable` attribute (read/write) and, on
//! profiles that export it, the [`StateMutator`].

use crate::attribute::DiagEnableAttribute;
use crate::config::DiagLockConfig;
use crate::engine::DecisionEngine;
use crate::error::{DiagLockError, DiagLockResult};
use crate::identity::{read_boot_override, BootOverride};
use crate::policy::{BuildProfile, CarrierVariant, Opcode};
use crate::state::{LockCell, LockState, StateMutator};
use diaglock_provider::{BoardInfo, SharedMemory};
use log::{error, info};
use std::sync::Arc;

/// Built-in lock state before any override.
pub const DEFAULT_LOCK_STATE: LockState = LockState::Locked;

/// Snapshot describing how the service came up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    pub profile: BuildProfile,
    pub initial_state: LockState,
    pub boot_override: BootOverride,
    pub mutator_exported: bool,
}

/// Lock state, policy engine and control surfaces for one device.
#[derive(Debug)]
pub struct DiagLockService<B> {
    config: Arc<DiagLockConfig>,
    state: Arc<LockCell>,
    engine: DecisionEngine<B>,
    report: BootReport,
}

impl<B> DiagLockService<B>
where
    B: BoardInfo,
{
    /// Validate configuration, seed the lock state, and assemble the engine.
    ///
    /// Identity problems are logged and leave the default state in place.
    ///
    /// # Errors
    /// `DiagLockError::Registration` when the configuration cannot back a
    /// working component; nothing is installed in that case.
    pub fn boot<M>(config: Arc<DiagLockConfig>, board: B, region: &M) -> DiagLockResult<Self>
    where
        M: SharedMemory + ?Sized,
    {
        let fatal = config.fatal_issues();
        if !fatal.is_empty() {
            let message = fatal.join("; ");
            error!("diag lock registration failed: {message}");
            return Err(DiagLockError::Registration(message));
        }

        let profile = config.profile();
        let boot_override = if profile.seeds_from_identity(&board) {
            info!(
                "diag lock: profile {profile} seeds from identity (operator {})",
                board.operator()
            );
            read_boot_override(region, config.identity_entry())
        } else {
            BootOverride::NotApplicable
        };

        let initial_state = boot_override.resolve(DEFAULT_LOCK_STATE);
        let state = Arc::new(LockCell::new(initial_state));
        let engine = DecisionEngine::new(
            state.clone(),
            board,
            profile,
            config.policy.factory_exemption(),
        );

        let report = BootReport {
            profile,
            initial_state,
            boot_override,
            mutator_exported: config.exports_mutator(),
        };
        info!(
            "diag lock ready (profile: {profile}, state: {initial_state}, mutator: {})",
            report.mutator_exported
        );

        Ok(Self {
            config,
            state,
            engine,
            report,
        })
    }

    pub fn config(&self) -> &DiagLockConfig {
        &self.config
    }

    pub fn engine(&self) -> &DecisionEngine<B> {
        &self.engine
    }

    pub fn boot_report(&self) -> &BootReport {
        &self.report
    }

    pub fn lock_state(&self) -> LockState {
        self.state.get()
    }

    /// The `diag_enable` attribute bound to this service's state.
    pub fn attribute(&self) -> DiagEnableAttribute {
        DiagEnableAttribute::new(self.state.clone())
    }

    /// Mutator for trusted callers, when the configuration exports one.
    pub fn mutator(&self) -> Option<StateMutator> {
        self.report
            .mutator_exported
            .then(|| StateMutator::new(self.state.clone()))
    }

    pub fn is_unlocked_or_factory_exempt(&self) -> bool {
        self.engine.is_unlocked_or_factory_exempt()
    }

    pub fn is_command_allowed(&self, opcode: Option<Opcode>) -> bool {
        self.engine.is_command_allowed(opcode)
    }

    pub fn carrier_variant(&self) -> CarrierVariant {
        self.engine.carrier_variant()
    }
}
