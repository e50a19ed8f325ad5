//! Vendor identity record and boot-time lock seeding.
//!
//! The bootloader writes a fixed-layout record into shared memory entry
//! `SMEM_ID_VENDOR0` unless the configuration names another entry. Integers are little-endian `u32`, strings are
//! NUL-padded byte arrays, and the struct is padded to a 4-byte boundary.
//!
//! | offset | size | field           |
//! |--------|------|-----------------|
//! | 0      | 4    | sku_rev         |
//! | 4      | 4    | hw_rev          |
//! | 8      | 4    | sub_rev         |
//! | 12     | 4    | vari_mem        |
//! | 16     | 4    | vari_main       |
//! | 20     | 4    | ant_rev         |
//! | 24     | 16   | model_name      |
//! | 40     | 64   | sw_version      |
//! | 104    | 16   | operator_name   |
//! | 120    | 2048 | ntcode          |
//! | 2168   | 20   | lg_modem_name   |
//! | 2188   | 4    | sim_num         |
//! | 2192   | 4    | flag_gpio       |
//! | 2196   | 1    | diag_enable     |

use crate::error::{DiagLockError, DiagLockResult};
use crate::state::LockState;
use diaglock_provider::{SharedMemory, SmemId};
use log::{info, warn};

/// Size of the record including trailing padding.
pub const VENDOR_RECORD_LEN: usize = 2200;
/// Offset of the single-byte `diag_enable` flag.
pub const DIAG_ENABLE_OFFSET: usize = 2196;

const MODEL_NAME: (usize, usize) = (24, 16);
const SW_VERSION: (usize, usize) = (40, 64);
const OPERATOR_NAME: (usize, usize) = (104, 16);
const NTCODE: (usize, usize) = (120, 2048);
const MODEM_NAME: (usize, usize) = (2168, 20);
const SIM_NUM_OFFSET: usize = 2188;
const FLAG_GPIO_OFFSET: usize = 2192;

/// Decoded vendor identity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorRecord {
    pub sku_rev: u32,
    pub hw_rev: u32,
    pub sub_rev: u32,
    pub vari_mem: u32,
    pub vari_main: u32,
    pub ant_rev: u32,
    pub model_name: String,
    pub sw_version: String,
    pub operator_name: String,
    pub ntcode: String,
    pub modem_name: String,
    pub sim_num: u32,
    pub flag_gpio: u32,
    pub diag_enable: u8,
    /// Length of the entry as published, which may differ from the layout.
    pub raw_len: usize,
}

impl VendorRecord {
    /// Decode `bytes`.
    ///
    /// Extra trailing bytes are ignored. A record too short to reach the
    /// `diag_enable` byte is rejected since the flag is the one field callers
    /// act on.
    pub fn parse(bytes: &[u8]) -> DiagLockResult<Self> {
        if bytes.len() <= DIAG_ENABLE_OFFSET {
            return Err(DiagLockError::Identity(format!(
                "record truncated at {} bytes; diag_enable lives at offset {}",
                bytes.len(),
                DIAG_ENABLE_OFFSET
            )));
        }

        Ok(Self {
            sku_rev: read_u32(bytes, 0),
            hw_rev: read_u32(bytes, 4),
            sub_rev: read_u32(bytes, 8),
            vari_mem: read_u32(bytes, 12),
            vari_main: read_u32(bytes, 16),
            ant_rev: read_u32(bytes, 20),
            model_name: read_cstr(bytes, MODEL_NAME),
            sw_version: read_cstr(bytes, SW_VERSION),
            operator_name: read_cstr(bytes, OPERATOR_NAME),
            ntcode: read_cstr(bytes, NTCODE),
            modem_name: read_cstr(bytes, MODEM_NAME),
            sim_num: read_u32(bytes, SIM_NUM_OFFSET),
            flag_gpio: read_u32(bytes, FLAG_GPIO_OFFSET),
            diag_enable: bytes[DIAG_ENABLE_OFFSET],
            raw_len: bytes.len(),
        })
    }

    pub fn has_expected_len(&self) -> bool {
        self.raw_len == VENDOR_RECORD_LEN
    }

    /// Lock state requested by the record: any nonzero flag unlocks.
    pub fn lock_state(&self) -> LockState {
        LockState::from_unlocked(self.diag_enable != 0)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn read_cstr(bytes: &[u8], (offset, len): (usize, usize)) -> String {
    let field = &bytes[offset..offset + len];
    let end = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// How the boot-time lock state was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOverride {
    /// The profile does not seed from identity data.
    NotApplicable,
    /// Seeded from the record.
    Applied {
        state: LockState,
        diag_enable: u8,
        size_mismatch: bool,
    },
    /// The region does not carry the record.
    RecordMissing,
    /// The record exists but could not be read or decoded.
    Unusable(String),
}

impl BootOverride {
    /// Lock state to start with, given the built-in `default`.
    pub fn resolve(&self, default: LockState) -> LockState {
        match self {
            BootOverride::Applied { state, .. } => *state,
            _ => default,
        }
    }
}

/// Fetch and decode the vendor record from `region`.
///
/// Never fails: every problem is logged and reported through
/// [`BootOverride`] so initialization can proceed with the default state.
pub fn read_boot_override<M>(region: &M, entry: SmemId) -> BootOverride
where
    M: SharedMemory + ?Sized,
{
    let bytes = match region.entry(entry) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!("smem entry {entry} not present; keeping default diag lock state");
            return BootOverride::RecordMissing;
        }
        Err(err) => {
            warn!("failed to read smem entry {entry}: {err}; keeping default diag lock state");
            return BootOverride::Unusable(err.to_string());
        }
    };

    let size_mismatch = bytes.len() != VENDOR_RECORD_LEN;
    if size_mismatch {
        warn!(
            "size of smem entry {entry} is not correct ({}/{})",
            VENDOR_RECORD_LEN,
            bytes.len()
        );
    }

    match VendorRecord::parse(&bytes) {
        Ok(record) => {
            info!("smem entry {entry} diag_enable({})", record.diag_enable);
            BootOverride::Applied {
                state: record.lock_state(),
                diag_enable: record.diag_enable,
                size_mismatch,
            }
        }
        Err(err) => {
            warn!("{err}; keeping default diag lock state");
            BootOverride::Unusable(err.to_string())
        }
    }
}
