//! The `diag_enable` control attribute.
//!
//! Reads render `"1"`/`"0"`; writes take a decimal integer the way the
//! attribute endpoint has always accepted it (leading whitespace, optional
//! sign, anything after the digits ignored).

use crate::error::{DiagLockError, DiagLockResult};
use crate::state::{LockCell, LockState};
use log::info;
use std::sync::Arc;

/// Attribute name as exposed by the owning component.
pub const ATTRIBUTE_NAME: &str = "diag_enable";

/// Text view over the lock state.
#[derive(Debug, Clone)]
pub struct DiagEnableAttribute {
    cell: Arc<LockCell>,
}

impl DiagEnableAttribute {
    pub(crate) fn new(cell: Arc<LockCell>) -> Self {
        Self { cell }
    }

    pub fn name(&self) -> &'static str {
        ATTRIBUTE_NAME
    }

    /// `"1"` when unlocked, `"0"` otherwise.
    pub fn show(&self) -> String {
        match self.cell.get() {
            LockState::Unlocked => "1".to_string(),
            LockState::Locked => "0".to_string(),
        }
    }

    /// Apply a textual write and return the number of bytes consumed.
    ///
    /// # Errors
    /// `DiagLockError::InvalidArgument` when `input` does not start with an
    /// integer; the lock state is left untouched.
    pub fn store(&self, input: &str) -> DiagLockResult<usize> {
        let value = parse_leading_int(input).ok_or_else(|| {
            DiagLockError::InvalidArgument(format!(
                "{ATTRIBUTE_NAME} expects an integer, got {:?}",
                input.trim_end()
            ))
        })?;

        let state = LockState::from_unlocked(value != 0);
        self.cell.set(state);
        info!("{ATTRIBUTE_NAME} set to {value}; diag interface {state}");
        Ok(input.len())
    }
}

/// Parse the integer at the start of `input`, `%d` style.
///
/// Values beyond `i64` saturate; only zero versus nonzero matters here.
fn parse_leading_int(input: &str) -> Option<i64> {
    let rest = input.trim_start();
    let (negative, digits) = match rest.as_bytes().first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };

    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }

    let magnitude = digits[..len].bytes().fold(0i64, |acc, byte| {
        acc.saturating_mul(10).saturating_add(i64::from(byte - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}
