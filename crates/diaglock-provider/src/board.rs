//! Provider contract for board identity.
//!
//! Board identity is resolved once by early boot code (factory cable, carrier
//! SKU). Implementations are expected to be cheap to query repeatedly.

use std::fmt;
use std::sync::Arc;

/// Carrier operator reported by the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Sprint (US).
    SprUs,
    /// Verizon postpaid.
    VzwPostpaid,
    /// Verizon prepaid.
    VzwPrepaid,
    /// Any other operator code, kept verbatim.
    Other(String),
}

impl Operator {
    /// Parse an operator code as written by the bootloader or an operator.
    ///
    /// Matching is case-insensitive; unknown codes are preserved in
    /// [`Operator::Other`]. An empty code maps to `Other("")`.
    pub fn from_code(code: &str) -> Self {
        let trimmed = code.trim();
        match trimmed.to_ascii_uppercase().replace('-', "_").as_str() {
            "SPR" | "SPR_US" | "SPRINT" => Operator::SprUs,
            "VZW" | "VZW_POSTPAID" => Operator::VzwPostpaid,
            "VZW_PREPAID" => Operator::VzwPrepaid,
            _ => Operator::Other(trimmed.to_string()),
        }
    }

    pub fn is_sprint(&self) -> bool {
        matches!(self, Operator::SprUs)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::SprUs => f.write_str("SPR_US"),
            Operator::VzwPostpaid => f.write_str("VZW_POSTPAID"),
            Operator::VzwPrepaid => f.write_str("VZW_PREPAID"),
            Operator::Other(code) if code.is_empty() => f.write_str("(unknown)"),
            Operator::Other(code) => f.write_str(code),
        }
    }
}

/// Identity facts about the running board.
pub trait BoardInfo {
    /// True when the device booted through the factory/test path.
    fn factory_boot(&self) -> bool;

    /// Carrier operator the device was provisioned for.
    fn operator(&self) -> Operator;
}

impl<T> BoardInfo for &T
where
    T: BoardInfo + ?Sized,
{
    fn factory_boot(&self) -> bool {
        (**self).factory_boot()
    }

    fn operator(&self) -> Operator {
        (**self).operator()
    }
}

impl<T> BoardInfo for Arc<T>
where
    T: BoardInfo + ?Sized,
{
    fn factory_boot(&self) -> bool {
        (**self).factory_boot()
    }

    fn operator(&self) -> Operator {
        (**self).operator()
    }
}
