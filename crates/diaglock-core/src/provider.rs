//! Collaborator contracts used by `diaglock-core`.
//!
//! Concrete implementations live in `diaglock-smem`; tests supply their own.
//! The shared traits/types are sourced from `diaglock-provider` so the core
//! crate stays focused on state and policy.

pub use diaglock_provider::board::{BoardInfo, Operator};
pub use diaglock_provider::smem::{SharedMemory, SmemId, SMEM_ID_VENDOR0};

/// Board identity fixed at construction time.
///
/// Useful when identity comes from configuration or a test rather than the
/// running system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticBoard {
    pub factory_boot: bool,
    pub operator: Operator,
}

impl StaticBoard {
    pub fn new(factory_boot: bool, operator: Operator) -> Self {
        Self {
            factory_boot,
            operator,
        }
    }
}

impl BoardInfo for StaticBoard {
    fn factory_boot(&self) -> bool {
        self.factory_boot
    }

    fn operator(&self) -> Operator {
        self.operator.clone()
    }
}
