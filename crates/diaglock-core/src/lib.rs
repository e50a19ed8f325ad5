//! Core building blocks for the diagnostic command lock.
//!
//! Lock state, the carrier allow-list policy and the decision engine live
//! here; system integrations and operator surfaces sit in sibling crates.

pub mod attribute;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod logging;
pub mod policy;
pub mod provider;
pub mod service;
pub mod state;

pub use attribute::DiagEnableAttribute;
pub use config::{BoardCfg, ConfigFormat, DiagLockConfig, IdentityCfg, PolicyCfg};
pub use engine::DecisionEngine;
pub use error::{DiagLockError, DiagLockResult};
pub use identity::{BootOverride, VendorRecord};
pub use policy::{AllowList, BuildProfile, CarrierVariant, Opcode};
pub use provider::{BoardInfo, Operator, SharedMemory, StaticBoard};
pub use service::{BootReport, DiagLockService};
pub use state::{LockState, StateMutator};
