#![forbid(unsafe_code)]

//! Collaborator contracts shared across DiagLock.
//!
//! The policy core only talks to the outside world through these traits, so
//! system integrations (shared memory, kernel command line) and test doubles
//! can be swapped without touching decision logic.

pub mod board;
pub mod smem;

pub use board::{BoardInfo, Operator};
pub use smem::{SharedMemory, SmemId, SMEM_ID_VENDOR0};
