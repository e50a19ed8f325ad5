#![forbid(unsafe_code)]

//! System collaborators for the diag lock.
//!
//! Integrates with the host via:
//! - a directory exposing one file per shared-memory entry
//! - the kernel command line (`/proc/cmdline`) for factory and carrier identity

mod board;
mod cmdline;
mod region;

pub use board::CmdlineBoardInfo;
pub use cmdline::KernelCmdline;
pub use region::SystemSharedMemory;
