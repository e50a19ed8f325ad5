//! Provider contract for persisted shared-memory entries.
//!
//! The bootloader publishes a handful of fixed-layout records into a shared
//! memory region before the kernel starts. Only the vendor identity record is
//! consumed here; its layout lives in `diaglock-core::identity`.

use std::error::Error;
use std::fmt;

/// Numeric identifier of a shared-memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SmemId(pub u32);

/// Vendor identity record (`SMEM_ID_VENDOR0`).
pub const SMEM_ID_VENDOR0: SmemId = SmemId(134);

impl fmt::Display for SmemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read access to the shared-memory region.
pub trait SharedMemory {
    type Error: Error + Send + Sync + 'static;

    /// Fetch the raw bytes of entry `id`.
    ///
    /// Returns `Ok(None)` when the region does not carry the entry at all; an
    /// `Err` means the region exists but could not be read.
    fn entry(&self, id: SmemId) -> Result<Option<Vec<u8>>, Self::Error>;
}

impl<T> SharedMemory for &T
where
    T: SharedMemory + ?Sized,
{
    type Error = T::Error;

    fn entry(&self, id: SmemId) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).entry(id)
    }
}
