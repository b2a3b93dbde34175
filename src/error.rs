use thiserror::Error;

use crate::config::Lba;

pub type Result<T> = std::result::Result<T, FtlError>;

/// Terminal failures of the translation layer. None of these are
/// retryable; the simulation stops on the first one.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FtlError {
    /// The free-block queue ran dry during page allocation. Cannot happen
    /// while the collection threshold is above zero, but checked instead of
    /// indexing past the queue.
    #[error("free-block queue empty during allocation, device exhausted")]
    DeviceExhausted,

    /// Garbage collection ran with no full block to reclaim.
    #[error("garbage collection found no full block to use as victim")]
    NoVictim,

    #[error("lba {lba} out of range, device has {max_lba} logical pages")]
    LbaOutOfRange { lba: Lba, max_lba: Lba },

    #[error("invalid geometry: {0}")]
    Config(&'static str),
}
