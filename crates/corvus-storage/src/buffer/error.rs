//! Buffer pool errors.

use corvus_common::types::PageId;
use thiserror::Error;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
///
/// Recoverable conditions that callers routinely probe for (page not
/// resident, double unpin, delete of a pinned page) are reported in-band
/// as booleans by the pool API, not as error variants.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Every frame is pinned; nothing can be evicted.
    #[error("no evictable frames available, all pages are pinned")]
    PoolExhausted,

    /// A scheduled disk transfer reported failure.
    #[error("disk request for page {page_id} failed")]
    DiskRequest {
        /// The page whose transfer failed.
        page_id: PageId,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description.
        message: String,
    },
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried
    /// once pins are released.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted)
    }
}
