//! # corvus-storage
//!
//! The caching and I/O layer of CorvusDB.
//!
//! This crate implements the storage engine's page cache:
//!
//! - A buffer pool that keeps a bounded set of fixed-size pages resident
//!   in memory, with pin-count discipline and dirty-page write-back
//! - LRU-K victim selection for eviction
//! - A disk scheduler that serializes block I/O onto a background worker

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool: frames, guards, replacement policy
pub mod buffer;

/// Block device abstraction and I/O scheduling
pub mod disk;

/// Write-ahead log collaborator
pub mod wal;
