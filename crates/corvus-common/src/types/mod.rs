//! Core types for CorvusDB.

mod ids;

pub use ids::{Lsn, PageId};
