//! Core identifier types for CorvusDB.
//!
//! Identifiers are `u64` newtypes stamped out by [`define_id`], so every
//! id carries its own reserved sentinel and the compiler keeps the
//! different id spaces from mixing. The sentinel is per-type: page ids
//! grow from zero, so their sentinel is the top of the range; LSNs start
//! at one and reserve zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines a `u64`-backed identifier newtype.
///
/// Each generated type gets a reserved `INVALID` sentinel, the `FIRST`
/// id its allocator hands out, const conversions, and a `Debug` form
/// that renders the sentinel as `Name(-)` instead of a raw number.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident { invalid: $invalid:expr, first: $first:expr }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Reserved sentinel meaning "no id".
            pub const INVALID: Self = Self($invalid);

            /// Lowest id the allocator hands out.
            pub const FIRST: Self = Self($first);

            /// Wraps a raw value.
            #[inline]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw value.
            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// Returns the id after this one, saturating at the top of
            /// the range.
            #[inline]
            pub const fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }

            /// False only for the reserved sentinel.
            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != $invalid
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                } else {
                    f.write_str(concat!(stringify!($name), "(-)"))
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(raw: u64) -> Self {
                Self::new(raw)
            }
        }

        impl From<$name> for u64 {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Page identifier - uniquely identifies a page in the database.
    ///
    /// Pages are the fundamental unit of storage in CorvusDB. Page ids
    /// are assigned densely from zero by the buffer pool's allocator and
    /// never recycled, so the sentinel sits at the top of the range.
    ///
    /// # Example
    ///
    /// ```rust
    /// use corvus_common::types::PageId;
    ///
    /// let page = PageId::new(42);
    /// assert_eq!(page.as_u64(), 42);
    /// ```
    PageId { invalid: u64::MAX, first: 0 }
}

define_id! {
    /// Log Sequence Number - uniquely identifies a position in the WAL.
    ///
    /// LSNs are monotonically increasing and order log records for
    /// recovery. Zero is reserved as the sentinel, so numbering starts
    /// at one.
    Lsn { invalid: 0, first: 1 }
}
