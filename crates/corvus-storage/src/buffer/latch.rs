//! Page guards: scoped pin/unpin handles over buffer frames.
//!
//! Guards borrow the pool, so they can never outlive it. Every guard
//! holds one pin and releases it exactly once when dropped; the read and
//! write variants additionally hold the frame's page latch for their
//! whole lifetime. The latch guard is declared before the pin handle so
//! it is released first on drop — the pool latch taken by the unpin is
//! never acquired while a page latch is still held.

use std::ops::{Deref, DerefMut};

use corvus_common::types::PageId;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::frame::{BufferFrame, FrameId};
use super::pool::BufferPool;
use super::replacer::AccessType;

/// Releases the guard's pin when dropped.
struct PinHandle<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
}

impl Drop for PinHandle<'_> {
    fn drop(&mut self) {
        self.pool
            .unpin_page(self.page_id, false, AccessType::Unknown);
    }
}

/// Basic page guard: holds a pin without taking the page latch.
///
/// Data access takes the latch per call; mutable access sets the dirty
/// bit. Move-only, released deterministically on drop.
pub struct PageGuard<'a> {
    frame: &'a BufferFrame,
    pin: PinHandle<'a>,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPool, frame: &'a BufferFrame) -> Self {
        Self {
            frame,
            pin: PinHandle {
                pool,
                page_id: frame.page_id(),
            },
        }
    }

    /// Returns the guarded page's id.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Returns the hosting frame's id.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Takes the page latch in shared mode and returns the page data.
    #[inline]
    pub fn data(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.frame.read_data()
    }

    /// Takes the page latch in exclusive mode and returns the page data,
    /// marking the frame dirty.
    #[inline]
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.frame.set_dirty(true);
        self.frame.write_data()
    }

    /// Marks the frame dirty without touching the data.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.frame.set_dirty(true);
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id())
            .field("frame_id", &self.frame_id())
            .finish()
    }
}

/// Read guard: a pin plus the page latch in shared mode for the guard's
/// lifetime. Dereferences to the page bytes.
pub struct PageReadGuard<'a> {
    // Declared first: the latch must release before the pin does.
    data: RwLockReadGuard<'a, Vec<u8>>,
    frame: &'a BufferFrame,
    pin: PinHandle<'a>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPool, frame: &'a BufferFrame) -> Self {
        Self {
            data: frame.read_data(),
            frame,
            pin: PinHandle {
                pool,
                page_id: frame.page_id(),
            },
        }
    }

    /// Returns the guarded page's id.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Returns the hosting frame's id.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl std::fmt::Debug for PageReadGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("page_id", &self.page_id())
            .field("frame_id", &self.frame_id())
            .finish()
    }
}

/// Write guard: a pin plus the page latch in exclusive mode for the
/// guard's lifetime. Mutable access marks the frame dirty.
pub struct PageWriteGuard<'a> {
    // Declared first: the latch must release before the pin does.
    data: RwLockWriteGuard<'a, Vec<u8>>,
    frame: &'a BufferFrame,
    pin: PinHandle<'a>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPool, frame: &'a BufferFrame) -> Self {
        Self {
            data: frame.write_data(),
            frame,
            pin: PinHandle {
                pool,
                page_id: frame.page_id(),
            },
        }
    }

    /// Returns the guarded page's id.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Returns the hosting frame's id.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Marks the frame dirty without touching the data.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.frame.set_dirty(true);
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.frame.set_dirty(true);
        &mut self.data
    }
}

impl std::fmt::Debug for PageWriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("page_id", &self.page_id())
            .field("frame_id", &self.frame_id())
            .finish()
    }
}
