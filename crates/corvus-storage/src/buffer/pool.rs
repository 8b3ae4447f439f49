//! Buffer pool: frame table, page table, pin discipline, page lifecycle.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use corvus_common::types::PageId;
use parking_lot::Mutex;
use tracing::debug;

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{BufferFrame, FrameId};
use super::latch::{PageGuard, PageReadGuard, PageWriteGuard};
use super::replacer::{AccessType, SyncLruKReplacer};
use super::BufferPoolStats;
use crate::disk::{DiskManager, DiskRequest, DiskScheduler, RequestKind};
use crate::wal::LogManager;

/// Mutable pool state behind the pool latch.
struct PoolState {
    /// Maps resident page ids to their frames.
    page_table: HashMap<PageId, FrameId>,
    /// Frames currently holding no page, FIFO order.
    free_list: VecDeque<FrameId>,
    /// Next page id to hand out. Ids are never recycled.
    next_page_id: u64,
}

/// The buffer pool manages page caching for the storage engine.
///
/// It keeps a bounded array of fixed-size frames, admits pages on
/// demand, and evicts cold pages back to disk when space runs out. A
/// pinned frame is never relocated or reclaimed. All I/O goes through
/// the [`DiskScheduler`]'s background worker.
///
/// A single pool latch serializes every public operation, including the
/// synchronous wait on disk completions; the replacer keeps its own
/// latch, which is always acquired after the pool latch.
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// The frame array. Frames are allocated once and never move.
    frames: Vec<BufferFrame>,
    /// Page table, free list, and page-id allocator.
    state: Mutex<PoolState>,
    /// Victim selection policy.
    replacer: SyncLruKReplacer,
    /// Scheduled I/O to the block device.
    scheduler: DiskScheduler,
    /// Write-ahead log manager, retained for recovery integration.
    log_manager: Option<Arc<LogManager>>,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Flush counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPool {
    /// Creates a new buffer pool over the given block device.
    pub fn new(config: BufferPoolConfig, disk: Arc<dyn DiskManager>) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;

        let frames: Vec<BufferFrame> = (0..config.pool_size)
            .map(|i| BufferFrame::new(FrameId::new(i), config.page_size))
            .collect();
        // Initially, every frame is on the free list.
        let free_list: VecDeque<FrameId> = (0..config.pool_size).map(FrameId::new).collect();

        Ok(Self {
            replacer: SyncLruKReplacer::new(config.replacer_k, config.pool_size),
            scheduler: DiskScheduler::new(disk),
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(config.pool_size),
                free_list,
                next_page_id: 0,
            }),
            log_manager: None,
            config,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Attaches a write-ahead log manager.
    ///
    /// The pool only retains the handle; the cache layer itself never
    /// appends log records.
    pub fn with_log_manager(mut self, log_manager: Arc<LogManager>) -> Self {
        self.log_manager = Some(log_manager);
        self
    }

    /// Returns the attached log manager, if any.
    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    /// Creates a new page in the buffer pool.
    ///
    /// Allocates a fresh page id, places the page in a free or evicted
    /// frame with `pin_count = 1`, and returns the frame. The caller
    /// owns one pin and must balance it with [`BufferPool::unpin_page`].
    ///
    /// Returns [`BufferError::PoolExhausted`] when every frame is pinned.
    pub fn new_page(&self) -> BufferResult<&BufferFrame> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = Self::allocate_page(&mut state);

        let frame = &self.frames[frame_id.index()];
        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id, AccessType::Unknown);
        Ok(frame)
    }

    /// Fetches the page with the given id, reading it from disk if it is
    /// not resident.
    ///
    /// Every successful fetch takes one pin, matched by exactly one
    /// [`BufferPool::unpin_page`]. Returns [`BufferError::PoolExhausted`]
    /// when the page is not resident and every frame is pinned.
    pub fn fetch_page(
        &self,
        page_id: PageId,
        access_type: AccessType,
    ) -> BufferResult<&BufferFrame> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = &self.frames[frame_id.index()];
            if frame.pin() == 1 {
                self.replacer.set_evictable(frame_id, false);
            }
            self.replacer.record_access(frame_id, access_type);
            return Ok(frame);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.index()];
        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id, access_type);

        if !self.read_from_disk(frame) {
            // Roll the installation back so the frame is reusable.
            state.page_table.remove(&page_id);
            self.replacer.set_evictable(frame_id, true);
            self.replacer.remove(frame_id);
            frame.reset();
            state.free_list.push_back(frame_id);
            return Err(BufferError::DiskRequest { page_id });
        }
        Ok(frame)
    }

    /// Drops one pin on the resident page.
    ///
    /// Returns false if the page is not resident or its pin count is
    /// already zero. `is_dirty` is OR'd into the frame's dirty flag;
    /// passing false never clears it. When the count reaches zero the
    /// frame becomes a candidate for eviction.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool, _access_type: AccessType) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }
        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes the page to disk regardless of its dirty flag and clears
    /// the flag. Pin state is unchanged.
    ///
    /// Returns `Ok(false)` if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        self.flush_frame(&self.frames[frame_id.index()])?;
        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> BufferResult<()> {
        let state = self.state.lock();
        for &frame_id in state.page_table.values() {
            self.flush_frame(&self.frames[frame_id.index()])?;
        }
        Ok(())
    }

    /// Removes the page from the pool and frees its frame.
    ///
    /// Returns `Ok(false)` if the page is pinned, and `Ok(true)` if the
    /// page was deleted or was not resident to begin with. A dirty page
    /// is flushed first, so a later allocation of the same id observes
    /// the stored bytes.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<bool> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.index()];
        if frame.is_pinned() {
            return Ok(false);
        }
        if frame.is_dirty() {
            self.flush_frame(frame)?;
        }
        state.page_table.remove(&page_id);
        debug_assert!(self.replacer.is_evictable(frame_id));
        self.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        Ok(true)
    }

    /// Creates a new page and returns it behind a basic guard.
    pub fn new_page_guarded(&self) -> BufferResult<PageGuard<'_>> {
        let frame = self.new_page()?;
        Ok(PageGuard::new(self, frame))
    }

    /// Fetches a page behind a basic guard (pin only, no page latch).
    pub fn fetch_page_basic(&self, page_id: PageId) -> BufferResult<PageGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(PageGuard::new(self, frame))
    }

    /// Fetches a page behind a read guard holding the page latch in
    /// shared mode.
    pub fn fetch_page_read(&self, page_id: PageId) -> BufferResult<PageReadGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(PageReadGuard::new(self, frame))
    }

    /// Fetches a page behind a write guard holding the page latch in
    /// exclusive mode.
    pub fn fetch_page_write(&self, page_id: PageId) -> BufferResult<PageWriteGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(PageWriteGuard::new(self, frame))
    }

    /// Returns true if the page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Number of resident pages.
    pub fn resident_page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns a snapshot of the pool's statistics.
    pub fn stats(&self) -> BufferPoolStats {
        let resident_pages = self.state.lock().page_table.len();
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }
        BufferPoolStats {
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            disk_requests: self.scheduler.scheduled_count(),
            resident_pages,
            pinned_frames: pinned,
            dirty_frames: dirty,
            evictable_frames: self.replacer.size(),
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Returns and post-increments the page-id counter.
    fn allocate_page(state: &mut PoolState) -> PageId {
        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;
        page_id
    }

    /// Takes a frame from the free list, or evicts one.
    ///
    /// The returned frame is unmapped: a dirty victim has been written
    /// back and its page-table entry erased.
    fn acquire_frame(&self, state: &mut PoolState) -> BufferResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.replacer.evict() else {
            return Err(BufferError::PoolExhausted);
        };
        let frame = &self.frames[frame_id.index()];
        let victim_page = frame.page_id();
        if frame.is_dirty() && !self.write_back(frame) {
            // Put the node back so the page stays tracked and evictable.
            self.replacer.record_access(frame_id, AccessType::Unknown);
            self.replacer.set_evictable(frame_id, true);
            return Err(BufferError::DiskRequest {
                page_id: victim_page,
            });
        }
        state.page_table.remove(&victim_page);
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        debug!(page = %victim_page, frame = %frame_id, "evicted page");
        Ok(frame_id)
    }

    /// Writes the frame out and clears its dirty flag.
    fn flush_frame(&self, frame: &BufferFrame) -> BufferResult<()> {
        if !self.write_back(frame) {
            return Err(BufferError::DiskRequest {
                page_id: frame.page_id(),
            });
        }
        frame.set_dirty(false);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Schedules a write of the frame's page and waits for completion.
    fn write_back(&self, frame: &BufferFrame) -> bool {
        let (done, wait) = mpsc::channel();
        self.scheduler.schedule(DiskRequest {
            kind: RequestKind::Write,
            page_id: frame.page_id(),
            data: frame.data_handle(),
            done,
        });
        wait.recv().unwrap_or(false)
    }

    /// Schedules a read into the frame's buffer and waits for completion.
    fn read_from_disk(&self, frame: &BufferFrame) -> bool {
        let (done, wait) = mpsc::channel();
        self.scheduler.schedule(DiskRequest {
            kind: RequestKind::Read,
            page_id: frame.page_id(),
            data: frame.data_handle(),
            done,
        });
        wait.recv().unwrap_or(false)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("pool_size", &self.config.pool_size)
            .field("page_size", &self.config.page_size)
            .field("resident_pages", &self.resident_page_count())
            .field("stats", &self.stats())
            .finish()
    }
}
