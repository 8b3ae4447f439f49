//! Disk scheduler: a single background worker draining an I/O queue.
//!
//! The scheduler decouples block-device latency from the buffer pool's
//! latch. Producers enqueue [`DiskRequest`]s and return immediately; the
//! worker performs the transfer and fires the request's one-shot
//! completion sender with a success boolean. Requests on distinct pages
//! complete in submission order because there is exactly one worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use corvus_common::types::PageId;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::manager::DiskManager;

/// Direction of a disk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Fill the buffer from disk.
    Read,
    /// Store the buffer to disk.
    Write,
}

/// A single block I/O request.
///
/// The buffer is shared with the frame it belongs to; the worker takes
/// the frame's page latch (read for writes, write for reads) for the
/// duration of the transfer. `done` is fired exactly once with `true` on
/// success and `false` on device error.
pub struct DiskRequest {
    /// Transfer direction.
    pub kind: RequestKind,
    /// Target page.
    pub page_id: PageId,
    /// Shared reference to the page buffer.
    pub data: Arc<RwLock<Vec<u8>>>,
    /// One-shot completion signal.
    pub done: Sender<bool>,
}

impl std::fmt::Debug for DiskRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskRequest")
            .field("kind", &self.kind)
            .field("page_id", &self.page_id)
            .finish()
    }
}

/// Schedules disk requests onto a background worker thread.
///
/// The worker is spawned at construction and joined on drop: dropping
/// the scheduler enqueues a shutdown sentinel behind any outstanding
/// requests, so everything already scheduled still completes.
pub struct DiskScheduler {
    queue: Sender<Option<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
    scheduled: AtomicU64,
}

impl DiskScheduler {
    /// Spawns the worker thread over the given block device.
    pub fn new(disk: Arc<dyn DiskManager>) -> Self {
        let (queue, requests) = mpsc::channel();
        let worker = thread::spawn(move || Self::worker_loop(&requests, disk.as_ref()));
        Self {
            queue,
            worker: Some(worker),
            scheduled: AtomicU64::new(0),
        }
    }

    /// Enqueues a request and returns immediately.
    ///
    /// The request's completion sender fires once the transfer finishes.
    /// Safe to call from multiple threads.
    pub fn schedule(&self, request: DiskRequest) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        if self.queue.send(Some(request)).is_err() {
            // Worker gone; the caller observes the dropped completion
            // sender as a failed request.
            warn!("disk scheduler worker is not running, request dropped");
        }
    }

    /// Total requests scheduled so far.
    pub fn scheduled_count(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    fn worker_loop(requests: &Receiver<Option<DiskRequest>>, disk: &dyn DiskManager) {
        while let Ok(Some(request)) = requests.recv() {
            let result = match request.kind {
                RequestKind::Read => {
                    let mut buf = request.data.write();
                    disk.read_page(request.page_id, &mut buf)
                }
                RequestKind::Write => {
                    let buf = request.data.read();
                    disk.write_page(request.page_id, &buf)
                }
            };
            let ok = match result {
                Ok(()) => true,
                Err(error) => {
                    warn!(page_id = %request.page_id, %error, "disk request failed");
                    false
                }
            };
            // The receiver may have given up waiting; that is not an error.
            let _ = request.done.send(ok);
        }
        debug!("disk scheduler worker exiting");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Sentinel behind all outstanding requests, then wait for the
        // worker to drain.
        let _ = self.queue.send(None);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for DiskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskScheduler")
            .field("scheduled", &self.scheduled_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::manager::{DiskResult, MemoryDiskManager};

    const PAGE_SIZE: usize = 512;

    fn buffer(fill: u8) -> Arc<RwLock<Vec<u8>>> {
        Arc::new(RwLock::new(vec![fill; PAGE_SIZE]))
    }

    #[test]
    fn test_schedule_write_then_read() {
        let disk = Arc::new(MemoryDiskManager::new(PAGE_SIZE));
        let scheduler = DiskScheduler::new(Arc::clone(&disk) as Arc<dyn DiskManager>);

        let (done, wait) = mpsc::channel();
        scheduler.schedule(DiskRequest {
            kind: RequestKind::Write,
            page_id: PageId::new(0),
            data: buffer(0xCD),
            done,
        });
        assert!(wait.recv().unwrap());

        let out = buffer(0);
        let (done, wait) = mpsc::channel();
        scheduler.schedule(DiskRequest {
            kind: RequestKind::Read,
            page_id: PageId::new(0),
            data: Arc::clone(&out),
            done,
        });
        assert!(wait.recv().unwrap());
        assert!(out.read().iter().all(|&b| b == 0xCD));
    }

    #[test]
    fn test_requests_complete_in_fifo_order() {
        let disk = Arc::new(MemoryDiskManager::new(PAGE_SIZE));
        let scheduler = DiskScheduler::new(Arc::clone(&disk) as Arc<dyn DiskManager>);

        let mut waits = Vec::new();
        for i in 0..16u64 {
            let (done, wait) = mpsc::channel();
            scheduler.schedule(DiskRequest {
                kind: RequestKind::Write,
                page_id: PageId::new(i),
                data: buffer(i as u8),
                done,
            });
            waits.push(wait);
        }
        // A later request completing implies every earlier one already has.
        assert!(waits.pop().unwrap().recv().unwrap());
        for wait in waits {
            assert!(wait.try_recv().unwrap());
        }
        assert_eq!(disk.write_count(), 16);
        assert_eq!(scheduler.scheduled_count(), 16);
    }

    #[test]
    fn test_failure_surfaces_as_false() {
        struct BrokenDisk;
        impl DiskManager for BrokenDisk {
            fn read_page(&self, page_id: PageId, _buf: &mut [u8]) -> DiskResult<()> {
                Err(crate::disk::DiskError::InvalidPageId { page_id })
            }
            fn write_page(&self, page_id: PageId, _data: &[u8]) -> DiskResult<()> {
                Err(crate::disk::DiskError::InvalidPageId { page_id })
            }
            fn page_size(&self) -> usize {
                PAGE_SIZE
            }
        }

        let scheduler = DiskScheduler::new(Arc::new(BrokenDisk));
        let (done, wait) = mpsc::channel();
        scheduler.schedule(DiskRequest {
            kind: RequestKind::Write,
            page_id: PageId::new(1),
            data: buffer(0),
            done,
        });
        assert!(!wait.recv().unwrap());
    }

    #[test]
    fn test_drop_drains_outstanding_requests() {
        let disk = Arc::new(MemoryDiskManager::new(PAGE_SIZE));
        let scheduler = DiskScheduler::new(Arc::clone(&disk) as Arc<dyn DiskManager>);

        let mut waits = Vec::new();
        for i in 0..8u64 {
            let (done, wait) = mpsc::channel();
            scheduler.schedule(DiskRequest {
                kind: RequestKind::Write,
                page_id: PageId::new(i),
                data: buffer(1),
                done,
            });
            waits.push(wait);
        }
        drop(scheduler);

        for wait in waits {
            assert!(wait.recv().unwrap());
        }
        assert_eq!(disk.write_count(), 8);
    }
}
