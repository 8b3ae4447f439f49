//! LRU-K replacement policy.
//!
//! The LRU-K algorithm evicts the frame whose backward K-distance is the
//! maximum over all evictable frames. Backward K-distance is the
//! difference between the current timestamp and the timestamp of the
//! K-th previous access.
//!
//! A frame with fewer than K recorded accesses has +inf backward
//! K-distance. When multiple frames are at +inf, the one whose earliest
//! recorded access is oldest is evicted first (classical LRU among
//! them).

use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;

use super::frame::FrameId;

/// How the caller touched a page.
///
/// Forwarded to the replacer on every recorded access so a policy can
/// bias its accounting (for example, age out sequential scans faster).
/// The default policy ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    /// Access pattern unknown.
    #[default]
    Unknown,
    /// Point lookup.
    Lookup,
    /// Sequential scan.
    Scan,
    /// Index traversal.
    Index,
}

/// Per-frame access record.
struct LruKNode {
    frame_id: FrameId,
    is_evictable: bool,
    /// Last K access timestamps, oldest in front.
    history: VecDeque<u64>,
}

/// Position of a node in the eviction order.
///
/// Derived ordering gives the priority order directly: frames still
/// short of K accesses (`full_history = false`) sort before frames with
/// a full history, and within each class an earlier key timestamp means
/// higher eviction priority. The timestamp is the oldest retained
/// access, which for a full history is exactly the K-th most recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EvictionKey {
    full_history: bool,
    timestamp: u64,
    frame_id: FrameId,
}

fn eviction_key(node: &LruKNode, k: usize) -> EvictionKey {
    // A node always holds at least one recorded access.
    let timestamp = node.history.front().copied().unwrap_or(0);
    EvictionKey {
        full_history: node.history.len() >= k,
        timestamp,
        frame_id: node.frame_id,
    }
}

/// LRU-K replacer over buffer pool frames.
///
/// Tracks access history per frame and selects eviction victims. Not
/// synchronized; see [`SyncLruKReplacer`] for the thread-safe wrapper
/// the buffer pool uses.
pub struct LruKReplacer {
    k: usize,
    /// Maximum number of tracked frames (the pool size).
    replacer_size: usize,
    /// Number of currently evictable nodes.
    curr_size: usize,
    current_timestamp: u64,
    nodes: HashMap<FrameId, LruKNode>,
    /// Nodes in eviction priority order, highest priority first.
    queue: BTreeSet<EvictionKey>,
}

impl LruKReplacer {
    /// Creates a replacer for `replacer_size` frames with history depth `k`.
    pub fn new(k: usize, replacer_size: usize) -> Self {
        assert!(k >= 1, "replacer k must be at least 1");
        Self {
            k,
            replacer_size,
            curr_size: 0,
            current_timestamp: 0,
            nodes: HashMap::new(),
            queue: BTreeSet::new(),
        }
    }

    /// Records an access to the given frame at the current timestamp.
    ///
    /// Creates a non-evictable node on first access. If tracking the
    /// frame pushes the node count past the replacer capacity, the
    /// lowest-priority evictable node is evicted immediately.
    pub fn record_access(&mut self, frame_id: FrameId, _access_type: AccessType) {
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;
        let k = self.k;
        match self.nodes.get_mut(&frame_id) {
            Some(node) => {
                let old_key = eviction_key(node, k);
                if node.history.len() == k {
                    node.history.pop_front();
                }
                node.history.push_back(timestamp);
                let new_key = eviction_key(node, k);
                self.queue.remove(&old_key);
                self.queue.insert(new_key);
            }
            None => {
                let mut history = VecDeque::with_capacity(k);
                history.push_back(timestamp);
                let node = LruKNode {
                    frame_id,
                    is_evictable: false,
                    history,
                };
                self.queue.insert(eviction_key(&node, k));
                self.nodes.insert(frame_id, node);
            }
        }
        if self.nodes.len() > self.replacer_size {
            self.evict();
        }
    }

    /// Evicts the evictable frame with the largest backward K-distance.
    ///
    /// Removes the victim's access history. Returns `None` without
    /// mutating state when no frame is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        let victim = self
            .queue
            .iter()
            .find(|key| {
                self.nodes
                    .get(&key.frame_id)
                    .is_some_and(|node| node.is_evictable)
            })
            .copied()?;
        self.queue.remove(&victim);
        self.nodes.remove(&victim.frame_id);
        self.curr_size -= 1;
        Some(victim.frame_id)
    }

    /// Toggles whether a frame is a candidate for eviction.
    ///
    /// Adjusts the replacer size on transitions; no-op for an unknown
    /// frame or when the flag does not change.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let Some(node) = self.nodes.get_mut(&frame_id) else {
            return;
        };
        if node.is_evictable == evictable {
            return;
        }
        node.is_evictable = evictable;
        if evictable {
            self.curr_size += 1;
        } else {
            self.curr_size -= 1;
        }
    }

    /// Returns whether the frame is currently evictable.
    ///
    /// Unknown frames report `true` (there is nothing to protect).
    pub fn is_evictable(&self, frame_id: FrameId) -> bool {
        self.nodes
            .get(&frame_id)
            .map_or(true, |node| node.is_evictable)
    }

    /// Removes a specific frame and its history, regardless of its
    /// position in the eviction order.
    ///
    /// No-op for an unknown frame.
    ///
    /// # Panics
    ///
    /// Panics if the frame is tracked but not evictable: removing a
    /// pinned frame is a caller bug, not a recoverable condition.
    pub fn remove(&mut self, frame_id: FrameId) {
        let Some(node) = self.nodes.get(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "removed non-evictable frame {frame_id} from the replacer"
        );
        let key = eviction_key(node, self.k);
        self.queue.remove(&key);
        self.nodes.remove(&frame_id);
        self.curr_size -= 1;
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.curr_size
    }
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruKReplacer")
            .field("k", &self.k)
            .field("replacer_size", &self.replacer_size)
            .field("curr_size", &self.curr_size)
            .field("tracked", &self.nodes.len())
            .finish()
    }
}

/// Thread-safe LRU-K replacer.
///
/// All the heavy lifting happens in [`LruKReplacer`]; this wrapper adds
/// the replacer latch. The buffer pool acquires its own latch before
/// calling in here, never the other way around.
pub struct SyncLruKReplacer {
    inner: Mutex<LruKReplacer>,
}

impl SyncLruKReplacer {
    /// Creates a synchronized replacer.
    pub fn new(k: usize, replacer_size: usize) -> Self {
        Self {
            inner: Mutex::new(LruKReplacer::new(k, replacer_size)),
        }
    }

    /// See [`LruKReplacer::record_access`].
    pub fn record_access(&self, frame_id: FrameId, access_type: AccessType) {
        self.inner.lock().record_access(frame_id, access_type);
    }

    /// See [`LruKReplacer::evict`].
    pub fn evict(&self) -> Option<FrameId> {
        self.inner.lock().evict()
    }

    /// See [`LruKReplacer::set_evictable`].
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        self.inner.lock().set_evictable(frame_id, evictable);
    }

    /// See [`LruKReplacer::is_evictable`].
    pub fn is_evictable(&self, frame_id: FrameId) -> bool {
        self.inner.lock().is_evictable(frame_id)
    }

    /// See [`LruKReplacer::remove`].
    pub fn remove(&self, frame_id: FrameId) {
        self.inner.lock().remove(frame_id);
    }

    /// See [`LruKReplacer::size`].
    pub fn size(&self) -> usize {
        self.inner.lock().size()
    }
}

impl std::fmt::Debug for SyncLruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.lock().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: usize) -> FrameId {
        FrameId::new(id)
    }

    fn record(replacer: &mut LruKReplacer, id: usize) {
        replacer.record_access(fid(id), AccessType::Unknown);
    }

    #[test]
    fn test_infinite_distance_evicted_oldest_first() {
        // Accesses: A(0), B(1), A(2), C(3) with k = 2. A has a full
        // history; B and C are at +inf. Among the infinities the earliest
        // first access wins, so the order is B, C, then A.
        let mut replacer = LruKReplacer::new(2, 7);
        record(&mut replacer, 0); // A
        record(&mut replacer, 1); // B
        record(&mut replacer, 0); // A
        record(&mut replacer, 2); // C
        for id in 0..3 {
            replacer.set_evictable(fid(id), true);
        }
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_full_history_ranked_by_kth_recent_access() {
        // k = 2; both frames have two accesses. Frame 0's second-most
        // recent access (ts 0) is older than frame 1's (ts 1), so frame 0
        // has the larger backward K-distance and goes first.
        let mut replacer = LruKReplacer::new(2, 7);
        record(&mut replacer, 0); // ts 0
        record(&mut replacer, 1); // ts 1
        record(&mut replacer, 1); // ts 2
        record(&mut replacer, 0); // ts 3
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    fn test_classic_eviction_scenario() {
        let mut replacer = LruKReplacer::new(2, 7);

        // Six frames accessed once; frame 6 stays non-evictable.
        for id in 1..=6 {
            record(&mut replacer, id);
        }
        for id in 1..=5 {
            replacer.set_evictable(fid(id), true);
        }
        replacer.set_evictable(fid(6), false);
        assert_eq!(replacer.size(), 5);

        // Frame 1 gets a second access; every other frame keeps +inf
        // distance, so the eviction order becomes [2, 3, 4, 5, 1].
        record(&mut replacer, 1);

        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.size(), 2);

        // Insert new frames 3 and 4, update 5 and 4.
        record(&mut replacer, 3);
        record(&mut replacer, 4);
        record(&mut replacer, 5);
        record(&mut replacer, 4);
        replacer.set_evictable(fid(3), true);
        replacer.set_evictable(fid(4), true);
        assert_eq!(replacer.size(), 4);

        // Frame 3 has the oldest single access among the infinities.
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.size(), 3);

        // Frame 6 becomes evictable with its old +inf distance.
        replacer.set_evictable(fid(6), true);
        assert_eq!(replacer.size(), 4);
        assert_eq!(replacer.evict(), Some(fid(6)));
        assert_eq!(replacer.size(), 3);

        replacer.set_evictable(fid(1), false);
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(fid(5)));
        assert_eq!(replacer.size(), 1);

        record(&mut replacer, 1);
        record(&mut replacer, 1);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.size(), 2);

        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.size(), 0);

        // Operations on an empty replacer do not modify its size.
        assert_eq!(replacer.evict(), None);
        replacer.remove(fid(1));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_new_node_starts_non_evictable() {
        let mut replacer = LruKReplacer::new(2, 7);
        record(&mut replacer, 0);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
        assert!(!replacer.is_evictable(fid(0)));
    }

    #[test]
    fn test_set_evictable_does_not_double_count() {
        let mut replacer = LruKReplacer::new(2, 7);
        record(&mut replacer, 0);

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(fid(0), false);
        replacer.set_evictable(fid(0), false);
        assert_eq!(replacer.size(), 0);

        // Unknown frame is a no-op.
        replacer.set_evictable(fid(9), true);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_overflow_evicts_immediately() {
        let mut replacer = LruKReplacer::new(2, 2);
        record(&mut replacer, 0);
        record(&mut replacer, 1);
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        // Tracking a third frame exceeds capacity; frame 0 (oldest) is
        // evicted on the spot.
        record(&mut replacer, 2);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(fid(2), true);
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_remove_clears_history() {
        let mut replacer = LruKReplacer::new(2, 7);
        record(&mut replacer, 0);
        record(&mut replacer, 0);
        replacer.set_evictable(fid(0), true);
        replacer.remove(fid(0));
        assert_eq!(replacer.size(), 0);

        // Re-recording starts from an empty history: the frame is back
        // at +inf distance and non-evictable.
        record(&mut replacer, 0);
        assert!(!replacer.is_evictable(fid(0)));
        record(&mut replacer, 1);
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_remove_non_evictable_panics() {
        let mut replacer = LruKReplacer::new(2, 7);
        record(&mut replacer, 0);
        replacer.remove(fid(0));
    }

    #[test]
    fn test_k_equals_one_is_plain_lru() {
        let mut replacer = LruKReplacer::new(1, 7);
        record(&mut replacer, 0);
        record(&mut replacer, 1);
        record(&mut replacer, 0); // frame 0 most recently used
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_sync_wrapper() {
        let replacer = SyncLruKReplacer::new(2, 7);
        replacer.record_access(fid(0), AccessType::Lookup);
        replacer.record_access(fid(1), AccessType::Scan);
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(fid(0)));
        replacer.remove(fid(1));
        assert_eq!(replacer.size(), 0);
    }
}
