//! Keyed fragment buffers with range-merge completeness tracking.

use std::collections::HashMap;
use std::hash::Hash;

use crate::config::{OverlapPolicy, ReassemblyConfig};
use crate::error::ReassemblyError;

/// Sorted, disjoint set of half-open byte ranges.
///
/// Adjacent and overlapping ranges merge on insert; completion testing is
/// then a single comparison against `[0, total)`.
#[derive(Debug, Clone, Default)]
pub struct RangeSet {
    ranges: Vec<(usize, usize)>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Insert `[start, end)`, merging as needed.
    ///
    /// Returns the subranges of the insertion that were NOT already
    /// covered; a first-wins overlap policy writes bytes only there.
    pub fn insert(&mut self, start: usize, end: usize) -> Vec<(usize, usize)> {
        if start >= end {
            return Vec::new();
        }

        // Uncovered gaps within [start, end)
        let mut uncovered = Vec::new();
        let mut cursor = start;
        for &(s, e) in &self.ranges {
            if e <= cursor {
                continue;
            }
            if s >= end {
                break;
            }
            if s > cursor {
                uncovered.push((cursor, s.min(end)));
            }
            cursor = cursor.max(e);
            if cursor >= end {
                break;
            }
        }
        if cursor < end {
            uncovered.push((cursor, end));
        }

        // Merge the new range in (adjacent ranges coalesce too)
        let mut merged_start = start;
        let mut merged_end = end;
        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;
        for &(s, e) in &self.ranges {
            if e < merged_start || s > merged_end {
                if s > merged_end && !placed {
                    result.push((merged_start, merged_end));
                    placed = true;
                }
                result.push((s, e));
            } else {
                merged_start = merged_start.min(s);
                merged_end = merged_end.max(e);
            }
        }
        if !placed {
            result.push((merged_start, merged_end));
            result.sort_unstable();
        }
        self.ranges = result;

        uncovered
    }

    /// Total bytes covered.
    pub fn covered(&self) -> usize {
        self.ranges.iter().map(|(s, e)| e - s).sum()
    }

    /// True when the set is exactly `[0, total)` with no gaps.
    pub fn covers_exactly(&self, total: usize) -> bool {
        self.ranges.len() == 1 && self.ranges[0] == (0, total)
    }

    pub fn spans(&self) -> &[(usize, usize)] {
        &self.ranges
    }
}

/// One partially reassembled datagram.
#[derive(Debug, Clone)]
pub struct DatagramBuffer {
    data: Vec<u8>,
    ranges: RangeSet,
    /// Known once a fragment arrives with "more fragments" unset.
    total_len: Option<usize>,
    /// Frame index of the last fragment applied; drives idle eviction.
    last_frame: u64,
    fragment_count: u32,
}

impl DatagramBuffer {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            ranges: RangeSet::new(),
            total_len: None,
            last_frame: 0,
            fragment_count: 0,
        }
    }

    fn apply(
        &mut self,
        offset: usize,
        payload: &[u8],
        total_hint: Option<usize>,
        frame_index: u64,
        overlap: OverlapPolicy,
    ) {
        let end = offset + payload.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        // First total declaration sticks
        if self.total_len.is_none() {
            self.total_len = total_hint;
        }
        self.last_frame = frame_index;
        self.fragment_count += 1;

        match overlap {
            OverlapPolicy::FirstWins => {
                for (s, e) in self.ranges.insert(offset, end) {
                    self.data[s..e].copy_from_slice(&payload[s - offset..e - offset]);
                }
            }
            OverlapPolicy::LastWins => {
                self.ranges.insert(offset, end);
                self.data[offset..end].copy_from_slice(payload);
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        match self.total_len {
            Some(total) => self.ranges.covers_exactly(total),
            None => false,
        }
    }

    pub fn covered(&self) -> usize {
        self.ranges.covered()
    }

    pub fn total_len(&self) -> Option<usize> {
        self.total_len
    }

    pub fn last_frame(&self) -> u64 {
        self.last_frame
    }

    pub fn fragment_count(&self) -> u32 {
        self.fragment_count
    }

    pub fn buffered_bytes(&self) -> usize {
        self.data.len()
    }

    fn into_payload(mut self) -> Vec<u8> {
        if let Some(total) = self.total_len {
            self.data.truncate(total);
        }
        self.data
    }
}

/// Outcome of a single `upsert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Fragment applied and the buffer now covers `[0, total)`.
    Completed,
    /// Fragment applied; more are needed.
    Pending,
    /// The key blew past a resource ceiling; its buffer was dropped.
    Overflowed,
}

/// Keyed store of partially reassembled buffers.
///
/// Generic over the key so IP datagram and TCP stream domains share the
/// bookkeeping (creation on first fragment, completeness, eviction).
#[derive(Debug)]
pub struct FragmentStore<K> {
    buffers: HashMap<K, DatagramBuffer>,
    config: ReassemblyConfig,
}

impl<K: Eq + Hash + Clone> FragmentStore<K> {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            buffers: HashMap::new(),
            config,
        }
    }

    /// Insert/merge a fragment into the buffer for `key`, creating it if
    /// absent. `total_hint` declares the datagram's full length when known
    /// (the fragment with "more fragments" unset).
    pub fn upsert(
        &mut self,
        key: K,
        offset: usize,
        payload: &[u8],
        total_hint: Option<usize>,
        frame_index: u64,
    ) -> UpsertOutcome {
        let buffer = self.buffers.entry(key.clone()).or_insert_with(DatagramBuffer::new);
        buffer.apply(
            offset,
            payload,
            total_hint,
            frame_index,
            self.config.overlap,
        );

        let ceiling = &self.config.eviction;
        if buffer.fragment_count() > ceiling.max_fragments_per_key
            || buffer.buffered_bytes() > ceiling.max_buffered_bytes_per_key
        {
            self.buffers.remove(&key);
            return UpsertOutcome::Overflowed;
        }

        if buffer.is_complete() {
            UpsertOutcome::Completed
        } else {
            UpsertOutcome::Pending
        }
    }

    pub fn is_complete(&self, key: &K) -> bool {
        self.buffers.get(key).is_some_and(|b| b.is_complete())
    }

    pub fn get(&self, key: &K) -> Option<&DatagramBuffer> {
        self.buffers.get(key)
    }

    /// Remove and return the completed payload for `key`.
    pub fn take(&mut self, key: &K) -> Result<Vec<u8>, ReassemblyError> {
        let buffer = self.buffers.get(key).ok_or(ReassemblyError::UnknownKey)?;
        if !buffer.is_complete() {
            return Err(ReassemblyError::Incomplete {
                covered: buffer.covered(),
                total: buffer.total_len(),
            });
        }
        // Checked above; the remove cannot miss
        let buffer = self.buffers.remove(key).ok_or(ReassemblyError::UnknownKey)?;
        Ok(buffer.into_payload())
    }

    /// Drop buffers idle past the configured frame threshold; returns the
    /// evicted keys.
    pub fn evict(&mut self, current_frame: u64) -> Vec<K> {
        let max_idle = self.config.eviction.max_idle_frames;
        let stale: Vec<K> = self
            .buffers
            .iter()
            .filter(|(_, b)| current_frame.saturating_sub(b.last_frame()) > max_idle)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            self.buffers.remove(key);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionPolicy;

    // Test 1: range merge collapses adjacent and overlapping inserts
    #[test]
    fn test_rangeset_merges() {
        let mut set = RangeSet::new();
        set.insert(0, 100);
        set.insert(200, 300);
        assert_eq!(set.spans(), &[(0, 100), (200, 300)]);

        set.insert(100, 200); // bridges the gap
        assert_eq!(set.spans(), &[(0, 300)]);
        assert!(set.covers_exactly(300));
        assert_eq!(set.covered(), 300);
    }

    // Test 2: insert reports only the uncovered subranges
    #[test]
    fn test_rangeset_uncovered() {
        let mut set = RangeSet::new();
        set.insert(0, 200);

        let uncovered = set.insert(150, 350);
        assert_eq!(uncovered, vec![(200, 350)]);

        let uncovered = set.insert(100, 180);
        assert!(uncovered.is_empty());
    }

    // Test 3: out-of-order middle insert
    #[test]
    fn test_rangeset_out_of_order() {
        let mut set = RangeSet::new();
        set.insert(300, 500);
        set.insert(0, 100);
        set.insert(100, 300);
        assert!(set.covers_exactly(500));
    }

    // Test 4: first-wins keeps the earlier bytes in an overlap
    #[test]
    fn test_first_wins_overlap() {
        let mut store: FragmentStore<u32> = FragmentStore::new(ReassemblyConfig::default());

        store.upsert(1, 0, &[0xaa; 200], None, 1);
        // Overlapping fragment with different content at [150, 200)
        store.upsert(1, 150, &[0xbb; 200], Some(350), 2);

        let payload = store.take(&1).unwrap();
        assert_eq!(payload.len(), 350);
        assert!(payload[..200].iter().all(|&b| b == 0xaa));
        assert!(payload[200..].iter().all(|&b| b == 0xbb));
    }

    // Test 5: last-wins overwrites
    #[test]
    fn test_last_wins_overlap() {
        let config = ReassemblyConfig {
            overlap: OverlapPolicy::LastWins,
            ..Default::default()
        };
        let mut store: FragmentStore<u32> = FragmentStore::new(config);

        store.upsert(1, 0, &[0xaa; 200], None, 1);
        store.upsert(1, 150, &[0xbb; 200], Some(350), 2);

        let payload = store.take(&1).unwrap();
        assert!(payload[..150].iter().all(|&b| b == 0xaa));
        assert!(payload[150..].iter().all(|&b| b == 0xbb));
    }

    // Test 6: take on an incomplete buffer fails without removing it
    #[test]
    fn test_take_incomplete() {
        let mut store: FragmentStore<u32> = FragmentStore::new(ReassemblyConfig::default());
        store.upsert(7, 0, &[1; 100], None, 1);

        let err = store.take(&7).unwrap_err();
        assert_eq!(
            err,
            ReassemblyError::Incomplete {
                covered: 100,
                total: None,
            }
        );
        assert_eq!(store.len(), 1);

        assert_eq!(store.take(&99).unwrap_err(), ReassemblyError::UnknownKey);
    }

    // Test 7: completion requires the total to be declared
    #[test]
    fn test_completion_needs_total() {
        let mut store: FragmentStore<u32> = FragmentStore::new(ReassemblyConfig::default());

        assert_eq!(store.upsert(1, 0, &[0; 100], None, 1), UpsertOutcome::Pending);
        assert!(!store.is_complete(&1));

        assert_eq!(
            store.upsert(1, 100, &[0; 50], Some(150), 2),
            UpsertOutcome::Completed
        );
        assert!(store.is_complete(&1));
    }

    // Test 8: idle buffers drop on evict; the key starts fresh afterwards
    #[test]
    fn test_idle_eviction() {
        let config = ReassemblyConfig {
            eviction: EvictionPolicy {
                max_idle_frames: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut store: FragmentStore<u32> = FragmentStore::new(config);

        store.upsert(1, 0, &[1; 100], None, 5);
        assert!(store.evict(10).is_empty()); // within threshold

        let evicted = store.evict(16);
        assert_eq!(evicted, vec![1]);
        assert!(store.is_empty());

        // A later fragment starts a fresh buffer, not a resumed one
        store.upsert(1, 100, &[2; 50], Some(150), 20);
        assert!(!store.is_complete(&1));
        assert_eq!(store.get(&1).unwrap().fragment_count(), 1);
    }

    // Test 9: fragment-count ceiling drops the key immediately
    #[test]
    fn test_fragment_ceiling_overflow() {
        let config = ReassemblyConfig {
            eviction: EvictionPolicy {
                max_fragments_per_key: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut store: FragmentStore<u32> = FragmentStore::new(config);

        assert_eq!(store.upsert(1, 0, &[0; 8], None, 1), UpsertOutcome::Pending);
        assert_eq!(store.upsert(1, 8, &[0; 8], None, 2), UpsertOutcome::Pending);
        assert_eq!(
            store.upsert(1, 16, &[0; 8], None, 3),
            UpsertOutcome::Overflowed
        );
        assert!(store.is_empty());
    }

    // Test 10: byte ceiling
    #[test]
    fn test_byte_ceiling_overflow() {
        let config = ReassemblyConfig {
            eviction: EvictionPolicy {
                max_buffered_bytes_per_key: 64,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut store: FragmentStore<u32> = FragmentStore::new(config);

        assert_eq!(
            store.upsert(1, 0, &[0; 128], None, 1),
            UpsertOutcome::Overflowed
        );
        assert!(store.is_empty());
    }
}
