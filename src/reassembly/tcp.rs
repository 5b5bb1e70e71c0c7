//! TCP stream reassembly.
//!
//! Unlike datagram reassembly there is no completion signal: the buffer
//! tracks a left edge (lowest contiguous sequence number) and emits bytes
//! as the edge advances. Out-of-order segments queue ahead of the edge;
//! overlapping bytes defer to the earliest-arriving data.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use tracing::warn;

use crate::config::ReassemblyConfig;

use super::{ReassemblyEvent, ReassemblyKey, ReassemblyStatus, TcpSegment};

/// Stream identity: one buffer per directed (src, dst) endpoint pair.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct StreamKey {
    pub src: (IpAddr, u16),
    pub dst: (IpAddr, u16),
}

/// Buffer for one direction of a TCP stream.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    /// Next expected sequence number (the left edge).
    expected_seq: u32,
    /// Initial sequence number, from SYN or inferred from the first segment.
    initial_seq: Option<u32>,
    /// Out-of-order payloads queued ahead of the left edge.
    pending: BTreeMap<u32, Vec<u8>>,
    /// Contiguous bytes not yet handed to the caller.
    ready: Vec<u8>,
    /// Frame index of the last segment applied; drives idle eviction.
    last_frame: u64,
    segment_count: u32,
    fin_received: bool,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial sequence number from a SYN (consumes one seq).
    fn set_initial_seq(&mut self, seq: u32) {
        self.initial_seq = Some(seq);
        self.expected_seq = seq.wrapping_add(1);
    }

    /// Apply one segment's payload at `seq`.
    ///
    /// Advances the left edge when the segment (or a cascade of queued
    /// segments it unblocks) is contiguous with it.
    pub fn add_segment(&mut self, seq: u32, data: &[u8], syn: bool, fin: bool, frame_index: u64) {
        self.last_frame = frame_index;
        if syn {
            self.set_initial_seq(seq);
        }
        if fin {
            self.fin_received = true;
        }
        if data.is_empty() {
            return;
        }
        self.segment_count += 1;

        // Without a SYN, the first payload segment anchors the stream
        let data_seq = if syn { seq.wrapping_add(1) } else { seq };
        if self.initial_seq.is_none() {
            self.initial_seq = Some(data_seq);
            self.expected_seq = data_seq;
        }

        let seg_end = seq_add(data_seq, data.len());

        if seq_lt(data_seq, self.expected_seq) {
            // Fully before the edge: pure retransmit, already-emitted bytes win
            if seq_le(seg_end, self.expected_seq) {
                return;
            }
            // Partial overlap with emitted data: keep the earlier bytes,
            // apply only the tail
            let overlap = self.expected_seq.wrapping_sub(data_seq) as usize;
            self.apply_at_edge(&data[overlap..]);
            return;
        }

        if data_seq == self.expected_seq {
            self.apply_at_edge(data);
        } else {
            // Ahead of the edge: queue it. A duplicate seq keeps the
            // earlier arrival.
            self.pending.entry(data_seq).or_insert_with(|| data.to_vec());
        }
    }

    /// Extend the run with `data`, deferring to queued segments wherever
    /// they overlap it (queued segments arrived earlier by definition).
    fn apply_at_edge(&mut self, mut data: &[u8]) {
        loop {
            // Earliest queued segment starting inside the incoming run
            let overlap = self
                .pending
                .keys()
                .map(|&s| (s, s.wrapping_sub(self.expected_seq) as usize))
                .filter(|&(_, off)| off < data.len())
                .min_by_key(|&(_, off)| off);

            let Some((seq, head)) = overlap else {
                self.ready.extend_from_slice(data);
                self.expected_seq = seq_add(self.expected_seq, data.len());
                break;
            };

            // Incoming bytes up to the queued segment, then the queued
            // bytes themselves win across their span
            self.ready.extend_from_slice(&data[..head]);
            self.expected_seq = seq;
            if let Some(queued) = self.pending.remove(&seq) {
                let consumed = head + queued.len();
                self.expected_seq = seq_add(seq, queued.len());
                self.ready.extend_from_slice(&queued);
                data = if consumed < data.len() {
                    &data[consumed..]
                } else {
                    &[]
                };
            } else {
                data = &[];
            }
            if data.is_empty() {
                break;
            }
        }
        self.flush_pending();
    }

    /// Cascade queued segments that the new left edge made contiguous.
    fn flush_pending(&mut self) {
        while let Some((&seq, _)) = self.pending.first_key_value() {
            if seq == self.expected_seq {
                if let Some(data) = self.pending.remove(&seq) {
                    self.ready.extend_from_slice(&data);
                    self.expected_seq = seq_add(seq, data.len());
                }
            } else if seq_lt(seq, self.expected_seq) {
                // Queued segment the edge has overtaken: earlier bytes won,
                // keep only a tail that still extends the edge
                if let Some(data) = self.pending.remove(&seq) {
                    let end = seq_add(seq, data.len());
                    if seq_lt(self.expected_seq, end) {
                        let overlap = self.expected_seq.wrapping_sub(seq) as usize;
                        self.ready.extend_from_slice(&data[overlap..]);
                        self.expected_seq = end;
                    }
                }
            } else {
                // Gap ahead of the edge
                break;
            }
        }
    }

    /// Take the bytes the left edge has passed since the last call.
    pub fn drain_ready(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.ready)
    }

    /// Left edge sequence number.
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    pub fn fin_received(&self) -> bool {
        self.fin_received
    }

    pub fn last_frame(&self) -> u64 {
        self.last_frame
    }

    pub fn segment_count(&self) -> u32 {
        self.segment_count
    }

    /// Bytes held: contiguous-but-undrained plus queued out-of-order.
    pub fn buffered_bytes(&self) -> usize {
        self.ready.len() + self.pending.values().map(Vec::len).sum::<usize>()
    }
}

// Wrapping sequence-space comparisons (RFC 1982 style)
fn seq_lt(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

fn seq_le(a: u32, b: u32) -> bool {
    a == b || seq_lt(a, b)
}

fn seq_add(a: u32, n: usize) -> u32 {
    a.wrapping_add(n as u32)
}

/// TCP stream reassembler across all live streams.
#[derive(Debug)]
pub struct TcpStreamReassembler {
    streams: HashMap<StreamKey, StreamBuffer>,
    config: ReassemblyConfig,
}

impl TcpStreamReassembler {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            streams: HashMap::new(),
            config,
        }
    }

    /// Apply one segment; emits the newly contiguous run, if any.
    pub fn submit(&mut self, segment: TcpSegment) -> ReassemblyEvent {
        let TcpSegment {
            key,
            seq,
            payload,
            syn,
            fin,
            frame_index,
        } = segment;

        let buffer = self.streams.entry(key.clone()).or_default();
        buffer.add_segment(seq, &payload, syn, fin, frame_index);

        let ceiling = &self.config.eviction;
        if buffer.segment_count() > ceiling.max_fragments_per_key
            || buffer.buffered_bytes() > ceiling.max_buffered_bytes_per_key
        {
            warn!(
                src = %key.src.0, src_port = key.src.1,
                dst = %key.dst.0, dst_port = key.dst.1,
                "tcp stream buffer exceeded resource ceiling, dropped"
            );
            self.streams.remove(&key);
            return ReassemblyEvent {
                key: ReassemblyKey::Tcp(key),
                status: ReassemblyStatus::EvictedIncomplete,
                payload: Vec::new(),
            };
        }

        let emitted = buffer.drain_ready();
        let fin_done = buffer.fin_received();
        if fin_done {
            self.streams.remove(&key);
        }

        let status = if !emitted.is_empty() || fin_done {
            ReassemblyStatus::Complete
        } else {
            ReassemblyStatus::Pending
        };
        ReassemblyEvent {
            key: ReassemblyKey::Tcp(key),
            status,
            payload: emitted,
        }
    }

    /// Drop idle streams; one event per evicted key.
    pub fn evict(&mut self, current_frame: u64) -> Vec<ReassemblyEvent> {
        let max_idle = self.config.eviction.max_idle_frames;
        let stale: Vec<StreamKey> = self
            .streams
            .iter()
            .filter(|(_, b)| current_frame.saturating_sub(b.last_frame()) > max_idle)
            .map(|(k, _)| k.clone())
            .collect();

        stale
            .into_iter()
            .map(|key| {
                warn!(
                    src = %key.src.0, src_port = key.src.1,
                    dst = %key.dst.0, dst_port = key.dst.1,
                    "tcp stream buffer evicted while idle"
                );
                self.streams.remove(&key);
                ReassemblyEvent {
                    key: ReassemblyKey::Tcp(key),
                    status: ReassemblyStatus::EvictedIncomplete,
                    payload: Vec::new(),
                }
            })
            .collect()
    }

    pub fn live_streams(&self) -> usize {
        self.streams.len()
    }
}
