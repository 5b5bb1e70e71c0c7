//! Cross-frame reassembly: IP datagram fragments and TCP streams.
//!
//! The decode chain emits [`FragmentDescriptor`]s mid-chain; the
//! [`ReassemblyEngine`] routes each to the store for its domain and emits a
//! [`ReassemblyEvent`] describing what happened. Buffers here are the only
//! cross-frame mutable state in the crate.

pub mod ip;
pub mod store;
pub mod tcp;

pub use ip::{IpKey, IpReassembler};
pub use store::{DatagramBuffer, FragmentStore, RangeSet};
pub use tcp::{StreamBuffer, StreamKey, TcpStreamReassembler};

use crate::config::ReassemblyConfig;

/// One IP fragment, detached from its frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpFragment {
    pub key: IpKey,
    /// Byte offset within the original datagram (already scaled from the
    /// 8-octet wire units).
    pub offset: usize,
    pub payload: Vec<u8>,
    pub more_fragments: bool,
    /// Frame that carried this fragment; drives idle eviction.
    pub frame_index: u64,
}

/// One TCP segment's payload, detached from its frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSegment {
    pub key: StreamKey,
    pub seq: u32,
    pub payload: Vec<u8>,
    pub syn: bool,
    pub fin: bool,
    pub frame_index: u64,
}

/// A unit of work for the reassembly engine, produced by the decode chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentDescriptor {
    Ip(IpFragment),
    Tcp(TcpSegment),
}

/// Reassembly key, reported back alongside synthesized payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReassemblyKey {
    Ip(IpKey),
    Tcp(StreamKey),
}

impl std::fmt::Display for ReassemblyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReassemblyKey::Ip(k) => write!(
                f,
                "ip {} -> {} proto {} id {:#x}",
                k.src, k.dst, k.protocol, k.ident
            ),
            ReassemblyKey::Tcp(k) => write!(
                f,
                "tcp {}:{} -> {}:{}",
                k.src.0, k.src.1, k.dst.0, k.dst.1
            ),
        }
    }
}

/// Outcome of applying one descriptor (or of an eviction sweep).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyStatus {
    /// A full payload is available.
    Complete,
    /// The buffer is waiting on more fragments.
    Pending,
    /// The buffer was dropped before completing.
    EvictedIncomplete,
}

/// Synthesized payload (or progress report) for one reassembly key.
#[derive(Debug, Clone)]
pub struct ReassemblyEvent {
    pub key: ReassemblyKey,
    pub status: ReassemblyStatus,
    /// Complete datagram, or the newly contiguous stream bytes. Empty for
    /// `Pending` and `EvictedIncomplete`.
    pub payload: Vec<u8>,
}

/// Orchestrates the per-domain stores.
///
/// Single-threaded by design: fragments for a key must be applied in frame
/// arrival order or the overlap policy loses its determinism.
#[derive(Debug)]
pub struct ReassemblyEngine {
    ip: IpReassembler,
    tcp: TcpStreamReassembler,
}

impl ReassemblyEngine {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            ip: IpReassembler::new(config.clone()),
            tcp: TcpStreamReassembler::new(config),
        }
    }

    /// Apply one descriptor, returning the resulting event.
    pub fn submit(&mut self, descriptor: FragmentDescriptor) -> ReassemblyEvent {
        match descriptor {
            FragmentDescriptor::Ip(fragment) => self.ip.submit(fragment),
            FragmentDescriptor::Tcp(segment) => self.tcp.submit(segment),
        }
    }

    /// Sweep both domains for idle buffers; called between frames.
    pub fn evict(&mut self, current_frame: u64) -> Vec<ReassemblyEvent> {
        let mut events = Vec::new();
        events.extend(self.ip.evict(current_frame));
        events.extend(self.tcp.evict(current_frame));
        events
    }
}
