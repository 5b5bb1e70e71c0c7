//! Configuration consumed by the dissector core.
//!
//! All knobs are supplied externally; the core never reads process-global
//! state. See [`DissectConfig::default`] for the values used when the
//! embedding application has no opinion.

use std::collections::HashSet;

/// How overlapping bytes in a reassembly buffer are resolved.
///
/// Applies to both IP datagram and TCP stream reassembly. Determinism of
/// either choice depends on fragments being applied in frame arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Bytes from the first-received fragment win (RFC 815 style).
    #[default]
    FirstWins,
    /// Bytes from the most recent fragment overwrite earlier data.
    LastWins,
}

/// Resource ceilings consulted by `evict()` between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Buffers untouched for this many frames are dropped.
    pub max_idle_frames: u64,
    /// Per-key fragment/segment count ceiling.
    pub max_fragments_per_key: u32,
    /// Per-key buffered byte ceiling.
    pub max_buffered_bytes_per_key: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_idle_frames: 4096,
            max_fragments_per_key: 1024,
            max_buffered_bytes_per_key: 16 * 1024 * 1024, // 16 MB per key
        }
    }
}

/// Configuration for the reassembly engine.
#[derive(Debug, Clone, Default)]
pub struct ReassemblyConfig {
    pub overlap: OverlapPolicy,
    pub eviction: EvictionPolicy,
}

/// Configuration for one dissector instance.
#[derive(Debug, Clone)]
pub struct DissectConfig {
    /// Maximum number of layers decoded per frame. Exceeding it ends the
    /// chain with a depth-exceeded terminal (guards cyclic tunneling).
    pub max_depth: usize,
    /// Protocols to treat as opaque payload (by decoder name).
    pub disabled: HashSet<String>,
    /// Reassembly policy knobs.
    pub reassembly: ReassemblyConfig,
}

impl Default for DissectConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            disabled: HashSet::new(),
            reassembly: ReassemblyConfig::default(),
        }
    }
}

impl DissectConfig {
    /// Disable a protocol by decoder name; its bytes become a raw terminal.
    pub fn disable(mut self, protocol: &str) -> Self {
        self.disabled.insert(protocol.to_string());
        self
    }

    /// Check whether a decoder is enabled.
    pub fn is_enabled(&self, protocol: &str) -> bool {
        !self.disabled.contains(protocol)
    }
}
