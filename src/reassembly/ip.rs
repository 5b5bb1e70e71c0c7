//! IP datagram reassembly.
//!
//! Fragments are addressed by byte offset; a fragment with "more
//! fragments" unset declares the datagram's total length. Completion means
//! contiguous coverage of `[0, total)`.

use std::net::IpAddr;

use tracing::warn;

use crate::config::ReassemblyConfig;

use super::store::{FragmentStore, UpsertOutcome};
use super::{IpFragment, ReassemblyEvent, ReassemblyKey, ReassemblyStatus};

/// Datagram identity: one in-flight reassembly per (src, dst, protocol,
/// identification) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpKey {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: u8,
    pub ident: u32,
}

/// IP datagram reassembler over the generic fragment store.
#[derive(Debug)]
pub struct IpReassembler {
    store: FragmentStore<IpKey>,
}

impl IpReassembler {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            store: FragmentStore::new(config),
        }
    }

    /// Apply one fragment. Completion yields the synthesized datagram.
    pub fn submit(&mut self, fragment: IpFragment) -> ReassemblyEvent {
        let IpFragment {
            key,
            offset,
            payload,
            more_fragments,
            frame_index,
        } = fragment;

        // The final fragment pins the datagram's total length
        let total_hint = if more_fragments {
            None
        } else {
            Some(offset + payload.len())
        };

        let outcome = self
            .store
            .upsert(key.clone(), offset, &payload, total_hint, frame_index);

        match outcome {
            UpsertOutcome::Completed => {
                // upsert just reported completion; take cannot fail
                let payload = self.store.take(&key).unwrap_or_default();
                ReassemblyEvent {
                    key: ReassemblyKey::Ip(key),
                    status: ReassemblyStatus::Complete,
                    payload,
                }
            }
            UpsertOutcome::Pending => ReassemblyEvent {
                key: ReassemblyKey::Ip(key),
                status: ReassemblyStatus::Pending,
                payload: Vec::new(),
            },
            UpsertOutcome::Overflowed => {
                warn!(
                    src = %key.src,
                    dst = %key.dst,
                    ident = key.ident,
                    "ip reassembly buffer exceeded resource ceiling, dropped"
                );
                ReassemblyEvent {
                    key: ReassemblyKey::Ip(key),
                    status: ReassemblyStatus::EvictedIncomplete,
                    payload: Vec::new(),
                }
            }
        }
    }

    /// Drop idle buffers; one event per evicted key.
    pub fn evict(&mut self, current_frame: u64) -> Vec<ReassemblyEvent> {
        self.store
            .evict(current_frame)
            .into_iter()
            .map(|key| {
                warn!(
                    src = %key.src,
                    dst = %key.dst,
                    ident = key.ident,
                    "ip reassembly buffer evicted while incomplete"
                );
                ReassemblyEvent {
                    key: ReassemblyKey::Ip(key),
                    status: ReassemblyStatus::EvictedIncomplete,
                    payload: Vec::new(),
                }
            })
            .collect()
    }

    pub fn pending_keys(&self) -> usize {
        self.store.len()
    }
}
