//! Frame-by-frame dissection façade.
//!
//! Owns the registry, the configuration, and the only cross-frame mutable
//! state (the reassembly engine). One instance per capture stream; a
//! single instance must not be driven from more than one thread.

use tracing::debug;

use crate::chain::{decode_frame, decode_with_context, Frame, ProtocolChain, FrameDissection};
use crate::config::DissectConfig;
use crate::error::Result;
use crate::protocol::{default_registry, DecodeContext, DecoderRegistry, OwnedFieldValue};
use crate::reassembly::{ReassemblyEngine, ReassemblyEvent, ReassemblyKey, ReassemblyStatus};

/// Layers decoded from a synthesized (reassembled) payload, with all field
/// values detached from the transient buffer.
pub type OwnedLayers = Vec<(&'static str, Vec<(&'static str, OwnedFieldValue)>)>;

/// A payload synthesized by the reassembly engine, tagged with its key and
/// decoded one step further.
#[derive(Debug)]
pub struct ReassembledPayload {
    pub key: ReassemblyKey,
    pub status: ReassemblyStatus,
    /// Chain reached when re-decoding the synthesized payload.
    pub chain: ProtocolChain,
    pub layers: OwnedLayers,
    pub payload: Vec<u8>,
}

/// Everything produced for one frame.
#[derive(Debug)]
pub struct FrameOutput<'a> {
    pub dissection: FrameDissection<'a>,
    /// Reassembly output triggered by this frame: completed payloads and
    /// progress/eviction notices.
    pub reassembled: Vec<ReassembledPayload>,
}

impl<'a> FrameOutput<'a> {
    /// Completed payloads only.
    pub fn completed(&self) -> impl Iterator<Item = &ReassembledPayload> {
        self.reassembled
            .iter()
            .filter(|r| r.status == ReassemblyStatus::Complete)
    }
}

/// The core engine: decode chains plus reassembly, one frame at a time.
#[derive(Debug)]
pub struct Dissector {
    registry: DecoderRegistry,
    config: DissectConfig,
    engine: ReassemblyEngine,
}

impl Dissector {
    /// Dissector with all built-in decoders and default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(DissectConfig::default())
    }

    pub fn with_config(config: DissectConfig) -> Result<Self> {
        Ok(Self {
            registry: default_registry()?,
            engine: ReassemblyEngine::new(config.reassembly.clone()),
            config,
        })
    }

    /// Dissector over a caller-assembled registry.
    pub fn with_registry(registry: DecoderRegistry, config: DissectConfig) -> Self {
        Self {
            registry,
            engine: ReassemblyEngine::new(config.reassembly.clone()),
            config,
        }
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DissectConfig {
        &self.config
    }

    /// Process one frame: decode its chain, apply any fragment it carried
    /// to the reassembly engine, re-decode completed payloads, and sweep
    /// idle buffers.
    ///
    /// Frames must be fed in increasing index order; overlap resolution is
    /// only deterministic under arrival-ordered application.
    pub fn process_frame<'a>(&mut self, frame: &Frame<'a>) -> FrameOutput<'a> {
        let mut dissection = decode_frame(&self.registry, &self.config, frame);
        let mut reassembled = Vec::new();

        if let Some(descriptor) = dissection.descriptor.take() {
            let event = self.engine.submit(descriptor);
            self.resolve_event(event, frame.index, &mut reassembled);
        }

        // Synchronous between-frames sweep, never a background task
        for event in self.engine.evict(frame.index) {
            reassembled.push(ReassembledPayload {
                key: event.key,
                status: event.status,
                chain: ProtocolChain {
                    protocols: Vec::new(),
                    terminal: crate::chain::Terminal::NoPayload,
                },
                layers: Vec::new(),
                payload: Vec::new(),
            });
        }

        FrameOutput {
            dissection,
            reassembled,
        }
    }

    /// Turn one reassembly event into output, feeding completed payloads
    /// back through the decode chain (which may in turn emit another
    /// descriptor, e.g. a TCP segment inside a reassembled datagram).
    fn resolve_event(
        &mut self,
        event: ReassemblyEvent,
        frame_index: u64,
        out: &mut Vec<ReassembledPayload>,
    ) {
        let ReassemblyEvent {
            key,
            status,
            payload,
        } = event;

        if status != ReassemblyStatus::Complete || payload.is_empty() {
            out.push(ReassembledPayload {
                key,
                status,
                chain: ProtocolChain {
                    protocols: Vec::new(),
                    terminal: crate::chain::Terminal::NoPayload,
                },
                layers: Vec::new(),
                payload,
            });
            return;
        }

        debug!(key = %key, bytes = payload.len(), "reassembly completed");

        let context = self.injection_context(&key);
        let inner = decode_with_context(
            &self.registry,
            &self.config,
            context,
            &payload,
            frame_index,
        );

        // Detach fields before the payload buffer moves
        let layers: OwnedLayers = inner
            .layers
            .iter()
            .map(|(name, layer)| (*name, layer.owned_fields()))
            .collect();
        let chain = inner.chain.clone();
        let nested = inner.descriptor.clone();
        drop(inner);

        out.push(ReassembledPayload {
            key,
            status,
            chain,
            layers,
            payload,
        });

        if let Some(descriptor) = nested {
            let event = self.engine.submit(descriptor);
            self.resolve_event(event, frame_index, out);
        }
    }

    /// Starting context for re-decoding a synthesized payload.
    fn injection_context(&self, key: &ReassemblyKey) -> DecodeContext {
        let mut context = DecodeContext::new(0);
        match key {
            ReassemblyKey::Ip(k) => {
                // Resume at the transport layer the datagram carried
                context.parent_protocol = Some(match k.src {
                    std::net::IpAddr::V4(_) => "ipv4",
                    std::net::IpAddr::V6(_) => "ipv6",
                });
                context.insert_hint("ip_protocol", k.protocol as u64);
            }
            ReassemblyKey::Tcp(k) => {
                // No application decoders are registered; the stream bytes
                // surface as a raw terminal tagged with the ports
                context.parent_protocol = Some("tcp");
                context.insert_hint("src_port", k.src.1 as u64);
                context.insert_hint("dst_port", k.dst.1 as u64);
            }
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Terminal;

    /// Ethernet + IPv4 frame with the given fragment fields around a UDP
    /// payload slice.
    fn ipv4_fragment_frame(
        ident: u16,
        offset_units: u16,
        more: bool,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut f = Vec::new();
        f.extend_from_slice(&[0; 6]);
        f.extend_from_slice(&[1; 6]);
        f.extend_from_slice(&[0x08, 0x00]);

        let total_len = (20 + payload.len()) as u16;
        let flags_frag = offset_units | if more { 0x2000 } else { 0x0000 };
        f.extend_from_slice(&[0x45, 0x00]);
        f.extend_from_slice(&total_len.to_be_bytes());
        f.extend_from_slice(&ident.to_be_bytes());
        f.extend_from_slice(&flags_frag.to_be_bytes());
        f.extend_from_slice(&[0x40, 0x11, 0x00, 0x00]); // TTL, UDP, checksum
        f.extend_from_slice(&[0x0a, 0x00, 0x00, 0x01]);
        f.extend_from_slice(&[0x0a, 0x00, 0x00, 0x02]);
        f.extend_from_slice(payload);
        f
    }

    /// A UDP datagram (8-byte header + body) split into two IP fragments.
    fn udp_datagram(body: &[u8]) -> Vec<u8> {
        let mut d = Vec::new();
        d.extend_from_slice(&53u16.to_be_bytes());
        d.extend_from_slice(&9999u16.to_be_bytes());
        d.extend_from_slice(&((8 + body.len()) as u16).to_be_bytes());
        d.extend_from_slice(&[0, 0]);
        d.extend_from_slice(body);
        d
    }

    #[test]
    fn test_reassembled_datagram_resumes_transport_decode() {
        let mut dissector = Dissector::new().unwrap();

        let datagram = udp_datagram(&[0x5a; 24]); // 32 bytes total
        let first = ipv4_fragment_frame(0x0042, 0, true, &datagram[..16]);
        let second = ipv4_fragment_frame(0x0042, 2, false, &datagram[16..]);

        let out = dissector.process_frame(&Frame::new(1, 0, &first, 1));
        assert!(out.completed().next().is_none());

        let out = dissector.process_frame(&Frame::new(2, 0, &second, 1));
        let completed: Vec<_> = out.completed().collect();
        assert_eq!(completed.len(), 1);

        let result = completed[0];
        assert_eq!(result.payload, datagram);
        // The synthesized datagram decoded as UDP
        assert_eq!(result.chain.protocols, vec!["udp"]);
        let (name, fields) = &result.layers[0];
        assert_eq!(*name, "udp");
        assert!(fields
            .iter()
            .any(|(k, v)| *k == "src_port" && v.as_u64() == Some(53)));
    }

    #[test]
    fn test_pending_fragment_reports_status() {
        let mut dissector = Dissector::new().unwrap();

        let frame_bytes = ipv4_fragment_frame(7, 0, true, &[0; 16]);
        let out = dissector.process_frame(&Frame::new(1, 0, &frame_bytes, 1));

        assert_eq!(out.reassembled.len(), 1);
        assert_eq!(out.reassembled[0].status, ReassemblyStatus::Pending);
        assert!(out.reassembled[0].payload.is_empty());
    }

    #[test]
    fn test_non_fragmented_frame_has_no_reassembly() {
        let mut dissector = Dissector::new().unwrap();

        let frame_bytes = ipv4_fragment_frame(7, 0, false, &udp_datagram(b"hi"));
        let out = dissector.process_frame(&Frame::new(1, 0, &frame_bytes, 1));

        assert_eq!(
            out.dissection.chain.protocols,
            vec!["ethernet", "ipv4", "udp"]
        );
        assert!(out.reassembled.is_empty());
    }

    #[test]
    fn test_idle_eviction_between_frames() {
        let mut config = DissectConfig::default();
        config.reassembly.eviction.max_idle_frames = 4;
        let mut dissector = Dissector::with_config(config).unwrap();

        let stale = ipv4_fragment_frame(1, 0, true, &[0; 16]);
        dissector.process_frame(&Frame::new(1, 0, &stale, 1));

        // An unrelated frame far in the future triggers the sweep
        let other = ipv4_fragment_frame(2, 0, true, &[0; 16]);
        let out = dissector.process_frame(&Frame::new(100, 0, &other, 1));

        assert!(out
            .reassembled
            .iter()
            .any(|r| r.status == ReassemblyStatus::EvictedIncomplete));
    }

    #[test]
    fn test_injection_context_tracks_address_family() {
        use crate::reassembly::IpKey;

        let dissector = Dissector::new().unwrap();

        let v4 = ReassemblyKey::Ip(IpKey {
            src: "10.0.0.1".parse().unwrap(),
            dst: "10.0.0.2".parse().unwrap(),
            protocol: 17,
            ident: 1,
        });
        let context = dissector.injection_context(&v4);
        assert_eq!(context.parent_protocol, Some("ipv4"));
        assert_eq!(context.hint("ip_protocol"), Some(17));

        let v6 = ReassemblyKey::Ip(IpKey {
            src: "2001:db8::1".parse().unwrap(),
            dst: "2001:db8::2".parse().unwrap(),
            protocol: 6,
            ident: 2,
        });
        let context = dissector.injection_context(&v6);
        assert_eq!(context.parent_protocol, Some("ipv6"));
        assert_eq!(context.hint("ip_protocol"), Some(6));
    }

    #[test]
    fn test_tcp_stream_surfaces_as_raw_payload() {
        let mut dissector = Dissector::new().unwrap();

        // Hand-built TCP frame carrying "hello"
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0; 6]);
        bytes.extend_from_slice(&[1; 6]);
        bytes.extend_from_slice(&[0x08, 0x00]);
        bytes.extend_from_slice(&[
            0x45, 0x00, 0x00, 0x2d, 0x00, 0x01, 0x00, 0x00, 0x40, 0x06, 0x00, 0x00, 0x0a, 0x00,
            0x00, 0x01, 0x0a, 0x00, 0x00, 0x02,
        ]);
        bytes.extend_from_slice(&40000u16.to_be_bytes());
        bytes.extend_from_slice(&80u16.to_be_bytes());
        bytes.extend_from_slice(&1000u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&[0x50, 0x18, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(b"hello");

        let out = dissector.process_frame(&Frame::new(1, 0, &bytes, 1));

        let completed: Vec<_> = out.completed().collect();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].payload, b"hello");
        assert!(matches!(completed[0].key, ReassemblyKey::Tcp(_)));
        // No application decoder claims the bytes
        assert_eq!(
            completed[0].chain.terminal,
            Terminal::Raw { len: 5 }
        );
    }
}
