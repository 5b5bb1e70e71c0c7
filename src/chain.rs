//! Decode chain builder: drives one frame through successive decoders.

use std::net::IpAddr;

use tracing::warn;

use crate::config::DissectConfig;
use crate::protocol::{
    BuiltinDecoder, DecodeContext, DecodedLayer, Decoder, DecoderRegistry, LayerClass, PayloadMode,
};
use crate::reassembly::{FragmentDescriptor, IpFragment, IpKey, StreamKey, TcpSegment};

/// One captured packet plus its capture metadata.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Position in the frame stream; strictly increasing.
    pub index: u64,
    /// Capture timestamp, microseconds since the epoch.
    pub timestamp_us: u64,
    /// Captured bytes (possibly truncated below `orig_len`).
    pub data: &'a [u8],
    /// Length on the wire.
    pub orig_len: u32,
    /// Link-type code selecting the initial decoder.
    pub link_type: u16,
}

impl<'a> Frame<'a> {
    pub fn new(index: u64, timestamp_us: u64, data: &'a [u8], link_type: u16) -> Self {
        Self {
            index,
            timestamp_us,
            data,
            orig_len: data.len() as u32,
            link_type,
        }
    }
}

/// How a protocol chain ended. Every chain ends in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// All bytes consumed (or routed to reassembly); nothing left to decode.
    NoPayload,
    /// Leftover bytes no registered decoder claimed, kept undissected.
    Raw { len: usize },
    /// The configured layer bound was hit before the payload ran out.
    DepthExceeded,
}

/// Ordered protocol names for one frame plus the terminal it reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolChain {
    pub protocols: Vec<&'static str>,
    pub terminal: Terminal,
}

impl std::fmt::Display for ProtocolChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for name in &self.protocols {
            write!(f, "{name} > ")?;
        }
        match self.terminal {
            Terminal::NoPayload => write!(f, "[end]"),
            Terminal::Raw { len } => write!(f, "[raw {len}]"),
            Terminal::DepthExceeded => write!(f, "[depth exceeded]"),
        }
    }
}

/// Full result of decoding one frame.
#[derive(Debug)]
pub struct FrameDissection<'a> {
    pub chain: ProtocolChain,
    /// Per-layer decoded fields, in chain order.
    pub layers: Vec<(&'static str, DecodedLayer<'a>)>,
    /// Payload handed off to the reassembly engine, if any.
    pub descriptor: Option<FragmentDescriptor>,
}

impl<'a> FrameDissection<'a> {
    /// Most recent layer decoded for `protocol`.
    pub fn layer(&self, protocol: &str) -> Option<&DecodedLayer<'a>> {
        self.layers
            .iter()
            .rev()
            .find(|(name, _)| *name == protocol)
            .map(|(_, layer)| layer)
    }

    /// Whether any layer recorded a decode error.
    pub fn has_errors(&self) -> bool {
        self.layers.iter().any(|(_, layer)| !layer.is_ok())
    }
}

/// Decode one frame into a protocol chain.
///
/// Never fails: malformed or unrecognized input degrades to a raw
/// terminal, not an error.
pub fn decode_frame<'a>(
    registry: &DecoderRegistry,
    config: &DissectConfig,
    frame: &Frame<'a>,
) -> FrameDissection<'a> {
    let context = DecodeContext::new(frame.link_type);
    decode_with_context(registry, config, context, frame.data, frame.index)
}

/// Run the chain loop from an arbitrary starting context.
///
/// Used for frames (root context) and for reassembled payloads re-injected
/// as fresh input with the hints of the layer that produced them.
pub fn decode_with_context<'a>(
    registry: &DecoderRegistry,
    config: &DissectConfig,
    context: DecodeContext,
    data: &'a [u8],
    frame_index: u64,
) -> FrameDissection<'a> {
    let link_type = context.link_type;
    let mut protocols = Vec::new();
    let mut layers: Vec<(&'static str, DecodedLayer<'a>)> = Vec::new();
    let mut descriptor = None;

    let mut context = context;
    let mut data = data;

    let terminal = loop {
        if data.is_empty() {
            break Terminal::NoPayload;
        }
        if layers.len() >= config.max_depth {
            warn!(
                frame = frame_index,
                depth = config.max_depth,
                "decode chain hit depth bound"
            );
            break Terminal::DepthExceeded;
        }

        let Some(decoder) = registry.find_decoder(&context) else {
            break Terminal::Raw { len: data.len() };
        };
        let name = decoder.name();
        if !config.is_enabled(name) {
            break Terminal::Raw { len: data.len() };
        }

        let layer = decoder.decode(data, &context);
        let remaining = layer.remaining;
        let errored = !layer.is_ok();
        protocols.push(name);

        // A fragmented datagram's payload is partial: hand it to the
        // reassembly engine instead of decoding it
        if layer.hint("ip_fragment") == Some(1) {
            descriptor = ip_fragment_descriptor(&layer, remaining, frame_index);
            layers.push((name, layer));
            break Terminal::NoPayload;
        }

        match decoder.payload_mode() {
            PayloadMode::Terminal => {
                layers.push((name, layer));
                break Terminal::NoPayload;
            }
            PayloadMode::Reassemble if !errored => {
                layers.push((name, layer));
                descriptor = reassembly_descriptor(decoder, &layers, remaining, frame_index);
                break Terminal::NoPayload;
            }
            _ => {}
        }

        if errored {
            layers.push((name, layer));
            break Terminal::Raw {
                len: remaining.len(),
            };
        }

        let mut next = DecodeContext::new(link_type);
        next.parent_protocol = Some(name);
        next.hints = layer.child_hints.clone();
        next.offset = context.offset + layer.header_len;
        layers.push((name, layer));
        context = next;
        data = remaining;
    };

    FrameDissection {
        chain: ProtocolChain {
            protocols,
            terminal,
        },
        layers,
        descriptor,
    }
}

fn field_u64(layer: &DecodedLayer<'_>, name: &str) -> Option<u64> {
    layer.get(name).and_then(|v| v.as_u64())
}

fn field_bool(layer: &DecodedLayer<'_>, name: &str) -> Option<bool> {
    layer.get(name).and_then(|v| v.as_bool())
}

fn field_ip(layer: &DecodedLayer<'_>, name: &str) -> Option<IpAddr> {
    layer.get(name).and_then(|v| v.as_ip())
}

/// Build an IP fragment descriptor from a fragment-flagged internet layer.
fn ip_fragment_descriptor(
    layer: &DecodedLayer<'_>,
    payload: &[u8],
    frame_index: u64,
) -> Option<FragmentDescriptor> {
    let protocol = field_u64(layer, "protocol").or_else(|| field_u64(layer, "next_header"))?;
    let key = IpKey {
        src: field_ip(layer, "src_ip")?,
        dst: field_ip(layer, "dst_ip")?,
        protocol: protocol as u8,
        ident: field_u64(layer, "identification")? as u32,
    };
    // Wire offset is in 8-octet units
    let offset = field_u64(layer, "fragment_offset")? as usize * 8;

    Some(FragmentDescriptor::Ip(IpFragment {
        key,
        offset,
        payload: payload.to_vec(),
        more_fragments: field_bool(layer, "more_fragments")?,
        frame_index,
    }))
}

/// Build the descriptor for a decoder that routes payload to reassembly.
fn reassembly_descriptor(
    decoder: &BuiltinDecoder,
    layers: &[(&'static str, DecodedLayer<'_>)],
    payload: &[u8],
    frame_index: u64,
) -> Option<FragmentDescriptor> {
    // Currently the only Reassemble-mode decoder is TCP
    if decoder.layer() != LayerClass::Transport {
        return None;
    }
    let (_, tcp) = layers.last()?;
    let syn = field_bool(tcp, "flag_syn")?;
    let fin = field_bool(tcp, "flag_fin")?;
    if payload.is_empty() && !syn && !fin {
        return None;
    }

    // Addresses come from the nearest internet layer below
    let ip = layers
        .iter()
        .rev()
        .find_map(|(_, l)| Some((field_ip(l, "src_ip")?, field_ip(l, "dst_ip")?)))?;

    let key = StreamKey {
        src: (ip.0, field_u64(tcp, "src_port")? as u16),
        dst: (ip.1, field_u64(tcp, "dst_port")? as u16),
    };

    Some(FragmentDescriptor::Tcp(TcpSegment {
        key,
        seq: field_u64(tcp, "seq")? as u32,
        payload: payload.to_vec(),
        syn,
        fin,
        frame_index,
    }))
}
