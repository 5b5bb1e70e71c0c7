//! Decoder registry with priority-based dispatch.

use crate::error::{Error, Result};
use crate::schema::FieldDescriptor;

use super::{
    DecodeContext, DecodedLayer, EthernetDecoder, Ipv4Decoder, Ipv6Decoder, TcpDecoder,
    UdpDecoder, VlanDecoder,
};

/// Stack position a decoder occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerClass {
    Link,
    Internet,
    Transport,
    Application,
}

impl std::fmt::Display for LayerClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LayerClass::Link => "link",
            LayerClass::Internet => "internet",
            LayerClass::Transport => "transport",
            LayerClass::Application => "application",
        };
        write!(f, "{s}")
    }
}

/// How a decoder's remaining bytes should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Continue the decode chain (default). Remaining bytes are offered to
    /// the next decoder via the child hints.
    Chain,

    /// Route the payload to the reassembly engine. A decoder declaring this
    /// must also declare a [`ReassemblyDomain`].
    Reassemble,

    /// No payload / terminal protocol. The chain stops after this layer.
    Terminal,
}

/// Which reassembly state machine a `PayloadMode::Reassemble` decoder feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyDomain {
    /// Offset-addressed datagram fragments (IPv4/IPv6 fragmentation).
    IpDatagram,
    /// Sequence-addressed byte stream (TCP).
    TcpStream,
}

/// Core trait all protocol decoders must implement.
pub trait Decoder: Send + Sync {
    /// Unique identifier for this decoder (e.g., "tcp", "ipv4").
    fn name(&self) -> &'static str;

    /// Human-readable display name.
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Stack position this decoder occupies.
    fn layer(&self) -> LayerClass;

    /// Check if this decoder can handle the given context.
    /// Returns a priority score (higher = more specific match).
    /// Returns `None` if this decoder cannot handle the context.
    fn can_decode(&self, context: &DecodeContext) -> Option<u32>;

    /// Decode bytes into structured fields.
    ///
    /// Never panics on malformed input; errors are recorded on the
    /// returned layer and the buffer survives as opaque payload.
    fn decode<'a>(&self, data: &'a [u8], context: &DecodeContext) -> DecodedLayer<'a>;

    /// Return the schema fields this decoder produces.
    fn schema_fields(&self) -> Vec<FieldDescriptor>;

    /// How remaining bytes are handled after this layer.
    fn payload_mode(&self) -> PayloadMode {
        PayloadMode::Chain
    }

    /// Reassembly state machine fed by this decoder.
    ///
    /// Must be `Some` when [`payload_mode`](Decoder::payload_mode) is
    /// `Reassemble`; checked at registration.
    fn reassembly_domain(&self) -> Option<ReassemblyDomain> {
        None
    }
}

/// Enum of all built-in decoders.
///
/// Static dispatch (no vtable): the compiler can inline match arms and
/// optimize branch prediction in the per-frame hot loop.
#[derive(Debug, Clone, Copy)]
pub enum BuiltinDecoder {
    Ethernet(EthernetDecoder),
    Vlan(VlanDecoder),
    Ipv4(Ipv4Decoder),
    Ipv6(Ipv6Decoder),
    Tcp(TcpDecoder),
    Udp(UdpDecoder),
}

/// Macro to delegate Decoder trait methods to inner types.
macro_rules! delegate_decoder {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            BuiltinDecoder::Ethernet(d) => d.$method($($arg),*),
            BuiltinDecoder::Vlan(d) => d.$method($($arg),*),
            BuiltinDecoder::Ipv4(d) => d.$method($($arg),*),
            BuiltinDecoder::Ipv6(d) => d.$method($($arg),*),
            BuiltinDecoder::Tcp(d) => d.$method($($arg),*),
            BuiltinDecoder::Udp(d) => d.$method($($arg),*),
        }
    };
}

impl Decoder for BuiltinDecoder {
    #[inline]
    fn name(&self) -> &'static str {
        delegate_decoder!(self, name)
    }

    #[inline]
    fn display_name(&self) -> &'static str {
        delegate_decoder!(self, display_name)
    }

    #[inline]
    fn layer(&self) -> LayerClass {
        delegate_decoder!(self, layer)
    }

    #[inline]
    fn can_decode(&self, context: &DecodeContext) -> Option<u32> {
        delegate_decoder!(self, can_decode, context)
    }

    #[inline]
    fn decode<'a>(&self, data: &'a [u8], context: &DecodeContext) -> DecodedLayer<'a> {
        delegate_decoder!(self, decode, data, context)
    }

    #[inline]
    fn schema_fields(&self) -> Vec<FieldDescriptor> {
        delegate_decoder!(self, schema_fields)
    }

    #[inline]
    fn payload_mode(&self) -> PayloadMode {
        delegate_decoder!(self, payload_mode)
    }

    #[inline]
    fn reassembly_domain(&self) -> Option<ReassemblyDomain> {
        delegate_decoder!(self, reassembly_domain)
    }
}

/// Conversion traits for ergonomic registration.
impl From<EthernetDecoder> for BuiltinDecoder {
    fn from(d: EthernetDecoder) -> Self {
        BuiltinDecoder::Ethernet(d)
    }
}

impl From<VlanDecoder> for BuiltinDecoder {
    fn from(d: VlanDecoder) -> Self {
        BuiltinDecoder::Vlan(d)
    }
}

impl From<Ipv4Decoder> for BuiltinDecoder {
    fn from(d: Ipv4Decoder) -> Self {
        BuiltinDecoder::Ipv4(d)
    }
}

impl From<Ipv6Decoder> for BuiltinDecoder {
    fn from(d: Ipv6Decoder) -> Self {
        BuiltinDecoder::Ipv6(d)
    }
}

impl From<TcpDecoder> for BuiltinDecoder {
    fn from(d: TcpDecoder) -> Self {
        BuiltinDecoder::Tcp(d)
    }
}

impl From<UdpDecoder> for BuiltinDecoder {
    fn from(d: UdpDecoder) -> Self {
        BuiltinDecoder::Udp(d)
    }
}

/// Validate a decoder's declared contract.
///
/// Runs at registration time so frame processing never has to re-check.
pub fn validate_capabilities<D: Decoder>(decoder: &D) -> Result<()> {
    if decoder.name().is_empty() {
        return Err(Error::UnsupportedCapability {
            decoder: decoder.display_name(),
            capability: "non-empty name",
        });
    }
    if decoder.payload_mode() == PayloadMode::Reassemble && decoder.reassembly_domain().is_none() {
        return Err(Error::UnsupportedCapability {
            decoder: decoder.name(),
            capability: "reassembly domain",
        });
    }
    Ok(())
}

/// Registry of decoders with priority-based selection.
///
/// Read-only after construction: registration happens up front and the
/// per-frame loop only queries.
#[derive(Debug, Clone)]
pub struct DecoderRegistry {
    decoders: Vec<BuiltinDecoder>,
}

impl DecoderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// Register a decoder, validating its declared contract.
    pub fn register<D: Into<BuiltinDecoder>>(&mut self, decoder: D) -> Result<()> {
        let decoder = decoder.into();
        validate_capabilities(&decoder)?;
        self.decoders.push(decoder);
        Ok(())
    }

    /// Find the best decoder for the given context.
    ///
    /// Among decoders that claim the context, the highest priority wins;
    /// ties go to the earliest registration (`max_by_key` keeps the last
    /// maximum, so the scan runs in reverse).
    #[inline]
    pub fn find_decoder(&self, context: &DecodeContext) -> Option<&BuiltinDecoder> {
        self.decoders
            .iter()
            .rev()
            .filter_map(|d| d.can_decode(context).map(|priority| (d, priority)))
            .max_by_key(|(_, priority)| *priority)
            .map(|(decoder, _)| decoder)
    }

    /// Get all registered decoders.
    pub fn all_decoders(&self) -> impl Iterator<Item = &BuiltinDecoder> {
        self.decoders.iter()
    }

    /// Get a decoder by name.
    pub fn get_decoder(&self, name: &str) -> Option<&BuiltinDecoder> {
        self.decoders.iter().find(|d| d.name() == name)
    }

    /// Build combined schema from all decoders.
    pub fn combined_schema(&self) -> Vec<FieldDescriptor> {
        let mut fields = Vec::new();
        for decoder in &self.decoders {
            fields.extend(decoder.schema_fields());
        }
        fields
    }

    /// Get the number of registered decoders.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
