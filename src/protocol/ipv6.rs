//! IPv6 decoder.
//!
//! The fixed header parses via `etherparse`; extension headers are walked
//! manually so a Fragment header can be surfaced the same way IPv4
//! fragments are (the `ip_fragment` child hint plus identification/offset
//! fields for the chain builder).

use smallvec::SmallVec;

use etherparse::Ipv6HeaderSlice;

use super::ethernet::ethertype;
use super::{DecodeContext, DecodedLayer, Decoder, FieldValue, LayerClass};
use crate::codec::Reader;
use crate::error::DecodeError;
use crate::schema::{DataKind, FieldDescriptor};

const FIXED_HEADER_LEN: usize = 40;

/// Extension header next-header numbers walked by this decoder.
mod ext {
    pub const HOP_BY_HOP: u8 = 0;
    pub const ROUTING: u8 = 43;
    pub const FRAGMENT: u8 = 44;
    pub const DEST_OPTS: u8 = 60;
}

/// IPv6 decoder.
#[derive(Debug, Clone, Copy)]
pub struct Ipv6Decoder;

impl Decoder for Ipv6Decoder {
    fn name(&self) -> &'static str {
        "ipv6"
    }

    fn display_name(&self) -> &'static str {
        "IPv6"
    }

    fn layer(&self) -> LayerClass {
        LayerClass::Internet
    }

    fn can_decode(&self, context: &DecodeContext) -> Option<u32> {
        match context.hint("ethertype") {
            Some(et) if et == ethertype::IPV6 as u64 => Some(100),
            _ => None,
        }
    }

    fn decode<'a>(&self, data: &'a [u8], _context: &DecodeContext) -> DecodedLayer<'a> {
        if data.len() < FIXED_HEADER_LEN {
            return DecodedLayer::failed(
                DecodeError::Truncated {
                    protocol: "ipv6",
                    needed: FIXED_HEADER_LEN,
                    have: data.len(),
                },
                data,
            );
        }

        let ipv6 = match Ipv6HeaderSlice::from_slice(data) {
            Ok(ipv6) => ipv6,
            Err(e) => {
                return DecodedLayer::failed(
                    DecodeError::Structural {
                        protocol: "ipv6",
                        reason: e.to_string(),
                    },
                    data,
                )
            }
        };

        let mut fields = SmallVec::new();
        fields.push(("version", FieldValue::UInt8(6)));
        fields.push(("traffic_class", FieldValue::UInt8(ipv6.traffic_class())));
        fields.push(("flow_label", FieldValue::UInt32(ipv6.flow_label().value())));
        fields.push(("payload_length", FieldValue::UInt16(ipv6.payload_length())));
        fields.push(("hop_limit", FieldValue::UInt8(ipv6.hop_limit())));
        fields.push(("src_ip", FieldValue::ipv6(&ipv6.source())));
        fields.push(("dst_ip", FieldValue::ipv6(&ipv6.destination())));

        // Walk extension headers to find the upper-layer protocol and any
        // Fragment header.
        let mut next_header = ipv6.next_header().0;
        let mut is_fragment = false;
        let mut reader = Reader::new(&data[FIXED_HEADER_LEN..]);

        loop {
            let walk = match next_header {
                ext::HOP_BY_HOP | ext::ROUTING | ext::DEST_OPTS => {
                    // next_header (1), hdr_ext_len (1), then len*8 + 6 bytes
                    reader.read_u8().and_then(|next| {
                        let len = reader.read_u8()?;
                        reader.skip(len as usize * 8 + 6)?;
                        Ok(next)
                    })
                }
                ext::FRAGMENT => reader.read_u8().and_then(|next| {
                    reader.skip(1)?; // reserved
                    let offset_and_flags = reader.read_u16()?;
                    let ident = reader.read_u32()?;

                    is_fragment = true;
                    fields.push(("fragment_offset", FieldValue::UInt16(offset_and_flags >> 3)));
                    fields.push((
                        "more_fragments",
                        FieldValue::Bool(offset_and_flags & 0x1 != 0),
                    ));
                    fields.push(("identification", FieldValue::UInt32(ident)));
                    Ok(next)
                }),
                _ => break,
            };

            match walk {
                Ok(next) => next_header = next,
                Err(crate::codec::CodecError::OutOfBounds { needed, have }) => {
                    fields.push(("next_header", FieldValue::UInt8(next_header)));
                    return DecodedLayer::partial(
                        fields,
                        reader.rest(),
                        FIXED_HEADER_LEN + reader.position(),
                        DecodeError::Truncated {
                            protocol: "ipv6",
                            needed,
                            have,
                        },
                    );
                }
            }
        }

        fields.push(("next_header", FieldValue::UInt8(next_header)));

        let mut child_hints = SmallVec::new();
        child_hints.push(("ip_protocol", next_header as u64));
        child_hints.push(("ip_version", 6));
        if is_fragment {
            child_hints.push(("ip_fragment", 1));
        }

        let header_len = FIXED_HEADER_LEN + reader.position();
        DecodedLayer::success(fields, reader.rest(), header_len, child_hints)
    }

    fn schema_fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("ipv6.version", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv6.traffic_class", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv6.flow_label", DataKind::UInt32).set_nullable(true),
            FieldDescriptor::new("ipv6.payload_length", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("ipv6.next_header", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv6.hop_limit", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv6.fragment_offset", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("ipv6.more_fragments", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("ipv6.identification", DataKind::UInt32).set_nullable(true),
            FieldDescriptor::ip_field("ipv6.src_ip").set_nullable(true),
            FieldDescriptor::ip_field("ipv6.dst_ip").set_nullable(true),
        ]
    }
}
