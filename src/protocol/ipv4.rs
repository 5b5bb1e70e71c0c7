//! IPv4 decoder.
//!
//! Fragmented datagrams (MF set or nonzero offset) are flagged with the
//! `ip_fragment` child hint; the chain builder turns the flagged layer into
//! a fragment descriptor instead of decoding the partial payload.

use smallvec::SmallVec;

use etherparse::Ipv4HeaderSlice;

use super::ethernet::ethertype;
use super::{DecodeContext, DecodedLayer, Decoder, FieldValue, LayerClass};
use crate::codec::internet_checksum;
use crate::error::DecodeError;
use crate::schema::{DataKind, FieldDescriptor};

const MIN_HEADER_LEN: usize = 20;

/// IPv4 decoder.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Decoder;

impl Decoder for Ipv4Decoder {
    fn name(&self) -> &'static str {
        "ipv4"
    }

    fn display_name(&self) -> &'static str {
        "IPv4"
    }

    fn layer(&self) -> LayerClass {
        LayerClass::Internet
    }

    fn can_decode(&self, context: &DecodeContext) -> Option<u32> {
        match context.hint("ethertype") {
            Some(et) if et == ethertype::IPV4 as u64 => Some(100),
            _ => None,
        }
    }

    fn decode<'a>(&self, data: &'a [u8], _context: &DecodeContext) -> DecodedLayer<'a> {
        if data.len() < MIN_HEADER_LEN {
            return DecodedLayer::failed(
                DecodeError::Truncated {
                    protocol: "ipv4",
                    needed: MIN_HEADER_LEN,
                    have: data.len(),
                },
                data,
            );
        }

        match Ipv4HeaderSlice::from_slice(data) {
            Ok(ipv4) => {
                let frag_offset = ipv4.fragments_offset().value();
                let more_fragments = ipv4.more_fragments();
                let is_fragment = more_fragments || frag_offset > 0;

                let mut fields = SmallVec::new();
                fields.push(("version", FieldValue::UInt8(4)));
                fields.push(("ihl", FieldValue::UInt8(ipv4.ihl())));
                fields.push(("dscp", FieldValue::UInt8(ipv4.dcp().value())));
                fields.push(("ecn", FieldValue::UInt8(ipv4.ecn().value())));
                fields.push(("total_length", FieldValue::UInt16(ipv4.total_len())));
                fields.push(("identification", FieldValue::UInt16(ipv4.identification())));
                fields.push(("dont_fragment", FieldValue::Bool(ipv4.dont_fragment())));
                fields.push(("more_fragments", FieldValue::Bool(more_fragments)));
                fields.push(("fragment_offset", FieldValue::UInt16(frag_offset)));
                fields.push(("ttl", FieldValue::UInt8(ipv4.ttl())));
                fields.push(("protocol", FieldValue::UInt8(ipv4.protocol().0)));
                fields.push(("checksum", FieldValue::UInt16(ipv4.header_checksum())));
                fields.push((
                    "checksum_valid",
                    FieldValue::Bool(internet_checksum(ipv4.slice()) == 0),
                ));
                fields.push(("src_ip", FieldValue::ipv4(&ipv4.source())));
                fields.push(("dst_ip", FieldValue::ipv4(&ipv4.destination())));

                let mut child_hints = SmallVec::new();
                child_hints.push(("ip_protocol", ipv4.protocol().0 as u64));
                child_hints.push(("ip_version", 4));
                if is_fragment {
                    child_hints.push(("ip_fragment", 1));
                }

                let header_len = ipv4.slice().len();
                DecodedLayer::success(fields, &data[header_len..], header_len, child_hints)
            }
            Err(e) => DecodedLayer::failed(
                DecodeError::Structural {
                    protocol: "ipv4",
                    reason: e.to_string(),
                },
                data,
            ),
        }
    }

    fn schema_fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("ipv4.version", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv4.ihl", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv4.dscp", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv4.ecn", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv4.total_length", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("ipv4.identification", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("ipv4.dont_fragment", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("ipv4.more_fragments", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("ipv4.fragment_offset", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("ipv4.ttl", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv4.protocol", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("ipv4.checksum", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("ipv4.checksum_valid", DataKind::Bool).set_nullable(true),
            FieldDescriptor::ip_field("ipv4.src_ip").set_nullable(true),
            FieldDescriptor::ip_field("ipv4.dst_ip").set_nullable(true),
        ]
    }
}
