//! Ethernet II decoder.

use smallvec::SmallVec;

use etherparse::Ethernet2HeaderSlice;

use super::{DecodeContext, DecodedLayer, Decoder, FieldValue, LayerClass};
use crate::error::DecodeError;
use crate::schema::{DataKind, FieldDescriptor};

/// Link type constant for Ethernet.
pub const LINKTYPE_ETHERNET: u16 = 1;

/// Ethernet II header length.
const HEADER_LEN: usize = 14;

/// Well-known EtherType values (IEEE 802).
#[allow(dead_code)]
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
    pub const MPLS: u16 = 0x8847;
    pub const QINQ: u16 = 0x88A8;
    pub const QINQ_OLD: u16 = 0x9100;
}

/// Ethernet II decoder.
#[derive(Debug, Clone, Copy)]
pub struct EthernetDecoder;

impl Decoder for EthernetDecoder {
    fn name(&self) -> &'static str {
        "ethernet"
    }

    fn display_name(&self) -> &'static str {
        "Ethernet II"
    }

    fn layer(&self) -> LayerClass {
        LayerClass::Link
    }

    fn can_decode(&self, context: &DecodeContext) -> Option<u32> {
        // Only at the root of an Ethernet-link frame
        if context.is_root() && context.link_type == LINKTYPE_ETHERNET {
            return Some(100);
        }
        None
    }

    fn decode<'a>(&self, data: &'a [u8], _context: &DecodeContext) -> DecodedLayer<'a> {
        if data.len() < HEADER_LEN {
            return DecodedLayer::failed(
                DecodeError::Truncated {
                    protocol: "ethernet",
                    needed: HEADER_LEN,
                    have: data.len(),
                },
                data,
            );
        }

        match Ethernet2HeaderSlice::from_slice(data) {
            Ok(eth) => {
                let mut fields = SmallVec::new();

                fields.push(("src_mac", FieldValue::mac(&eth.source())));
                fields.push(("dst_mac", FieldValue::mac(&eth.destination())));
                fields.push(("ethertype", FieldValue::UInt16(eth.ether_type().0)));

                let mut child_hints = SmallVec::new();
                child_hints.push(("ethertype", eth.ether_type().0 as u64));

                let header_len = eth.slice().len();
                DecodedLayer::success(fields, &data[header_len..], header_len, child_hints)
            }
            Err(e) => DecodedLayer::failed(
                DecodeError::Structural {
                    protocol: "ethernet",
                    reason: e.to_string(),
                },
                data,
            ),
        }
    }

    fn schema_fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::mac_field("eth.src_mac").set_nullable(true),
            FieldDescriptor::mac_field("eth.dst_mac").set_nullable(true),
            FieldDescriptor::new("eth.ethertype", DataKind::UInt16).set_nullable(true),
        ]
    }
}
