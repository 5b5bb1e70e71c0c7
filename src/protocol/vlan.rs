//! IEEE 802.1Q VLAN tag decoder.
//!
//! Handles single tags and stacked (QinQ) tags: each tag is its own layer
//! and re-publishes the inner ethertype, so a stack of tags decodes as a
//! chain of `vlan` layers.

use smallvec::SmallVec;

use super::ethernet::ethertype;
use super::{DecodeContext, DecodedLayer, Decoder, FieldValue, LayerClass};
use crate::codec::{bits_u16, Reader};
use crate::error::DecodeError;
use crate::schema::{DataKind, FieldDescriptor};

/// Tag control info + inner ethertype.
const TAG_LEN: usize = 4;

/// IEEE 802.1Q VLAN tag decoder.
#[derive(Debug, Clone, Copy)]
pub struct VlanDecoder;

impl Decoder for VlanDecoder {
    fn name(&self) -> &'static str {
        "vlan"
    }

    fn display_name(&self) -> &'static str {
        "802.1Q VLAN"
    }

    fn layer(&self) -> LayerClass {
        LayerClass::Link
    }

    fn can_decode(&self, context: &DecodeContext) -> Option<u32> {
        match context.hint("ethertype") {
            Some(et)
                if et == ethertype::VLAN as u64
                    || et == ethertype::QINQ as u64
                    || et == ethertype::QINQ_OLD as u64 =>
            {
                Some(100)
            }
            _ => None,
        }
    }

    fn decode<'a>(&self, data: &'a [u8], _context: &DecodeContext) -> DecodedLayer<'a> {
        let mut reader = Reader::new(data);

        let (tci, inner_ethertype) = match (reader.read_u16(), reader.read_u16()) {
            (Ok(tci), Ok(et)) => (tci, et),
            _ => {
                return DecodedLayer::failed(
                    DecodeError::Truncated {
                        protocol: "vlan",
                        needed: TAG_LEN,
                        have: data.len(),
                    },
                    data,
                )
            }
        };

        let mut fields = SmallVec::new();
        fields.push(("pcp", FieldValue::UInt8(bits_u16(tci, 15, 13) as u8)));
        fields.push(("dei", FieldValue::Bool(bits_u16(tci, 12, 12) != 0)));
        fields.push(("vlan_id", FieldValue::UInt16(bits_u16(tci, 11, 0))));
        fields.push(("ethertype", FieldValue::UInt16(inner_ethertype)));

        let mut child_hints = SmallVec::new();
        child_hints.push(("ethertype", inner_ethertype as u64));

        DecodedLayer::success(fields, reader.rest(), TAG_LEN, child_hints)
    }

    fn schema_fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("vlan.pcp", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("vlan.dei", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("vlan.vlan_id", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("vlan.ethertype", DataKind::UInt16).set_nullable(true),
        ]
    }
}
