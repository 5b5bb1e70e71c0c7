//! UDP decoder.

use smallvec::SmallVec;

use etherparse::UdpHeaderSlice;

use super::{DecodeContext, DecodedLayer, Decoder, FieldValue, LayerClass};
use crate::error::DecodeError;
use crate::schema::{DataKind, FieldDescriptor};

const HEADER_LEN: usize = 8;

/// IP protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;

/// UDP decoder.
#[derive(Debug, Clone, Copy)]
pub struct UdpDecoder;

impl Decoder for UdpDecoder {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn display_name(&self) -> &'static str {
        "UDP"
    }

    fn layer(&self) -> LayerClass {
        LayerClass::Transport
    }

    fn can_decode(&self, context: &DecodeContext) -> Option<u32> {
        match context.hint("ip_protocol") {
            Some(proto) if proto == IP_PROTO_UDP as u64 => Some(100),
            _ => None,
        }
    }

    fn decode<'a>(&self, data: &'a [u8], _context: &DecodeContext) -> DecodedLayer<'a> {
        if data.len() < HEADER_LEN {
            return DecodedLayer::failed(
                DecodeError::Truncated {
                    protocol: "udp",
                    needed: HEADER_LEN,
                    have: data.len(),
                },
                data,
            );
        }

        match UdpHeaderSlice::from_slice(data) {
            Ok(udp) => {
                let mut fields = SmallVec::new();

                fields.push(("src_port", FieldValue::UInt16(udp.source_port())));
                fields.push(("dst_port", FieldValue::UInt16(udp.destination_port())));
                fields.push(("length", FieldValue::UInt16(udp.length())));
                fields.push(("checksum", FieldValue::UInt16(udp.checksum())));

                let mut child_hints = SmallVec::new();
                child_hints.push(("src_port", udp.source_port() as u64));
                child_hints.push(("dst_port", udp.destination_port() as u64));

                DecodedLayer::success(fields, &data[HEADER_LEN..], HEADER_LEN, child_hints)
            }
            Err(e) => DecodedLayer::failed(
                DecodeError::Structural {
                    protocol: "udp",
                    reason: e.to_string(),
                },
                data,
            ),
        }
    }

    fn schema_fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("udp.src_port", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("udp.dst_port", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("udp.length", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("udp.checksum", DataKind::UInt16).set_nullable(true),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udp_context() -> DecodeContext {
        let mut context = DecodeContext::new(1);
        context.insert_hint("ip_protocol", 17);
        context
    }

    #[test]
    fn test_decode_udp() {
        let packet = [
            0x00, 0x35, // src port: 53 (DNS)
            0xc3, 0x50, // dst port: 50000
            0x00, 0x0c, // length: 12
            0x00, 0x00, // checksum
            0xde, 0xad, 0xbe, 0xef, // payload
        ];

        let layer = UdpDecoder.decode(&packet, &udp_context());

        assert!(layer.is_ok());
        assert_eq!(layer.get("src_port"), Some(&FieldValue::UInt16(53)));
        assert_eq!(layer.get("dst_port"), Some(&FieldValue::UInt16(50000)));
        assert_eq!(layer.get("length"), Some(&FieldValue::UInt16(12)));
        assert_eq!(layer.hint("src_port"), Some(53));
        assert_eq!(layer.remaining, &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_decode_udp_too_short() {
        let packet = [0x00, 0x35, 0xc3];

        let layer = UdpDecoder.decode(&packet, &udp_context());

        assert!(!layer.is_ok());
        assert!(layer.error.as_ref().unwrap().is_truncation());
    }

    #[test]
    fn test_can_decode() {
        let decoder = UdpDecoder;

        assert!(decoder.can_decode(&udp_context()).is_some());

        let mut tcp_ctx = DecodeContext::new(1);
        tcp_ctx.insert_hint("ip_protocol", 6);
        assert!(decoder.can_decode(&tcp_ctx).is_none());
    }
}
