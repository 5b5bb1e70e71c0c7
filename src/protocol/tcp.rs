//! TCP decoder.
//!
//! Declares `PayloadMode::Reassemble` in the `TcpStream` domain: segment
//! payload bytes go to the reassembly engine instead of the decode chain.

use smallvec::SmallVec;

use etherparse::{TcpHeaderSlice, TcpOptionElement};

use super::{
    DecodeContext, DecodedLayer, Decoder, FieldValue, LayerClass, PayloadMode, ReassemblyDomain,
};
use crate::error::DecodeError;
use crate::schema::{DataKind, FieldDescriptor};

const MIN_HEADER_LEN: usize = 20;

/// IP protocol number for TCP.
pub const IP_PROTO_TCP: u8 = 6;

/// TCP decoder.
#[derive(Debug, Clone, Copy)]
pub struct TcpDecoder;

impl Decoder for TcpDecoder {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn display_name(&self) -> &'static str {
        "TCP"
    }

    fn layer(&self) -> LayerClass {
        LayerClass::Transport
    }

    fn can_decode(&self, context: &DecodeContext) -> Option<u32> {
        match context.hint("ip_protocol") {
            Some(proto) if proto == IP_PROTO_TCP as u64 => Some(100),
            _ => None,
        }
    }

    fn decode<'a>(&self, data: &'a [u8], _context: &DecodeContext) -> DecodedLayer<'a> {
        if data.len() < MIN_HEADER_LEN {
            return DecodedLayer::failed(
                DecodeError::Truncated {
                    protocol: "tcp",
                    needed: MIN_HEADER_LEN,
                    have: data.len(),
                },
                data,
            );
        }

        match TcpHeaderSlice::from_slice(data) {
            Ok(tcp) => {
                let mut fields = SmallVec::new();

                fields.push(("src_port", FieldValue::UInt16(tcp.source_port())));
                fields.push(("dst_port", FieldValue::UInt16(tcp.destination_port())));
                fields.push(("seq", FieldValue::UInt32(tcp.sequence_number())));
                fields.push(("ack", FieldValue::UInt32(tcp.acknowledgment_number())));
                fields.push(("data_offset", FieldValue::UInt8(tcp.data_offset())));
                fields.push(("flag_fin", FieldValue::Bool(tcp.fin())));
                fields.push(("flag_syn", FieldValue::Bool(tcp.syn())));
                fields.push(("flag_rst", FieldValue::Bool(tcp.rst())));
                fields.push(("flag_psh", FieldValue::Bool(tcp.psh())));
                fields.push(("flag_ack", FieldValue::Bool(tcp.ack())));
                fields.push(("window_size", FieldValue::UInt16(tcp.window_size())));
                fields.push(("checksum", FieldValue::UInt16(tcp.checksum())));

                // Negotiation-relevant options only
                for option in tcp.options_iterator().flatten() {
                    match option {
                        TcpOptionElement::MaximumSegmentSize(mss) => {
                            fields.push(("opt_mss", FieldValue::UInt16(mss)));
                        }
                        TcpOptionElement::WindowScale(shift) => {
                            fields.push(("opt_window_scale", FieldValue::UInt8(shift)));
                        }
                        TcpOptionElement::SelectiveAcknowledgementPermitted => {
                            fields.push(("opt_sack_permitted", FieldValue::Bool(true)));
                        }
                        TcpOptionElement::Timestamp(ts_val, ts_ecr) => {
                            fields.push(("opt_ts_val", FieldValue::UInt32(ts_val)));
                            fields.push(("opt_ts_ecr", FieldValue::UInt32(ts_ecr)));
                        }
                        _ => {}
                    }
                }

                let mut child_hints = SmallVec::new();
                child_hints.push(("src_port", tcp.source_port() as u64));
                child_hints.push(("dst_port", tcp.destination_port() as u64));

                let header_len = tcp.slice().len();
                DecodedLayer::success(fields, &data[header_len..], header_len, child_hints)
            }
            Err(e) => DecodedLayer::failed(
                DecodeError::Structural {
                    protocol: "tcp",
                    reason: e.to_string(),
                },
                data,
            ),
        }
    }

    fn schema_fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("tcp.src_port", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("tcp.dst_port", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("tcp.seq", DataKind::UInt32).set_nullable(true),
            FieldDescriptor::new("tcp.ack", DataKind::UInt32).set_nullable(true),
            FieldDescriptor::new("tcp.data_offset", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("tcp.flag_fin", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("tcp.flag_syn", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("tcp.flag_rst", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("tcp.flag_psh", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("tcp.flag_ack", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("tcp.window_size", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("tcp.checksum", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("tcp.opt_mss", DataKind::UInt16).set_nullable(true),
            FieldDescriptor::new("tcp.opt_window_scale", DataKind::UInt8).set_nullable(true),
            FieldDescriptor::new("tcp.opt_sack_permitted", DataKind::Bool).set_nullable(true),
            FieldDescriptor::new("tcp.opt_ts_val", DataKind::UInt32).set_nullable(true),
            FieldDescriptor::new("tcp.opt_ts_ecr", DataKind::UInt32).set_nullable(true),
        ]
    }

    fn payload_mode(&self) -> PayloadMode {
        PayloadMode::Reassemble
    }

    fn reassembly_domain(&self) -> Option<ReassemblyDomain> {
        Some(ReassemblyDomain::TcpStream)
    }
}
