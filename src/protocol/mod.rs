//! Protocol decoders and the registry that dispatches them.
//!
//! Each decoder implements the [`Decoder`] trait: it claims a
//! [`DecodeContext`] via `can_decode` (priority-scored, hint-driven) and
//! turns bytes into a [`DecodedLayer`] of typed fields. Decoders never see
//! each other; the chain builder in [`crate::chain`] wires them together
//! through the registry.

pub mod context;
pub mod ethernet;
pub mod field;
pub mod ipv4;
pub mod ipv6;
pub mod registry;
pub mod tcp;
pub mod udp;
pub mod vlan;

pub use context::{DecodeContext, DecodedLayer, FieldEntry, HintEntry};
pub use ethernet::{EthernetDecoder, LINKTYPE_ETHERNET};
pub use field::{FieldValue, OwnedFieldValue};
pub use ipv4::Ipv4Decoder;
pub use ipv6::Ipv6Decoder;
pub use registry::{
    BuiltinDecoder, Decoder, DecoderRegistry, LayerClass, PayloadMode, ReassemblyDomain,
};
pub use tcp::TcpDecoder;
pub use udp::UdpDecoder;
pub use vlan::VlanDecoder;

use crate::error::Result;

/// Create a registry with all built-in decoders.
pub fn default_registry() -> Result<DecoderRegistry> {
    let mut registry = DecoderRegistry::new();

    registry.register(EthernetDecoder)?;
    registry.register(VlanDecoder)?;
    registry.register(Ipv4Decoder)?;
    registry.register(Ipv6Decoder)?;
    registry.register(TcpDecoder)?;
    registry.register(UdpDecoder)?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 6);
        assert!(registry.get_decoder("ethernet").is_some());
        assert!(registry.get_decoder("tcp").is_some());
    }

    #[test]
    fn test_combined_schema_has_prefixed_names() {
        let registry = default_registry().unwrap();
        let schema = registry.combined_schema();

        assert!(schema.iter().any(|f| f.name == "eth.src_mac"));
        assert!(schema.iter().any(|f| f.name == "tcp.seq"));
        // Every field is protocol-prefixed
        assert!(schema.iter().all(|f| f.name.contains('.')));
    }
}
