//! # dissect-core
//!
//! Frame-by-frame network protocol decoding with cross-frame reassembly.
//!
//! The crate turns raw captured frames into per-layer typed fields and a
//! protocol chain, tolerating malformed and truncated traffic: a decode
//! error is recorded on the affected layer and the chain still ends at a
//! clean terminal. IP fragments and TCP segments are routed to a
//! reassembly engine whose completed payloads feed back into the decode
//! chain.
//!
//! ## Quick Start
//!
//! ```rust
//! use dissect_core::prelude::*;
//!
//! let mut dissector = Dissector::new().unwrap();
//!
//! let bytes = [
//!     0xffu8, 0xff, 0xff, 0xff, 0xff, 0xff, // dst mac
//!     0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src mac
//!     0x08, 0x06, // ARP: no decoder registered, raw terminal
//!     0x00, 0x01,
//! ];
//! let output = dissector.process_frame(&Frame::new(0, 0, &bytes, 1));
//!
//! assert_eq!(output.dissection.chain.protocols, vec!["ethernet"]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                         dissect-core                                |
//! +---------------------------------------------------------------------+
//! |  codec       - bounds-checked byte/bit reads, internet checksum     |
//! |  schema/     - FieldDescriptor, DataKind (engine-agnostic)          |
//! |  protocol/   - Decoder trait, registry, built-in decoders           |
//! |  chain       - decode chain builder, Frame, Terminal                |
//! |  reassembly/ - fragment store, IP datagram + TCP stream engines     |
//! |  dissector   - per-stream façade tying chain and reassembly         |
//! |  config      - depth bound, protocol toggles, eviction, overlap     |
//! |  error       - Error types                                          |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Supported Protocols
//!
//! | Layer | Protocols |
//! |-------|-----------|
//! | Link | Ethernet, VLAN (802.1Q, stacked) |
//! | Internet | IPv4, IPv6 (with extension headers) |
//! | Transport | TCP, UDP |

pub mod chain;
pub mod codec;
pub mod config;
pub mod dissector;
pub mod error;
pub mod prelude;
pub mod protocol;
pub mod reassembly;
pub mod schema;

// Re-export commonly used types at crate root for convenience
pub use chain::{decode_frame, Frame, FrameDissection, ProtocolChain, Terminal};
pub use config::{DissectConfig, EvictionPolicy, OverlapPolicy, ReassemblyConfig};
pub use dissector::{Dissector, FrameOutput, ReassembledPayload};
pub use error::{DecodeError, Error, ReassemblyError, Result};
pub use protocol::{
    default_registry, BuiltinDecoder, DecodeContext, DecodedLayer, Decoder, DecoderRegistry,
    FieldValue, LayerClass, OwnedFieldValue, PayloadMode, ReassemblyDomain,
};
pub use reassembly::{
    FragmentDescriptor, IpFragment, IpKey, ReassemblyEngine, ReassemblyEvent, ReassemblyKey,
    ReassemblyStatus, StreamKey, TcpSegment,
};
pub use schema::{DataKind, FieldDescriptor};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
