//! Convenient re-exports for common usage.
//!
//! # Example
//!
//! ```rust
//! use dissect_core::prelude::*;
//!
//! let registry = default_registry().unwrap();
//! assert!(registry.get_decoder("tcp").is_some());
//! ```

// Schema types
pub use crate::schema::{DataKind, FieldDescriptor};

// Decoder types
pub use crate::protocol::{
    default_registry, BuiltinDecoder, DecodeContext, DecodedLayer, Decoder, DecoderRegistry,
    FieldValue, LayerClass, PayloadMode, ReassemblyDomain,
};

// Chain and dissector types
pub use crate::chain::{decode_frame, Frame, FrameDissection, ProtocolChain, Terminal};
pub use crate::dissector::{Dissector, FrameOutput, ReassembledPayload};

// Reassembly types
pub use crate::reassembly::{ReassemblyKey, ReassemblyStatus};

// Configuration and error types
pub use crate::config::{DissectConfig, OverlapPolicy};
pub use crate::error::{Error, Result};
