//! Error types for dissect-core.
//!
//! Two families of errors exist and they are handled very differently:
//!
//! - [`DecodeError`] is *non-fatal*. It is recorded on the affected
//!   [`DecodedLayer`](crate::protocol::DecodedLayer) and the decode chain
//!   still reaches a clean terminal state. Malformed traffic must never
//!   abort extraction of the current or subsequent frames.
//! - [`enum@Error`] is a hard failure returned to the caller. The only
//!   variant raised by the core is [`Error::UnsupportedCapability`], which
//!   signals contract misuse at decoder registration time rather than
//!   malformed traffic.

use thiserror::Error;

/// Hard errors returned to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// A decoder was registered that cannot honor the contract it declares.
    ///
    /// Raised at registration time, never during frame processing.
    #[error("decoder {decoder:?} does not support required capability: {capability}")]
    UnsupportedCapability {
        decoder: &'static str,
        capability: &'static str,
    },

    /// Error from the reassembly store.
    #[error("reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),
}

/// Non-fatal decode errors recorded on a layer.
///
/// A layer carrying one of these still appears in the protocol chain; the
/// remainder of the frame is preserved as an opaque raw terminal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Bytes violate the protocol's required structure.
    #[error("{protocol}: structural error: {reason}")]
    Structural {
        protocol: &'static str,
        reason: String,
    },

    /// Fewer bytes than the header requires (truncated capture or frame).
    #[error("{protocol}: truncated (need {needed} bytes, have {have})")]
    Truncated {
        protocol: &'static str,
        needed: usize,
        have: usize,
    },
}

impl DecodeError {
    /// Protocol that recorded the error.
    pub fn protocol(&self) -> &'static str {
        match self {
            DecodeError::Structural { protocol, .. } => protocol,
            DecodeError::Truncated { protocol, .. } => protocol,
        }
    }

    /// True for the truncation variant.
    pub fn is_truncation(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }
}

/// Errors from fragment/stream store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// `take()` was called on a buffer that is not yet complete.
    #[error("buffer incomplete: {covered} of {total:?} bytes covered")]
    Incomplete {
        covered: usize,
        total: Option<usize>,
    },

    /// `take()` was called for a key with no buffer (never seen or evicted).
    #[error("no reassembly buffer for key")]
    UnknownKey,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
