//! Decode context and per-layer result types.

use smallvec::SmallVec;

use crate::error::DecodeError;

use super::FieldValue;

/// Field entry for decoded layers: (field_name, value).
/// Field names are always static strings (decoder-defined).
pub type FieldEntry<'data> = (&'static str, FieldValue<'data>);

/// Hint entry for next-protocol resolution: (hint_name, numeric value).
pub type HintEntry = (&'static str, u64);

/// Context passed down the decode chain.
///
/// A decoder never sees the layers above it directly; it sees the numeric
/// hints the previous layer published (ethertype, IP protocol number,
/// ports) plus the frame's link type.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    /// Link type from the capture container (e.g. 1 = Ethernet).
    pub link_type: u16,

    /// Decoder that identified this layer's protocol.
    pub parent_protocol: Option<&'static str>,

    /// Next-protocol hints from the previous layer. Typically 2-4 entries.
    pub hints: SmallVec<[HintEntry; 4]>,

    /// Byte offset of this layer's data within the original frame.
    pub offset: usize,
}

impl DecodeContext {
    /// Context for the first (link) layer of a frame.
    pub fn new(link_type: u16) -> Self {
        Self {
            link_type,
            parent_protocol: None,
            hints: SmallVec::new(),
            offset: 0,
        }
    }

    /// Get a hint value by key (linear search, N is small).
    #[inline]
    pub fn hint(&self, key: &str) -> Option<u64> {
        self.hints.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Insert a hint value.
    #[inline]
    pub fn insert_hint(&mut self, key: &'static str, value: u64) {
        self.hints.push((key, value));
    }

    /// At the start of the frame (no parent layer)?
    pub fn is_root(&self) -> bool {
        self.parent_protocol.is_none()
    }
}

/// Result of decoding one protocol layer.
///
/// Uses SmallVec inline storage; most layers have fewer than 16 fields.
/// The lifetime parameter ties field values and the leftover payload to the
/// buffer being decoded.
#[derive(Debug, Clone)]
pub struct DecodedLayer<'data> {
    /// Extracted field values, possibly referencing the buffer (zero-copy).
    pub fields: SmallVec<[FieldEntry<'data>; 16]>,

    /// Leftover payload bytes for the next layer.
    pub remaining: &'data [u8],

    /// Header length consumed by this layer.
    pub header_len: usize,

    /// Hints for next-protocol resolution.
    pub child_hints: SmallVec<[HintEntry; 4]>,

    /// Non-fatal decode error, if the layer was malformed or truncated.
    pub error: Option<DecodeError>,
}

impl<'data> DecodedLayer<'data> {
    /// A successfully decoded layer.
    pub fn success(
        fields: SmallVec<[FieldEntry<'data>; 16]>,
        remaining: &'data [u8],
        header_len: usize,
        child_hints: SmallVec<[HintEntry; 4]>,
    ) -> Self {
        Self {
            fields,
            remaining,
            header_len,
            child_hints,
            error: None,
        }
    }

    /// A layer that failed to decode; the whole buffer is preserved as
    /// opaque payload.
    pub fn failed(error: DecodeError, remaining: &'data [u8]) -> Self {
        Self {
            fields: SmallVec::new(),
            remaining,
            header_len: 0,
            child_hints: SmallVec::new(),
            error: Some(error),
        }
    }

    /// A partially decoded layer: some fields extracted, error recorded.
    pub fn partial(
        fields: SmallVec<[FieldEntry<'data>; 16]>,
        remaining: &'data [u8],
        header_len: usize,
        error: DecodeError,
    ) -> Self {
        Self {
            fields,
            remaining,
            header_len,
            child_hints: SmallVec::new(),
            error: Some(error),
        }
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue<'data>> {
        self.fields.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    /// Get a child hint value by name.
    pub fn hint(&self, name: &str) -> Option<u64> {
        self.child_hints
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
    }

    /// True when no decode error was recorded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Detach all field values from the underlying buffer.
    pub fn owned_fields(&self) -> Vec<(&'static str, FieldValue<'static>)> {
        self.fields
            .iter()
            .map(|(name, value)| (*name, value.to_owned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_hint_access() {
        let mut ctx = DecodeContext::new(1);
        assert!(ctx.is_root());

        ctx.insert_hint("ip_protocol", 6);
        ctx.insert_hint("dst_port", 80);

        assert_eq!(ctx.hint("ip_protocol"), Some(6));
        assert_eq!(ctx.hint("dst_port"), Some(80));
        assert_eq!(ctx.hint("nonexistent"), None);
    }

    #[test]
    fn test_hints_stay_inline() {
        let mut ctx = DecodeContext::new(1);
        ctx.insert_hint("ethertype", 0x0800);
        ctx.insert_hint("ip_protocol", 6);
        ctx.insert_hint("src_port", 12345);
        ctx.insert_hint("dst_port", 80);

        assert!(!ctx.hints.spilled());
    }

    #[test]
    fn test_layer_success() {
        let mut fields = SmallVec::new();
        fields.push(("src_port", FieldValue::UInt16(80)));

        let mut hints = SmallVec::new();
        hints.push(("transport", 6u64));

        let layer = DecodedLayer::success(fields, &[], 20, hints);

        assert!(layer.is_ok());
        assert_eq!(layer.header_len, 20);
        assert_eq!(layer.get("src_port"), Some(&FieldValue::UInt16(80)));
        assert_eq!(layer.hint("transport"), Some(6));
    }

    #[test]
    fn test_layer_failed_preserves_buffer() {
        let buf = [1u8, 2, 3];
        let layer = DecodedLayer::failed(
            DecodeError::Truncated {
                protocol: "tcp",
                needed: 20,
                have: 3,
            },
            &buf,
        );

        assert!(!layer.is_ok());
        assert_eq!(layer.remaining, &buf);
        assert!(layer.error.as_ref().unwrap().is_truncation());
    }

    #[test]
    fn test_owned_fields_detach() {
        let buf = b"hostname";
        let mut fields = SmallVec::new();
        fields.push(("name", FieldValue::Bytes(&buf[..])));
        let layer = DecodedLayer::success(fields, &[], 8, SmallVec::new());

        let owned = layer.owned_fields();
        assert_eq!(owned.len(), 1);
        assert!(matches!(owned[0].1, FieldValue::OwnedBytes(_)));
    }
}
