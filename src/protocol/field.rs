//! Typed field values produced by decoders.
//!
//! Values are zero-copy where possible: `Str` and `Bytes` borrow from the
//! frame buffer, `OwnedString` and `OwnedBytes` are used when a value must
//! be constructed (or detached from the frame via [`FieldValue::to_owned`],
//! e.g. for layers decoded from a reassembled payload that does not outlive
//! the call).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use compact_str::CompactString;

/// A decoded field value.
///
/// The lifetime parameter `'data` ties borrowed variants to the frame (or
/// reassembled payload) the value was decoded from.
#[derive(Debug, Clone)]
pub enum FieldValue<'data> {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Bool(bool),

    /// IP address (v4 or v6)
    IpAddr(IpAddr),
    /// MAC address (6 bytes)
    MacAddr([u8; 6]),

    /// Zero-copy string reference into frame data.
    Str(&'data str),
    /// Zero-copy byte slice reference into frame data.
    Bytes(&'data [u8]),

    /// Owned string for constructed values.
    /// Uses CompactString for small-string optimization.
    OwnedString(CompactString),
    /// Owned bytes for constructed data.
    OwnedBytes(Vec<u8>),

    /// Null/missing value
    Null,
}

/// FieldValue that owns all its data (no frame lifetime).
pub type OwnedFieldValue = FieldValue<'static>;

impl<'data> FieldValue<'data> {
    /// Create a MAC address from bytes.
    pub fn mac(bytes: &[u8]) -> Self {
        if bytes.len() >= 6 {
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&bytes[..6]);
            FieldValue::MacAddr(mac)
        } else {
            FieldValue::Null
        }
    }

    /// Create an IPv4 address from bytes.
    pub fn ipv4(bytes: &[u8]) -> Self {
        if bytes.len() >= 4 {
            FieldValue::IpAddr(IpAddr::V4(Ipv4Addr::new(
                bytes[0], bytes[1], bytes[2], bytes[3],
            )))
        } else {
            FieldValue::Null
        }
    }

    /// Create an IPv6 address from bytes.
    pub fn ipv6(bytes: &[u8]) -> Self {
        if bytes.len() >= 16 {
            let mut arr = [0u8; 16];
            arr.copy_from_slice(&bytes[..16]);
            FieldValue::IpAddr(IpAddr::V6(Ipv6Addr::from(arr)))
        } else {
            FieldValue::Null
        }
    }

    /// Format a MAC address as a string.
    pub fn format_mac(mac: &[u8; 6]) -> String {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        )
    }

    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt8(v) => Some(*v as u64),
            FieldValue::UInt16(v) => Some(*v as u64),
            FieldValue::UInt32(v) => Some(*v as u64),
            FieldValue::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as an IP address.
    pub fn as_ip(&self) -> Option<IpAddr> {
        match self {
            FieldValue::IpAddr(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Try to get as str reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            FieldValue::OwnedString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to get as bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            FieldValue::OwnedBytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Convert to an owned value, copying borrowed data.
    pub fn to_owned(&self) -> FieldValue<'static> {
        match self {
            FieldValue::UInt8(v) => FieldValue::UInt8(*v),
            FieldValue::UInt16(v) => FieldValue::UInt16(*v),
            FieldValue::UInt32(v) => FieldValue::UInt32(*v),
            FieldValue::UInt64(v) => FieldValue::UInt64(*v),
            FieldValue::Bool(v) => FieldValue::Bool(*v),
            FieldValue::IpAddr(v) => FieldValue::IpAddr(*v),
            FieldValue::MacAddr(v) => FieldValue::MacAddr(*v),
            FieldValue::Str(s) => FieldValue::OwnedString(CompactString::new(s)),
            FieldValue::Bytes(b) => FieldValue::OwnedBytes(b.to_vec()),
            FieldValue::OwnedString(s) => FieldValue::OwnedString(s.clone()),
            FieldValue::OwnedBytes(b) => FieldValue::OwnedBytes(b.clone()),
            FieldValue::Null => FieldValue::Null,
        }
    }
}

impl<'data> std::fmt::Display for FieldValue<'data> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt16(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Str(s) => write!(f, "{s}"),
            FieldValue::OwnedString(s) => write!(f, "{s}"),
            FieldValue::Bytes(b) => write!(f, "[{} bytes]", b.len()),
            FieldValue::OwnedBytes(b) => write!(f, "[{} bytes]", b.len()),
            FieldValue::IpAddr(addr) => write!(f, "{addr}"),
            FieldValue::MacAddr(mac) => write!(f, "{}", Self::format_mac(mac)),
            FieldValue::Null => write!(f, "NULL"),
        }
    }
}

// Manual PartialEq so borrowed and owned representations compare equal.
impl<'a, 'b> PartialEq<FieldValue<'b>> for FieldValue<'a> {
    fn eq(&self, other: &FieldValue<'b>) -> bool {
        match (self, other) {
            (FieldValue::UInt8(a), FieldValue::UInt8(b)) => a == b,
            (FieldValue::UInt16(a), FieldValue::UInt16(b)) => a == b,
            (FieldValue::UInt32(a), FieldValue::UInt32(b)) => a == b,
            (FieldValue::UInt64(a), FieldValue::UInt64(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::IpAddr(a), FieldValue::IpAddr(b)) => a == b,
            (FieldValue::MacAddr(a), FieldValue::MacAddr(b)) => a == b,
            (FieldValue::Str(a), FieldValue::Str(b)) => a == b,
            (FieldValue::Str(a), FieldValue::OwnedString(b)) => *a == b.as_str(),
            (FieldValue::OwnedString(a), FieldValue::Str(b)) => a.as_str() == *b,
            (FieldValue::OwnedString(a), FieldValue::OwnedString(b)) => a == b,
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => a == b,
            (FieldValue::Bytes(a), FieldValue::OwnedBytes(b)) => *a == b.as_slice(),
            (FieldValue::OwnedBytes(a), FieldValue::Bytes(b)) => a.as_slice() == *b,
            (FieldValue::OwnedBytes(a), FieldValue::OwnedBytes(b)) => a == b,
            (FieldValue::Null, FieldValue::Null) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_copy_bytes() {
        let frame = vec![0x45, 0x00, 0x00, 0x28, 0xde, 0xad, 0xbe, 0xef];
        let value = FieldValue::Bytes(&frame[4..]);

        match value {
            FieldValue::Bytes(b) => {
                assert_eq!(b, &[0xde, 0xad, 0xbe, 0xef]);
                assert!(std::ptr::eq(b.as_ptr(), frame[4..].as_ptr()));
            }
            _ => panic!("Expected Bytes variant"),
        }
    }

    #[test]
    fn test_address_constructors() {
        assert_eq!(
            FieldValue::ipv4(&[10, 0, 0, 1]).as_ip(),
            Some("10.0.0.1".parse().unwrap())
        );
        assert!(FieldValue::ipv4(&[10, 0]).is_null());
        assert!(FieldValue::ipv6(&[0; 8]).is_null());
        assert!(FieldValue::mac(&[1, 2, 3]).is_null());

        match FieldValue::mac(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]) {
            FieldValue::MacAddr(mac) => {
                assert_eq!(FieldValue::format_mac(&mac), "de:ad:be:ef:00:01");
            }
            _ => panic!("Expected MacAddr variant"),
        }
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(FieldValue::UInt8(6).as_u64(), Some(6));
        assert_eq!(FieldValue::UInt16(80).as_u64(), Some(80));
        assert_eq!(FieldValue::UInt32(0xdead_beef).as_u64(), Some(0xdead_beef));
        assert_eq!(FieldValue::Bool(true).as_u64(), None);
    }

    #[test]
    fn test_borrowed_owned_equality() {
        let borrowed = FieldValue::Str("example");
        let owned = FieldValue::OwnedString(CompactString::new("example"));
        assert_eq!(borrowed, owned);
        assert_eq!(owned, borrowed);

        let bytes = FieldValue::Bytes(&[1, 2, 3]);
        let owned_bytes = FieldValue::OwnedBytes(vec![1, 2, 3]);
        assert_eq!(bytes, owned_bytes);
    }

    #[test]
    fn test_to_owned_detaches() {
        let frame = b"payload";
        let borrowed = FieldValue::Bytes(&frame[..]);
        let owned = borrowed.to_owned();

        assert_eq!(borrowed, owned);
        assert!(matches!(owned, FieldValue::OwnedBytes(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::UInt16(443).to_string(), "443");
        assert_eq!(FieldValue::Null.to_string(), "NULL");
        assert_eq!(FieldValue::Bytes(&[0, 1, 2]).to_string(), "[3 bytes]");
    }
}
