//! Engine-agnostic field schema published by decoders.
//!
//! Downstream collaborators (formatters, filters) use these descriptors to
//! know which typed fields each decoder can produce without decoding
//! anything.

/// Data types a decoded field can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataKind {
    Bool,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// UTF-8 string
    String,
    /// Variable-length binary data
    Binary,
    /// Fixed-size binary data (MAC address = 6, IPv6 = 16)
    FixedBinary(usize),
    /// IP address (v4 or v6)
    IpAddr,
}

impl DataKind {
    /// Human-readable type name for display.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataKind::Bool => "bool",
            DataKind::UInt8 => "u8",
            DataKind::UInt16 => "u16",
            DataKind::UInt32 => "u32",
            DataKind::UInt64 => "u64",
            DataKind::String => "string",
            DataKind::Binary => "binary",
            DataKind::FixedBinary(n) => match n {
                6 => "mac",
                16 => "ipv6",
                _ => "fixed_binary",
            },
            DataKind::IpAddr => "ipaddr",
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Field definition published by a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name (snake_case, prefixed with the protocol, e.g. "tcp.seq")
    pub name: &'static str,
    /// Data type
    pub kind: DataKind,
    /// Whether the field may be absent for a successfully decoded layer
    pub nullable: bool,
}

impl FieldDescriptor {
    /// Create a new non-nullable field.
    pub const fn new(name: &'static str, kind: DataKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    /// Builder: set nullability.
    pub const fn set_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// MAC address field (6-byte binary).
    pub const fn mac_field(name: &'static str) -> Self {
        Self::new(name, DataKind::FixedBinary(6))
    }

    /// IP address field (v4 or v6).
    pub const fn ip_field(name: &'static str) -> Self {
        Self::new(name, DataKind::IpAddr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_creation() {
        let field = FieldDescriptor::new("tcp.window", DataKind::UInt16);
        assert_eq!(field.name, "tcp.window");
        assert_eq!(field.kind, DataKind::UInt16);
        assert!(!field.nullable);
    }

    #[test]
    fn test_builder_and_helpers() {
        let field = FieldDescriptor::mac_field("eth.src_mac").set_nullable(true);
        assert!(field.nullable);
        assert_eq!(field.kind, DataKind::FixedBinary(6));
        assert_eq!(field.kind.type_name(), "mac");

        let field = FieldDescriptor::ip_field("ipv4.src_ip");
        assert_eq!(field.kind.type_name(), "ipaddr");
    }
}
