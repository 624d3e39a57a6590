use std::fmt;

/// An adapter's 64-bit node GUID, in network byte order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Guid([u8; 8]);

impl Guid {
    /// Constructs a Guid from network bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Returns the bytes of GUID in network byte order.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Constructs a Guid from its integer value.
    #[inline]
    #[must_use]
    pub const fn from_u64(val: u64) -> Self {
        Self(val.to_be_bytes())
    }

    /// Returns the integer value of the GUID.
    #[inline]
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

impl fmt::Debug for Guid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self:x})")
    }
}

fn guid_to_hex<R>(guid: Guid, case: hex_simd::AsciiCase, f: impl FnOnce(&str) -> R) -> R {
    let hex = hex_simd::encode_to_string(guid.as_bytes(), case);
    f(&hex)
}

impl fmt::LowerHex for Guid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        guid_to_hex(*self, hex_simd::AsciiCase::Lower, |s| {
            <str as fmt::Display>::fmt(s, f)
        })
    }
}

impl fmt::UpperHex for Guid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        guid_to_hex(*self, hex_simd::AsciiCase::Upper, |s| {
            <str as fmt::Display>::fmt(s, f)
        })
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::Guid;

    use serde::{Deserialize, Serialize};

    impl Serialize for Guid {
        #[inline]
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            <[u8; 8] as Serialize>::serialize(self.as_bytes(), serializer)
        }
    }

    impl<'de> Deserialize<'de> for Guid {
        #[inline]
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            <[u8; 8] as Deserialize<'de>>::deserialize(deserializer).map(Self::from_bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::utils::require_send_sync;

    use const_str::hex;

    #[test]
    fn guid_fmt() {
        const GUID_HEX: &str = "26418cfffe021df9";
        let guid = Guid::from_bytes(hex!(GUID_HEX));

        let debug = format!("{guid:?}");
        let lower_hex = format!("{guid:x}");
        let upper_hex = format!("{guid:X}");

        assert_eq!(debug, format!("Guid({GUID_HEX})"));
        assert_eq!(lower_hex, GUID_HEX);
        assert_eq!(upper_hex, GUID_HEX.to_ascii_uppercase());
    }

    #[test]
    fn guid_u64_round_trip() {
        let guid = Guid::from_u64(0x26418c_fffe02_1df9);
        assert_eq!(guid.to_u64(), 0x26418c_fffe02_1df9);
        assert_eq!(guid, Guid::from_bytes(0x26418c_fffe02_1df9u64.to_be_bytes()));
    }

    #[test]
    fn marker() {
        require_send_sync::<Guid>();
    }
}
