// Copyright 2021-2022 Farcaster Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

use std::fmt;

use serde::de::{self, Unexpected, Visitor};

/// A visitor that deserializes a fixed-size byte string written in hex, optionally prefixed with
/// `0x`. The inner value is the expected number of bytes.
pub(crate) struct HexString(pub usize);

impl<'de> Visitor<'de> for HexString {
    type Value = Vec<u8>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "a string representing {} bytes in hex value, optionally prefixed with 0x",
            self.0
        )
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        decode_hex(s, self.0).ok_or_else(|| de::Error::invalid_value(Unexpected::Str(s), &self))
    }
}

/// Decode a hex string of exactly `len` bytes, with or without the `0x` prefix.
pub(crate) fn decode_hex(s: &str, len: usize) -> Option<Vec<u8>> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    match hex::decode(raw) {
        Ok(bytes) if bytes.len() == len => Some(bytes),
        _ => None,
    }
}

/// Implement `Serialize`, `Deserialize`, and `FromStr` for a type constructed with
/// `fixed_hash::construct_fixed_hash!`, using a `0x` prefixed hex string representation.
macro_rules! impl_hex_serde {
    ($name:ident, $len:expr) => {
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(format!("{:#x}", self).as_ref())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<$name, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let bytes = deserializer.deserialize_str($crate::hash::HexString($len))?;
                Ok($name::from_slice(&bytes))
            }
        }

        impl std::str::FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(raw)?;
                if bytes.len() != $len {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                Ok($name::from_slice(&bytes))
            }
        }
    };
}

pub(crate) use impl_hex_serde;

#[cfg(test)]
mod tests {
    use super::decode_hex;

    #[test]
    fn decode_with_and_without_prefix() {
        assert_eq!(decode_hex("0x0a0b", 2), Some(vec![0x0a, 0x0b]));
        assert_eq!(decode_hex("0a0b", 2), Some(vec![0x0a, 0x0b]));
        assert_eq!(decode_hex("0a0b", 3), None);
        assert_eq!(decode_hex("zz", 1), None);
    }
}
