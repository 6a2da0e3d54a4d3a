//! Dictionary key types.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use stratum_common::{Result, error::Error};

/// Width of the keys stored in a dictionary file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyWidth {
    U8,
    U16,
    U32,
    U64,
}

impl KeyWidth {
    /// Size of a key in bytes.
    pub const fn size(self) -> usize {
        match self {
            KeyWidth::U8 => 1,
            KeyWidth::U16 => 2,
            KeyWidth::U32 => 4,
            KeyWidth::U64 => 8,
        }
    }

    pub const fn max_key(self) -> u64 {
        match self {
            KeyWidth::U8 => u8::MAX as u64,
            KeyWidth::U16 => u16::MAX as u64,
            KeyWidth::U32 => u32::MAX as u64,
            KeyWidth::U64 => u64::MAX,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            KeyWidth::U8 => "u8",
            KeyWidth::U16 => "u16",
            KeyWidth::U32 => "u32",
            KeyWidth::U64 => "u64",
        }
    }
}

impl fmt::Display for KeyWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyWidth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [KeyWidth::U8, KeyWidth::U16, KeyWidth::U32, KeyWidth::U64]
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_arg("key_width", format!("unknown key width '{s}'")))
    }
}

/// A fixed-width unsigned integer usable as a dictionary key.
pub trait DictKeyType: Copy + Ord + Send + Sync + fmt::Debug + 'static {
    const WIDTH: KeyWidth;
    const SIZE: usize;

    /// Decodes a key from the first `SIZE` bytes of `bytes`.
    fn read_le(bytes: &[u8]) -> Self;

    fn write_le(self, out: &mut Vec<u8>);

    /// Narrows a query key; `None` when it does not fit this width.
    fn from_u64(value: u64) -> Option<Self>;

    fn to_u64(self) -> u64;
}

macro_rules! impl_dict_key_type {
    ($t:ty, $width:ident) => {
        impl DictKeyType for $t {
            const WIDTH: KeyWidth = KeyWidth::$width;
            const SIZE: usize = std::mem::size_of::<$t>();

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_le_bytes(buf)
            }

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn from_u64(value: u64) -> Option<Self> {
                <$t>::try_from(value).ok()
            }

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }
        }
    };
}

impl_dict_key_type!(u8, U8);
impl_dict_key_type!(u16, U16);
impl_dict_key_type!(u32, U32);
impl_dict_key_type!(u64, U64);

/// A dictionary query key.
///
/// The null term sorts after every regular term: iteration yields it last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DictKey {
    Term(u64),
    Null,
}

impl From<u64> for DictKey {
    fn from(key: u64) -> Self {
        DictKey::Term(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codec() {
        let mut buf = Vec::new();
        0x1234u16.write_le(&mut buf);
        0xdeadbeefu32.write_le(&mut buf);
        assert_eq!(buf, [0x34, 0x12, 0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(u16::read_le(&buf), 0x1234);
        assert_eq!(u32::read_le(&buf[2..]), 0xdeadbeef);
        assert_eq!(u8::SIZE, 1);
        assert_eq!(u64::WIDTH, KeyWidth::U64);
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(u8::from_u64(255), Some(255));
        assert_eq!(u8::from_u64(256), None);
        assert_eq!(u32::from_u64(u32::MAX as u64 + 1), None);
        assert_eq!(u64::from_u64(u64::MAX), Some(u64::MAX));
    }

    #[test]
    fn test_null_sorts_last() {
        assert!(DictKey::Term(u64::MAX) < DictKey::Null);
        assert_eq!("U32".parse::<KeyWidth>().unwrap(), KeyWidth::U32);
        assert!("u128".parse::<KeyWidth>().is_err());
        assert_eq!(KeyWidth::U16.max_key(), 65535);
    }
}
