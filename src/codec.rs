//! Key/value codecs: the compile-time stand-in for a template-dispatched
//! page shape.
//!
//! A codec with `FIXED_SIZE = Some(n)` is a *scalar* shape: every encoded
//! instance is exactly `n` bytes and is stored inline in a page's fixed
//! slots. A codec with `FIXED_SIZE = None` is an *array* shape: encoded
//! instances vary in length and are stored via a cumulative end-offset
//! table.

use crate::error::{Result, TreeError};

/// A type that can be stored as a B-tree key.
///
/// Ordering is defined on the decoded value (`Ord`), not on the encoded
/// bytes, so scalar integer keys sort numerically without requiring a
/// big-endian encoding.
pub trait KeyCodec: Ord + Clone + std::fmt::Debug {
    /// `Some(n)` for a fixed-width scalar key, `None` for a variable-length
    /// array key.
    const FIXED_SIZE: Option<u16>;

    /// Append the encoded form of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decode a value previously produced by [`encode`](Self::encode).
    fn decode(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// A type that can be stored as a B-tree value.
pub trait ValueCodec: Clone + std::fmt::Debug {
    /// `Some(n)` for a fixed-width scalar value, `None` for a
    /// variable-length array value.
    const FIXED_SIZE: Option<u16>;

    /// Append the encoded form of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decode a value previously produced by [`encode`](Self::encode).
    fn decode(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

macro_rules! impl_scalar_codec {
    ($ty:ty, $size:expr) => {
        impl KeyCodec for $ty {
            const FIXED_SIZE: Option<u16> = Some($size);

            fn encode(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn decode(bytes: &[u8]) -> Result<Self> {
                let arr = bytes
                    .try_into()
                    .map_err(|_| TreeError::Corruption("scalar key truncated".into()))?;
                Ok(<$ty>::from_le_bytes(arr))
            }
        }

        impl ValueCodec for $ty {
            const FIXED_SIZE: Option<u16> = Some($size);

            fn encode(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn decode(bytes: &[u8]) -> Result<Self> {
                let arr = bytes
                    .try_into()
                    .map_err(|_| TreeError::Corruption("scalar value truncated".into()))?;
                Ok(<$ty>::from_le_bytes(arr))
            }
        }
    };
}

impl_scalar_codec!(u32, 4);
impl_scalar_codec!(u64, 8);
impl_scalar_codec!(i32, 4);
impl_scalar_codec!(i64, 8);

impl KeyCodec for Vec<u8> {
    const FIXED_SIZE: Option<u16> = None;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl ValueCodec for Vec<u8> {
    const FIXED_SIZE: Option<u16> = None;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

/// Codec for the value type used by B-tree node pages: every node value is
/// a child [`PageLink`](crate::types::PageLink), a 4-byte scalar.
impl ValueCodec for crate::types::PageLink {
    const FIXED_SIZE: Option<u16> = Some(4);

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(TreeError::Corruption("page link truncated".into()));
        }
        Ok(crate::types::PageLink::from_bytes(bytes))
    }
}
