//! Opaque, reversible identity tokens.
//!
//! An [`EncodedId`] packs a primary identifier and a verification sub-value
//! into one little-endian byte buffer and renders it with the Flickr base58
//! alphabet. The token is short, URL-safe and tamper-evident: decoding never
//! fails loudly, it yields [`EncodedId::EMPTY`] for anything that is not a
//! well-formed token of exactly the expected width.
//!
//! ```rust
//! use switchyard_core::EncodedId;
//!
//! let token = EncodedId::<i64, i32>::new(42, 7).encode();
//! assert_eq!(EncodedId::<i64, i32>::decode(&token), EncodedId::new(42, 7));
//! assert!(EncodedId::<i64, i32>::decode("not a token").is_empty());
//! ```

use std::fmt;

/// A fixed-width integer that can be packed into an [`EncodedId`].
pub trait IdPart: Copy + Default + PartialEq + fmt::Debug {
    /// Serialized width in bytes.
    const WIDTH: usize;

    /// The zero value, usable in const context.
    const ZERO: Self;

    /// Writes `self` little-endian into `out`, which is exactly `WIDTH` long.
    fn write_le(self, out: &mut [u8]);

    /// Reads a value from `bytes`, which is exactly `WIDTH` long.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_id_part {
    ($($ty:ty),*) => {
        $(
            impl IdPart for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                const ZERO: Self = 0;

                fn write_le(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_id_part!(i16, u16, i32, u32, i64, u64);

/// A primary identifier paired with a verification sub-value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EncodedId<A, B> {
    /// Primary identifier.
    pub id: A,
    /// Verification sub-value (e.g. a salt).
    pub sub_id: B,
}

impl<A: IdPart, B: IdPart> EncodedId<A, B> {
    /// The unset pair. Encodes to the empty token.
    pub const EMPTY: Self = Self {
        id: A::ZERO,
        sub_id: B::ZERO,
    };

    /// Total serialized width in bytes.
    pub const WIDTH: usize = A::WIDTH + B::WIDTH;

    pub fn new(id: A, sub_id: B) -> Self {
        Self { id, sub_id }
    }

    /// Returns `true` for the unset pair.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Serializes and base58-encodes the pair.
    pub fn encode(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut bytes = vec![0u8; Self::WIDTH];
        self.id.write_le(&mut bytes[..A::WIDTH]);
        self.sub_id.write_le(&mut bytes[A::WIDTH..]);

        bs58::encode(bytes)
            .with_alphabet(bs58::Alphabet::FLICKR)
            .into_string()
    }

    /// Decodes a token produced by [`encode`](Self::encode).
    ///
    /// Empty, malformed and wrong-length input all yield [`EMPTY`](Self::EMPTY).
    pub fn decode(token: &str) -> Self {
        if token.is_empty() {
            return Self::EMPTY;
        }

        let bytes = match bs58::decode(token)
            .with_alphabet(bs58::Alphabet::FLICKR)
            .into_vec()
        {
            Ok(bytes) => bytes,
            Err(_) => return Self::EMPTY,
        };

        if bytes.len() != Self::WIDTH {
            return Self::EMPTY;
        }

        Self {
            id: A::read_le(&bytes[..A::WIDTH]),
            sub_id: B::read_le(&bytes[A::WIDTH..]),
        }
    }
}

impl<A: IdPart, B: IdPart> fmt::Display for EncodedId<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<A: IdPart, B: IdPart> From<&str> for EncodedId<A, B> {
    fn from(token: &str) -> Self {
        Self::decode(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type BotRoute = EncodedId<i64, i32>;

    #[test]
    fn test_round_trip() {
        for (id, salt) in [
            (1_i64, 0_i32),
            (42, 7),
            (-1, -1),
            (i64::MAX, i32::MIN),
            (i64::MIN, i32::MAX),
            (0, 9),
            (6_123_456_789, 1_337),
        ] {
            let token = BotRoute::new(id, salt).encode();
            assert!(!token.is_empty());
            assert_eq!(BotRoute::decode(&token), BotRoute::new(id, salt));
        }
    }

    #[test]
    fn test_empty_pair() {
        assert_eq!(BotRoute::EMPTY.encode(), "");
        assert!(BotRoute::decode("").is_empty());
    }

    #[test]
    fn test_malformed_input() {
        // '0', 'O', 'I' and 'l' are not part of the base58 alphabet.
        assert!(BotRoute::decode("0OIl").is_empty());
        assert!(BotRoute::decode("hello world").is_empty());
        assert!(BotRoute::decode("/update").is_empty());
    }

    #[test]
    fn test_wrong_length() {
        let short = EncodedId::<i32, i16>::new(5, 3).encode();
        assert!(BotRoute::decode(&short).is_empty());

        let long = EncodedId::<i64, i64>::new(5, 3).encode();
        assert!(BotRoute::decode(&long).is_empty());
    }

    #[test]
    fn test_tampering_changes_the_pair() {
        let token = BotRoute::new(42, 7).encode();
        let mut chars: Vec<char> = token.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        let tampered: String = chars.into_iter().collect();

        assert_ne!(BotRoute::decode(&tampered), BotRoute::new(42, 7));
    }

    #[test]
    fn test_display_matches_encode() {
        let id = BotRoute::new(99, 1);
        assert_eq!(id.to_string(), id.encode());
        assert_eq!(BotRoute::from(id.encode().as_str()), id);
    }
}
