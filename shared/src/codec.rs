//! Typed values on top of the bit stream.
//!
//! Fixed-width kinds carry no length prefix; they are encoded with exactly the
//! number of bits of their type. Strings use the bit stream's length prefix and
//! are bounded by [`MAX_STRING_LENGTH`] unless a field reads them with its own
//! ceiling through [`BitReader::read_string`].

use crate::bits::{BitReader, BitWriter};
use crate::error::DecodeError;

/// Read ceiling applied to strings decoded through the [`Decode`] trait.
pub const MAX_STRING_LENGTH: usize = 1024;

/// A value that can be appended to a bit stream.
pub trait Encode {
    fn encode(&self, writer: &mut BitWriter);
}

/// A value that can be parsed from a bit stream.
pub trait Decode: Sized {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError>;
}

macro_rules! impl_unsigned {
    ($($ty:ty => $bits:expr),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, writer: &mut BitWriter) {
                    writer.write_bits(u64::from(*self), $bits);
                }
            }

            impl Decode for $ty {
                fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
                    Ok(reader.read_bits($bits)? as $ty)
                }
            }
        )*
    };
}

macro_rules! impl_signed {
    ($($ty:ty as $unsigned:ty => $bits:expr),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, writer: &mut BitWriter) {
                    writer.write_bits(u64::from(*self as $unsigned), $bits);
                }
            }

            impl Decode for $ty {
                fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
                    Ok(reader.read_bits($bits)? as $unsigned as $ty)
                }
            }
        )*
    };
}

impl_unsigned!(u8 => 8, u16 => 16, u32 => 32, u64 => 64);
impl_signed!(i8 as u8 => 8, i16 as u16 => 16, i32 as u32 => 32, i64 as u64 => 64);

impl Encode for bool {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write_bit(*self);
    }
}

impl Decode for bool {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        reader.read_bit()
    }
}

impl Encode for f32 {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write_bits(u64::from(self.to_bits()), 32);
    }
}

impl Decode for f32 {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        Ok(f32::from_bits(reader.read_bits(32)? as u32))
    }
}

impl Encode for f64 {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write_bits(self.to_bits(), 64);
    }
}

impl Decode for f64 {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        Ok(f64::from_bits(reader.read_bits(64)?))
    }
}

impl Encode for str {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write_string(self);
    }
}

impl Encode for String {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write_string(self);
    }
}

impl Decode for String {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        reader.read_string(MAX_STRING_LENGTH)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write_bit(self.is_some());
        if let Some(value) = self {
            value.encode(writer);
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        if reader.read_bit()? {
            Ok(Some(T::decode(reader)?))
        } else {
            Ok(None)
        }
    }
}

/// Declares a small closed enumeration that is encoded with a fixed bit width.
///
/// The width is a literal or the name of a `u32` constant.
///
/// Decoding a discriminant without a matching variant is a [`DecodeError::InvalidEnum`].
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $bits:tt {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $value:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $value
            ),+
        }

        impl $name {
            /// Number of bits used on the wire.
            pub const BITS: u32 = $bits;

            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn value(self) -> u8 {
                self as u8
            }

            pub fn from_value(value: u8) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }
        }

        impl $crate::codec::Encode for $name {
            fn encode(&self, writer: &mut $crate::bits::BitWriter) {
                writer.write_bits(u64::from(self.value()), Self::BITS);
            }
        }

        impl $crate::codec::Decode for $name {
            fn decode(
                reader: &mut $crate::bits::BitReader<'_>,
            ) -> Result<Self, $crate::error::DecodeError> {
                let raw = reader.read_bits(Self::BITS)?;
                u8::try_from(raw)
                    .ok()
                    .and_then(Self::from_value)
                    .ok_or($crate::error::DecodeError::InvalidEnum {
                        kind: stringify!($name),
                        value: raw,
                    })
            }
        }
    };
}
