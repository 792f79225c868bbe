//! Strongly-typed integer identifiers.
//!
//! Every identifier is an [`Id`] parameterised by a marker kind that names the
//! underlying integer. On the wire an ID is exactly its underlying integer.

use crate::bits::{BitReader, BitWriter};
use crate::codec::{Decode, Encode};
use crate::error::DecodeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker describing one family of identifiers.
pub trait IdKind: 'static {
    type Repr: Copy
        + Eq
        + Ord
        + Hash
        + Default
        + fmt::Debug
        + fmt::Display
        + Encode
        + Decode
        + Serialize
        + DeserializeOwned;

    const NAME: &'static str;
}

pub struct Id<K: IdKind> {
    value: K::Repr,
    _kind: PhantomData<fn() -> K>,
}

impl<K: IdKind> Id<K> {
    pub const fn new(value: K::Repr) -> Self {
        Self {
            value,
            _kind: PhantomData,
        }
    }

    pub fn get(self) -> K::Repr {
        self.value
    }
}

impl<K: IdKind> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: IdKind> Copy for Id<K> {}

impl<K: IdKind> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K: IdKind> Eq for Id<K> {}

impl<K: IdKind> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: IdKind> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<K: IdKind> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K: IdKind> Default for Id<K> {
    fn default() -> Self {
        Self::new(K::Repr::default())
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", K::NAME, self.value)
    }
}

impl<K: IdKind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl<K: IdKind> Encode for Id<K> {
    fn encode(&self, writer: &mut BitWriter) {
        self.value.encode(writer);
    }
}

impl<K: IdKind> Decode for Id<K> {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        K::Repr::decode(reader).map(Self::new)
    }
}

impl<K: IdKind> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, K: IdKind> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        K::Repr::deserialize(deserializer).map(Self::new)
    }
}

macro_rules! id_types {
    ($($(#[$meta:meta])* $name:ident($kind:ident): $repr:ty;)*) => {
        $(
            #[doc = concat!("Marker kind for [`", stringify!($name), "`].")]
            #[derive(Debug)]
            pub enum $kind {}

            impl IdKind for $kind {
                type Repr = $repr;
                const NAME: &'static str = stringify!($name);
            }

            $(#[$meta])*
            pub type $name = Id<$kind>;

            impl From<$repr> for $name {
                fn from(value: $repr) -> Self {
                    Self::new(value)
                }
            }
        )*
    };
}

id_types! {
    /// Index of a dynamic entity on its map.
    MapEntityIndex(MapEntityIndexKind): u16;
    /// Index of a map.
    MapIndex(MapIndexKind): u16;
    /// Slot in a character inventory.
    InventorySlot(InventorySlotKind): u8;
    /// Persistent identifier of a character.
    CharacterId(CharacterIdKind): i32;
    /// Persistent identifier of an item instance.
    ItemId(ItemIdKind): i32;
    /// Transport-assigned identifier of a live connection.
    ConnectionId(ConnectionIdKind): u32;
}
