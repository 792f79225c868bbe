//! Protocol pieces shared by the server and the client: the bit-packed wire
//! codec, strong identifiers, named-value records, packet builders and the
//! message dispatch table.

pub mod error;

pub mod bits;
pub mod codec;
pub mod dispatch;
pub mod game;
pub mod ids;
pub mod physics;
pub mod protocol;
pub mod values;

pub use bits::{BitReader, BitWriter};
pub use codec::{Decode, Encode};
pub use dispatch::{DispatchSummary, Dispatcher, DispatcherBuilder, Handler};
pub use error::{DecodeError, HandlerError, RegistrationError};
pub use ids::{CharacterId, ConnectionId, InventorySlot, ItemId, MapEntityIndex, MapIndex};
pub use values::{NamedValues, ValueReader, ValueWriter};
