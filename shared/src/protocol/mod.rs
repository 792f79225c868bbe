//! Packet identifiers, framing constants and packet builders for both
//! directions.
//!
//! Every packet starts with its message identifier and is padded to a byte
//! boundary, so several packets can be concatenated into one receive buffer.

pub mod client;
pub mod server;

use crate::bits::{BitReader, BitWriter};
use crate::codec::{Decode, Encode};
use crate::error::DecodeError;
use crate::game::{EntityKind, GameMessage, MAX_GAME_MESSAGE_PARAMS, MAX_ITEM_NAME_LENGTH};
use crate::ids::MapEntityIndex;
use crate::physics::Body;
use crate::values::{BitValueReader, BitValueWriter};
use crate::wire_enum;

/// Width of identifiers on packets sent by the client.
pub const CLIENT_MESSAGE_ID_BITS: u32 = 8;
/// Width of identifiers on packets sent by the server.
pub const SERVER_MESSAGE_ID_BITS: u32 = 8;

/// Size of the big-endian length prefix in front of every reliable frame.
pub const FRAME_LENGTH_BYTES: usize = 2;
pub const MAX_FRAME_LENGTH: usize = u16::MAX as usize;
/// Size of the connection token carried by the handshake and every datagram.
pub const TOKEN_BYTES: usize = 4;

/// Longest parameter accepted in a game message.
pub const MAX_GAME_MESSAGE_PARAM_LENGTH: usize = 255;

wire_enum! {
    /// Messages sent from the client to the server.
    pub enum ClientPacketId: CLIENT_MESSAGE_ID_BITS {
        Attack = 0,
        DropInventoryItem = 1,
        GetEquipmentItemInfo = 2,
        GetInventoryItemInfo = 3,
        Jump = 4,
        Login = 5,
        MoveLeft = 6,
        MoveRight = 7,
        MoveStop = 8,
        PickupItem = 9,
        Ping = 10,
        RaiseStat = 11,
        Say = 12,
        UnequipItem = 13,
        UseInventoryItem = 14,
        UseWorld = 15,
    }
}

wire_enum! {
    /// Messages sent from the server to the client.
    pub enum ServerPacketId: SERVER_MESSAGE_ID_BITS {
        CharAttack = 0,
        CharDamage = 1,
        Chat = 2,
        ChatSay = 3,
        CreateDynamicEntity = 4,
        LoginSuccessful = 5,
        LoginUnsuccessful = 6,
        NotifyExpCash = 7,
        NotifyGetItem = 8,
        NotifyLevel = 9,
        Ping = 10,
        RemoveDynamicEntity = 11,
        SendItemInfo = 12,
        SendMessage = 13,
        SetCash = 14,
        SetExp = 15,
        SetInventorySlot = 16,
        SetLevel = 17,
        SetMap = 18,
        SetStatPoints = 19,
        SetUserChar = 20,
        UpdateEquipmentSlot = 21,
        UpdateStat = 22,
        UpdateVelocityAndPosition = 23,
        UseEntity = 24,
    }
}

/// Prefixes a reliable-channel payload with its length.
///
/// Callers keep payloads within [`MAX_FRAME_LENGTH`].
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_FRAME_LENGTH);
    let mut frame = Vec::with_capacity(FRAME_LENGTH_BYTES + payload.len());
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn start_client_packet(id: ClientPacketId) -> BitWriter {
    let mut writer = BitWriter::with_capacity(16);
    writer.write(&id);
    writer
}

fn start_server_packet(id: ServerPacketId) -> BitWriter {
    let mut writer = BitWriter::with_capacity(16);
    writer.write(&id);
    writer
}

/// A game message identifier followed by its string parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWithParams {
    pub message: GameMessage,
    pub params: Vec<String>,
}

impl MessageWithParams {
    pub fn new(message: GameMessage, params: Vec<String>) -> Self {
        Self { message, params }
    }

    pub fn text(&self) -> String {
        self.message.format(&self.params)
    }
}

impl Encode for MessageWithParams {
    fn encode(&self, writer: &mut BitWriter) {
        let count = self.params.len().min(MAX_GAME_MESSAGE_PARAMS);
        writer.write(&self.message);
        writer.write(&(count as u8));
        for param in &self.params[..count] {
            writer.write_string(param);
        }
    }
}

impl Decode for MessageWithParams {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        let message = reader.read::<GameMessage>()?;
        let count = reader.read::<u8>()? as usize;
        if count > MAX_GAME_MESSAGE_PARAMS {
            return Err(DecodeError::TooManyElements {
                length: count,
                max: MAX_GAME_MESSAGE_PARAMS,
            });
        }
        let params = (0..count)
            .map(|_| reader.read_string(MAX_GAME_MESSAGE_PARAM_LENGTH))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { message, params })
    }
}

/// Everything a client needs to start mirroring a dynamic entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub index: MapEntityIndex,
    pub kind: EntityKind,
    pub name: String,
    pub body: Body,
}

impl Encode for EntitySnapshot {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write(&self.index);
        writer.write(&self.kind);
        writer.write_string(&self.name);
        self.body.write_values(&mut BitValueWriter::new(writer));
    }
}

impl Decode for EntitySnapshot {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        let index = reader.read()?;
        let kind = reader.read()?;
        let name = reader.read_string(MAX_ITEM_NAME_LENGTH)?;
        let body = Body::read_values(&mut BitValueReader::new(reader))?;
        Ok(Self {
            index,
            kind,
            name,
            body,
        })
    }
}
