//! Builders for packets sent by the server, plus the composite values they
//! carry.

use super::{start_server_packet, EntitySnapshot, MessageWithParams, ServerPacketId};
use crate::bits::{BitReader, BitWriter};
use crate::codec::{Decode, Encode};
use crate::error::DecodeError;
use crate::game::{
    EquipmentSlot, GameMessage, StatType, MAX_ITEM_DESCRIPTION_LENGTH, MAX_ITEM_NAME_LENGTH,
};
use crate::ids::{InventorySlot, MapEntityIndex, MapIndex};
use crate::physics::Body;
use crate::values::BitValueWriter;

/// An item as shown in an inventory or equipment slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub name: String,
    pub amount: u8,
}

impl Encode for ItemStack {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write_string(&self.name);
        writer.write(&self.amount);
    }
}

impl Decode for ItemStack {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string(MAX_ITEM_NAME_LENGTH)?,
            amount: reader.read()?,
        })
    }
}

/// Detailed description of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub name: String,
    pub description: String,
    pub value: i32,
}

impl Encode for ItemInfo {
    fn encode(&self, writer: &mut BitWriter) {
        writer.write_string(&self.name);
        writer.write_string(&self.description);
        writer.write(&self.value);
    }
}

impl Decode for ItemInfo {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string(MAX_ITEM_NAME_LENGTH)?,
            description: reader.read_string(MAX_ITEM_DESCRIPTION_LENGTH)?,
            value: reader.read()?,
        })
    }
}

fn with_index(id: ServerPacketId, index: MapEntityIndex) -> Vec<u8> {
    let mut writer = start_server_packet(id);
    writer.write(&index);
    writer.into_bytes()
}

fn with_i32(id: ServerPacketId, value: i32) -> Vec<u8> {
    let mut writer = start_server_packet(id);
    writer.write(&value);
    writer.into_bytes()
}

pub fn char_attack(attacker: MapEntityIndex) -> Vec<u8> {
    with_index(ServerPacketId::CharAttack, attacker)
}

pub fn char_damage(target: MapEntityIndex, damage: i32) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::CharDamage);
    writer.write(&target);
    writer.write(&damage);
    writer.into_bytes()
}

pub fn chat(text: &str) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::Chat);
    writer.write_string(text);
    writer.into_bytes()
}

pub fn chat_say(name: &str, speaker: MapEntityIndex, text: &str) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::ChatSay);
    writer.write_string(name);
    writer.write(&speaker);
    writer.write_string(text);
    writer.into_bytes()
}

pub fn create_dynamic_entity(snapshot: &EntitySnapshot) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::CreateDynamicEntity);
    writer.write(snapshot);
    writer.into_bytes()
}

pub fn remove_dynamic_entity(index: MapEntityIndex) -> Vec<u8> {
    with_index(ServerPacketId::RemoveDynamicEntity, index)
}

pub fn login_successful() -> Vec<u8> {
    start_server_packet(ServerPacketId::LoginSuccessful).into_bytes()
}

pub fn login_unsuccessful(message: GameMessage, params: Vec<String>) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::LoginUnsuccessful);
    writer.write(&MessageWithParams::new(message, params));
    writer.into_bytes()
}

pub fn use_entity(used: MapEntityIndex, used_by: MapEntityIndex) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::UseEntity);
    writer.write(&used);
    writer.write(&used_by);
    writer.into_bytes()
}

pub fn notify_exp_cash(exp_gained: i32, cash_gained: i32) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::NotifyExpCash);
    writer.write(&exp_gained);
    writer.write(&cash_gained);
    writer.into_bytes()
}

pub fn notify_level(character: MapEntityIndex) -> Vec<u8> {
    with_index(ServerPacketId::NotifyLevel, character)
}

pub fn notify_get_item(name: &str, amount: u8) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::NotifyGetItem);
    writer.write(&ItemStack {
        name: name.to_string(),
        amount,
    });
    writer.into_bytes()
}

pub fn ping(sent_at: u32) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::Ping);
    writer.write(&sent_at);
    writer.into_bytes()
}

pub fn send_item_info(info: &ItemInfo) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::SendItemInfo);
    writer.write(info);
    writer.into_bytes()
}

pub fn send_message(message: GameMessage, params: Vec<String>) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::SendMessage);
    writer.write(&MessageWithParams::new(message, params));
    writer.into_bytes()
}

pub fn set_cash(cash: i32) -> Vec<u8> {
    with_i32(ServerPacketId::SetCash, cash)
}

pub fn set_exp(exp: i32) -> Vec<u8> {
    with_i32(ServerPacketId::SetExp, exp)
}

pub fn set_inventory_slot(slot: InventorySlot, item: Option<&ItemStack>) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::SetInventorySlot);
    writer.write(&slot);
    writer.write(&item.cloned());
    writer.into_bytes()
}

pub fn set_level(level: u8) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::SetLevel);
    writer.write(&level);
    writer.into_bytes()
}

pub fn set_map(map: MapIndex) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::SetMap);
    writer.write(&map);
    writer.into_bytes()
}

pub fn set_stat_points(points: i32) -> Vec<u8> {
    with_i32(ServerPacketId::SetStatPoints, points)
}

pub fn set_user_char(index: MapEntityIndex) -> Vec<u8> {
    with_index(ServerPacketId::SetUserChar, index)
}

pub fn update_equipment_slot(slot: EquipmentSlot, item: Option<&str>) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::UpdateEquipmentSlot);
    writer.write(&slot);
    writer.write(&item.map(str::to_string));
    writer.into_bytes()
}

pub fn update_stat(stat: StatType, value: u16) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::UpdateStat);
    writer.write(&stat);
    writer.write(&value);
    writer.into_bytes()
}

pub fn update_velocity_and_position(index: MapEntityIndex, body: &Body) -> Vec<u8> {
    let mut writer = start_server_packet(ServerPacketId::UpdateVelocityAndPosition);
    writer.write(&index);
    body.write_values(&mut BitValueWriter::new(&mut writer));
    writer.into_bytes()
}
