//! Builders for packets sent by the client.

use super::{start_client_packet, ClientPacketId};
use crate::game::{EquipmentSlot, StatType};
use crate::ids::{InventorySlot, MapEntityIndex};

fn bare(id: ClientPacketId) -> Vec<u8> {
    start_client_packet(id).into_bytes()
}

pub fn attack() -> Vec<u8> {
    bare(ClientPacketId::Attack)
}

pub fn drop_inventory_item(slot: InventorySlot) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::DropInventoryItem);
    writer.write(&slot);
    writer.into_bytes()
}

pub fn get_equipment_item_info(slot: EquipmentSlot) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::GetEquipmentItemInfo);
    writer.write(&slot);
    writer.into_bytes()
}

pub fn get_inventory_item_info(slot: InventorySlot) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::GetInventoryItemInfo);
    writer.write(&slot);
    writer.into_bytes()
}

pub fn jump() -> Vec<u8> {
    bare(ClientPacketId::Jump)
}

pub fn login(name: &str, password: &str) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::Login);
    writer.write_string(name);
    writer.write_string(password);
    writer.into_bytes()
}

pub fn move_left() -> Vec<u8> {
    bare(ClientPacketId::MoveLeft)
}

pub fn move_right() -> Vec<u8> {
    bare(ClientPacketId::MoveRight)
}

pub fn move_stop() -> Vec<u8> {
    bare(ClientPacketId::MoveStop)
}

pub fn pickup_item(item: MapEntityIndex) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::PickupItem);
    writer.write(&item);
    writer.into_bytes()
}

/// `sent_at` is echoed back by the server and used to measure latency.
pub fn ping(sent_at: u32) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::Ping);
    writer.write(&sent_at);
    writer.into_bytes()
}

pub fn raise_stat(stat: StatType) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::RaiseStat);
    writer.write(&stat);
    writer.into_bytes()
}

pub fn say(text: &str) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::Say);
    writer.write_string(text);
    writer.into_bytes()
}

pub fn unequip_item(slot: EquipmentSlot) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::UnequipItem);
    writer.write(&slot);
    writer.into_bytes()
}

pub fn use_inventory_item(slot: InventorySlot) -> Vec<u8> {
    let mut writer = start_client_packet(ClientPacketId::UseInventoryItem);
    writer.write(&slot);
    writer.into_bytes()
}

pub fn use_world() -> Vec<u8> {
    bare(ClientPacketId::UseWorld)
}
