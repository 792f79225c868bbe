//! Handlers for every packet the server sends.
//!
//! Each handler decodes its fields and applies them to the
//! [`ClientGameState`] mirror; chat-worthy events also become chat lines.

use crate::game::ClientGameState;
use log::{debug, info, warn};
use shared::game::{EquipmentSlot, StatType, MAX_SERVER_SAY_LENGTH, MAX_SERVER_SAY_NAME_LENGTH};
use shared::physics::Body;
use shared::protocol::server::{ItemInfo, ItemStack};
use shared::protocol::{EntitySnapshot, MessageWithParams, ServerPacketId, SERVER_MESSAGE_ID_BITS};
use shared::values::BitValueReader;
use shared::{
    BitReader, DispatchSummary, Dispatcher, HandlerError, InventorySlot, MapEntityIndex, MapIndex,
    RegistrationError,
};
use std::time::Instant;

pub type ClientDispatcher = Dispatcher<ClientPacketHandler, ()>;

pub struct ClientPacketHandler {
    pub state: ClientGameState,
    started: Instant,
    login_error: Option<String>,
}

impl ClientPacketHandler {
    pub fn new() -> Self {
        Self {
            state: ClientGameState::new(),
            started: Instant::now(),
            login_error: None,
        }
    }

    pub fn dispatcher() -> Result<ClientDispatcher, RegistrationError> {
        use ServerPacketId as Id;
        Dispatcher::builder(SERVER_MESSAGE_ID_BITS)
            .handler(Id::CharAttack.value(), "CharAttack", Self::recv_char_attack)
            .handler(Id::CharDamage.value(), "CharDamage", Self::recv_char_damage)
            .handler(Id::Chat.value(), "Chat", Self::recv_chat)
            .handler(Id::ChatSay.value(), "ChatSay", Self::recv_chat_say)
            .handler(
                Id::CreateDynamicEntity.value(),
                "CreateDynamicEntity",
                Self::recv_create_dynamic_entity,
            )
            .handler(Id::LoginSuccessful.value(), "LoginSuccessful", Self::recv_login_successful)
            .handler(
                Id::LoginUnsuccessful.value(),
                "LoginUnsuccessful",
                Self::recv_login_unsuccessful,
            )
            .handler(Id::NotifyExpCash.value(), "NotifyExpCash", Self::recv_notify_exp_cash)
            .handler(Id::NotifyGetItem.value(), "NotifyGetItem", Self::recv_notify_get_item)
            .handler(Id::NotifyLevel.value(), "NotifyLevel", Self::recv_notify_level)
            .handler(Id::Ping.value(), "Ping", Self::recv_ping)
            .handler(
                Id::RemoveDynamicEntity.value(),
                "RemoveDynamicEntity",
                Self::recv_remove_dynamic_entity,
            )
            .handler(Id::SendItemInfo.value(), "SendItemInfo", Self::recv_send_item_info)
            .handler(Id::SendMessage.value(), "SendMessage", Self::recv_send_message)
            .handler(Id::SetCash.value(), "SetCash", Self::recv_set_cash)
            .handler(Id::SetExp.value(), "SetExp", Self::recv_set_exp)
            .handler(Id::SetInventorySlot.value(), "SetInventorySlot", Self::recv_set_inventory_slot)
            .handler(Id::SetLevel.value(), "SetLevel", Self::recv_set_level)
            .handler(Id::SetMap.value(), "SetMap", Self::recv_set_map)
            .handler(Id::SetStatPoints.value(), "SetStatPoints", Self::recv_set_stat_points)
            .handler(Id::SetUserChar.value(), "SetUserChar", Self::recv_set_user_char)
            .handler(
                Id::UpdateEquipmentSlot.value(),
                "UpdateEquipmentSlot",
                Self::recv_update_equipment_slot,
            )
            .handler(Id::UpdateStat.value(), "UpdateStat", Self::recv_update_stat)
            .handler(
                Id::UpdateVelocityAndPosition.value(),
                "UpdateVelocityAndPosition",
                Self::recv_update_velocity_and_position,
            )
            .handler(Id::UseEntity.value(), "UseEntity", Self::recv_use_entity)
            .build()
    }

    /// Dispatches one receive buffer.
    pub fn handle(&mut self, dispatcher: &ClientDispatcher, data: &[u8]) -> DispatchSummary {
        dispatcher.dispatch(self, &(), data)
    }

    /// Milliseconds since the client started, as carried by Ping.
    pub fn now_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    pub fn login_error(&self) -> Option<&str> {
        self.login_error.as_deref()
    }

    fn chat(&mut self, line: String) {
        info!("{}", line);
        self.state.push_chat(line);
    }

    fn recv_char_attack(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let attacker = reader.read::<MapEntityIndex>()?;
        debug!("{} attacks", self.state.entity_name(attacker));
        Ok(())
    }

    fn recv_char_damage(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let target = reader.read::<MapEntityIndex>()?;
        let damage = reader.read::<i32>()?;
        let line = format!("{} takes {} damage", self.state.entity_name(target), damage);
        self.chat(line);
        Ok(())
    }

    fn recv_chat(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let text = reader.read_string(MAX_SERVER_SAY_LENGTH)?;
        self.chat(text);
        Ok(())
    }

    fn recv_chat_say(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let name = reader.read_string(MAX_SERVER_SAY_NAME_LENGTH)?;
        let _speaker = reader.read::<MapEntityIndex>()?;
        let text = reader.read_string(MAX_SERVER_SAY_LENGTH)?;
        self.chat(format!("{name}: {text}"));
        Ok(())
    }

    fn recv_create_dynamic_entity(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let snapshot = reader.read::<EntitySnapshot>()?;
        self.state.add_entity(snapshot);
        Ok(())
    }

    fn recv_remove_dynamic_entity(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let index = reader.read::<MapEntityIndex>()?;
        if self.state.remove_entity(index).is_none() {
            debug!("Removal of unknown entity {}", index);
        }
        Ok(())
    }

    fn recv_login_successful(&mut self, _: &(), _reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        info!("Logged in");
        self.state.logged_in = true;
        self.login_error = None;
        Ok(())
    }

    fn recv_login_unsuccessful(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let message = reader.read::<MessageWithParams>()?;
        let text = message.text();
        warn!("Login failed: {}", text);
        self.login_error = Some(text);
        Ok(())
    }

    fn recv_notify_exp_cash(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let exp = reader.read::<i32>()?;
        let cash = reader.read::<i32>()?;
        let line = match (exp, cash) {
            (0, cash) => format!("You got {cash} cash"),
            (exp, 0) => format!("You got {exp} exp"),
            (exp, cash) => format!("You got {exp} exp and {cash} cash"),
        };
        self.chat(line);
        Ok(())
    }

    fn recv_notify_get_item(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let item = reader.read::<ItemStack>()?;
        self.chat(format!("You got {} x{}", item.name, item.amount));
        Ok(())
    }

    fn recv_notify_level(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let index = reader.read::<MapEntityIndex>()?;
        let line = format!("{} levelled up!", self.state.entity_name(index));
        self.chat(line);
        Ok(())
    }

    fn recv_ping(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let sent_at = reader.read::<u32>()?;
        let round_trip = self.now_ms().wrapping_sub(sent_at);
        self.chat(format!("Ping: {round_trip}ms"));
        Ok(())
    }

    fn recv_send_item_info(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let info = reader.read::<ItemInfo>()?;
        self.chat(format!("{}: {} (worth {})", info.name, info.description, info.value));
        Ok(())
    }

    fn recv_send_message(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let message = reader.read::<MessageWithParams>()?;
        self.chat(message.text());
        Ok(())
    }

    fn recv_set_cash(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        self.state.cash = reader.read()?;
        Ok(())
    }

    fn recv_set_exp(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        self.state.exp = reader.read()?;
        Ok(())
    }

    fn recv_set_level(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        self.state.level = reader.read()?;
        Ok(())
    }

    fn recv_set_stat_points(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        self.state.stat_points = reader.read()?;
        Ok(())
    }

    fn recv_set_inventory_slot(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let slot = reader.read::<InventorySlot>()?;
        let item = reader.read::<Option<ItemStack>>()?;
        self.state.set_inventory_slot(slot, item);
        Ok(())
    }

    fn recv_set_map(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let map = reader.read::<MapIndex>()?;
        self.state.set_map(map);
        Ok(())
    }

    fn recv_set_user_char(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        self.state.user_char = Some(reader.read()?);
        Ok(())
    }

    fn recv_update_equipment_slot(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let slot = reader.read::<EquipmentSlot>()?;
        let item = reader.read::<Option<String>>()?;
        self.state.set_equipment_slot(slot, item);
        Ok(())
    }

    fn recv_update_stat(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let stat = reader.read::<StatType>()?;
        let value = reader.read::<u16>()?;
        self.state.stats.insert(stat, value);
        Ok(())
    }

    fn recv_update_velocity_and_position(
        &mut self,
        _: &(),
        reader: &mut BitReader<'_>,
    ) -> Result<(), HandlerError> {
        let index = reader.read::<MapEntityIndex>()?;
        let body = Body::read_values(&mut BitValueReader::new(reader))?;
        if !self.state.update_entity(index, body) {
            debug!("Position for unknown entity {}", index);
        }
        Ok(())
    }

    /// Carries the used entity and its user as two separate indices.
    fn recv_use_entity(&mut self, _: &(), reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let used = reader.read::<MapEntityIndex>()?;
        let used_by = reader.read::<MapEntityIndex>()?;
        let line = format!(
            "{} used {}",
            self.state.entity_name(used_by),
            self.state.entity_name(used)
        );
        self.chat(line);
        Ok(())
    }
}

impl Default for ClientPacketHandler {
    fn default() -> Self {
        Self::new()
    }
}
