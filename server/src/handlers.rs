//! Handlers for every packet a client can send.
//!
//! [`ServerPacketHandler`] owns the world and the account store. Its methods
//! are registered in a [`Dispatcher`] keyed by [`ClientPacketId`]. Each
//! handler reads all of its fields before acting, so a rejected packet never
//! leaves the read cursor in the middle of a message.

use crate::accounts::{AccountRecord, AccountStore};
use crate::connection::Connection;
use crate::inventory::ItemKind;
use crate::say::{parse_say, SayAction};
use crate::user::{SessionLink, User};
use crate::world::{DisposedUser, World};
use log::{debug, error, info, warn};
use rand::Rng;
use shared::game::{
    EntityKind, EquipmentSlot, GameMessage, StatType, MAX_ACCOUNT_NAME_LENGTH,
    MAX_ACCOUNT_PASSWORD_LENGTH, MAX_CLIENT_SAY_LENGTH, MAX_SERVER_SAY_LENGTH,
};
use shared::physics::{Body, MOVE_SPEED};
use shared::protocol::server as packets;
use shared::protocol::{ClientPacketId, CLIENT_MESSAGE_ID_BITS, MAX_GAME_MESSAGE_PARAM_LENGTH};
use shared::{
    BitReader, ConnectionId, Dispatcher, HandlerError, InventorySlot, MapEntityIndex,
    RegistrationError,
};
use std::sync::Arc;

/// Furthest an item can be picked up from, measured between body centres.
pub const PICKUP_DISTANCE: f32 = 64.0;
pub const ATTACK_EXP_REWARD: i32 = 10;
pub const ATTACK_CASH_REWARD: i32 = 5;

pub type ServerDispatcher = Dispatcher<ServerPacketHandler, Arc<Connection>>;

/// Cuts `text` to at most `max` bytes on a character boundary.
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn reply(conn: &Connection, data: &[u8]) {
    if let Err(e) = conn.send(data, true) {
        debug!("Reply to connection {} not sent: {}", conn.id(), e);
    }
}

pub struct ServerPacketHandler {
    world: World,
    accounts: Box<dyn AccountStore>,
}

impl ServerPacketHandler {
    pub fn new(world: World, accounts: Box<dyn AccountStore>) -> Self {
        Self { world, accounts }
    }

    /// Builds the table routing client packets to this handler.
    pub fn dispatcher() -> Result<ServerDispatcher, RegistrationError> {
        Dispatcher::builder(CLIENT_MESSAGE_ID_BITS)
            .handler(ClientPacketId::Attack.value(), "Attack", Self::recv_attack)
            .handler(
                ClientPacketId::DropInventoryItem.value(),
                "DropInventoryItem",
                Self::recv_drop_inventory_item,
            )
            .handler(
                ClientPacketId::GetEquipmentItemInfo.value(),
                "GetEquipmentItemInfo",
                Self::recv_get_equipment_item_info,
            )
            .handler(
                ClientPacketId::GetInventoryItemInfo.value(),
                "GetInventoryItemInfo",
                Self::recv_get_inventory_item_info,
            )
            .handler(ClientPacketId::Jump.value(), "Jump", Self::recv_jump)
            .handler(ClientPacketId::Login.value(), "Login", Self::recv_login)
            .handler(ClientPacketId::MoveLeft.value(), "MoveLeft", Self::recv_move_left)
            .handler(ClientPacketId::MoveRight.value(), "MoveRight", Self::recv_move_right)
            .handler(ClientPacketId::MoveStop.value(), "MoveStop", Self::recv_move_stop)
            .handler(ClientPacketId::PickupItem.value(), "PickupItem", Self::recv_pickup_item)
            .handler(ClientPacketId::Ping.value(), "Ping", Self::recv_ping)
            .handler(ClientPacketId::RaiseStat.value(), "RaiseStat", Self::recv_raise_stat)
            .handler(ClientPacketId::Say.value(), "Say", Self::recv_say)
            .handler(ClientPacketId::UnequipItem.value(), "UnequipItem", Self::recv_unequip_item)
            .handler(
                ClientPacketId::UseInventoryItem.value(),
                "UseInventoryItem",
                Self::recv_use_inventory_item,
            )
            .handler(ClientPacketId::UseWorld.value(), "UseWorld", Self::recv_use_world)
            .build()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The connection went away; its session is disposed on the next update.
    pub fn connection_lost(&mut self, id: ConnectionId) {
        self.world.dispose_connection(id);
    }

    /// Runs one world update and persists the sessions it disposed.
    pub fn update(&mut self, now: u64) {
        let disposed = self.world.update(now);
        self.persist(disposed);
    }

    /// Removes every session and saves it, for shutdown.
    pub fn save_all(&mut self) {
        let disposed = self.world.dispose_all();
        self.persist(disposed);
    }

    fn persist(&mut self, disposed: Vec<DisposedUser>) {
        for user in disposed {
            if let Err(e) = self.accounts.save_character(&user.account, user.values) {
                error!("Failed to save character of `{}`: {}", user.account, e);
            }
        }
    }

    fn session(&self, conn: &Connection) -> Result<&User, HandlerError> {
        self.world
            .user(conn.id())
            .ok_or_else(|| HandlerError::rejected("connection is not logged in"))
    }

    fn session_mut(&mut self, conn: &Connection) -> Result<&mut User, HandlerError> {
        self.world
            .user_mut(conn.id())
            .ok_or_else(|| HandlerError::rejected("connection is not logged in"))
    }

    fn recv_login(&mut self, conn: &Arc<Connection>, reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let name = reader.read_string(MAX_ACCOUNT_NAME_LENGTH)?;
        let password = reader.read_string(MAX_ACCOUNT_PASSWORD_LENGTH)?;

        if self.world.user(conn.id()).is_some() {
            return Err(HandlerError::rejected("connection is already logged in"));
        }

        if self.world.is_account_online(&name) {
            info!("Login for `{}` refused: already online", name);
            reply(conn, &packets::login_unsuccessful(GameMessage::AccountInUse, vec![name]));
            return Ok(());
        }

        let record: AccountRecord = match self.accounts.login(&name, &password) {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Login for `{}` from {} refused: bad credentials", name, conn.remote());
                reply(conn, &packets::login_unsuccessful(GameMessage::InvalidAccount, Vec::new()));
                return Ok(());
            }
            Err(e) => {
                error!("Account lookup for `{}` failed: {}", name, e);
                reply(conn, &packets::login_unsuccessful(GameMessage::InvalidAccount, Vec::new()));
                return Ok(());
            }
        };

        let link = SessionLink::new(Some(Arc::clone(conn)));
        self.world
            .join(conn.id(), link, &record)
            .map(|_| ())
            .ok_or_else(|| HandlerError::rejected("map has no room for another character"))
    }

    fn recv_say(&mut self, conn: &Arc<Connection>, reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let text = reader.read_string(MAX_CLIENT_SAY_LENGTH)?;
        let user = self.session(conn)?;
        let (name, index) = (user.name().to_string(), user.index());

        match parse_say(&text) {
            SayAction::Speak(text) => {
                self.world.broadcast(&packets::chat_say(&name, index, &text));
            }
            SayAction::Emote(action) => {
                let line = format!("* {} {}", name, action);
                self.world
                    .broadcast(&packets::chat(truncate(&line, MAX_SERVER_SAY_LENGTH)));
            }
            SayAction::Who => {
                let names = self
                    .world
                    .users()
                    .map(User::name)
                    .collect::<Vec<_>>()
                    .join(", ");
                let names = truncate(&names, MAX_GAME_MESSAGE_PARAM_LENGTH).to_string();
                user_send(&self.world, conn, &packets::send_message(GameMessage::WhoOnline, vec![names]));
            }
            SayAction::Reply(message, params) => {
                user_send(&self.world, conn, &packets::send_message(message, params));
            }
        }
        Ok(())
    }

    fn set_horizontal_velocity(&mut self, conn: &Connection, vx: f32) -> Result<(), HandlerError> {
        let index = self.session(conn)?.index();
        if let Some(entity) = self.world.entity_mut(index) {
            if entity.body.velocity.x != vx {
                entity.body.velocity.x = vx;
                entity.mark_dirty();
            }
        }
        Ok(())
    }

    fn recv_move_left(&mut self, conn: &Arc<Connection>, _reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        self.set_horizontal_velocity(conn, -MOVE_SPEED)
    }

    fn recv_move_right(&mut self, conn: &Arc<Connection>, _reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        self.set_horizontal_velocity(conn, MOVE_SPEED)
    }

    fn recv_move_stop(&mut self, conn: &Arc<Connection>, _reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        self.set_horizontal_velocity(conn, 0.0)
    }

    fn recv_jump(&mut self, conn: &Arc<Connection>, _reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let index = self.session(conn)?.index();
        if let Some(entity) = self.world.entity_mut(index) {
            if entity.body.jump() {
                entity.mark_dirty();
            }
        }
        Ok(())
    }

    fn recv_attack(&mut self, conn: &Arc<Connection>, _reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let user = self.session(conn)?;
        let attacker = user.index();
        let (strength, min_hit, max_hit) = (
            user.character.stat(StatType::Str),
            user.character.stat(StatType::MinHit),
            user.character.stat(StatType::MaxHit),
        );
        let Some(body) = self.world.entity(attacker).map(|entity| entity.body) else {
            return Ok(());
        };

        self.world.broadcast(&packets::char_attack(attacker));

        let target = self
            .world
            .entities()
            .find(|entity| {
                entity.kind == EntityKind::Character
                    && entity.index != attacker
                    && entity.body.overlaps(&body)
            })
            .map(|entity| entity.index);
        let Some(target) = target else {
            return Ok(());
        };

        let roll = rand::thread_rng().gen_range(min_hit..=max_hit.max(min_hit));
        let damage = i32::from(strength) + i32::from(roll);
        self.world.broadcast(&packets::char_damage(target, damage));

        let user = self.session_mut(conn)?;
        user.character.add_exp(ATTACK_EXP_REWARD);
        user.character.add_cash(ATTACK_CASH_REWARD);
        Ok(())
    }

    fn recv_raise_stat(&mut self, conn: &Arc<Connection>, reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let stat = reader.read::<StatType>()?;
        let user = self.session_mut(conn)?;
        if user.character.raise_stat(stat).is_none() {
            user.send(&packets::send_message(GameMessage::NoStatPoints, Vec::new()));
        }
        Ok(())
    }

    fn recv_drop_inventory_item(
        &mut self,
        conn: &Arc<Connection>,
        reader: &mut BitReader<'_>,
    ) -> Result<(), HandlerError> {
        let slot = reader.read::<InventorySlot>()?;
        let user = self.session_mut(conn)?;
        let Some(item) = user.inventory.take(slot) else {
            user.send(&packets::send_message(GameMessage::NoItemInSlot, Vec::new()));
            return Ok(());
        };
        user.send(&packets::set_inventory_slot(slot, None));
        let index = user.index();

        let body = self
            .world
            .entity(index)
            .map(|entity| Body::at(entity.body.position.x, entity.body.position.y))
            .unwrap_or_default();
        self.world.spawn_item(item, body);
        Ok(())
    }

    fn recv_use_inventory_item(
        &mut self,
        conn: &Arc<Connection>,
        reader: &mut BitReader<'_>,
    ) -> Result<(), HandlerError> {
        let slot = reader.read::<InventorySlot>()?;
        let user = self.session_mut(conn)?;
        let Some(kind) = user.inventory.get(slot).map(|item| item.kind) else {
            user.send(&packets::send_message(GameMessage::NoItemInSlot, Vec::new()));
            return Ok(());
        };

        match kind {
            ItemKind::Consumable => {
                if let Some(name) = user.inventory.consume_one(slot) {
                    let remaining = user.inventory.get(slot).map(|item| item.stack());
                    user.send(&packets::set_inventory_slot(slot, remaining.as_ref()));
                    user.send(&packets::send_message(GameMessage::ItemUsed, vec![name]));
                }
            }
            ItemKind::Equipment(equip_slot) => {
                if let Some(item) = user.inventory.take(slot) {
                    let name = item.name.clone();
                    let previous = user.equipment.equip(equip_slot, item);
                    let previous_stack = previous.as_ref().map(|item| item.stack());
                    user.inventory.replace(slot, previous);
                    user.send(&packets::set_inventory_slot(slot, previous_stack.as_ref()));
                    user.send(&packets::update_equipment_slot(equip_slot, Some(&name)));
                }
            }
        }
        Ok(())
    }

    fn recv_get_inventory_item_info(
        &mut self,
        conn: &Arc<Connection>,
        reader: &mut BitReader<'_>,
    ) -> Result<(), HandlerError> {
        let slot = reader.read::<InventorySlot>()?;
        let user = self.session(conn)?;
        match user.inventory.get(slot) {
            Some(item) => user.send(&packets::send_item_info(&item.info())),
            None => user.send(&packets::send_message(GameMessage::NoItemInSlot, Vec::new())),
        }
        Ok(())
    }

    fn recv_get_equipment_item_info(
        &mut self,
        conn: &Arc<Connection>,
        reader: &mut BitReader<'_>,
    ) -> Result<(), HandlerError> {
        let slot = reader.read::<EquipmentSlot>()?;
        let user = self.session(conn)?;
        match user.equipment.get(slot) {
            Some(item) => user.send(&packets::send_item_info(&item.info())),
            None => user.send(&packets::send_message(GameMessage::NoItemInSlot, Vec::new())),
        }
        Ok(())
    }

    fn recv_unequip_item(&mut self, conn: &Arc<Connection>, reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let slot = reader.read::<EquipmentSlot>()?;
        let user = self.session_mut(conn)?;
        let Some(item) = user.equipment.unequip(slot) else {
            return Ok(());
        };
        match user.inventory.add(item) {
            Ok(inventory_slot) => {
                let stack = user.inventory.get(inventory_slot).map(|item| item.stack());
                user.send(&packets::set_inventory_slot(inventory_slot, stack.as_ref()));
                user.send(&packets::update_equipment_slot(slot, None));
            }
            Err(item) => {
                user.equipment.equip(slot, item);
                user.send(&packets::send_message(GameMessage::InventoryFull, Vec::new()));
            }
        }
        Ok(())
    }

    fn recv_pickup_item(&mut self, conn: &Arc<Connection>, reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let target = reader.read::<MapEntityIndex>()?;
        let picker = self.session(conn)?.index();

        let Some(center) = self.world.entity(picker).map(|entity| entity.body.center()) else {
            return Ok(());
        };
        let (item, distance) = match self.world.entity(target) {
            Some(entity) if entity.kind == EntityKind::Item => match &entity.item {
                Some(item) => (item.clone(), entity.body.center().distance(&center)),
                None => return Err(HandlerError::rejected(format!("{target} carries no item"))),
            },
            _ => return Err(HandlerError::rejected(format!("{target} is not an item"))),
        };

        let user = self.session_mut(conn)?;
        if distance > PICKUP_DISTANCE {
            user.send(&packets::send_message(GameMessage::TooFarToPickup, Vec::new()));
            return Ok(());
        }
        if user.inventory.is_full() {
            user.send(&packets::send_message(GameMessage::InventoryFull, Vec::new()));
            return Ok(());
        }
        let (name, amount) = (item.name.clone(), item.amount);
        let slot = user
            .inventory
            .add(item)
            .map_err(|_| HandlerError::rejected("inventory has no free slot"))?;
        let stack = user.inventory.get(slot).map(|item| item.stack());
        user.send(&packets::set_inventory_slot(slot, stack.as_ref()));
        user.send(&packets::notify_get_item(&name, amount));
        self.world.remove_entity(target);
        Ok(())
    }

    fn recv_use_world(&mut self, conn: &Arc<Connection>, _reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let user_index = self.session(conn)?.index();
        let Some(body) = self.world.entity(user_index).map(|entity| entity.body) else {
            return Ok(());
        };
        let used = self
            .world
            .entities()
            .find(|entity| entity.kind == EntityKind::Usable && entity.body.overlaps(&body))
            .map(|entity| entity.index);
        match used {
            Some(used) => self.world.broadcast(&packets::use_entity(used, user_index)),
            None => debug!("{} used nothing", user_index),
        }
        Ok(())
    }

    fn recv_ping(&mut self, conn: &Arc<Connection>, reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
        let sent_at = reader.read::<u32>()?;
        reply(conn, &packets::ping(sent_at));
        Ok(())
    }
}

fn user_send(world: &World, conn: &Connection, data: &[u8]) {
    match world.user(conn.id()) {
        Some(user) => user.send(data),
        None => warn!("No session for connection {}", conn.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::FileAccountStore;
    use crate::inventory::Item;
    use crate::transport::memory::{MemoryPeer, MemoryTransport};
    use crate::transport::{Transport, TransportEvent};
    use shared::protocol::{client, MessageWithParams, ServerPacketId};
    use shared::{DispatchSummary, ItemId, MapIndex};

    struct Harness {
        handler: ServerPacketHandler,
        dispatcher: ServerDispatcher,
        transport: MemoryTransport,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                handler: ServerPacketHandler::new(
                    World::new(MapIndex::new(1)),
                    Box::new(FileAccountStore::in_memory(true)),
                ),
                dispatcher: ServerPacketHandler::dispatcher().unwrap(),
                transport: MemoryTransport::new(1200),
            }
        }

        fn connect(&mut self) -> (Arc<Connection>, MemoryPeer) {
            let peer = self.transport.connect();
            let Some(TransportEvent::Connected { id, remote, link }) = self.transport.poll_event() else {
                panic!("expected a connect event");
            };
            (Arc::new(Connection::new(id, remote, link, 0)), peer)
        }

        fn send(&mut self, conn: &Arc<Connection>, data: &[u8]) -> DispatchSummary {
            self.dispatcher.dispatch(&mut self.handler, conn, data)
        }

        fn login(&mut self, name: &str) -> (Arc<Connection>, MemoryPeer) {
            let (conn, peer) = self.connect();
            self.send(&conn, &client::login(name, "pw"));
            peer.take_reliable();
            (conn, peer)
        }
    }

    fn ids(packets: &[Vec<u8>]) -> Vec<ServerPacketId> {
        packets
            .iter()
            .map(|data| BitReader::new(data).read::<ServerPacketId>().unwrap())
            .collect()
    }

    fn message(packet: &[u8]) -> MessageWithParams {
        let mut reader = BitReader::new(packet);
        reader.read::<ServerPacketId>().unwrap();
        reader.read::<MessageWithParams>().unwrap()
    }

    #[test]
    fn test_every_client_packet_has_a_handler() {
        let dispatcher = ServerPacketHandler::dispatcher().unwrap();
        assert_eq!(dispatcher.len(), ClientPacketId::ALL.len());
        assert_eq!(
            dispatcher.handler_name(u32::from(ClientPacketId::Say.value())),
            Some("Say")
        );
    }

    #[test]
    fn test_login_and_duplicate_login() {
        let mut harness = Harness::new();
        let (conn, peer) = harness.connect();
        let summary = harness.send(&conn, &client::login("alice", "pw"));
        assert_eq!(summary.handled, 1);
        assert_eq!(ids(&peer.take_reliable())[0], ServerPacketId::LoginSuccessful);

        let (other, other_peer) = harness.connect();
        harness.send(&other, &client::login("Alice", "pw"));
        let replies = other_peer.take_reliable();
        assert_eq!(ids(&replies), vec![ServerPacketId::LoginUnsuccessful]);
        assert_eq!(message(&replies[0]).message, GameMessage::AccountInUse);
    }

    #[test]
    fn test_wrong_password() {
        let mut harness = Harness::new();
        let (first, _first_peer) = harness.login("alice");
        harness.handler.connection_lost(first.id());
        harness.handler.update(0);
        assert_eq!(harness.handler.world().user_count(), 0);

        let (conn, peer) = harness.connect();
        harness.send(&conn, &client::login("alice", "nope"));
        let replies = peer.take_reliable();
        assert_eq!(message(&replies[0]).message, GameMessage::InvalidAccount);
    }

    #[test]
    fn test_packets_before_login_are_rejected() {
        let mut harness = Harness::new();
        let (conn, peer) = harness.connect();
        let mut buffer = client::say("hello");
        buffer.extend(client::ping(7));

        let summary = harness.send(&conn, &buffer);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.handled, 1);
        assert_eq!(ids(&peer.take_reliable()), vec![ServerPacketId::Ping]);
    }

    #[test]
    fn test_say_reaches_everyone() {
        let mut harness = Harness::new();
        let (alice, alice_peer) = harness.login("alice");
        let (_, bob_peer) = harness.login("bob");
        alice_peer.take_reliable();

        harness.send(&alice, &client::say("hello"));
        for peer in [&alice_peer, &bob_peer] {
            let packets = peer.take_reliable();
            assert_eq!(ids(&packets), vec![ServerPacketId::ChatSay]);
            let mut reader = BitReader::new(&packets[0]);
            reader.read::<ServerPacketId>().unwrap();
            assert_eq!(reader.read_string(50).unwrap(), "alice");
            reader.read::<MapEntityIndex>().unwrap();
            assert_eq!(reader.read_string(255).unwrap(), "hello");
        }
    }

    #[test]
    fn test_who_and_unknown_command_reply_to_speaker_only() {
        let mut harness = Harness::new();
        let (alice, alice_peer) = harness.login("alice");
        let (_, bob_peer) = harness.login("bob");
        alice_peer.take_reliable();

        harness.send(&alice, &client::say("/who"));
        let replies = alice_peer.take_reliable();
        let who = message(&replies[0]);
        assert_eq!(who.message, GameMessage::WhoOnline);
        assert_eq!(who.params, vec!["alice, bob".to_string()]);

        harness.send(&alice, &client::say("/dance"));
        assert_eq!(message(&alice_peer.take_reliable()[0]).message, GameMessage::UnknownCommand);
        assert!(bob_peer.take_reliable().is_empty());
    }

    #[test]
    fn test_oversized_say_corrupts_the_buffer() {
        let mut harness = Harness::new();
        let (alice, alice_peer) = harness.login("alice");
        let mut buffer = client::say(&"a".repeat(MAX_CLIENT_SAY_LENGTH + 1));
        buffer.extend(client::ping(1));

        let summary = harness.send(&alice, &buffer);
        assert!(summary.is_corrupted());
        assert_eq!(summary.handled, 0);
        assert!(alice_peer.take_reliable().is_empty());
    }

    #[test]
    fn test_raise_stat_without_points() {
        let mut harness = Harness::new();
        let (alice, peer) = harness.login("alice");
        harness.send(&alice, &client::raise_stat(StatType::Str));
        assert_eq!(message(&peer.take_reliable()[0]).message, GameMessage::NoStatPoints);
    }

    #[test]
    fn test_movement_marks_entity_for_sync() {
        let mut harness = Harness::new();
        let (alice, peer) = harness.login("alice");
        harness.handler.update(0);
        peer.take_unreliable();

        harness.send(&alice, &client::move_right());
        harness.handler.update(5);
        assert_eq!(
            ids(&peer.take_unreliable()),
            vec![ServerPacketId::UpdateVelocityAndPosition]
        );
    }

    #[test]
    fn test_pickup_and_drop() {
        let mut harness = Harness::new();
        let (alice, peer) = harness.login("alice");
        let index = harness.handler.world().user(alice.id()).unwrap().index();
        let position = harness.handler.world().entity(index).unwrap().body.position;

        let potion = Item {
            id: ItemId::new(1),
            name: "Healing Potion".into(),
            description: "Restores a little health.".into(),
            value: 10,
            amount: 2,
            kind: ItemKind::Consumable,
        };
        let near = harness
            .handler
            .world_mut()
            .spawn_item(potion.clone(), Body::at(position.x + 10.0, position.y))
            .unwrap();
        let far = harness
            .handler
            .world_mut()
            .spawn_item(potion, Body::at(position.x + 300.0, position.y))
            .unwrap();
        peer.take_reliable();

        harness.send(&alice, &client::pickup_item(far));
        assert_eq!(message(&peer.take_reliable()[0]).message, GameMessage::TooFarToPickup);

        harness.send(&alice, &client::pickup_item(near));
        assert_eq!(
            ids(&peer.take_reliable()),
            vec![
                ServerPacketId::SetInventorySlot,
                ServerPacketId::NotifyGetItem,
                ServerPacketId::RemoveDynamicEntity,
            ]
        );
        assert!(harness.handler.world().entity(near).is_none());

        harness.send(&alice, &client::use_inventory_item(InventorySlot::new(0)));
        let replies = peer.take_reliable();
        assert_eq!(message(&replies[1]).message, GameMessage::ItemUsed);

        harness.send(&alice, &client::drop_inventory_item(InventorySlot::new(0)));
        assert_eq!(
            ids(&peer.take_reliable()),
            vec![ServerPacketId::SetInventorySlot, ServerPacketId::CreateDynamicEntity]
        );

        harness.send(&alice, &client::drop_inventory_item(InventorySlot::new(0)));
        assert_eq!(message(&peer.take_reliable()[0]).message, GameMessage::NoItemInSlot);
    }

    #[test]
    fn test_pickup_with_full_inventory_leaves_the_item() {
        let mut harness = Harness::new();
        let (alice, peer) = harness.login("alice");
        let index = harness.handler.world().user(alice.id()).unwrap().index();
        let position = harness.handler.world().entity(index).unwrap().body.position;

        let potion = Item {
            id: ItemId::new(1),
            name: "Healing Potion".into(),
            description: "Restores a little health.".into(),
            value: 10,
            amount: 1,
            kind: ItemKind::Consumable,
        };
        let user = harness.handler.world_mut().user_mut(alice.id()).unwrap();
        while !user.inventory.is_full() {
            user.inventory.add(potion.clone()).unwrap();
        }
        let near = harness
            .handler
            .world_mut()
            .spawn_item(potion, Body::at(position.x + 10.0, position.y))
            .unwrap();
        peer.take_reliable();

        let summary = harness.send(&alice, &client::pickup_item(near));
        assert_eq!(summary.handled, 1);
        let replies = peer.take_reliable();
        assert_eq!(replies.len(), 1);
        assert_eq!(message(&replies[0]).message, GameMessage::InventoryFull);
        assert!(harness.handler.world().entity(near).is_some());
    }

    #[test]
    fn test_pickup_of_non_item_is_rejected() {
        let mut harness = Harness::new();
        let (alice, _peer) = harness.login("alice");
        let index = harness.handler.world().user(alice.id()).unwrap().index();
        let summary = harness.send(&alice, &client::pickup_item(index));
        assert_eq!(summary.rejected, 1);
    }

    #[test]
    fn test_use_world_broadcasts_both_indices() {
        let mut harness = Harness::new();
        let (alice, peer) = harness.login("alice");
        let index = harness.handler.world().user(alice.id()).unwrap().index();
        let position = harness.handler.world().entity(index).unwrap().body.position;
        let fountain = harness
            .handler
            .world_mut()
            .spawn(EntityKind::Usable, "Fountain", Body::at(position.x, position.y), None)
            .unwrap();
        peer.take_reliable();

        harness.send(&alice, &client::use_world());
        let packets = peer.take_reliable();
        let mut reader = BitReader::new(&packets[0]);
        assert_eq!(reader.read::<ServerPacketId>().unwrap(), ServerPacketId::UseEntity);
        assert_eq!(reader.read::<MapEntityIndex>().unwrap(), fountain);
        assert_eq!(reader.read::<MapEntityIndex>().unwrap(), index);
    }

    #[test]
    fn test_attack_damages_overlapping_character() {
        let mut harness = Harness::new();
        let (alice, alice_peer) = harness.login("alice");
        let (_, bob_peer) = harness.login("bob");
        alice_peer.take_reliable();

        harness.send(&alice, &client::attack());
        let seen = ids(&bob_peer.take_reliable());
        assert_eq!(seen, vec![ServerPacketId::CharAttack, ServerPacketId::CharDamage]);

        let alice_seen = ids(&alice_peer.take_reliable());
        assert!(alice_seen.contains(&ServerPacketId::SetExp));
        assert!(alice_seen.contains(&ServerPacketId::NotifyExpCash));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "h");
    }
}
