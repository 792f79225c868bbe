//! The map simulation and the sessions playing on it.
//!
//! The world owns every dynamic entity and every logged-in [`User`]. Its
//! update advances physics from the elapsed time it is handed, syncs moving
//! entities over the unreliable channel, flushes each session once and
//! disposes the sessions that were scheduled for it.

use crate::accounts::AccountRecord;
use crate::character::Character;
use crate::inventory::{Item, ItemKind};
use crate::user::{SessionLink, User};
use log::{info, warn};
use shared::game::EntityKind;
use shared::physics::Body;
use shared::protocol::server as packets;
use shared::protocol::EntitySnapshot;
use shared::values::NamedValues;
use shared::{ConnectionId, ItemId, MapEntityIndex, MapIndex};
use std::collections::BTreeMap;

/// Largest simulation step, in seconds.
const MAX_DELTA_SECS: f32 = 0.05;
/// Moving entities are re-synced at least this often.
const RESYNC_INTERVAL_MS: u64 = 250;

pub struct Entity {
    pub index: MapEntityIndex,
    pub kind: EntityKind,
    pub name: String,
    pub body: Body,
    pub item: Option<Item>,
    dirty: bool,
    last_sync: u64,
}

impl Entity {
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            index: self.index,
            kind: self.kind,
            name: self.name.clone(),
            body: self.body,
        }
    }

    /// Forces a sync on the next update.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// State of a session removed from the world, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DisposedUser {
    pub account: String,
    pub values: NamedValues,
}

pub struct World {
    map: MapIndex,
    entities: BTreeMap<MapEntityIndex, Entity>,
    users: BTreeMap<ConnectionId, User>,
    next_index: u16,
    last_update: Option<u64>,
}

impl World {
    pub fn new(map: MapIndex) -> Self {
        Self {
            map,
            entities: BTreeMap::new(),
            users: BTreeMap::new(),
            next_index: 0,
            last_update: None,
        }
    }

    /// A map with a fountain to use and a potion to pick up.
    pub fn with_default_contents(map: MapIndex) -> Self {
        let mut world = Self::new(map);
        world.spawn(EntityKind::Usable, "Healing Fountain", Body::at(200.0, 518.0), None);
        let potion = Item {
            id: ItemId::new(1),
            name: "Healing Potion".into(),
            description: "Restores a little health.".into(),
            value: 10,
            amount: 3,
            kind: ItemKind::Consumable,
        };
        world.spawn_item(potion, Body::at(600.0, 518.0));
        world
    }

    pub fn map(&self) -> MapIndex {
        self.map
    }

    fn allocate_index(&mut self) -> Option<MapEntityIndex> {
        for _ in 0..=u16::MAX {
            let candidate = MapEntityIndex::new(self.next_index);
            self.next_index = self.next_index.wrapping_add(1);
            if !self.entities.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Adds an entity and announces it to everyone on the map.
    pub fn spawn(
        &mut self,
        kind: EntityKind,
        name: &str,
        body: Body,
        item: Option<Item>,
    ) -> Option<MapEntityIndex> {
        let Some(index) = self.allocate_index() else {
            warn!("Map {} has no free entity index", self.map);
            return None;
        };
        let entity = Entity {
            index,
            kind,
            name: name.to_string(),
            body,
            item,
            dirty: false,
            last_sync: 0,
        };
        self.broadcast(&packets::create_dynamic_entity(&entity.snapshot()));
        self.entities.insert(index, entity);
        Some(index)
    }

    pub fn spawn_item(&mut self, item: Item, body: Body) -> Option<MapEntityIndex> {
        let name = item.name.clone();
        self.spawn(EntityKind::Item, &name, body, Some(item))
    }

    /// Removes an entity and tells everyone on the map.
    pub fn remove_entity(&mut self, index: MapEntityIndex) -> Option<Entity> {
        let entity = self.entities.remove(&index)?;
        self.broadcast(&packets::remove_dynamic_entity(index));
        Some(entity)
    }

    pub fn entity(&self, index: MapEntityIndex) -> Option<&Entity> {
        self.entities.get(&index)
    }

    pub fn entity_mut(&mut self, index: MapEntityIndex) -> Option<&mut Entity> {
        self.entities.get_mut(&index)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn user(&self, id: ConnectionId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_mut(&mut self, id: ConnectionId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn is_account_online(&self, account: &str) -> bool {
        self.users
            .values()
            .any(|user| user.account().eq_ignore_ascii_case(account))
    }

    /// Places a freshly logged-in session on the map and sends it the
    /// initial state.
    pub fn join(&mut self, id: ConnectionId, link: SessionLink, record: &AccountRecord) -> Option<MapEntityIndex> {
        let mut values = record.character.clone();
        let body = if values.is_empty() {
            Body::default()
        } else {
            match Body::read_values(&mut values) {
                Ok(mut body) => {
                    body.velocity = Default::default();
                    body
                }
                Err(e) => {
                    warn!("Ignoring saved position of `{}`: {}", record.name, e);
                    Body::default()
                }
            }
        };

        let index = self.spawn(EntityKind::Character, &record.name, body, None)?;

        let mut character = Character::new(record.character_id, record.name.clone(), index);
        if !values.is_empty() {
            if let Err(e) = character.read_values(&mut values) {
                warn!("Ignoring saved stats of `{}`: {}", record.name, e);
            }
        }

        let mut user = User::new(id, record.name.clone(), link, character);
        user.send(&packets::login_successful());
        user.send(&packets::set_map(self.map));
        user.send(&packets::set_user_char(index));
        for entity in self.entities.values() {
            user.send(&packets::create_dynamic_entity(&entity.snapshot()));
        }
        user.character.publish_all();

        info!("`{}` joined map {} as {}", record.name, self.map, index);
        self.users.insert(id, user);
        Some(index)
    }

    /// Marks the session on `id` for disposal at the end of the next update.
    pub fn dispose_connection(&mut self, id: ConnectionId) {
        if let Some(user) = self.users.get(&id) {
            user.delayed_dispose();
        }
    }

    pub fn broadcast(&self, data: &[u8]) {
        for user in self.users.values() {
            user.send(data);
        }
    }

    pub fn broadcast_unreliable(&self, data: &[u8]) {
        for user in self.users.values() {
            user.send_unreliable_buffered(data);
        }
    }

    /// Advances the world to `now` (milliseconds on the server clock).
    pub fn update(&mut self, now: u64) -> Vec<DisposedUser> {
        let dt = match self.last_update {
            Some(previous) => (now.saturating_sub(previous) as f32 / 1000.0).min(MAX_DELTA_SECS),
            None => 0.0,
        };
        self.last_update = Some(now);

        let mut syncs = Vec::new();
        for entity in self.entities.values_mut() {
            let velocity = entity.body.velocity;
            let grounded = entity.body.on_ground;
            entity.body.step(dt);

            let changed = entity.dirty
                || entity.body.velocity != velocity
                || entity.body.on_ground != grounded;
            let moving = entity.body.velocity != Default::default();
            if changed || (moving && now.saturating_sub(entity.last_sync) >= RESYNC_INTERVAL_MS) {
                entity.dirty = false;
                entity.last_sync = now;
                syncs.push(packets::update_velocity_and_position(entity.index, &entity.body));
            }
        }
        for packet in &syncs {
            self.broadcast_unreliable(packet);
        }

        for user in self.users.values() {
            user.flush();
        }

        let disposed: Vec<ConnectionId> = self
            .users
            .values()
            .filter(|user| user.is_disposed())
            .map(User::connection_id)
            .collect();
        disposed
            .into_iter()
            .filter_map(|id| self.remove_user(id))
            .collect()
    }

    fn remove_user(&mut self, id: ConnectionId) -> Option<DisposedUser> {
        let user = self.users.remove(&id)?;
        let mut values = NamedValues::new();
        user.character.write_values(&mut values);
        if let Some(entity) = self.remove_entity(user.index()) {
            entity.body.write_values(&mut values);
        }
        info!("`{}` left map {}", user.account(), self.map);
        Some(DisposedUser {
            account: user.account().to_string(),
            values,
        })
    }

    /// Removes every session, for shutdown.
    pub fn dispose_all(&mut self) -> Vec<DisposedUser> {
        let ids: Vec<ConnectionId> = self.users.keys().copied().collect();
        ids.into_iter().filter_map(|id| self.remove_user(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::transport::memory::{MemoryPeer, MemoryTransport};
    use crate::transport::{Transport, TransportEvent};
    use shared::physics::MOVE_SPEED;
    use shared::protocol::ServerPacketId;
    use shared::{BitReader, CharacterId};
    use std::sync::Arc;

    fn login(world: &mut World, transport: &mut MemoryTransport, name: &str) -> (ConnectionId, MemoryPeer) {
        let peer = transport.connect();
        let Some(TransportEvent::Connected { id, remote, link }) = transport.poll_event() else {
            panic!("expected a connect event");
        };
        let conn = Arc::new(Connection::new(id, remote, link, 0));
        let record = AccountRecord {
            name: name.to_string(),
            password: "pw".into(),
            character_id: CharacterId::new(id.get() as i32),
            character: NamedValues::new(),
        };
        world.join(id, SessionLink::new(Some(conn)), &record).unwrap();
        (id, peer)
    }

    fn packet_ids(data: &[Vec<u8>]) -> Vec<ServerPacketId> {
        data.iter()
            .map(|packet| BitReader::new(packet).read::<ServerPacketId>().unwrap())
            .collect()
    }

    #[test]
    fn test_join_sends_initial_state() {
        let mut world = World::with_default_contents(MapIndex::new(1));
        let mut transport = MemoryTransport::new(1200);
        let (_, peer) = login(&mut world, &mut transport, "alice");

        let ids = packet_ids(&peer.take_reliable());
        assert_eq!(ids[0], ServerPacketId::LoginSuccessful);
        assert_eq!(ids[1], ServerPacketId::SetMap);
        assert_eq!(ids[2], ServerPacketId::SetUserChar);
        assert_eq!(
            ids.iter()
                .filter(|id| **id == ServerPacketId::CreateDynamicEntity)
                .count(),
            3
        );
        assert!(ids.contains(&ServerPacketId::SetLevel));
        assert!(ids.contains(&ServerPacketId::UpdateStat));
        assert!(world.is_account_online("ALICE"));
    }

    #[test]
    fn test_moving_entity_is_synced_unreliably() {
        let mut world = World::new(MapIndex::new(1));
        let mut transport = MemoryTransport::new(1200);
        let (id, peer) = login(&mut world, &mut transport, "alice");
        world.update(0);
        peer.take_unreliable();

        let index = world.user(id).unwrap().index();
        let entity = world.entity_mut(index).unwrap();
        entity.body.velocity.x = MOVE_SPEED;
        entity.mark_dirty();
        world.update(10);

        let sent = peer.take_unreliable();
        assert_eq!(packet_ids(&sent), vec![ServerPacketId::UpdateVelocityAndPosition]);

        // Steady motion is not re-sent every tick.
        world.update(20);
        assert!(peer.take_unreliable().is_empty());
    }

    #[test]
    fn test_disposed_user_is_removed_and_saved() {
        let mut world = World::new(MapIndex::new(1));
        let mut transport = MemoryTransport::new(1200);
        let (alice, _alice_peer) = login(&mut world, &mut transport, "alice");
        let (_, bob_peer) = login(&mut world, &mut transport, "bob");
        bob_peer.take_reliable();

        world.dispose_connection(alice);
        let disposed = world.update(5);

        assert_eq!(disposed.len(), 1);
        assert_eq!(disposed[0].account, "alice");
        assert!(disposed[0].values.get("x").is_some());
        assert!(disposed[0].values.get("level").is_some());
        assert_eq!(world.user_count(), 1);
        assert_eq!(
            packet_ids(&bob_peer.take_reliable()),
            vec![ServerPacketId::RemoveDynamicEntity]
        );
    }

    #[test]
    fn test_dead_connection_is_disposed_on_flush() {
        let mut world = World::new(MapIndex::new(1));
        let mut transport = MemoryTransport::new(1200);
        let (_, peer) = login(&mut world, &mut transport, "alice");
        peer.drop_link();

        let disposed = world.update(5);
        assert_eq!(disposed.len(), 1);
        assert_eq!(world.user_count(), 0);
        assert_eq!(world.entities().count(), 0);
    }

    #[test]
    fn test_saved_position_is_restored() {
        let mut world = World::new(MapIndex::new(1));
        let mut transport = MemoryTransport::new(1200);
        let peer = transport.connect();
        let Some(TransportEvent::Connected { id, remote, link }) = transport.poll_event() else {
            panic!("expected a connect event");
        };

        let mut values = NamedValues::new();
        Body::at(123.0, 518.0).write_values(&mut values);
        Character::new(CharacterId::new(5), "alice", MapEntityIndex::new(0)).write_values(&mut values);
        let record = AccountRecord {
            name: "alice".into(),
            password: "pw".into(),
            character_id: CharacterId::new(5),
            character: values,
        };

        let conn = Arc::new(Connection::new(id, remote, link, 0));
        let index = world.join(id, SessionLink::new(Some(conn)), &record).unwrap();
        assert_eq!(world.entity(index).unwrap().body.position.x, 123.0);
        assert!(peer.is_connected());
    }
}
