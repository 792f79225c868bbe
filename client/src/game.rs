//! Client-side mirror of the map and of the player's own character.
//!
//! The server is authoritative; the mirror only extrapolates entity bodies
//! between velocity updates so positions stay plausible.

use log::debug;
use shared::game::{EquipmentSlot, StatType};
use shared::physics::Body;
use shared::protocol::server::ItemStack;
use shared::protocol::EntitySnapshot;
use shared::{InventorySlot, MapEntityIndex, MapIndex};
use std::collections::{BTreeMap, VecDeque};

/// Chat lines kept for display.
pub const CHAT_HISTORY: usize = 100;

pub struct ClientGameState {
    pub logged_in: bool,
    pub map: Option<MapIndex>,
    pub user_char: Option<MapEntityIndex>,
    pub level: u8,
    pub exp: i32,
    pub cash: i32,
    pub stat_points: i32,
    pub stats: BTreeMap<StatType, u16>,
    pub inventory: BTreeMap<InventorySlot, ItemStack>,
    pub equipment: BTreeMap<EquipmentSlot, String>,
    entities: BTreeMap<MapEntityIndex, EntitySnapshot>,
    chat: VecDeque<String>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            logged_in: false,
            map: None,
            user_char: None,
            level: 0,
            exp: 0,
            cash: 0,
            stat_points: 0,
            stats: BTreeMap::new(),
            inventory: BTreeMap::new(),
            equipment: BTreeMap::new(),
            entities: BTreeMap::new(),
            chat: VecDeque::new(),
        }
    }

    pub fn add_entity(&mut self, snapshot: EntitySnapshot) {
        debug!("Entity {} `{}` appeared", snapshot.index, snapshot.name);
        self.entities.insert(snapshot.index, snapshot);
    }

    pub fn remove_entity(&mut self, index: MapEntityIndex) -> Option<EntitySnapshot> {
        self.entities.remove(&index)
    }

    /// Applies a server correction. Unknown entities are ignored.
    pub fn update_entity(&mut self, index: MapEntityIndex, body: Body) -> bool {
        match self.entities.get_mut(&index) {
            Some(entity) => {
                entity.body = body;
                true
            }
            None => false,
        }
    }

    pub fn entity(&self, index: MapEntityIndex) -> Option<&EntitySnapshot> {
        self.entities.get(&index)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities.values()
    }

    pub fn entity_name(&self, index: MapEntityIndex) -> String {
        self.entity(index)
            .map(|entity| entity.name.clone())
            .unwrap_or_else(|| index.to_string())
    }

    pub fn user_entity(&self) -> Option<&EntitySnapshot> {
        self.user_char.and_then(|index| self.entity(index))
    }

    /// Switching maps forgets every mirrored entity.
    pub fn set_map(&mut self, map: MapIndex) {
        if self.map != Some(map) {
            self.entities.clear();
        }
        self.map = Some(map);
    }

    /// Extrapolates every body by `dt` seconds.
    pub fn update_physics(&mut self, dt: f32) {
        for entity in self.entities.values_mut() {
            entity.body.step(dt);
        }
    }

    pub fn push_chat(&mut self, line: impl Into<String>) {
        if self.chat.len() == CHAT_HISTORY {
            self.chat.pop_front();
        }
        self.chat.push_back(line.into());
    }

    pub fn chat_lines(&self) -> impl Iterator<Item = &str> {
        self.chat.iter().map(String::as_str)
    }

    pub fn set_inventory_slot(&mut self, slot: InventorySlot, item: Option<ItemStack>) {
        match item {
            Some(item) => {
                self.inventory.insert(slot, item);
            }
            None => {
                self.inventory.remove(&slot);
            }
        }
    }

    pub fn set_equipment_slot(&mut self, slot: EquipmentSlot, item: Option<String>) {
        match item {
            Some(item) => {
                self.equipment.insert(slot, item);
            }
            None => {
                self.equipment.remove(&slot);
            }
        }
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}
