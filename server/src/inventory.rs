//! Fixed-size inventory and equipment slots.

use shared::game::{EquipmentSlot, INVENTORY_SIZE};
use shared::protocol::server::{ItemInfo, ItemStack};
use shared::{InventorySlot, ItemId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Consumed one at a time.
    Consumable,
    Equipment(EquipmentSlot),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub value: i32,
    pub amount: u8,
    pub kind: ItemKind,
}

impl Item {
    pub fn stack(&self) -> ItemStack {
        ItemStack {
            name: self.name.clone(),
            amount: self.amount,
        }
    }

    pub fn info(&self) -> ItemInfo {
        ItemInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            value: self.value,
        }
    }
}

pub struct Inventory {
    slots: Vec<Option<Item>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            slots: vec![None; INVENTORY_SIZE as usize],
        }
    }
}

impl Inventory {
    pub fn get(&self, slot: InventorySlot) -> Option<&Item> {
        self.slots.get(slot.get() as usize).and_then(Option::as_ref)
    }

    /// Places `item` in the first free slot, or gives it back when full.
    pub fn add(&mut self, item: Item) -> Result<InventorySlot, Item> {
        match self.slots.iter().position(Option::is_none) {
            Some(free) => {
                self.slots[free] = Some(item);
                Ok(InventorySlot::new(free as u8))
            }
            None => Err(item),
        }
    }

    pub fn take(&mut self, slot: InventorySlot) -> Option<Item> {
        self.slots.get_mut(slot.get() as usize).and_then(Option::take)
    }

    /// Puts `item` into `slot`, returning whatever was there.
    pub fn replace(&mut self, slot: InventorySlot, item: Option<Item>) -> Option<Item> {
        match self.slots.get_mut(slot.get() as usize) {
            Some(existing) => std::mem::replace(existing, item),
            None => item,
        }
    }

    /// Uses up one of the consumable in `slot` and returns its name.
    pub fn consume_one(&mut self, slot: InventorySlot) -> Option<String> {
        let entry = self.slots.get_mut(slot.get() as usize)?;
        let item = entry.as_mut()?;
        if item.kind != ItemKind::Consumable {
            return None;
        }
        let name = item.name.clone();
        item.amount = item.amount.saturating_sub(1);
        if item.amount == 0 {
            *entry = None;
        }
        Some(name)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

#[derive(Default)]
pub struct Equipment {
    slots: BTreeMap<EquipmentSlot, Item>,
}

impl Equipment {
    pub fn get(&self, slot: EquipmentSlot) -> Option<&Item> {
        self.slots.get(&slot)
    }

    /// Equips `item` into its slot, returning the previously equipped item.
    pub fn equip(&mut self, slot: EquipmentSlot, item: Item) -> Option<Item> {
        self.slots.insert(slot, item)
    }

    pub fn unequip(&mut self, slot: EquipmentSlot) -> Option<Item> {
        self.slots.remove(&slot)
    }
}
