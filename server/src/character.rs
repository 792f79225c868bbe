//! Player character stats with change notification.
//!
//! Every mutation publishes a [`CharacterChange`] to the registered
//! listeners, synchronously and in registration order.

use shared::game::StatType;
use shared::{CharacterId, DecodeError, MapEntityIndex, ValueReader, ValueWriter};

pub const STAT_POINTS_PER_LEVEL: i32 = 5;
pub const MAX_LEVEL: u8 = 99;
const BASE_STAT: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterChange {
    Level { old: u8, new: u8 },
    Exp { old: i32, new: i32 },
    Cash { old: i32, new: i32 },
    StatPoints(i32),
    Stat { stat: StatType, value: u16 },
}

pub trait CharacterListener: Send {
    fn on_change(&mut self, character: MapEntityIndex, change: CharacterChange);
}

pub struct Character {
    id: CharacterId,
    name: String,
    index: MapEntityIndex,
    level: u8,
    exp: i32,
    cash: i32,
    stat_points: i32,
    stats: [u16; StatType::ALL.len()],
    listeners: Vec<Box<dyn CharacterListener>>,
}

impl Character {
    pub fn new(id: CharacterId, name: impl Into<String>, index: MapEntityIndex) -> Self {
        Self {
            id,
            name: name.into(),
            index,
            level: 1,
            exp: 0,
            cash: 0,
            stat_points: 0,
            stats: [BASE_STAT; StatType::ALL.len()],
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn CharacterListener>) {
        self.listeners.push(listener);
    }

    fn publish(&mut self, change: CharacterChange) {
        let index = self.index;
        for listener in &mut self.listeners {
            listener.on_change(index, change);
        }
    }

    pub fn id(&self) -> CharacterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> MapEntityIndex {
        self.index
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn exp(&self) -> i32 {
        self.exp
    }

    pub fn cash(&self) -> i32 {
        self.cash
    }

    pub fn stat_points(&self) -> i32 {
        self.stat_points
    }

    pub fn stat(&self, stat: StatType) -> u16 {
        self.stats[stat.value() as usize]
    }

    /// Experience needed to advance past `level`.
    pub fn exp_for_level(level: u8) -> i32 {
        i32::from(level) * 100
    }

    /// Adds experience, levelling up as many times as it pays for.
    pub fn add_exp(&mut self, amount: i32) {
        if amount == 0 {
            return;
        }
        let old = self.exp;
        self.exp = self.exp.saturating_add(amount).max(0);
        self.publish(CharacterChange::Exp { old, new: self.exp });

        while self.level < MAX_LEVEL && self.exp >= Self::exp_for_level(self.level) {
            self.exp -= Self::exp_for_level(self.level);
            let old_level = self.level;
            self.level += 1;
            self.stat_points += STAT_POINTS_PER_LEVEL;
            self.publish(CharacterChange::Level {
                old: old_level,
                new: self.level,
            });
            self.publish(CharacterChange::StatPoints(self.stat_points));
        }
    }

    pub fn add_cash(&mut self, amount: i32) {
        if amount == 0 {
            return;
        }
        let old = self.cash;
        self.cash = self.cash.saturating_add(amount).max(0);
        self.publish(CharacterChange::Cash { old, new: self.cash });
    }

    /// Spends one stat point on `stat`. Returns the new value, or `None` when
    /// no points are left or the stat cannot be raised.
    pub fn raise_stat(&mut self, stat: StatType) -> Option<u16> {
        if self.stat_points <= 0 || !stat.is_raisable() {
            return None;
        }
        self.stat_points -= 1;
        let slot = &mut self.stats[stat.value() as usize];
        *slot = slot.saturating_add(1);
        let value = *slot;
        self.publish(CharacterChange::StatPoints(self.stat_points));
        self.publish(CharacterChange::Stat { stat, value });
        Some(value)
    }

    /// Announces the full current state to the listeners.
    pub fn publish_all(&mut self) {
        self.publish(CharacterChange::Level {
            old: self.level,
            new: self.level,
        });
        self.publish(CharacterChange::Exp {
            old: self.exp,
            new: self.exp,
        });
        self.publish(CharacterChange::Cash {
            old: self.cash,
            new: self.cash,
        });
        self.publish(CharacterChange::StatPoints(self.stat_points));
        for stat in StatType::ALL {
            let value = self.stat(*stat);
            self.publish(CharacterChange::Stat { stat: *stat, value });
        }
    }

    pub fn write_values(&self, writer: &mut dyn ValueWriter) {
        writer.write_u8("level", self.level);
        writer.write_i32("exp", self.exp);
        writer.write_i32("cash", self.cash);
        writer.write_i32("stat_points", self.stat_points);
        for stat in StatType::ALL {
            writer.write_u16(stat.name(), self.stat(*stat));
        }
    }

    /// Restores persisted values without notifying listeners.
    pub fn read_values(&mut self, reader: &mut dyn ValueReader) -> Result<(), DecodeError> {
        self.level = reader.read_u8("level")?.clamp(1, MAX_LEVEL);
        self.exp = reader.read_i32("exp")?;
        self.cash = reader.read_i32("cash")?;
        self.stat_points = reader.read_i32("stat_points")?;
        for stat in StatType::ALL {
            self.stats[stat.value() as usize] = reader.read_u16(stat.name())?;
        }
        Ok(())
    }
}
