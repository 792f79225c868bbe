//! Minimal side-view movement shared by the server simulation and the client
//! mirror.

use crate::error::DecodeError;
use crate::values::{ValueReader, ValueWriter};
use serde::{Deserialize, Serialize};

pub const GRAVITY: f32 = 980.0;
pub const MOVE_SPEED: f32 = 300.0;
pub const JUMP_VELOCITY: f32 = -400.0;
pub const FLOOR_Y: f32 = 550.0;
pub const WORLD_WIDTH: f32 = 800.0;
pub const BODY_SIZE: f32 = 32.0;

/// A vector in 2D space. Positive y points down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Vector2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Position and velocity of an entity standing in the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Top-left corner.
    pub position: Vector2,
    pub velocity: Vector2,
    pub on_ground: bool,
}

impl Body {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vector2::new(x, y),
            velocity: Vector2::ZERO,
            on_ground: y >= FLOOR_Y - BODY_SIZE,
        }
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(
            self.position.x + BODY_SIZE / 2.0,
            self.position.y + BODY_SIZE / 2.0,
        )
    }

    pub fn jump(&mut self) -> bool {
        if !self.on_ground {
            return false;
        }
        self.velocity.y = JUMP_VELOCITY;
        self.on_ground = false;
        true
    }

    /// Advances the body by `dt` seconds and reports whether its position or
    /// velocity changed.
    pub fn step(&mut self, dt: f32) -> bool {
        let before = *self;

        if !self.on_ground {
            self.velocity.y += GRAVITY * dt;
        }

        self.position.x += self.velocity.x * dt;
        self.position.y += self.velocity.y * dt;

        let floor = FLOOR_Y - BODY_SIZE;
        if self.position.y >= floor {
            self.position.y = floor;
            self.velocity.y = 0.0;
            self.on_ground = true;
        }

        self.position.x = self.position.x.clamp(0.0, WORLD_WIDTH - BODY_SIZE);

        *self != before
    }

    pub fn overlaps(&self, other: &Body) -> bool {
        let (ax, ay) = (self.position.x, self.position.y);
        let (bx, by) = (other.position.x, other.position.y);
        !(ax + BODY_SIZE <= bx || bx + BODY_SIZE <= ax || ay + BODY_SIZE <= by || by + BODY_SIZE <= ay)
    }

    pub fn write_values(&self, writer: &mut dyn ValueWriter) {
        writer.write_f32("x", self.position.x);
        writer.write_f32("y", self.position.y);
        writer.write_f32("vx", self.velocity.x);
        writer.write_f32("vy", self.velocity.y);
    }

    pub fn read_values(reader: &mut dyn ValueReader) -> Result<Self, DecodeError> {
        let position = Vector2::new(reader.read_f32("x")?, reader.read_f32("y")?);
        let velocity = Vector2::new(reader.read_f32("vx")?, reader.read_f32("vy")?);
        Ok(Self {
            position,
            velocity,
            on_ground: position.y >= FLOOR_Y - BODY_SIZE && velocity.y == 0.0,
        })
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::at(WORLD_WIDTH / 2.0, FLOOR_Y - BODY_SIZE)
    }
}
