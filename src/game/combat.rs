//! Combat entities - projectiles, transient effects, delayed actions

use super::character::{Character, Side};
use super::variant::ProjectileSpec;

/// Active projectile in the arena
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub owner: Side,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub damage: u32,
    pub clip: &'static str,
}

impl Projectile {
    /// Launch from in front of `owner`, travelling the way it faces
    pub fn launch(id: u64, owner: &Character, spec: &ProjectileSpec) -> Self {
        let dir = owner.facing.sign();
        Self {
            id,
            owner: owner.side,
            x: owner.x + dir * spec.offset_x,
            y: owner.y + spec.offset_y,
            vel_x: dir * spec.speed,
            vel_y: 0.0,
            damage: spec.damage,
            clip: spec.clip.key,
        }
    }

    /// Constant-velocity move
    pub fn update(&mut self, dt: f32) {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
    }
}

/// Visual-only effect that removes itself once its clip has played
#[derive(Debug, Clone)]
pub struct Effect {
    pub id: u64,
    pub clip: &'static str,
    pub x: f32,
    pub y: f32,
    pub remaining: f32,
}

impl Effect {
    /// Returns false once expired
    pub fn update(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining > 0.0
    }
}

/// Work deferred to a later tick, e.g. a projectile released after a wind-up
#[derive(Debug, Clone)]
pub struct ScheduledAction {
    pub owner: Side,
    pub remaining: f32,
    pub kind: Deferred,
}

#[derive(Debug, Clone, Copy)]
pub enum Deferred {
    SpawnProjectile(ProjectileSpec),
    Strike {
        damage: u32,
        effect_clip: &'static str,
        effect_duration: f32,
        effect_offset_y: f32,
    },
}

impl ScheduledAction {
    /// Count down, returns true when due
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining <= 1e-4
    }
}

/// Combat rules shared by melee, projectile and strike damage
pub struct CombatSystem;

impl CombatSystem {
    /// Melee connects strictly inside the range
    pub fn in_melee_range(attacker: &Character, target: &Character, range: f32) -> bool {
        attacker.distance_to(target) < range
    }
}
