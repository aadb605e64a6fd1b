//! Arena physics: gravity, floor, world bounds and body collision

use super::character::Character;
use super::variant::ArenaConfig;

/// Physics system for integrating fighter motion
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate one fighter over `dt`. Knocked-out fighters no longer move.
    pub fn integrate(fighter: &mut Character, arena: &ArenaConfig, dt: f32) {
        if !fighter.alive {
            return;
        }

        fighter.vel_y += arena.gravity * dt;
        fighter.x += fighter.vel_x * dt;
        fighter.y += fighter.vel_y * dt;

        // Land on the floor
        let floor = arena.floor_y();
        if fighter.y >= floor {
            fighter.y = floor;
            if fighter.vel_y > 0.0 {
                fighter.vel_y = 0.0;
            }
        }

        // Keep the whole body inside the world
        let min_x = arena.body_half_width;
        let max_x = arena.width - arena.body_half_width;
        fighter.x = fighter.x.clamp(min_x, max_x);
    }

    /// Check whether two fighter bodies overlap
    pub fn bodies_overlap(a: &Character, b: &Character, arena: &ArenaConfig) -> bool {
        (b.x - a.x).abs() < arena.body_half_width * 2.0
            && (b.y - a.y).abs() < arena.body_height
    }

    /// Push overlapping bodies apart horizontally. A knocked-out body stays
    /// put and the other one takes the whole correction.
    pub fn separate(a: &mut Character, b: &mut Character, arena: &ArenaConfig) {
        if !Self::bodies_overlap(a, b, arena) {
            return;
        }

        let dx = b.x - a.x;
        let overlap = arena.body_half_width * 2.0 - dx.abs();
        // Same position: push apart arbitrarily
        let dir = if dx.abs() < 0.001 { 1.0 } else { dx.signum() };

        let (push_a, push_b) = match (a.alive, b.alive) {
            (true, true) => (overlap / 2.0, overlap / 2.0),
            (true, false) => (overlap, 0.0),
            (false, true) => (0.0, overlap),
            (false, false) => (0.0, 0.0),
        };

        a.x -= dir * push_a;
        b.x += dir * push_b;

        let min_x = arena.body_half_width;
        let max_x = arena.width - arena.body_half_width;
        a.x = a.x.clamp(min_x, max_x);
        b.x = b.x.clamp(min_x, max_x);
    }

    /// Projectile point (with radius) against a fighter body anchored at its feet
    pub fn projectile_hits(x: f32, y: f32, fighter: &Character, arena: &ArenaConfig) -> bool {
        let r = arena.projectile_radius;
        (x - fighter.x).abs() <= arena.body_half_width + r
            && y >= fighter.y - arena.body_height - r
            && y <= fighter.y + r
    }

    pub fn is_outside(x: f32, arena: &ArenaConfig) -> bool {
        x < 0.0 || x > arena.projectile_max_x
    }
}
