//! Fighter entity: position, vitals and the action state machine

use serde::{Deserialize, Serialize};

use super::animation::AnimationState;
use super::variant::{ArenaConfig, CombatConfig};

/// Which of the two fighters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Human-controlled fighter
    Player,
    /// AI-controlled fighter
    Opponent,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Player => Self::Opponent,
            Self::Opponent => Self::Player,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// -1 for left, +1 for right
    pub fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    /// Facing that looks from `from_x` towards `to_x`
    pub fn towards(from_x: f32, to_x: f32) -> Self {
        if to_x < from_x {
            Self::Left
        } else {
            Self::Right
        }
    }
}

/// What the fighter is busy with. Timed states count down to zero and then
/// fall back to `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Neutral,
    Attacking {
        animation: AnimationState,
        remaining: f32,
    },
    /// Hit reaction
    Staggered { remaining: f32 },
    KnockedOut,
}

/// Timed state that ran out during `advance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finished {
    Attack,
    Stagger,
}

/// Timers below this are considered expired, absorbing f32 drift from
/// repeatedly subtracting the frame delta.
const TIMER_EPSILON: f32 = 1e-4;

/// Result of applying damage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    pub health: u32,
    pub knocked_out: bool,
}

#[derive(Debug, Clone)]
pub struct Character {
    pub side: Side,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub facing: Facing,
    pub health: u32,
    pub max_health: u32,
    pub energy: u32,
    pub max_energy: u32,
    pub animation: AnimationState,
    pub action: Action,
    pub alive: bool,
}

impl Character {
    pub fn new(side: Side, config: &CombatConfig) -> Self {
        let (x, facing) = spawn_point(side, &config.arena);
        Self {
            side,
            x,
            y: config.arena.floor_y(),
            vel_x: 0.0,
            vel_y: 0.0,
            facing,
            health: config.max_health,
            max_health: config.max_health,
            energy: config.starting_energy.min(config.max_energy),
            max_energy: config.max_energy,
            animation: AnimationState::Idle,
            action: Action::Neutral,
            alive: true,
        }
    }

    /// Restore spawn position and full vitals for a new round
    pub fn reset(&mut self, config: &CombatConfig) {
        *self = Self::new(self.side, config);
    }

    pub fn is_attacking(&self) -> bool {
        matches!(self.action, Action::Attacking { .. })
    }

    /// Free to pick a locomotion animation this tick
    pub fn is_free(&self) -> bool {
        self.alive && self.action == Action::Neutral
    }

    pub fn is_grounded(&self, arena: &ArenaConfig) -> bool {
        self.vel_y.abs() < 1e-3 && self.y >= arena.floor_y() - arena.ground_tolerance
    }

    pub fn distance_to(&self, other: &Character) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Switch animation. Knocked-out fighters keep their pose.
    pub fn play(&mut self, animation: AnimationState) {
        if self.action != Action::KnockedOut {
            self.animation = animation;
        }
    }

    /// Deduct `cost` if affordable
    pub fn try_spend_energy(&mut self, cost: u32) -> bool {
        if self.energy < cost {
            return false;
        }
        self.energy -= cost;
        true
    }

    /// Enter an attack lasting `duration` seconds. Ignored while attacking.
    pub fn begin_attack(&mut self, animation: AnimationState, duration: f32) {
        if !self.alive || self.is_attacking() {
            return;
        }
        self.action = Action::Attacking {
            animation,
            remaining: duration,
        };
        self.animation = animation;
    }

    /// Play the hit reaction unless an attack is in progress
    pub fn stagger(&mut self, duration: f32) {
        if !self.alive || self.is_attacking() {
            return;
        }
        self.action = Action::Staggered {
            remaining: duration,
        };
        self.animation = AnimationState::Hit;
    }

    pub fn take_damage(&mut self, amount: u32) -> DamageOutcome {
        let was_alive = self.health > 0;
        self.health = self.health.saturating_sub(amount);
        DamageOutcome {
            health: self.health,
            knocked_out: was_alive && self.health == 0,
        }
    }

    pub fn knock_out(&mut self) {
        self.vel_x = 0.0;
        self.vel_y = 0.0;
        self.alive = false;
        self.action = Action::KnockedOut;
        self.animation = AnimationState::KnockedDown;
    }

    /// Cancel timed states and stand still, used while the round is frozen
    pub fn freeze(&mut self) {
        self.vel_x = 0.0;
        if self.alive {
            self.action = Action::Neutral;
            self.animation = AnimationState::Idle;
        }
    }

    /// Count down the current timed state
    pub fn advance(&mut self, dt: f32) -> Option<Finished> {
        match &mut self.action {
            Action::Attacking { remaining, .. } => {
                *remaining -= dt;
                if *remaining <= TIMER_EPSILON {
                    self.action = Action::Neutral;
                    self.animation = AnimationState::Idle;
                    return Some(Finished::Attack);
                }
            }
            Action::Staggered { remaining } => {
                *remaining -= dt;
                if *remaining <= TIMER_EPSILON {
                    self.action = Action::Neutral;
                    self.animation = AnimationState::Idle;
                    return Some(Finished::Stagger);
                }
            }
            Action::Neutral | Action::KnockedOut => {}
        }
        None
    }
}

fn spawn_point(side: Side, arena: &ArenaConfig) -> (f32, Facing) {
    match side {
        Side::Player => (arena.player_spawn_x(), Facing::Right),
        Side::Opponent => (arena.opponent_spawn_x(), Facing::Left),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::variant::Variant;

    fn fighter() -> Character {
        Character::new(Side::Player, &CombatConfig::for_variant(Variant::ZBattle))
    }

    #[test]
    fn damage_clamps_at_zero() {
        let mut c = fighter();
        c.health = 10;
        let outcome = c.take_damage(15);
        assert_eq!(outcome.health, 0);
        assert!(outcome.knocked_out);
    }

    #[test]
    fn damage_is_saturating_for_any_amount() {
        for (health, damage) in [(1000u32, 0u32), (1000, 999), (1, 1), (5, u32::MAX)] {
            let mut c = fighter();
            c.health = health;
            assert_eq!(c.take_damage(damage).health, health.saturating_sub(damage));
        }
    }

    #[test]
    fn knockout_reported_only_once() {
        let mut c = fighter();
        c.health = 5;
        assert!(c.take_damage(5).knocked_out);
        assert!(!c.take_damage(5).knocked_out);
    }

    #[test]
    fn attack_cannot_be_retriggered_while_active() {
        let mut c = fighter();
        c.begin_attack(AnimationState::Punch, 0.3);
        assert!(c.is_attacking());
        c.begin_attack(AnimationState::Kick, 0.3);
        assert_eq!(c.animation, AnimationState::Punch);
    }

    #[test]
    fn attack_finishes_after_its_duration() {
        let mut c = fighter();
        c.begin_attack(AnimationState::Punch, 0.1);
        assert_eq!(c.advance(0.05), None);
        assert!(c.is_attacking());
        assert_eq!(c.advance(0.05), Some(Finished::Attack));
        assert!(!c.is_attacking());
        assert_eq!(c.animation, AnimationState::Idle);
    }

    #[test]
    fn stagger_does_not_interrupt_attack() {
        let mut c = fighter();
        c.begin_attack(AnimationState::Kick, 0.3);
        c.stagger(0.3);
        assert!(c.is_attacking());
        assert_eq!(c.animation, AnimationState::Kick);
    }

    #[test]
    fn energy_is_spent_only_when_affordable() {
        let mut c = fighter();
        c.energy = 50;
        assert!(!c.try_spend_energy(100));
        assert_eq!(c.energy, 50);
        assert!(c.try_spend_energy(50));
        assert_eq!(c.energy, 0);
    }

    #[test]
    fn knocked_out_fighter_keeps_pose_when_frozen() {
        let mut c = fighter();
        c.knock_out();
        c.freeze();
        c.play(AnimationState::Idle);
        assert_eq!(c.animation, AnimationState::KnockedDown);
        assert!(!c.alive);
    }

    #[test]
    fn spawn_faces_the_other_fighter() {
        let config = CombatConfig::for_variant(Variant::KiClash);
        let p = Character::new(Side::Player, &config);
        let o = Character::new(Side::Opponent, &config);
        assert_eq!(p.facing, Facing::Right);
        assert_eq!(o.facing, Facing::Left);
        assert!(p.is_grounded(&config.arena));
        assert_eq!(p.distance_to(&o), 480.0);
    }
}
