//! Per-variant combat tuning
//!
//! Both fighting scenes share one controller; everything that differs between
//! them (speeds, ranges, costs, AI tiers, available attacks) lives here.

use serde::{Deserialize, Serialize};

use super::animation::{
    AnimationClip, AnimationState, FighterClips, GALICK_GUN, GOKU_SSJ, GOKU_SSJ_SHEET, KAMEHAMEHA,
    SPIRIT_BOMB, VEGETA_SHEET, VEGETA_SSJ,
};
use super::character::Side;

/// Built-in game variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Dragon Ball Z: Ki Clash
    KiClash,
    /// Saiyan Showdown: Z Battle
    ZBattle,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::KiClash, Variant::ZBattle];

    pub fn title(self) -> &'static str {
        match self {
            Self::KiClash => "Dragon Ball Z: Ki Clash",
            Self::ZBattle => "Saiyan Showdown: Z Battle",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::KiClash => "Goku against a relentless Vegeta. Punch, kick and throw free fireballs.",
            Self::ZBattle => {
                "Goku against a dashing Vegeta. Spend ki on energy blasts or charge a Spirit Bomb."
            }
        }
    }
}

/// Named attacks, reported in events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    LightPunch,
    Kick,
    Fireball,
    EnergyBlast,
    SpiritBomb,
    /// Opponent AI melee
    AiPunch,
}

/// What an attack does once triggered
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackPayload {
    /// Range test at the trigger instant
    Melee { range: f32, damage: u32 },
    /// Projectile launched `lead_time` seconds after the trigger
    Projectile(ProjectileSpec),
    /// Direct hit on the opposing fighter after `lead_time`, with a visual effect
    Strike {
        lead_time: f32,
        damage: u32,
        effect: AnimationClip,
        effect_offset_y: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileSpec {
    pub lead_time: f32,
    pub speed: f32,
    pub damage: u32,
    /// Spawn offset in front of the owner (mirrored by facing)
    pub offset_x: f32,
    pub offset_y: f32,
    pub clip: AnimationClip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackSpec {
    pub kind: AttackKind,
    /// Body animation played while the attack is active
    pub animation: AnimationState,
    pub energy_cost: u32,
    pub payload: AttackPayload,
}

/// Opponent AI thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiConfig {
    /// Beyond this the AI walks; `None` means there is no dash tier
    pub aggro_range: Option<f32>,
    /// Within this the AI stops and attacks
    pub attack_range: f32,
    pub walk_speed: f32,
    pub dash_speed: f32,
    pub attack: AttackSpec,
}

/// Playfield geometry and physics constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArenaConfig {
    /// World width; fighters are clamped to [0, width]
    pub width: f32,
    /// Projectiles past [0, projectile_max_x] are destroyed
    pub projectile_max_x: f32,
    /// Viewport size the scene was authored for
    pub view_width: f32,
    pub view_height: f32,
    /// Distance from the bottom of the view to the floor line
    pub floor_offset: f32,
    pub gravity: f32,
    /// Half of a fighter's body width
    pub body_half_width: f32,
    pub body_height: f32,
    /// Vertical slack for the grounded test
    pub ground_tolerance: f32,
    pub projectile_radius: f32,
}

impl ArenaConfig {
    pub fn floor_y(&self) -> f32 {
        self.view_height - self.floor_offset
    }

    pub fn player_spawn_x(&self) -> f32 {
        400.0
    }

    pub fn opponent_spawn_x(&self) -> f32 {
        self.view_width - 400.0
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            projectile_max_x: 1920.0,
            view_width: 1280.0,
            view_height: 720.0,
            floor_offset: 60.0,
            gravity: 1000.0,
            body_half_width: 56.0,
            body_height: 174.0,
            ground_tolerance: 10.0,
            projectile_radius: 32.0,
        }
    }
}

/// Full tuning for one variant
#[derive(Debug, Clone, PartialEq)]
pub struct CombatConfig {
    pub variant: Variant,
    pub max_health: u32,
    pub max_energy: u32,
    pub starting_energy: u32,
    pub move_speed: f32,
    pub jump_impulse: f32,
    pub light: Option<AttackSpec>,
    pub heavy: Option<AttackSpec>,
    pub special: Option<AttackSpec>,
    /// Special pressed while the modifier is held
    pub modified_special: Option<AttackSpec>,
    pub ai: AiConfig,
    pub arena: ArenaConfig,
    pub player_clips: FighterClips,
    pub opponent_clips: FighterClips,
    /// Delay before each round's fight begins
    pub round_start_delay: f32,
    /// Pause between a knockout and the next round
    pub intermission: f32,
    pub rounds_to_win: u32,
}

const LIGHT_PUNCH: AttackSpec = AttackSpec {
    kind: AttackKind::LightPunch,
    animation: AnimationState::Punch,
    energy_cost: 0,
    payload: AttackPayload::Melee {
        range: 150.0,
        damage: 10,
    },
};

const AI_PUNCH: AttackSpec = AttackSpec {
    kind: AttackKind::AiPunch,
    animation: AnimationState::Punch,
    energy_cost: 0,
    payload: AttackPayload::Melee {
        range: 150.0,
        damage: 15,
    },
};

impl CombatConfig {
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::KiClash => Self::ki_clash(),
            Variant::ZBattle => Self::z_battle(),
        }
    }

    fn ki_clash() -> Self {
        Self {
            variant: Variant::KiClash,
            max_health: 1000,
            max_energy: 500,
            starting_energy: 0,
            move_speed: 200.0,
            jump_impulse: 350.0,
            light: Some(LIGHT_PUNCH),
            heavy: Some(AttackSpec {
                kind: AttackKind::Kick,
                animation: AnimationState::Kick,
                energy_cost: 0,
                payload: AttackPayload::Melee {
                    range: 150.0,
                    damage: 20,
                },
            }),
            special: Some(AttackSpec {
                kind: AttackKind::Fireball,
                animation: AnimationState::Punch,
                energy_cost: 0,
                payload: AttackPayload::Projectile(ProjectileSpec {
                    lead_time: 0.0,
                    speed: 500.0,
                    damage: 50,
                    offset_x: 80.0,
                    offset_y: -60.0,
                    clip: GALICK_GUN,
                }),
            }),
            modified_special: None,
            ai: AiConfig {
                aggro_range: None,
                attack_range: 120.0,
                walk_speed: 200.0,
                dash_speed: 200.0,
                attack: AI_PUNCH,
            },
            // Fireballs vanish at the edge of the view, not the world
            arena: ArenaConfig {
                projectile_max_x: 1280.0,
                ..ArenaConfig::default()
            },
            player_clips: GOKU_SSJ,
            opponent_clips: VEGETA_SSJ,
            round_start_delay: 2.0,
            intermission: 3.0,
            rounds_to_win: 2,
        }
    }

    fn z_battle() -> Self {
        let move_speed = 350.0;
        Self {
            variant: Variant::ZBattle,
            max_health: 1000,
            max_energy: 500,
            starting_energy: 500,
            move_speed,
            jump_impulse: 450.0,
            light: Some(LIGHT_PUNCH),
            heavy: None,
            special: Some(AttackSpec {
                kind: AttackKind::EnergyBlast,
                animation: AnimationState::Punch,
                energy_cost: 100,
                payload: AttackPayload::Projectile(ProjectileSpec {
                    lead_time: 0.5,
                    speed: 500.0,
                    damage: 50,
                    offset_x: 70.0,
                    offset_y: -100.0,
                    clip: KAMEHAMEHA,
                }),
            }),
            modified_special: Some(AttackSpec {
                kind: AttackKind::SpiritBomb,
                animation: AnimationState::Punch,
                energy_cost: 300,
                payload: AttackPayload::Strike {
                    lead_time: 1.0,
                    damage: 100,
                    effect: SPIRIT_BOMB,
                    effect_offset_y: -150.0,
                },
            }),
            ai: AiConfig {
                aggro_range: Some(400.0),
                attack_range: 120.0,
                walk_speed: move_speed * 0.8,
                dash_speed: 700.0,
                attack: AI_PUNCH,
            },
            arena: ArenaConfig::default(),
            player_clips: GOKU_SSJ_SHEET,
            opponent_clips: VEGETA_SHEET,
            round_start_delay: 2.0,
            intermission: 3.0,
            rounds_to_win: 2,
        }
    }

    /// Override the number of rounds needed to win the match
    pub fn with_rounds_to_win(mut self, rounds: u32) -> Self {
        self.rounds_to_win = rounds.max(1);
        self
    }

    pub fn clips(&self, side: Side) -> &FighterClips {
        match side {
            Side::Player => &self.player_clips,
            Side::Opponent => &self.opponent_clips,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_sits_sixty_pixels_above_view_bottom() {
        let arena = ArenaConfig::default();
        assert_eq!(arena.floor_y(), 660.0);
        assert_eq!(arena.opponent_spawn_x(), 880.0);
    }

    #[test]
    fn fireballs_are_bounded_by_the_view() {
        let ki_clash = CombatConfig::for_variant(Variant::KiClash).arena;
        let z_battle = CombatConfig::for_variant(Variant::ZBattle).arena;
        assert_eq!(ki_clash.projectile_max_x, ki_clash.view_width);
        assert_eq!(ki_clash.width, 1920.0);
        assert_eq!(z_battle.projectile_max_x, z_battle.width);
    }

    #[test]
    fn ki_clash_has_no_dash_tier_or_modifier_attack() {
        let config = CombatConfig::for_variant(Variant::KiClash);
        assert!(config.ai.aggro_range.is_none());
        assert!(config.modified_special.is_none());
        assert_eq!(config.starting_energy, 0);
        assert_eq!(config.special.map(|s| s.energy_cost), Some(0));
    }

    #[test]
    fn z_battle_energy_costs() {
        let config = CombatConfig::for_variant(Variant::ZBattle);
        assert_eq!(config.special.map(|s| s.energy_cost), Some(100));
        assert_eq!(config.modified_special.map(|s| s.energy_cost), Some(300));
        assert_eq!(config.ai.walk_speed, 280.0);
        assert_eq!(config.ai.aggro_range, Some(400.0));
    }

    #[test]
    fn rounds_to_win_is_at_least_one() {
        let config = CombatConfig::for_variant(Variant::ZBattle).with_rounds_to_win(0);
        assert_eq!(config.rounds_to_win, 1);
    }

    #[test]
    fn variant_ids_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&Variant::ZBattle).unwrap(),
            "\"z_battle\""
        );
        assert_eq!(
            serde_json::from_str::<Variant>("\"ki_clash\"").unwrap(),
            Variant::KiClash
        );
    }
}
