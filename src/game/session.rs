//! Match session context: everything the combat controller reads and mutates

use tracing::info;

use crate::ws::protocol::Score;

use super::character::{Character, Side};
use super::combat::{Effect, Projectile, ScheduledAction};
use super::variant::CombatConfig;

/// Round lifecycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundPhase {
    /// Start delay running, fighters frozen
    Countdown { remaining: f32 },
    Fighting,
    /// Someone was knocked out; `intermission` counts down to the next round
    Ended { winner: Side, intermission: f32 },
}

#[derive(Debug, Clone)]
pub struct Round {
    pub number: u32,
    pub phase: RoundPhase,
}

impl Round {
    pub fn new(number: u32, start_delay: f32) -> Self {
        Self {
            number,
            phase: RoundPhase::Countdown {
                remaining: start_delay,
            },
        }
    }

    pub fn started(&self) -> bool {
        self.phase == RoundPhase::Fighting
    }

    pub fn winner(&self) -> Option<Side> {
        match self.phase {
            RoundPhase::Ended { winner, .. } => Some(winner),
            _ => None,
        }
    }

    /// End the round. Only the first call while fighting has any effect.
    pub fn end(&mut self, winner: Side, intermission: f32) -> bool {
        if !self.started() {
            return false;
        }
        self.phase = RoundPhase::Ended {
            winner,
            intermission,
        };
        true
    }
}

/// Explicit match context handed to the controller each tick
#[derive(Debug, Clone)]
pub struct MatchSession {
    pub config: CombatConfig,
    pub tick: u64,
    pub round: Round,
    pub score: Score,
    pub player: Character,
    pub opponent: Character,
    pub projectiles: Vec<Projectile>,
    pub effects: Vec<Effect>,
    pub scheduled: Vec<ScheduledAction>,
    /// Set once a side reaches `rounds_to_win`
    pub match_winner: Option<Side>,
    next_entity_id: u64,
}

impl MatchSession {
    pub fn new(config: CombatConfig) -> Self {
        let player = Character::new(Side::Player, &config);
        let opponent = Character::new(Side::Opponent, &config);
        let round = Round::new(1, config.round_start_delay);
        Self {
            config,
            tick: 0,
            round,
            score: Score::default(),
            player,
            opponent,
            projectiles: Vec::new(),
            effects: Vec::new(),
            scheduled: Vec::new(),
            match_winner: None,
            next_entity_id: 1,
        }
    }

    pub fn fighter(&self, side: Side) -> &Character {
        match side {
            Side::Player => &self.player,
            Side::Opponent => &self.opponent,
        }
    }

    pub fn fighter_mut(&mut self, side: Side) -> &mut Character {
        match side {
            Side::Player => &mut self.player,
            Side::Opponent => &mut self.opponent,
        }
    }

    /// Both fighters, attacker first
    pub fn pair_mut(&mut self, attacker: Side) -> (&mut Character, &mut Character) {
        match attacker {
            Side::Player => (&mut self.player, &mut self.opponent),
            Side::Opponent => (&mut self.opponent, &mut self.player),
        }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn is_over(&self) -> bool {
        self.match_winner.is_some()
    }

    /// Start the next round with fresh fighters and an empty arena
    pub fn reset_round(&mut self) {
        let number = self.round.number + 1;
        self.round = Round::new(number, self.config.round_start_delay);
        self.player.reset(&self.config);
        self.opponent.reset(&self.config);
        self.projectiles.clear();
        self.effects.clear();
        self.scheduled.clear();

        info!(
            variant = ?self.config.variant,
            round = number,
            player_wins = self.score.player,
            opponent_wins = self.score.opponent,
            "Round reset"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::variant::Variant;

    #[test]
    fn round_ends_exactly_once() {
        let mut round = Round::new(1, 0.0);
        assert!(!round.end(Side::Player, 3.0));
        round.phase = RoundPhase::Fighting;
        assert!(round.end(Side::Player, 3.0));
        assert!(!round.end(Side::Opponent, 3.0));
        assert_eq!(round.winner(), Some(Side::Player));
        assert!(!round.started());
    }

    #[test]
    fn reset_restores_vitals_and_clears_arena() {
        let mut session = MatchSession::new(CombatConfig::for_variant(Variant::ZBattle));
        session.player.health = 0;
        session.opponent.energy = 0;
        session.player.x = 1000.0;
        session.effects.push(Effect {
            id: 9,
            clip: "hit_impact",
            x: 0.0,
            y: 0.0,
            remaining: 1.0,
        });
        session.reset_round();

        assert_eq!(session.round.number, 2);
        assert_eq!(session.player.health, 1000);
        assert_eq!(session.opponent.energy, 500);
        assert_eq!(session.player.x, 400.0);
        assert!(session.effects.is_empty());
        assert!(!session.round.started());
    }

    #[test]
    fn ids_are_unique() {
        let mut session = MatchSession::new(CombatConfig::for_variant(Variant::KiClash));
        let a = session.next_id();
        let b = session.next_id();
        assert_ne!(a, b);
    }
}
