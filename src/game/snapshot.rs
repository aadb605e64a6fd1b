//! Snapshot building

use crate::ws::protocol::{
    EffectSnapshot, FighterSnapshot, GameEvent, ProjectileSnapshot, RoundSnapshot, ServerMsg,
};

use super::character::Character;
use super::session::{MatchSession, RoundPhase};

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for round and match transitions)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a full snapshot of the session
    pub fn build(&self, session: &MatchSession, events: Vec<GameEvent>) -> ServerMsg {
        let countdown = match session.round.phase {
            RoundPhase::Countdown { remaining } => Some(remaining.max(0.0)),
            _ => None,
        };

        let projectiles = session
            .projectiles
            .iter()
            .map(|p| ProjectileSnapshot {
                id: p.id,
                owner: p.owner,
                x: p.x,
                y: p.y,
                vel_x: p.vel_x,
                clip: p.clip.to_string(),
            })
            .collect();

        let effects = session
            .effects
            .iter()
            .map(|e| EffectSnapshot {
                id: e.id,
                clip: e.clip.to_string(),
                x: e.x,
                y: e.y,
            })
            .collect();

        ServerMsg::Snapshot {
            tick: session.tick,
            round: RoundSnapshot {
                number: session.round.number,
                started: session.round.started(),
                winner: session.round.winner(),
                countdown,
                score: session.score,
            },
            player: fighter_snapshot(session, &session.player),
            opponent: fighter_snapshot(session, &session.opponent),
            projectiles,
            effects,
            events,
        }
    }
}

fn fighter_snapshot(session: &MatchSession, fighter: &Character) -> FighterSnapshot {
    let clip = session.config.clips(fighter.side).clip(fighter.animation);
    FighterSnapshot {
        side: fighter.side,
        x: fighter.x,
        y: fighter.y,
        vel_x: fighter.vel_x,
        vel_y: fighter.vel_y,
        facing: fighter.facing,
        health: fighter.health,
        energy: fighter.energy,
        animation: fighter.animation,
        clip: clip.key.to_string(),
        is_attacking: fighter.is_attacking(),
        alive: fighter.alive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::character::Side;
    use crate::game::variant::{CombatConfig, Variant};

    #[test]
    fn sends_every_interval() {
        let mut builder = SnapshotBuilder::new(2);
        let sent: Vec<bool> = (0..4).map(|_| builder.should_send()).collect();
        assert_eq!(sent, vec![false, true, false, true]);

        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn snapshot_carries_clip_keys_and_countdown() {
        let session = MatchSession::new(CombatConfig::for_variant(Variant::ZBattle));
        let builder = SnapshotBuilder::new(2);
        let events = vec![GameEvent::EnergyChanged {
            side: Side::Player,
            energy: 400,
        }];

        match builder.build(&session, events) {
            ServerMsg::Snapshot {
                round,
                player,
                opponent,
                events,
                ..
            } => {
                assert_eq!(round.number, 1);
                assert!(!round.started);
                assert_eq!(round.countdown, Some(2.0));
                assert_eq!(player.clip, "goku_idle");
                assert_eq!(opponent.clip, "vegeta_idle");
                assert_eq!(player.energy, 500);
                assert_eq!(events.len(), 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn snapshot_serializes_with_type_tag() {
        let session = MatchSession::new(CombatConfig::for_variant(Variant::KiClash));
        let json = serde_json::to_value(SnapshotBuilder::new(1).build(&session, Vec::new())).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["player"]["animation"], "idle");
        assert_eq!(json["round"]["score"]["player"], 0);
    }
}
