//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::animation::AnimationState;
use crate::game::character::{Facing, Side};
use crate::game::variant::{AttackKind, Variant};

/// Buttons held by the controlling client this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Buttons {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub light: bool,
    pub heavy: bool,
    pub special: bool,
    pub modifier: bool,
}

impl Buttons {
    /// Buttons held in `self` but not in `previous`
    pub fn pressed_since(self, previous: Buttons) -> Buttons {
        Buttons {
            left: self.left && !previous.left,
            right: self.right && !previous.right,
            jump: self.jump && !previous.jump,
            light: self.light && !previous.light,
            heavy: self.heavy && !previous.heavy,
            special: self.special && !previous.special,
            modifier: self.modifier && !previous.modifier,
        }
    }

    pub fn union(self, other: Buttons) -> Buttons {
        Buttons {
            left: self.left || other.left,
            right: self.right || other.right,
            jump: self.jump || other.jump,
            light: self.light || other.light,
            heavy: self.heavy || other.heavy,
            special: self.special || other.special,
            modifier: self.modifier || other.modifier,
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ask to control the player fighter; granted to the first client only
    Join,

    /// Held buttons for the current client frame
    Input {
        /// Sequence number, stale inputs are dropped
        seq: u32,
        #[serde(default)]
        buttons: Buttons,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Give up control (or stop spectating)
    Leave,
}

/// Connection role inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Fighter,
    Spectator,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        conn_id: Uuid,
        session_id: Uuid,
        variant: Variant,
        server_time: u64,
    },

    /// Answer to a join request
    Joined { conn_id: Uuid, role: Role },

    /// Session state snapshot (sent at regular intervals)
    Snapshot {
        tick: u64,
        round: RoundSnapshot,
        player: FighterSnapshot,
        opponent: FighterSnapshot,
        projectiles: Vec<ProjectileSnapshot>,
        effects: Vec<EffectSnapshot>,
        /// Events raised since the previous snapshot
        events: Vec<GameEvent>,
    },

    /// Match decided, the session is about to close
    MatchOver { winner: Side, score: Score },

    /// Session stopped for a reason other than a decided match
    SessionClosed { reason: String },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Rounds won by each side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub player: u32,
    pub opponent: u32,
}

impl Score {
    pub fn wins(&self, side: Side) -> u32 {
        match side {
            Side::Player => self.player,
            Side::Opponent => self.opponent,
        }
    }

    pub fn record_win(&mut self, side: Side) {
        match side {
            Side::Player => self.player += 1,
            Side::Opponent => self.opponent += 1,
        }
    }
}

/// Round state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub number: u32,
    pub started: bool,
    pub winner: Option<Side>,
    /// Seconds until the round starts, while counting down
    pub countdown: Option<f32>,
    pub score: Score,
}

/// Fighter state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FighterSnapshot {
    pub side: Side,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub facing: Facing,
    pub health: u32,
    pub energy: u32,
    pub animation: AnimationState,
    /// Clip key the renderer should play
    pub clip: String,
    pub is_attacking: bool,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub owner: Side,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub clip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectSnapshot {
    pub id: u64,
    pub clip: String,
    pub x: f32,
    pub y: f32,
}

/// Why a projectile left play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyCause {
    LeftArena,
    Hit,
}

/// Combat events, consumed by the client UI (health and energy bars, banners)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Fight begins after the start delay
    RoundStarted { round: u32 },

    /// Damage landed
    PlayerHit {
        target: Side,
        damage: u32,
        /// Target health after the hit
        health: u32,
    },

    /// A fighter was knocked out
    RoundEnd { round: u32, winner: Side },

    AttackStarted { side: Side, attack: AttackKind },

    ProjectileSpawned {
        id: u64,
        owner: Side,
        x: f32,
        y: f32,
        vel_x: f32,
    },

    ProjectileDestroyed { id: u64, cause: DestroyCause },

    EnergyChanged { side: Side, energy: u32 },

    MatchOver { winner: Side, score: Score },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_message_parses_with_partial_buttons() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"input","seq":4,"buttons":{"left":true}}"#).unwrap();
        match msg {
            ClientMsg::Input { seq, buttons } => {
                assert_eq!(seq, 4);
                assert!(buttons.left);
                assert!(!buttons.right);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn events_are_tagged_by_event_type() {
        let json = serde_json::to_value(GameEvent::RoundEnd {
            round: 1,
            winner: Side::Player,
        })
        .unwrap();
        assert_eq!(json["event_type"], "round_end");
        assert_eq!(json["winner"], "player");
    }

    #[test]
    fn pressed_since_reports_rising_edges_only() {
        let before = Buttons {
            jump: true,
            ..Default::default()
        };
        let now = Buttons {
            jump: true,
            light: true,
            ..Default::default()
        };
        let pressed = now.pressed_since(before);
        assert!(pressed.light);
        assert!(!pressed.jump);
    }

    #[test]
    fn score_tracks_each_side() {
        let mut score = Score::default();
        score.record_win(Side::Opponent);
        score.record_win(Side::Opponent);
        assert_eq!(score.wins(Side::Opponent), 2);
        assert_eq!(score.wins(Side::Player), 0);
    }
}
