//! Session runtime: the authoritative tick loop and the registry of live sessions

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{snapshot_interval, tick_delta, unix_millis, SIMULATION_TPS};
use crate::ws::protocol::{ClientMsg, GameEvent, Role, Score, ServerMsg};

use super::character::Side;
use super::controller::CombatController;
use super::session::MatchSession;
use super::snapshot::SnapshotBuilder;
use super::variant::{CombatConfig, Variant};
use super::InputTracker;

/// Commands delivered to a session's tick loop
#[derive(Debug)]
pub enum SessionCommand {
    /// A socket attached; `reply_tx` carries messages meant for it alone
    Connect {
        conn_id: Uuid,
        reply_tx: mpsc::Sender<ServerMsg>,
    },
    Disconnect {
        conn_id: Uuid,
    },
    Client {
        conn_id: Uuid,
        msg: ClientMsg,
        received_at: u64,
    },
    Shutdown {
        reason: String,
    },
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No fighter has joined yet, the simulation is paused
    Waiting,
    Running,
    /// A side reached the required round wins
    Finished,
    /// Stopped by request or idle timeout
    Closed,
}

/// Point-in-time view of a session, published by the tick loop
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub variant: Variant,
    pub phase: SessionPhase,
    pub tick: u64,
    pub round: u32,
    pub round_started: bool,
    pub score: Score,
    pub connections: usize,
    pub has_fighter: bool,
    pub winner: Option<Side>,
    pub created_at: DateTime<Utc>,
}

/// Knobs applied to every session the registry spawns
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub rounds_to_win: u32,
    /// Close a session after this long without any connection
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            rounds_to_win: 2,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub variant: Variant,
    pub created_at: DateTime<Utc>,
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    status: Arc<RwLock<SessionStatus>>,
}

impl SessionHandle {
    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session limit reached ({0} active)")]
    LimitReached(usize),

    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Session is no longer running")]
    Closed,
}

/// Registry of all live sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
    /// Serializes the capacity check with the insert
    spawn_lock: Mutex<()>,
    max_sessions: usize,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, settings: SessionSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            spawn_lock: Mutex::new(()),
            max_sessions,
            settings,
        }
    }

    /// Create a session and start its tick loop. The session removes itself
    /// from the registry when the loop ends.
    pub fn spawn(self: &Arc<Self>, variant: Variant) -> Result<SessionHandle, SessionError> {
        let config =
            CombatConfig::for_variant(variant).with_rounds_to_win(self.settings.rounds_to_win);
        let (game_match, handle) =
            GameMatch::new(Uuid::new_v4(), config, self.settings.idle_timeout);

        {
            let _guard = self.spawn_lock.lock();
            let active = self.sessions.len();
            if active >= self.max_sessions {
                warn!(active, max = self.max_sessions, "Session limit reached");
                return Err(SessionError::LimitReached(active));
            }
            self.sessions.insert(handle.id, handle.clone());
        }

        let registry = Arc::clone(self);
        let id = handle.id;
        tokio::spawn(async move {
            game_match.run().await;
            registry.sessions.remove(&id);
            debug!(session_id = %id, "Session removed from registry");
        });

        Ok(handle)
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    /// Statuses of all sessions, oldest first
    pub fn list(&self) -> Vec<SessionStatus> {
        let mut statuses: Vec<SessionStatus> =
            self.sessions.iter().map(|s| s.value().status()).collect();
        statuses.sort_by_key(|s| s.created_at);
        statuses
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_connections(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.value().status.read().connections)
            .sum()
    }

    /// Ask a session to stop and drop it from the registry
    pub async fn shutdown(&self, id: &Uuid, reason: &str) -> Result<(), SessionError> {
        let (_, handle) = self
            .sessions
            .remove(id)
            .ok_or(SessionError::NotFound(*id))?;

        handle
            .command_tx
            .send(SessionCommand::Shutdown {
                reason: reason.to_string(),
            })
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// The authoritative session loop
pub struct GameMatch {
    id: Uuid,
    created_at: DateTime<Utc>,
    session: MatchSession,
    phase: SessionPhase,
    command_rx: mpsc::Receiver<SessionCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    status: Arc<RwLock<SessionStatus>>,
    snapshot_builder: SnapshotBuilder,
    input: InputTracker,
    /// Connection controlling the player fighter
    fighter: Option<Uuid>,
    connections: HashMap<Uuid, mpsc::Sender<ServerMsg>>,
    /// Events raised since the last snapshot went out
    pending_events: Vec<GameEvent>,
    idle_timeout: Duration,
    idle_since: Option<Instant>,
    close_reason: Option<String>,
}

impl GameMatch {
    pub fn new(id: Uuid, config: CombatConfig, idle_timeout: Duration) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let created_at = Utc::now();
        let variant = config.variant;
        let session = MatchSession::new(config);

        let status = Arc::new(RwLock::new(SessionStatus {
            id,
            variant,
            phase: SessionPhase::Waiting,
            tick: 0,
            round: session.round.number,
            round_started: false,
            score: session.score,
            connections: 0,
            has_fighter: false,
            winner: None,
            created_at,
        }));

        let handle = SessionHandle {
            id,
            variant,
            created_at,
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            status: status.clone(),
        };

        let game_match = Self {
            id,
            created_at,
            session,
            phase: SessionPhase::Waiting,
            command_rx,
            snapshot_tx,
            status,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval()),
            input: InputTracker::default(),
            fighter: None,
            connections: HashMap::new(),
            pending_events: Vec::new(),
            idle_timeout,
            idle_since: Some(Instant::now()),
            close_reason: None,
        };

        (game_match, handle)
    }

    /// Run the tick loop until the match is decided or the session is closed
    pub async fn run(mut self) {
        info!(
            session_id = %self.id,
            variant = ?self.session.config.variant,
            "Session started"
        );

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let dt = tick_delta();

        loop {
            tick_interval.tick().await;

            self.process_commands();
            if self.close_reason.is_none() {
                self.step(dt);
                self.check_idle(Instant::now());
            }

            if self.close_reason.is_some() || self.phase == SessionPhase::Finished {
                break;
            }
        }

        if let Some(reason) = self.close_reason.take() {
            self.phase = SessionPhase::Closed;
            let _ = self.snapshot_tx.send(ServerMsg::SessionClosed {
                reason: reason.clone(),
            });
            info!(session_id = %self.id, reason = %reason, "Session closed");
        }

        self.publish_status();
        info!(
            session_id = %self.id,
            ticks = self.session.tick,
            lifetime_secs = (Utc::now() - self.created_at).num_seconds(),
            "Session loop exited"
        );
    }

    /// Drain the command queue
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.close("registry dropped the session");
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { conn_id, reply_tx } => {
                self.connections.insert(conn_id, reply_tx);
                self.idle_since = None;
                debug!(session_id = %self.id, conn_id = %conn_id, "Connection attached");
                self.publish_status();
            }
            SessionCommand::Disconnect { conn_id } => {
                self.connections.remove(&conn_id);
                self.release_fighter(conn_id);
                debug!(session_id = %self.id, conn_id = %conn_id, "Connection detached");
                self.publish_status();
            }
            SessionCommand::Client {
                conn_id,
                msg,
                received_at,
            } => self.handle_client(conn_id, msg, received_at),
            SessionCommand::Shutdown { reason } => self.close(&reason),
        }
    }

    fn handle_client(&mut self, conn_id: Uuid, msg: ClientMsg, received_at: u64) {
        match msg {
            ClientMsg::Join => self.handle_join(conn_id),
            ClientMsg::Input { seq, buttons } => {
                if self.fighter != Some(conn_id) {
                    self.reply(
                        conn_id,
                        ServerMsg::Error {
                            code: "not_fighter".to_string(),
                            message: "Only the controlling client may send input".to_string(),
                        },
                    );
                    return;
                }
                if !self.input.record(seq, buttons) {
                    debug!(session_id = %self.id, seq, "Dropped stale input");
                    return;
                }
                debug!(
                    session_id = %self.id,
                    seq,
                    queued_ms = unix_millis().saturating_sub(received_at),
                    "Input"
                );
            }
            ClientMsg::Ping { t } => self.reply(conn_id, ServerMsg::Pong { t }),
            ClientMsg::Leave => self.release_fighter(conn_id),
        }
    }

    /// The first connection to join controls the player, later ones spectate
    fn handle_join(&mut self, conn_id: Uuid) {
        let role = match self.fighter {
            None => {
                self.fighter = Some(conn_id);
                self.input.clear();
                if self.phase == SessionPhase::Waiting {
                    self.phase = SessionPhase::Running;
                }
                info!(session_id = %self.id, conn_id = %conn_id, "Fighter joined");
                Role::Fighter
            }
            Some(current) if current == conn_id => Role::Fighter,
            Some(_) => {
                info!(session_id = %self.id, conn_id = %conn_id, "Spectator joined");
                Role::Spectator
            }
        };

        self.reply(conn_id, ServerMsg::Joined { conn_id, role });
        self.publish_status();
    }

    fn release_fighter(&mut self, conn_id: Uuid) {
        if self.fighter == Some(conn_id) {
            self.fighter = None;
            self.input.clear();
            info!(session_id = %self.id, conn_id = %conn_id, "Fighter released control");
            self.publish_status();
        }
    }

    fn reply(&self, conn_id: Uuid, msg: ServerMsg) {
        if let Some(tx) = self.connections.get(&conn_id) {
            if tx.try_send(msg).is_err() {
                debug!(session_id = %self.id, conn_id = %conn_id, "Direct reply dropped");
            }
        }
    }

    fn close(&mut self, reason: &str) {
        if self.close_reason.is_none() {
            self.close_reason = Some(reason.to_string());
        }
    }

    /// One simulation tick plus snapshot broadcast
    fn step(&mut self, dt: f32) {
        if self.phase == SessionPhase::Running {
            let input = self.input.take_snapshot();
            let events = CombatController::tick(&mut self.session, &input, dt);

            let transition = events.iter().any(|e| {
                matches!(
                    e,
                    GameEvent::RoundStarted { .. }
                        | GameEvent::RoundEnd { .. }
                        | GameEvent::MatchOver { .. }
                )
            });
            if transition {
                self.snapshot_builder.force_next();
            }
            self.pending_events.extend(events);
        }

        if self.snapshot_builder.should_send() {
            let events = std::mem::take(&mut self.pending_events);
            let snapshot = self.snapshot_builder.build(&self.session, events);
            // No receivers is fine
            let _ = self.snapshot_tx.send(snapshot);
            self.publish_status();
        }

        if let Some(winner) = self.session.match_winner {
            if self.phase == SessionPhase::Running {
                self.phase = SessionPhase::Finished;
                let _ = self.snapshot_tx.send(ServerMsg::MatchOver {
                    winner,
                    score: self.session.score,
                });
                info!(
                    session_id = %self.id,
                    ?winner,
                    player_wins = self.session.score.player,
                    opponent_wins = self.session.score.opponent,
                    "Match over"
                );
                self.publish_status();
            }
        }
    }

    fn check_idle(&mut self, now: Instant) {
        if !self.connections.is_empty() {
            self.idle_since = None;
            return;
        }

        let since = *self.idle_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.idle_timeout {
            self.close("idle timeout");
        }
    }

    fn publish_status(&self) {
        let mut status = self.status.write();
        status.phase = self.phase;
        status.tick = self.session.tick;
        status.round = self.session.round.number;
        status.round_started = self.session.round.started();
        status.score = self.session.score;
        status.connections = self.connections.len();
        status.has_fighter = self.fighter.is_some();
        status.winner = self.session.match_winner;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::RoundPhase;
    use crate::ws::protocol::Buttons;

    fn new_match(variant: Variant) -> (GameMatch, SessionHandle) {
        GameMatch::new(
            Uuid::new_v4(),
            CombatConfig::for_variant(variant),
            Duration::from_secs(60),
        )
    }

    fn connect(game: &mut GameMatch) -> (Uuid, mpsc::Receiver<ServerMsg>) {
        let conn_id = Uuid::new_v4();
        let (reply_tx, reply_rx) = mpsc::channel(16);
        game.handle_command(SessionCommand::Connect { conn_id, reply_tx });
        (conn_id, reply_rx)
    }

    fn send(game: &mut GameMatch, conn_id: Uuid, msg: ClientMsg) {
        game.handle_command(SessionCommand::Client {
            conn_id,
            msg,
            received_at: unix_millis(),
        });
    }

    fn drain(rx: &mut broadcast::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(msg) => out.push(msg),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        out
    }

    #[test]
    fn first_join_controls_player_and_later_ones_spectate() {
        let (mut game, handle) = new_match(Variant::ZBattle);
        let (first, mut first_rx) = connect(&mut game);
        let (second, mut second_rx) = connect(&mut game);

        send(&mut game, first, ClientMsg::Join);
        send(&mut game, second, ClientMsg::Join);

        assert!(matches!(
            first_rx.try_recv(),
            Ok(ServerMsg::Joined { role: Role::Fighter, .. })
        ));
        assert!(matches!(
            second_rx.try_recv(),
            Ok(ServerMsg::Joined { role: Role::Spectator, .. })
        ));
        assert_eq!(game.phase, SessionPhase::Running);

        let status = handle.status();
        assert!(status.has_fighter);
        assert_eq!(status.connections, 2);
    }

    #[test]
    fn spectator_input_is_rejected() {
        let (mut game, _) = new_match(Variant::KiClash);
        let (fighter, _fighter_rx) = connect(&mut game);
        let (spectator, mut spectator_rx) = connect(&mut game);
        send(&mut game, fighter, ClientMsg::Join);
        send(&mut game, spectator, ClientMsg::Join);
        let _ = spectator_rx.try_recv();

        send(
            &mut game,
            spectator,
            ClientMsg::Input {
                seq: 1,
                buttons: Buttons {
                    right: true,
                    ..Default::default()
                },
            },
        );

        match spectator_rx.try_recv() {
            Ok(ServerMsg::Error { code, .. }) => assert_eq!(code, "not_fighter"),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert!(!game.input.take_snapshot().held.right);
    }

    #[test]
    fn ping_is_answered_to_sender_only() {
        let (mut game, handle) = new_match(Variant::KiClash);
        let mut broadcast_rx = handle.subscribe();
        let (conn, mut rx) = connect(&mut game);
        send(&mut game, conn, ClientMsg::Ping { t: 42 });

        assert!(matches!(rx.try_recv(), Ok(ServerMsg::Pong { t: 42 })));
        assert!(drain(&mut broadcast_rx).is_empty());
    }

    #[test]
    fn simulation_waits_for_a_fighter() {
        let (mut game, _) = new_match(Variant::ZBattle);
        for _ in 0..10 {
            game.step(tick_delta());
        }
        assert_eq!(game.session.tick, 0);
        assert_eq!(game.phase, SessionPhase::Waiting);
    }

    #[test]
    fn fighter_input_moves_player_once_round_starts() {
        let (mut game, _) = new_match(Variant::ZBattle);
        let (conn, _rx) = connect(&mut game);
        send(&mut game, conn, ClientMsg::Join);
        send(
            &mut game,
            conn,
            ClientMsg::Input {
                seq: 1,
                buttons: Buttons {
                    left: true,
                    ..Default::default()
                },
            },
        );

        let start_x = game.session.player.x;
        for _ in 0..60 {
            game.step(tick_delta());
        }
        assert_eq!(game.session.player.x, start_x);

        for _ in 0..90 {
            game.step(tick_delta());
        }
        assert!(game.session.round.started());
        assert!(game.session.player.x < start_x);
    }

    #[test]
    fn disconnect_releases_control() {
        let (mut game, _) = new_match(Variant::KiClash);
        let (first, _first_rx) = connect(&mut game);
        let (second, mut second_rx) = connect(&mut game);
        send(&mut game, first, ClientMsg::Join);
        game.handle_command(SessionCommand::Disconnect { conn_id: first });
        assert!(game.fighter.is_none());

        send(&mut game, second, ClientMsg::Join);
        assert!(matches!(
            second_rx.try_recv(),
            Ok(ServerMsg::Joined { role: Role::Fighter, .. })
        ));
    }

    #[test]
    fn events_reach_the_next_snapshot() {
        let (mut game, handle) = new_match(Variant::ZBattle);
        let mut rx = handle.subscribe();
        let (conn, _reply_rx) = connect(&mut game);
        send(&mut game, conn, ClientMsg::Join);

        for _ in 0..130 {
            game.step(tick_delta());
        }

        let started = drain(&mut rx).into_iter().any(|msg| match msg {
            ServerMsg::Snapshot { events, .. } => {
                events.contains(&GameEvent::RoundStarted { round: 1 })
            }
            _ => false,
        });
        assert!(started);
    }

    #[test]
    fn decided_match_broadcasts_match_over() {
        let (mut game, handle) = new_match(Variant::KiClash);
        let mut rx = handle.subscribe();
        let (conn, _reply_rx) = connect(&mut game);
        send(&mut game, conn, ClientMsg::Join);

        game.session.round.phase = RoundPhase::Fighting;
        game.session.score.player = 1;
        let mut events = Vec::new();
        CombatController::apply_damage(&mut game.session, Side::Opponent, 1000, &mut events);

        for _ in 0..200 {
            game.step(tick_delta());
            if game.phase == SessionPhase::Finished {
                break;
            }
        }

        assert_eq!(game.phase, SessionPhase::Finished);
        let over = drain(&mut rx).into_iter().any(|msg| {
            matches!(
                msg,
                ServerMsg::MatchOver {
                    winner: Side::Player,
                    ..
                }
            )
        });
        assert!(over);
        assert_eq!(handle.status().winner, Some(Side::Player));
    }

    #[test]
    fn idle_session_closes_after_timeout() {
        let (mut game, _) = new_match(Variant::KiClash);
        let now = Instant::now();
        game.check_idle(now);
        assert!(game.close_reason.is_none());

        game.check_idle(now + Duration::from_secs(61));
        assert_eq!(game.close_reason.as_deref(), Some("idle timeout"));
    }

    #[test]
    fn connected_session_never_idles() {
        let (mut game, _) = new_match(Variant::KiClash);
        let (_conn, _rx) = connect(&mut game);
        game.check_idle(Instant::now() + Duration::from_secs(3600));
        assert!(game.close_reason.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_spawns_respect_the_session_limit() {
        let registry = Arc::new(SessionRegistry::new(1, SessionSettings::default()));
        let barrier = Arc::new(tokio::sync::Barrier::new(32));

        let attempts: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    registry.spawn(Variant::KiClash).is_ok()
                })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(registry.active_sessions(), 1);
    }

    #[tokio::test]
    async fn registry_spawns_lists_and_shuts_down() {
        let registry = Arc::new(SessionRegistry::new(1, SessionSettings::default()));
        let handle = registry.spawn(Variant::ZBattle).unwrap();
        let mut rx = handle.subscribe();

        assert_eq!(registry.active_sessions(), 1);
        assert_eq!(registry.list()[0].id, handle.id);
        assert!(matches!(
            registry.spawn(Variant::KiClash),
            Err(SessionError::LimitReached(1))
        ));

        tokio_test::assert_ok!(registry.shutdown(&handle.id, "test").await);
        assert!(registry.get(&handle.id).is_none());

        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Ok(ServerMsg::SessionClosed { reason }) => break reason,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break String::new(),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(closed, "test");

        assert!(matches!(
            registry.shutdown(&handle.id, "again").await,
            Err(SessionError::NotFound(_))
        ));
    }
}
