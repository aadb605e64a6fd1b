//! Combat controller - the per-tick update for one match session
//!
//! Order within a tick:
//! 1. round clock (start delay, intermission, match decision)
//! 2. visual effects
//! 3. frozen rounds stop here
//! 4. action timers, then due scheduled actions
//! 5. human fighter: movement, jump, attacks
//! 6. AI fighter
//! 7. physics
//! 8. projectiles
//!
//! Damage is applied synchronously through [`CombatController::apply_damage`]
//! wherever it is raised, and the events it produces are appended to the
//! tick's event list in the order they happened.

use tracing::{debug, info};

use crate::ws::protocol::{DestroyCause, GameEvent};

use super::animation::{AnimationClip, AnimationState, HIT_IMPACT};
use super::character::{Facing, Side};
use super::combat::{CombatSystem, Deferred, Effect, Projectile, ScheduledAction};
use super::physics::PhysicsSystem;
use super::session::{MatchSession, RoundPhase};
use super::variant::{AttackPayload, AttackSpec, ProjectileSpec};
use super::InputSnapshot;

/// Vertical offset of the hit spark above the target's feet
const HIT_EFFECT_OFFSET_Y: f32 = -50.0;

pub struct CombatController;

impl CombatController {
    /// Run one tick and return the events it raised
    pub fn tick(session: &mut MatchSession, input: &InputSnapshot, dt: f32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        session.tick += 1;

        Self::advance_round(session, dt, &mut events);
        session.effects.retain_mut(|effect| effect.update(dt));

        if !session.round.started() {
            session.player.freeze();
            session.opponent.freeze();
            Self::step_physics(session, dt);
            return events;
        }

        Self::advance_fighters(session, dt);
        Self::fire_scheduled(session, dt, &mut events);

        if session.round.started() {
            Self::resolve_player(session, input, &mut events);
        }
        if session.round.started() {
            Self::resolve_ai(session, &mut events);
        }

        Self::step_physics(session, dt);

        if session.round.started() {
            Self::update_projectiles(session, dt, &mut events);
        }

        events
    }

    /// Damage handler. Clamps health, plays the hit reaction, spawns the
    /// impact effect and ends the round on a knockout. Ignored unless the
    /// round is live.
    pub fn apply_damage(
        session: &mut MatchSession,
        target: Side,
        amount: u32,
        events: &mut Vec<GameEvent>,
    ) {
        if !session.round.started() {
            debug!(?target, amount, "Damage ignored outside a live round");
            return;
        }

        let hurt_duration = session.config.clips(target).hurt.duration();
        let victim = session.fighter_mut(target);
        if !victim.alive {
            return;
        }

        let outcome = victim.take_damage(amount);
        victim.stagger(hurt_duration);
        let (x, y) = (victim.x, victim.y + HIT_EFFECT_OFFSET_Y);

        Self::spawn_effect(session, &HIT_IMPACT, x, y);
        events.push(GameEvent::PlayerHit {
            target,
            damage: amount,
            health: outcome.health,
        });

        debug!(?target, amount, health = outcome.health, "Hit");

        if outcome.knocked_out {
            session.fighter_mut(target).knock_out();
            let winner = target.other();
            let intermission = session.config.intermission;
            if session.round.end(winner, intermission) {
                session.score.record_win(winner);
                events.push(GameEvent::RoundEnd {
                    round: session.round.number,
                    winner,
                });
                info!(
                    round = session.round.number,
                    ?winner,
                    player_wins = session.score.player,
                    opponent_wins = session.score.opponent,
                    "Round ended by knockout"
                );
            }
        }
    }

    /// Start delay, intermission and the best-of decision
    fn advance_round(session: &mut MatchSession, dt: f32, events: &mut Vec<GameEvent>) {
        match session.round.phase {
            RoundPhase::Countdown { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    session.round.phase = RoundPhase::Fighting;
                    events.push(GameEvent::RoundStarted {
                        round: session.round.number,
                    });
                    info!(round = session.round.number, "Round started");
                } else {
                    session.round.phase = RoundPhase::Countdown { remaining };
                }
            }
            RoundPhase::Fighting => {}
            RoundPhase::Ended {
                winner,
                intermission,
            } => {
                if session.is_over() {
                    return;
                }

                let intermission = intermission - dt;
                if intermission > 0.0 {
                    session.round.phase = RoundPhase::Ended {
                        winner,
                        intermission,
                    };
                    return;
                }

                if session.score.wins(winner) >= session.config.rounds_to_win {
                    session.match_winner = Some(winner);
                    events.push(GameEvent::MatchOver {
                        winner,
                        score: session.score,
                    });
                    info!(?winner, "Match decided");
                } else {
                    session.reset_round();
                }
            }
        }
    }

    fn advance_fighters(session: &mut MatchSession, dt: f32) {
        for side in [Side::Player, Side::Opponent] {
            if let Some(finished) = session.fighter_mut(side).advance(dt) {
                debug!(?side, ?finished, "Action finished");
            }
        }
    }

    /// Fire delayed actions that came due, in scheduling order
    fn fire_scheduled(session: &mut MatchSession, dt: f32, events: &mut Vec<GameEvent>) {
        let mut due: Vec<ScheduledAction> = Vec::new();
        session.scheduled.retain_mut(|action| {
            if action.tick(dt) {
                due.push(action.clone());
                false
            } else {
                true
            }
        });

        for action in due {
            if !session.round.started() {
                break;
            }
            if !session.fighter(action.owner).alive {
                continue;
            }

            match action.kind {
                Deferred::SpawnProjectile(spec) => {
                    Self::spawn_projectile(session, action.owner, &spec, events);
                }
                Deferred::Strike {
                    damage,
                    effect_clip,
                    effect_duration,
                    effect_offset_y,
                } => {
                    let target = action.owner.other();
                    let victim = session.fighter(target);
                    let (x, y) = (victim.x, victim.y + effect_offset_y);
                    let effect = Effect {
                        id: session.next_id(),
                        clip: effect_clip,
                        x,
                        y,
                        remaining: effect_duration,
                    };
                    session.effects.push(effect);
                    Self::apply_damage(session, target, damage, events);
                }
            }
        }
    }

    /// Human fighter: movement, jump and attack selection
    fn resolve_player(session: &mut MatchSession, input: &InputSnapshot, events: &mut Vec<GameEvent>) {
        let arena = session.config.arena;
        let move_speed = session.config.move_speed;
        let jump_impulse = session.config.jump_impulse;

        let player = &mut session.player;
        if !player.alive {
            return;
        }

        let direction = if input.held.left {
            Some(Facing::Left)
        } else if input.held.right {
            Some(Facing::Right)
        } else {
            None
        };

        match direction {
            Some(facing) => {
                player.vel_x = facing.sign() * move_speed;
                player.facing = facing;
            }
            None => player.vel_x = 0.0,
        }

        let grounded = player.is_grounded(&arena);
        if player.is_free() {
            if direction.is_some() && grounded {
                player.play(AnimationState::Walk);
            } else {
                player.play(AnimationState::Idle);
            }
        }

        if input.pressed.jump && grounded {
            player.vel_y = -jump_impulse;
        }

        let requested = if input.pressed.light {
            session.config.light
        } else if input.pressed.heavy {
            session.config.heavy
        } else if input.pressed.special {
            match (input.held.modifier, session.config.modified_special) {
                (true, Some(spec)) => Some(spec),
                _ => session.config.special,
            }
        } else {
            None
        };

        if let Some(spec) = requested {
            Self::try_attack(session, Side::Player, &spec, events);
        }
    }

    /// Distance-tiered AI: walk, dash, or stop and attack
    fn resolve_ai(session: &mut MatchSession, events: &mut Vec<GameEvent>) {
        let ai_config = session.config.ai;
        let (ai, player) = session.pair_mut(Side::Opponent);
        if !ai.alive {
            return;
        }
        if ai.is_attacking() {
            ai.vel_x = 0.0;
            return;
        }

        let distance = ai.distance_to(player);
        let facing = Facing::towards(ai.x, player.x);
        ai.facing = facing;

        let chase_speed = if distance <= ai_config.attack_range {
            None
        } else {
            match ai_config.aggro_range {
                Some(aggro) if distance <= aggro => Some(ai_config.dash_speed),
                _ => Some(ai_config.walk_speed),
            }
        };

        match chase_speed {
            Some(speed) => {
                ai.vel_x = facing.sign() * speed;
                if ai.is_free() {
                    ai.play(AnimationState::Walk);
                }
            }
            None => {
                ai.vel_x = 0.0;
                let attack = ai_config.attack;
                Self::try_attack(session, Side::Opponent, &attack, events);
            }
        }
    }

    /// Trigger an attack if the fighter is free and can pay for it
    fn try_attack(
        session: &mut MatchSession,
        side: Side,
        spec: &AttackSpec,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        let duration = session.config.clips(side).clip(spec.animation).duration();
        let (attacker, target) = session.pair_mut(side);

        if !attacker.alive || attacker.is_attacking() {
            debug!(?side, attack = ?spec.kind, "Attack ignored, already attacking");
            return false;
        }
        if !attacker.try_spend_energy(spec.energy_cost) {
            debug!(
                ?side,
                attack = ?spec.kind,
                energy = attacker.energy,
                cost = spec.energy_cost,
                "Attack ignored, not enough energy"
            );
            return false;
        }

        attacker.begin_attack(spec.animation, duration);
        let energy = attacker.energy;

        let melee_hit = match spec.payload {
            AttackPayload::Melee { range, damage } => {
                CombatSystem::in_melee_range(attacker, target, range).then_some(damage)
            }
            _ => None,
        };

        events.push(GameEvent::AttackStarted {
            side,
            attack: spec.kind,
        });
        if spec.energy_cost > 0 {
            events.push(GameEvent::EnergyChanged { side, energy });
        }

        match spec.payload {
            AttackPayload::Melee { .. } => {
                if let Some(damage) = melee_hit {
                    Self::apply_damage(session, side.other(), damage, events);
                }
            }
            AttackPayload::Projectile(projectile) if projectile.lead_time <= 0.0 => {
                Self::spawn_projectile(session, side, &projectile, events);
            }
            AttackPayload::Projectile(projectile) => {
                session.scheduled.push(ScheduledAction {
                    owner: side,
                    remaining: projectile.lead_time,
                    kind: Deferred::SpawnProjectile(projectile),
                });
            }
            AttackPayload::Strike {
                lead_time,
                damage,
                effect,
                effect_offset_y,
            } => {
                session.scheduled.push(ScheduledAction {
                    owner: side,
                    remaining: lead_time,
                    kind: Deferred::Strike {
                        damage,
                        effect_clip: effect.key,
                        effect_duration: effect.duration(),
                        effect_offset_y,
                    },
                });
            }
        }

        true
    }

    fn spawn_projectile(
        session: &mut MatchSession,
        owner: Side,
        spec: &ProjectileSpec,
        events: &mut Vec<GameEvent>,
    ) {
        let id = session.next_id();
        let projectile = Projectile::launch(id, session.fighter(owner), spec);

        events.push(GameEvent::ProjectileSpawned {
            id,
            owner,
            x: projectile.x,
            y: projectile.y,
            vel_x: projectile.vel_x,
        });
        debug!(id, ?owner, x = projectile.x, "Projectile spawned");

        session.projectiles.push(projectile);
    }

    fn spawn_effect(session: &mut MatchSession, clip: &AnimationClip, x: f32, y: f32) {
        let effect = Effect {
            id: session.next_id(),
            clip: clip.key,
            x,
            y,
            remaining: clip.duration(),
        };
        session.effects.push(effect);
    }

    fn step_physics(session: &mut MatchSession, dt: f32) {
        let arena = session.config.arena;
        PhysicsSystem::integrate(&mut session.player, &arena, dt);
        PhysicsSystem::integrate(&mut session.opponent, &arena, dt);
        PhysicsSystem::separate(&mut session.player, &mut session.opponent, &arena);
    }

    /// Move projectiles; each leaves play exactly once, by exit or first hit
    fn update_projectiles(session: &mut MatchSession, dt: f32, events: &mut Vec<GameEvent>) {
        let arena = session.config.arena;
        let mut projectiles = std::mem::take(&mut session.projectiles);
        let mut hits: Vec<(Side, u32)> = Vec::new();

        projectiles.retain_mut(|projectile| {
            projectile.update(dt);

            if PhysicsSystem::is_outside(projectile.x, &arena) {
                events.push(GameEvent::ProjectileDestroyed {
                    id: projectile.id,
                    cause: DestroyCause::LeftArena,
                });
                return false;
            }

            let target = session.fighter(projectile.owner.other());
            if target.alive && PhysicsSystem::projectile_hits(projectile.x, projectile.y, target, &arena)
            {
                hits.push((target.side, projectile.damage));
                events.push(GameEvent::ProjectileDestroyed {
                    id: projectile.id,
                    cause: DestroyCause::Hit,
                });
                return false;
            }

            true
        });

        session.projectiles = projectiles;

        for (target, damage) in hits {
            Self::apply_damage(session, target, damage, events);
        }
    }
}
