// Arena context: one replicated game world, owned by a room and passed explicitly to
// every component that needs it.

use crate::domain::effects::resolve_effect;
use crate::domain::ports::{Clock, Replicator};
use crate::domain::tuning::{PlayerTuning, ProjectileTuning};
use crate::domain::{
    PlayerReplica, PlayerState, Projectile, ProjectilePool, ProjectileSpawn, SpellBook, SpellEvent,
    Vec2, Vec3,
};
use crate::use_cases::abilities::{AbilityEngine, CastResolution};
use crate::use_cases::store::{StateStore, StoreLimits, StoreSnapshot};
use crate::use_cases::types::{CastRejection, CastReport};
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where new and respawned players appear.
const SPAWN_POINT: Vec3 = Vec3::ZERO;

/// Gameplay configuration for one arena.
#[derive(Debug, Clone, Default)]
pub struct ArenaSettings {
    pub limits: StoreLimits,
    pub player: PlayerTuning,
    pub projectile: ProjectileTuning,
    pub spells: SpellBook,
}

pub struct Arena {
    store: StateStore,
    engine: AbilityEngine,
    // Lock order: projectiles before the store.
    projectiles: Mutex<ProjectilePool>,
    clock: Arc<dyn Clock>,
    player_tuning: PlayerTuning,
    projectile_tuning: ProjectileTuning,
    replicator: OnceLock<Arc<dyn Replicator>>,
}

impl Arena {
    pub fn new(settings: ArenaSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: StateStore::new(settings.limits),
            engine: AbilityEngine::new(settings.spells, settings.player),
            projectiles: Mutex::new(ProjectilePool::new(settings.projectile.pool_size)),
            clock,
            player_tuning: settings.player,
            projectile_tuning: settings.projectile,
            replicator: OnceLock::new(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn spell_book(&self) -> &SpellBook {
        self.engine.spell_book()
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Installs the outbound replicator. Only the first call wins.
    pub fn set_replicator(&self, replicator: Arc<dyn Replicator>) -> bool {
        self.replicator.set(replicator).is_ok()
    }

    pub fn replicator(&self) -> Option<&Arc<dyn Replicator>> {
        self.replicator.get()
    }

    /// Adds a fresh player at the spawn point. An existing player is returned unchanged.
    pub fn join_player(&self, player_id: &str) -> PlayerState {
        if let Some(existing) = self.store.get_player(player_id) {
            return existing;
        }

        let player = PlayerState::new(player_id, SPAWN_POINT, &self.player_tuning);
        self.insert_player(player.clone());
        info!(player_id, "player joined arena");
        player
    }

    // Inserts a new player; an evicted player takes its cooldowns with it.
    fn insert_player(&self, player: PlayerState) {
        if let Some(evicted) = self.store.upsert_player(player) {
            warn!(player_id = %evicted.id, "player evicted at capacity");
            self.engine.cooldowns().forget_player(&evicted.id);
        }
    }

    pub fn leave_player(&self, player_id: &str) -> Option<PlayerState> {
        let removed = self.store.remove_player(player_id);
        self.engine.cooldowns().forget_player(player_id);
        if removed.is_some() {
            info!(player_id, "player left arena");
        }
        removed
    }

    /// Stores a steering input. Returns false for unknown players or non-finite input.
    pub fn movement_input(&self, player_id: &str, direction: Vec2) -> bool {
        self.store
            .update_player(player_id, |player| player.steer(direction))
            .unwrap_or(false)
    }

    /// Resolves a cast request, records its event and forwards it to the replicator.
    pub fn cast(
        &self,
        caster_id: &str,
        spell_name: &str,
        target: Option<Vec3>,
    ) -> Result<CastReport, CastRejection> {
        let now = self.clock.now_millis();
        let resolution = self
            .engine
            .resolve(&self.store, caster_id, spell_name, target, now)
            .inspect_err(|rejection| {
                debug!(caster_id, spell = spell_name, %rejection, "cast rejected");
            })?;

        let projectile_slot = resolution
            .spell
            .launches_projectile()
            .then(|| self.launch_projectile(caster_id, &resolution));

        let event = SpellEvent {
            caster_id: caster_id.to_string(),
            spell_name: resolution.spell.name.clone(),
            target: resolution.target,
            timestamp: now,
        };
        self.store.append_spell_event(event.clone());
        if let Some(replicator) = self.replicator.get() {
            replicator.replicate_spell(&event);
        }

        debug!(
            caster_id,
            spell = %event.spell_name,
            affected = resolution.report.affected.len(),
            "cast resolved"
        );
        for defeated in &resolution.report.defeated {
            info!(player_id = %defeated, by = caster_id, "player defeated");
        }

        Ok(CastReport {
            event,
            mana_after: resolution.mana_after,
            affected: resolution.report.affected,
            defeated: resolution.report.defeated,
            projectile_slot,
        })
    }

    fn launch_projectile(&self, caster_id: &str, resolution: &CastResolution) -> usize {
        let aim = (resolution.target - resolution.caster_position).normalized();
        let direction = if aim == Vec3::ZERO {
            resolution.caster_facing
        } else {
            aim
        };

        let mut pool = self.pool();
        let slot = pool.spawn(ProjectileSpawn {
            kind: &resolution.spell.name,
            owner_id: caster_id,
            position: resolution.caster_position,
            velocity: direction * self.projectile_tuning.speed,
            damage: resolution.spell.base_damage,
            ttl_millis: self.projectile_tuning.ttl_millis,
        });
        self.store.publish_projectiles(pool.active_snapshot());
        slot
    }

    /// One simulation step: player upkeep, then projectile integration.
    pub fn tick(&self, dt: Duration) {
        let now = self.clock.now_millis();
        let dt_secs = dt.as_secs_f32();
        let tuning = self.player_tuning;

        self.store.with_players_mut(|players| {
            for player in players.values_mut() {
                let was_defeated = player.defeated;
                player.tick(dt_secs, now, &tuning);
                if was_defeated && !player.defeated {
                    info!(player_id = %player.id, "player respawned");
                }
            }
        });

        let mut pool = self.pool();
        pool.advance(u64::try_from(dt.as_millis()).unwrap_or(u64::MAX));
        self.store.publish_projectiles(pool.active_snapshot());
    }

    /// Resets a player to full vitals at the spawn point.
    pub fn respawn(&self, player_id: &str) -> bool {
        self.store
            .update_player(player_id, |player| player.respawn(SPAWN_POINT))
            .is_some()
    }

    /// Last-writer-wins merge of a remote player.
    pub fn apply_replica(&self, replica: &PlayerReplica) {
        let updated = self
            .store
            .update_player(&replica.id, |player| player.apply_replica(replica));
        if updated.is_none() {
            self.insert_player(PlayerState::from_replica(replica, &self.player_tuning));
        }
    }

    /// Records a cast resolved by a remote peer and applies its effect to the players this
    /// process owns. Remote-owned players are left alone; their owners resolve the same
    /// event and replicate the result. Returns the owned players the effect reached.
    pub fn apply_remote_spell(&self, event: SpellEvent, owned: &HashSet<String>) -> Vec<String> {
        let spell = self.engine.spell_book().find(&event.spell_name).cloned();
        let hit = match spell {
            Some(spell) => {
                let now = self.clock.now_millis();
                let half_map = self.player_tuning.half_map();
                let Ok(hit) = self.store.try_with_players_mut(|players| {
                    // Resolve against the full local view so target selection matches the
                    // caster's, then keep only the owned players' outcome.
                    let mut view = players.clone();
                    let report =
                        resolve_effect(&spell, &event.caster_id, event.target, &mut view, now, half_map);
                    let hit: Vec<String> = report
                        .affected
                        .into_iter()
                        .filter(|id| owned.contains(id))
                        .collect();
                    for id in &hit {
                        if let Some(player) = view.remove(id) {
                            players.insert(id.clone(), player);
                        }
                    }
                    Ok::<_, Infallible>((hit.clone(), hit))
                });
                hit
            }
            None => {
                debug!(spell = %event.spell_name, "remote cast of unknown spell recorded only");
                Vec::new()
            }
        };

        if !hit.is_empty() {
            info!(caster_id = %event.caster_id, spell = %event.spell_name, affected = ?hit, "remote cast landed");
        }
        self.store.append_spell_event(event);
        hit
    }

    pub fn current_players(&self) -> Vec<PlayerState> {
        self.store.get_all_players()
    }

    pub fn current_projectiles(&self) -> Vec<Projectile> {
        self.store.projectiles()
    }

    pub fn recent_spell_events(&self) -> Vec<SpellEvent> {
        self.store.get_recent_spell_events()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    fn pool(&self) -> MutexGuard<'_, ProjectilePool> {
        self.projectiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
