// Replicated state store: players, recent spell events, and the latest projectile snapshot.
//
// All access goes through short internal critical sections, so listener tasks, the world
// task and readers can share one `Arc<StateStore>` without locking on their side. Every
// mutation bumps a revision that snapshot serializers watch.

use crate::domain::{PlayerState, Projectile, SpellEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

pub const DEFAULT_PLAYER_CAPACITY: usize = 100;
pub const DEFAULT_SPELL_EVENT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    /// Players kept before the least recently written one is evicted.
    pub player_capacity: usize,
    /// Spell events kept for late joiners; oldest dropped first.
    pub spell_event_capacity: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            player_capacity: DEFAULT_PLAYER_CAPACITY,
            spell_event_capacity: DEFAULT_SPELL_EVENT_CAPACITY,
        }
    }
}

/// Consistent point-in-time copy of the replicated state.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub players: Vec<PlayerState>,
    pub projectiles: Vec<Projectile>,
}

#[derive(Debug, Default)]
struct StoreInner {
    players: HashMap<String, PlayerState>,
    // Write sequence per player; the smallest is the eviction candidate.
    last_written: HashMap<String, u64>,
    write_seq: u64,
    spell_events: VecDeque<SpellEvent>,
    projectiles: Vec<Projectile>,
}

impl StoreInner {
    fn touch(&mut self, id: &str) {
        self.write_seq += 1;
        self.last_written.insert(id.to_string(), self.write_seq);
    }

    // Evicts least recently written players until the map fits, never evicting `keep`.
    fn enforce_capacity(&mut self, capacity: usize, keep: Option<&str>) -> Vec<PlayerState> {
        let mut evicted = Vec::new();
        while self.players.len() > capacity {
            let candidate = self
                .players
                .keys()
                .filter(|id| Some(id.as_str()) != keep)
                .min_by_key(|id| self.last_written.get(*id).copied().unwrap_or(0))
                .cloned();
            let Some(id) = candidate else {
                break;
            };
            self.last_written.remove(&id);
            if let Some(player) = self.players.remove(&id) {
                evicted.push(player);
            }
        }
        evicted
    }
}

#[derive(Debug)]
pub struct StateStore {
    limits: StoreLimits,
    inner: RwLock<StoreInner>,
    revision_tx: watch::Sender<u64>,
}

impl StateStore {
    pub fn new(limits: StoreLimits) -> Self {
        let (revision_tx, _revision_rx) = watch::channel(0);
        Self {
            limits,
            inner: RwLock::new(StoreInner::default()),
            revision_tx,
        }
    }

    /// Inserts or replaces a player. Returns the player evicted to stay under capacity.
    pub fn upsert_player(&self, state: PlayerState) -> Option<PlayerState> {
        let evicted = {
            let mut inner = self.write();
            let id = state.id.clone();
            inner.touch(&id);
            inner.players.insert(id.clone(), state);
            inner.enforce_capacity(self.limits.player_capacity, Some(&id))
        };
        self.bump();
        evicted.into_iter().next()
    }

    /// Mutates one player in place. Returns `None` if the player is unknown.
    pub fn update_player<R>(&self, id: &str, f: impl FnOnce(&mut PlayerState) -> R) -> Option<R> {
        let result = {
            let mut inner = self.write();
            let result = inner.players.get_mut(id).map(f);
            if result.is_some() {
                inner.touch(id);
            }
            result
        };
        if result.is_some() {
            self.bump();
        }
        result
    }

    /// Runs `f` over the whole player table inside one critical section.
    pub fn with_players_mut<R>(&self, f: impl FnOnce(&mut HashMap<String, PlayerState>) -> R) -> R {
        let result = {
            let mut inner = self.write();
            let result = f(&mut inner.players);
            let StoreInner {
                players,
                last_written,
                ..
            } = &mut *inner;
            last_written.retain(|id, _| players.contains_key(id));
            inner.enforce_capacity(self.limits.player_capacity, None);
            result
        };
        self.bump();
        result
    }

    /// Like [`Self::with_players_mut`], but `f` must leave the table untouched when it
    /// returns `Err`. On success `f` also names the players it wrote; they become the
    /// most recently written, and the revision advances.
    pub fn try_with_players_mut<T, E>(
        &self,
        f: impl FnOnce(&mut HashMap<String, PlayerState>) -> Result<(T, Vec<String>), E>,
    ) -> Result<T, E> {
        let result = {
            let mut inner = self.write();
            f(&mut inner.players).map(|(value, written)| {
                for id in &written {
                    if inner.players.contains_key(id) {
                        inner.touch(id);
                    }
                }
                value
            })
        };
        if result.is_ok() {
            self.bump();
        }
        result
    }

    pub fn remove_player(&self, id: &str) -> Option<PlayerState> {
        let removed = {
            let mut inner = self.write();
            inner.last_written.remove(id);
            inner.players.remove(id)
        };
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    pub fn get_player(&self, id: &str) -> Option<PlayerState> {
        self.read().players.get(id).cloned()
    }

    pub fn contains_player(&self, id: &str) -> bool {
        self.read().players.contains_key(id)
    }

    pub fn player_count(&self) -> usize {
        self.read().players.len()
    }

    /// Snapshot of every player, ordered by id.
    pub fn get_all_players(&self) -> Vec<PlayerState> {
        let mut players: Vec<PlayerState> = self.read().players.values().cloned().collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        players
    }

    pub fn append_spell_event(&self, event: SpellEvent) {
        {
            let mut inner = self.write();
            inner.spell_events.push_back(event);
            while inner.spell_events.len() > self.limits.spell_event_capacity {
                inner.spell_events.pop_front();
            }
        }
        self.bump();
    }

    /// Recent spell events, oldest first.
    pub fn get_recent_spell_events(&self) -> Vec<SpellEvent> {
        self.read().spell_events.iter().cloned().collect()
    }

    pub fn clear_spell_events(&self) {
        self.write().spell_events.clear();
        self.bump();
    }

    /// Replaces the projectile snapshot written by the world task.
    pub fn publish_projectiles(&self, projectiles: Vec<Projectile>) {
        let changed = {
            let mut inner = self.write();
            let changed = !(inner.projectiles.is_empty() && projectiles.is_empty());
            inner.projectiles = projectiles;
            changed
        };
        if changed {
            self.bump();
        }
    }

    pub fn projectiles(&self) -> Vec<Projectile> {
        self.read().projectiles.clone()
    }

    /// Players and projectiles read under a single lock.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.read();
        let mut players: Vec<PlayerState> = inner.players.values().cloned().collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        StoreSnapshot {
            players,
            projectiles: inner.projectiles.clone(),
        }
    }

    /// Receiver that changes whenever the store is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision_tx.borrow()
    }

    fn bump(&self) {
        self.revision_tx.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    // A panicking writer cannot leave the maps structurally invalid, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Vec3;
    use crate::domain::tuning::PlayerTuning;
    use std::sync::Arc;

    fn player(id: &str) -> PlayerState {
        PlayerState::new(id, Vec3::ZERO, &PlayerTuning::default())
    }

    fn event(n: u64) -> SpellEvent {
        SpellEvent {
            caster_id: "p1".to_string(),
            spell_name: "Fireball".to_string(),
            target: Vec3::ZERO,
            timestamp: n,
        }
    }

    #[test]
    fn when_capacity_is_exceeded_then_least_recently_written_player_is_evicted() {
        let store = StateStore::new(StoreLimits {
            player_capacity: 3,
            spell_event_capacity: 50,
        });
        store.upsert_player(player("a"));
        store.upsert_player(player("b"));
        store.upsert_player(player("c"));
        // Writing "a" again makes "b" the oldest.
        store.update_player("a", |p| p.hp -= 1);

        let evicted = store.upsert_player(player("d"));

        assert_eq!(evicted.map(|p| p.id), Some("b".to_string()));
        assert_eq!(store.player_count(), 3);
        assert!(store.contains_player("a"));
        assert!(store.contains_player("d"));
    }

    #[test]
    fn when_table_write_names_players_then_they_become_most_recent() {
        let store = StateStore::new(StoreLimits {
            player_capacity: 2,
            spell_event_capacity: 50,
        });
        store.upsert_player(player("a"));
        store.upsert_player(player("b"));

        let rejected: Result<(), &str> = store.try_with_players_mut(|_| Err("no"));
        assert!(rejected.is_err());
        store
            .try_with_players_mut(|players| {
                if let Some(a) = players.get_mut("a") {
                    a.mana -= 10;
                }
                Ok::<_, ()>(((), vec!["a".to_string(), "ghost".to_string()]))
            })
            .expect("write succeeds");

        let evicted = store.upsert_player(player("c"));

        assert_eq!(evicted.map(|p| p.id), Some("b".to_string()));
        assert!(store.contains_player("a"));
    }

    #[test]
    fn when_upserting_existing_player_then_count_is_unchanged() {
        let store = StateStore::default();
        store.upsert_player(player("a"));

        let mut replacement = player("a");
        replacement.hp = 42;
        let evicted = store.upsert_player(replacement);

        assert!(evicted.is_none());
        assert_eq!(store.player_count(), 1);
        assert_eq!(store.get_player("a").map(|p| p.hp), Some(42));
    }

    #[test]
    fn when_more_than_capacity_events_are_appended_then_oldest_are_dropped() {
        let store = StateStore::default();

        for n in 0..120 {
            store.append_spell_event(event(n));
        }

        let events = store.get_recent_spell_events();
        assert_eq!(events.len(), DEFAULT_SPELL_EVENT_CAPACITY);
        assert_eq!(events.first().map(|e| e.timestamp), Some(70));
        assert_eq!(events.last().map(|e| e.timestamp), Some(119));
    }

    #[test]
    fn when_clearing_spell_events_then_buffer_is_empty() {
        let store = StateStore::default();
        store.append_spell_event(event(1));

        store.clear_spell_events();

        assert!(store.get_recent_spell_events().is_empty());
    }

    #[test]
    fn when_store_mutates_then_revision_advances() {
        let store = StateStore::default();
        let rx = store.subscribe();
        let before = *rx.borrow();

        store.upsert_player(player("a"));
        store.remove_player("a");

        assert_eq!(store.revision(), before + 2);
        assert!(rx.has_changed().unwrap_or(false));
    }

    #[test]
    fn when_unknown_player_is_updated_then_nothing_changes() {
        let store = StateStore::default();
        let before = store.revision();

        assert!(store.update_player("ghost", |p| p.hp = 0).is_none());
        assert_eq!(store.revision(), before);
    }

    #[test]
    fn when_empty_projectile_list_is_republished_then_revision_is_stable() {
        let store = StateStore::default();
        let before = store.revision();

        store.publish_projectiles(Vec::new());

        assert_eq!(store.revision(), before);
    }

    #[test]
    fn when_many_threads_write_concurrently_then_every_write_lands() {
        let store = Arc::new(StateStore::default());

        std::thread::scope(|scope| {
            for t in 0..4 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for i in 0..20 {
                        store.upsert_player(player(&format!("t{t}-p{i}")));
                        store.append_spell_event(event(i));
                        let _ = store.get_all_players();
                    }
                });
            }
        });

        assert_eq!(store.player_count(), 80);
        assert_eq!(store.get_recent_spell_events().len(), 50);
    }
}
