// Last-cast table used to gate spell cooldowns.

use crate::domain::CastRecord;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One [`CastRecord`] per (player, spell) pair, shared across threads.
#[derive(Debug, Default)]
pub struct CooldownTable {
    records: Mutex<HashMap<(String, String), CastRecord>>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds until `spell_name` is castable again by `player_id`, or `None` if ready.
    ///
    /// A cast exactly `cooldown_millis` after the previous one is allowed.
    pub fn remaining(
        &self,
        player_id: &str,
        spell_name: &str,
        cooldown_millis: u64,
        now: u64,
    ) -> Option<u64> {
        let records = self.lock();
        let record = records.get(&key(player_id, spell_name))?;
        let ready_at = record.timestamp_millis.saturating_add(cooldown_millis);
        (now < ready_at).then(|| ready_at - now)
    }

    /// Arms the cooldown. Timestamps never move backwards for a pair.
    pub fn record(&self, player_id: &str, spell_name: &str, now: u64) {
        let mut records = self.lock();
        let entry = records
            .entry(key(player_id, spell_name))
            .or_insert_with(|| CastRecord {
                player_id: player_id.to_string(),
                spell_name: spell_name.to_string(),
                timestamp_millis: now,
            });
        entry.timestamp_millis = entry.timestamp_millis.max(now);
    }

    pub fn last_cast(&self, player_id: &str, spell_name: &str) -> Option<CastRecord> {
        self.lock().get(&key(player_id, spell_name)).cloned()
    }

    /// Drops every record owned by `player_id`.
    pub fn forget_player(&self, player_id: &str) {
        self.lock().retain(|(owner, _), _| owner != player_id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), CastRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn key(player_id: &str, spell_name: &str) -> (String, String) {
    (player_id.to_string(), spell_name.to_string())
}
