// Live WebSocket sessions keyed by player id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug)]
struct SessionEntry {
    // Identifies the connection that currently owns the player id.
    token: u64,
    room_id: Arc<str>,
    // Signalled when a newer connection takes over.
    kick: Arc<Notify>,
}

/// Result of claiming a player id for a new connection.
#[derive(Debug)]
pub struct SessionClaim {
    /// Fires when this connection is replaced in turn.
    pub kick: Arc<Notify>,
    /// Whether an earlier connection was kicked to make room.
    pub displaced: bool,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `token` the owner of `player_id`, kicking any previous connection.
    pub fn register_or_replace(&self, player_id: &str, room_id: Arc<str>, token: u64) -> SessionClaim {
        let kick = Arc::new(Notify::new());
        let previous = self.lock().insert(
            player_id.to_string(),
            SessionEntry {
                token,
                room_id,
                kick: kick.clone(),
            },
        );
        let displaced = match previous {
            Some(previous) => {
                // notify_one keeps a permit, so a connection that is not yet waiting still sees it.
                previous.kick.notify_one();
                true
            }
            None => false,
        };
        SessionClaim { kick, displaced }
    }

    /// Removes the entry only if `token` still owns it. Returns true when removed.
    pub fn unregister_if_owner(&self, player_id: &str, token: u64) -> bool {
        let mut sessions = self.lock();
        match sessions.get(player_id) {
            Some(entry) if entry.token == token => {
                sessions.remove(player_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_live(&self, player_id: &str) -> bool {
        self.lock().contains_key(player_id)
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
