use async_trait::async_trait;

use crate::domain::events::{PlayerReplica, SpellEvent};
use crate::domain::player::PlayerState;

// Port for retrieving the current time in milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

// Port for pushing locally produced state out to remote peers. Best effort: implementations
// may drop anything and must never block the caller.
pub trait Replicator: Send + Sync {
    fn replicate_players(&self, players: &[PlayerState]);
    fn replicate_spell(&self, event: &SpellEvent);
}

// Port for state decoded from remote peers.
#[async_trait]
pub trait ReplicaSink: Send + Sync {
    async fn apply_players(&self, players: Vec<PlayerReplica>);
    async fn apply_spells(&self, events: Vec<SpellEvent>);
}
