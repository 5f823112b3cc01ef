// Replication records exchanged between peers and kept for late joiners.

use crate::domain::geometry::Vec3;

/// A resolved cast, kept in the recent-events ring buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SpellEvent {
    pub caster_id: String,
    pub spell_name: String,
    pub target: Vec3,
    /// Clock milliseconds when the cast resolved (0 when unknown, e.g. from older peers).
    pub timestamp: u64,
}

/// Last successful cast of one spell by one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastRecord {
    pub player_id: String,
    pub spell_name: String,
    pub timestamp_millis: u64,
}

/// The subset of a player that travels over the broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerReplica {
    pub id: String,
    pub position: Vec3,
    pub hp: i32,
    pub mana: i32,
}
