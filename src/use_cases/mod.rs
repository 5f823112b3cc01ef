// Use cases layer: application workflows for the arena.

pub mod abilities;
pub mod arena;
pub mod cooldowns;
pub mod game;
pub mod peer;
pub mod replication;
pub mod rooms;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use arena::{Arena, ArenaSettings};
pub use peer::LocalPeer;
pub use replication::RoomReplicaSink;
pub use rooms::{Room, RoomHandle, RoomRegistry, RoomSettings};
pub use store::{StateStore, StoreLimits, StoreSnapshot};
pub use types::{CastRejection, CastReport, GameEvent, RoomError};
