// Applies state decoded from remote peers to a local room.

use crate::domain::ports::ReplicaSink;
use crate::domain::{PlayerReplica, SpellEvent};
use crate::use_cases::rooms::RoomRegistry;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Merges remote replicas into one room.
///
/// Players owned by this process are never overwritten by remote data, and echoes of
/// their own casts are dropped. A remote player seen for the first time is admitted
/// into the room before its replica is applied.
pub struct RoomReplicaSink {
    registry: Arc<RoomRegistry>,
    room_id: String,
    local_ids: HashSet<String>,
}

impl RoomReplicaSink {
    pub fn new(
        registry: Arc<RoomRegistry>,
        room_id: impl Into<String>,
        local_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            registry,
            room_id: room_id.into(),
            local_ids: local_ids.into_iter().collect(),
        }
    }

    async fn admit(&self, player_id: &str) -> bool {
        if self.registry.is_member(&self.room_id, player_id).await {
            return true;
        }
        match self.registry.join_room(&self.room_id, player_id).await {
            Ok(_) => {
                info!(room_id = %self.room_id, player_id, "remote player admitted");
                true
            }
            Err(e) => {
                debug!(room_id = %self.room_id, player_id, error = %e, "remote player not admitted");
                false
            }
        }
    }
}

#[async_trait]
impl ReplicaSink for RoomReplicaSink {
    async fn apply_players(&self, players: Vec<PlayerReplica>) {
        let Some(room) = self.registry.get_room(&self.room_id).await else {
            debug!(room_id = %self.room_id, "replica for closed room dropped");
            return;
        };

        for replica in players {
            if self.local_ids.contains(&replica.id) {
                continue;
            }
            if self.admit(&replica.id).await {
                room.arena.apply_replica(&replica);
            }
        }
    }

    async fn apply_spells(&self, events: Vec<SpellEvent>) {
        let Some(room) = self.registry.get_room(&self.room_id).await else {
            return;
        };

        for event in events {
            if self.local_ids.contains(&event.caster_id) {
                continue;
            }
            // Casts are only recorded for players the room has accepted.
            if !self.registry.is_member(&self.room_id, &event.caster_id).await {
                debug!(caster_id = %event.caster_id, "spell from unknown caster dropped");
                continue;
            }
            room.arena.apply_remote_spell(event, &self.local_ids);
        }
    }
}
