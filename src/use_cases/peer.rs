// Handle given to the local collaborators of one peer (voice/UI casting, joystick input,
// rendering). Calls run on the caller's thread against the room's arena.

use crate::domain::{PlayerState, Projectile, SpellEvent, Vec2, Vec3};
use crate::use_cases::rooms::{RoomHandle, RoomRegistry};
use crate::use_cases::types::{CastRejection, CastReport, RoomError};

#[derive(Clone)]
pub struct LocalPeer {
    player_id: String,
    room: RoomHandle,
}

impl LocalPeer {
    /// Joins `room_id` as `player_id` and returns the handle for that player.
    pub async fn join(
        registry: &RoomRegistry,
        room_id: &str,
        player_id: &str,
    ) -> Result<Self, RoomError> {
        let room = registry.join_room(room_id, player_id).await?;
        Ok(Self {
            player_id: player_id.to_string(),
            room,
        })
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    /// Casts by name (the recognized voice keyword), aiming ahead of the player.
    pub fn cast_request(&self, spell_name: &str) -> Result<CastReport, CastRejection> {
        self.room.arena.cast(&self.player_id, spell_name, None)
    }

    pub fn cast_at(&self, spell_name: &str, target: Vec3) -> Result<CastReport, CastRejection> {
        self.room.arena.cast(&self.player_id, spell_name, Some(target))
    }

    pub fn movement_input(&self, direction: Vec2) -> bool {
        self.room.arena.movement_input(&self.player_id, direction)
    }

    /// Puts the local player back at the spawn point with full stats.
    pub fn respawn(&self) -> bool {
        self.room.arena.respawn(&self.player_id)
    }

    /// Hands this peer's own player to the replicator, if one is installed.
    pub fn publish_state(&self) -> bool {
        let Some(replicator) = self.room.arena.replicator() else {
            return false;
        };
        let Some(player) = self.room.arena.store().get_player(&self.player_id) else {
            return false;
        };
        replicator.replicate_players(std::slice::from_ref(&player));
        true
    }

    pub fn current_players(&self) -> Vec<PlayerState> {
        self.room.arena.current_players()
    }

    pub fn current_projectiles(&self) -> Vec<Projectile> {
        self.room.arena.current_projectiles()
    }

    pub fn recent_spell_events(&self) -> Vec<SpellEvent> {
        self.room.arena.recent_spell_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::arena::ArenaSettings;
    use crate::use_cases::rooms::RoomSettings;
    use crate::use_cases::test_support::{ManualClock, RecordingReplicator};
    use std::sync::Arc;
    use std::time::Duration;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(
            RoomSettings {
                input_channel_capacity: 16,
                snapshot_broadcast_capacity: 16,
                tick_interval: Duration::from_millis(5),
                arena: ArenaSettings::default(),
            },
            ManualClock::at(0),
        )
    }

    #[tokio::test]
    async fn when_voice_keyword_is_cast_then_spell_resolves_for_local_player() {
        let registry = registry();
        let room = registry.create_room("lan").await;
        let peer = LocalPeer::join(&registry, &room.room_id, "me")
            .await
            .expect("join succeeds");

        let report = peer.cast_request(" FREEZE ").expect("cast succeeds");

        assert_eq!(report.event.spell_name, "Freeze");
        assert_eq!(report.mana_after, 75);
        assert_eq!(peer.recent_spell_events().len(), 1);
    }

    #[tokio::test]
    async fn when_joining_missing_room_then_peer_is_not_created() {
        let registry = registry();

        let result = LocalPeer::join(&registry, "room-9", "me").await;

        assert!(matches!(result, Err(RoomError::NotFound(_))));
    }

    #[tokio::test]
    async fn when_replicator_is_installed_then_publish_sends_only_own_player() {
        let registry = registry();
        let room = registry.create_room("lan").await;
        let peer = LocalPeer::join(&registry, &room.room_id, "me")
            .await
            .expect("join succeeds");
        room.arena.join_player("someone-else");

        assert!(!peer.publish_state());
        let replicator = Arc::new(RecordingReplicator::default());
        room.arena.set_replicator(replicator.clone());

        assert!(peer.publish_state());
        let sent = replicator.players.lock().expect("players mutex poisoned");
        assert_eq!(sent.as_slice(), &[vec!["me".to_string()]]);
    }

    #[tokio::test]
    async fn when_local_player_respawns_then_stats_and_position_are_reset() {
        let registry = registry();
        let room = registry.create_room("lan").await;
        let peer = LocalPeer::join(&registry, &room.room_id, "me")
            .await
            .expect("join succeeds");
        peer.cast_request("Freeze").expect("cast succeeds");
        assert!(peer.movement_input(Vec2::new(1.0, 0.0)));

        assert!(peer.respawn());

        let me = room.arena.store().get_player("me").expect("player exists");
        assert_eq!(me.mana, me.max_mana);
        assert_eq!(me.hp, me.max_hp);
        assert!(!me.defeated);
        assert_eq!(me.steering, Vec2::ZERO);
    }
}
