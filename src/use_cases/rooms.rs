// Room orchestration: creates arenas, spawns their world tasks, and tracks membership.

use crate::domain::ports::Clock;
use crate::use_cases::arena::{Arena, ArenaSettings};
use crate::use_cases::game::world_task;
use crate::use_cases::types::{GameEvent, RoomError};
use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shared configuration for spawning room worlds.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Capacity for inbound player input events.
    pub input_channel_capacity: usize,
    /// Capacity for broadcast serialized snapshots.
    pub snapshot_broadcast_capacity: usize,
    /// Fixed tick interval for the game loop.
    pub tick_interval: Duration,
    /// Gameplay settings each new arena starts from.
    pub arena: ArenaSettings,
}

/// Point-in-time view of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: String,
    pub name: String,
    /// Player ids in join order.
    pub members: Vec<String>,
}

/// Per-room channels and the arena they drive.
#[derive(Clone)]
pub struct RoomHandle {
    /// Identifier clients use to target this room.
    pub room_id: Arc<str>,
    pub name: Arc<str>,
    pub arena: Arc<Arena>,
    /// Sender for game events into the room world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    /// Broadcast sender for serialized snapshots.
    pub snapshot_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the latest serialized snapshot.
    pub snapshot_latest_tx: watch::Sender<Utf8Bytes>,
    shutdown_tx: watch::Sender<bool>,
}

impl RoomHandle {
    /// Receiver that flips to true when the room is closed.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

struct RoomEntry {
    handle: RoomHandle,
    created: u64,
    members: Vec<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomEntry {
    fn view(&self) -> Room {
        Room {
            id: self.handle.room_id.to_string(),
            name: self.handle.name.to_string(),
            members: self.members.clone(),
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<String, RoomEntry>,
    // Player id to the room it currently belongs to.
    player_rooms: HashMap<String, String>,
}

/// Thread-safe registry for active rooms.
pub struct RoomRegistry {
    /// Global settings applied to newly created rooms.
    settings: RoomSettings,
    clock: Arc<dyn Clock>,
    next_room: AtomicU64,
    inner: RwLock<RegistryInner>,
}

impl RoomRegistry {
    /// Creates a new registry with the provided settings.
    pub fn new(settings: RoomSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            next_room: AtomicU64::new(1),
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Creates a new room and spawns its world task. A blank name falls back to the id.
    pub async fn create_room(&self, name: &str) -> RoomHandle {
        let seq = self.next_room.fetch_add(1, Ordering::Relaxed);
        let room_id = format!("room-{seq}");
        let name = match name.trim() {
            "" => room_id.clone(),
            trimmed => trimmed.to_string(),
        };

        let arena = Arc::new(Arena::new(self.settings.arena.clone(), self.clock.clone()));

        // Channel wiring for the room world loop.
        let (input_tx, input_rx) = mpsc::channel::<GameEvent>(self.settings.input_channel_capacity);
        let (snapshot_bytes_tx, _snapshot_bytes_rx) =
            broadcast::channel::<Utf8Bytes>(self.settings.snapshot_broadcast_capacity);
        let (snapshot_latest_tx, _snapshot_latest_rx) = watch::channel(Utf8Bytes::from(""));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Spawn the authoritative world loop for this room.
        let world = tokio::spawn(world_task(
            arena.clone(),
            input_rx,
            self.settings.tick_interval,
            shutdown_rx,
        ));

        let handle = RoomHandle {
            room_id: Arc::from(room_id.as_str()),
            name: Arc::from(name.as_str()),
            arena,
            input_tx,
            snapshot_bytes_tx,
            snapshot_latest_tx,
            shutdown_tx,
        };

        let mut inner = self.inner.write().await;
        inner.rooms.insert(
            room_id.clone(),
            RoomEntry {
                handle: handle.clone(),
                created: seq,
                members: Vec::new(),
                tasks: vec![world],
            },
        );
        info!(%room_id, %name, "room created");
        handle
    }

    /// Adds `player_id` to a room and its arena.
    ///
    /// Rejoining the current room is a no-op; joining another room requires leaving first.
    /// A failed join leaves the registry unchanged.
    pub async fn join_room(&self, room_id: &str, player_id: &str) -> Result<RoomHandle, RoomError> {
        let mut inner = self.inner.write().await;
        if !inner.rooms.contains_key(room_id) {
            return Err(RoomError::NotFound(room_id.to_string()));
        }
        match inner.player_rooms.get(player_id).cloned() {
            Some(current) if current != room_id => {
                return Err(RoomError::AlreadyInRoom { current });
            }
            Some(_) => {}
            None => {
                inner
                    .player_rooms
                    .insert(player_id.to_string(), room_id.to_string());
            }
        }

        let entry = inner
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        if !entry.members.iter().any(|m| m == player_id) {
            entry.members.push(player_id.to_string());
            info!(room_id, player_id, "player joined room");
        }
        entry.handle.arena.join_player(player_id);
        Ok(entry.handle.clone())
    }

    /// Removes `player_id` from its room and that room's arena. The room is closed,
    /// and its tasks awaited, once the last member leaves.
    pub async fn leave_room(&self, player_id: &str) -> Option<Room> {
        let closed = {
            let mut inner = self.inner.write().await;
            let room_id = inner.player_rooms.remove(player_id)?;
            let entry = inner.rooms.get_mut(&room_id)?;
            entry.members.retain(|m| m != player_id);
            entry.handle.arena.leave_player(player_id);
            info!(%room_id, player_id, "player left room");

            if entry.members.is_empty() {
                inner.rooms.remove(&room_id)
            } else {
                None
            }
        };

        let entry = closed?;
        let room = entry.view();
        close_entry(entry).await;
        Some(room)
    }

    /// Rooms in creation order.
    pub async fn list_rooms(&self) -> Vec<Room> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&RoomEntry> = inner.rooms.values().collect();
        entries.sort_by_key(|entry| entry.created);
        entries.into_iter().map(RoomEntry::view).collect()
    }

    /// Returns a room handle for the provided id, if it exists.
    pub async fn get_room(&self, room_id: &str) -> Option<RoomHandle> {
        let inner = self.inner.read().await;
        inner.rooms.get(room_id).map(|entry| entry.handle.clone())
    }

    pub async fn room_info(&self, room_id: &str) -> Option<Room> {
        let inner = self.inner.read().await;
        inner.rooms.get(room_id).map(RoomEntry::view)
    }

    /// Id of the room `player_id` is currently in.
    pub async fn room_of(&self, player_id: &str) -> Option<String> {
        let inner = self.inner.read().await;
        inner.player_rooms.get(player_id).cloned()
    }

    pub async fn is_member(&self, room_id: &str, player_id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.player_rooms.get(player_id).map(String::as_str) == Some(room_id)
    }

    /// Ties a background task to a room so closing the room awaits it.
    /// Returns false when the room is already gone.
    pub async fn attach_task(&self, room_id: &str, task: JoinHandle<()>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.rooms.get_mut(room_id) {
            Some(entry) => {
                entry.tasks.push(task);
                true
            }
            None => false,
        }
    }

    /// Closes every room and waits for their tasks.
    pub async fn shutdown(&self) {
        let entries: Vec<RoomEntry> = {
            let mut inner = self.inner.write().await;
            inner.player_rooms.clear();
            inner.rooms.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            close_entry(entry).await;
        }
    }
}

async fn close_entry(entry: RoomEntry) {
    let _ = entry.handle.shutdown_tx.send(true);
    for task in entry.tasks {
        if let Err(e) = task.await {
            warn!(room_id = %entry.handle.room_id, error = %e, "room task failed");
        }
    }
    info!(room_id = %entry.handle.room_id, "room closed");
}
