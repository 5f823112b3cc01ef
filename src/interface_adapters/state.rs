use crate::interface_adapters::sessions::SessionRegistry;
use crate::use_cases::RoomRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Rooms and the arenas they own.
    pub room_registry: Arc<RoomRegistry>,
    // Live WebSocket sessions, one per player id.
    pub sessions: Arc<SessionRegistry>,
}
