use crate::interface_adapters::http::json_error;
use crate::interface_adapters::net::session::spawn_room_serializer;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{Room, RoomHandle, RoomRegistry};

use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

const MAX_ROOM_NAME_LEN: usize = 64;

#[derive(Debug, Default, serde::Deserialize)]
struct CreateRoomRequest {
    // Display name; the room id is used when omitted.
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct RoomDto {
    pub id: String,
    pub name: String,
    pub members: Vec<String>,
}

impl From<Room> for RoomDto {
    fn from(room: Room) -> Self {
        Self {
            id: room.id,
            name: room.name,
            members: room.members,
        }
    }
}

/// Creates a room and the serializer that feeds its sessions.
pub async fn open_room(registry: &RoomRegistry, name: &str) -> RoomHandle {
    let room = registry.create_room(name).await;
    let serializer = spawn_room_serializer(&room);
    if !registry.attach_task(&room.room_id, serializer).await {
        // Only possible if the registry shut down in between; the serializer sees the signal.
        warn!(room_id = %room.room_id, "room closed before serializer was attached");
    }
    room
}

pub async fn create_room_handler(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    // An empty body is allowed and means "no name".
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateRoomRequest::default()
    } else {
        match serde_json::from_slice::<CreateRoomRequest>(&body) {
            Ok(request) => request,
            Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid room request"),
        }
    };

    let name = request.name.unwrap_or_default();
    if name.trim().len() > MAX_ROOM_NAME_LEN {
        return json_error(StatusCode::BAD_REQUEST, "room name too long");
    }

    let room = open_room(&state.room_registry, &name).await;
    let created = RoomDto {
        id: room.room_id.to_string(),
        name: room.name.to_string(),
        members: Vec::new(),
    };
    (StatusCode::CREATED, Json(created)).into_response()
}

pub async fn list_rooms_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rooms: Vec<RoomDto> = state
        .room_registry
        .list_rooms()
        .await
        .into_iter()
        .map(RoomDto::from)
        .collect();
    Json(rooms)
}

pub async fn get_room_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    match state.room_registry.room_info(&room_id).await {
        Some(room) => Json(RoomDto::from(room)).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "room not found"),
    }
}
