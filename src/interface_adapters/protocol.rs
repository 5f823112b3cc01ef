// Wire protocol DTOs and conversions for session-mode (WebSocket) messages.
// The broadcast datagram format lives in `wire`.

use crate::domain::{PlayerState, Projectile, SpellEvent, Vec2, Vec3};
use crate::use_cases::StoreSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Identity assigned to the connection once it joined its room.
    Identity(IdentityDto),
    // Full snapshot of the room, pushed after every state change.
    GameStateUpdate(GameStateUpdateDto),
    // Recent casts, sent once so late joiners can catch up.
    SpellEvents(Vec<SpellEventDto>),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    UpdatePosition(UpdatePositionDto),
    SpellCastRequest(SpellCastRequestDto),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDto {
    pub player_id: String,
    pub room_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VelocityDto {
    pub x: f32,
    pub y: f32,
}

impl From<VelocityDto> for Vec2 {
    fn from(v: VelocityDto) -> Self {
        Vec2::new(v.x, v.y)
    }
}

/// Movement input. `player_id` is informational; the session's own identity is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePositionDto {
    #[serde(default)]
    pub player_id: Option<String>,
    pub velocity: VelocityDto,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TargetDto {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl From<TargetDto> for Vec3 {
    fn from(t: TargetDto) -> Self {
        Vec3::new(t.x, t.y, t.z)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellCastRequestDto {
    pub spell_name: String,
    /// When absent the cast aims ahead of the player.
    #[serde(default)]
    pub target: Option<TargetDto>,
}

/// Snapshot of a room sent to clients.
#[derive(Debug, Clone, Serialize)]
pub struct GameStateUpdateDto {
    pub players: BTreeMap<String, PlayerStateDto>,
    pub projectiles: Vec<ProjectileDto>,
}

impl From<&StoreSnapshot> for GameStateUpdateDto {
    fn from(snapshot: &StoreSnapshot) -> Self {
        Self {
            players: snapshot
                .players
                .iter()
                .map(|p| (p.id.clone(), PlayerStateDto::from(p)))
                .collect(),
            projectiles: snapshot.projectiles.iter().map(ProjectileDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateDto {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub facing_angle: f32,
    pub hp: i32,
}

impl From<&PlayerState> for PlayerStateDto {
    fn from(player: &PlayerState) -> Self {
        Self {
            id: player.id.clone(),
            x: player.position.x,
            y: player.position.y,
            facing_angle: player.facing,
            hp: player.hp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileDto {
    /// Spawn serial; differs between successive occupants of one pool slot.
    pub id: u64,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&Projectile> for ProjectileDto {
    fn from(projectile: &Projectile) -> Self {
        Self {
            id: projectile.serial,
            x: projectile.position.x,
            y: projectile.position.y,
            kind: projectile.kind.clone(),
        }
    }
}

/// Spell event shape shared by both transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellEventDto {
    pub caster_id: String,
    pub spell_name: String,
    pub target_x: f32,
    pub target_y: f32,
    pub target_z: f32,
    #[serde(default)]
    pub timestamp: u64,
}

impl From<&SpellEvent> for SpellEventDto {
    fn from(event: &SpellEvent) -> Self {
        Self {
            caster_id: event.caster_id.clone(),
            spell_name: event.spell_name.clone(),
            target_x: event.target.x,
            target_y: event.target.y,
            target_z: event.target.z,
            timestamp: event.timestamp,
        }
    }
}

impl From<SpellEventDto> for SpellEvent {
    fn from(dto: SpellEventDto) -> Self {
        Self {
            caster_id: dto.caster_id,
            spell_name: dto.spell_name,
            target: Vec3::new(dto.target_x, dto.target_y, dto.target_z),
            timestamp: dto.timestamp,
        }
    }
}
