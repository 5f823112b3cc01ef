use std::{env, net::IpAddr, time::Duration};

// Runtime/server constants (not gameplay tuning).

/// Which transports the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Session,
    Broadcast,
    Both,
}

impl TransportMode {
    pub fn runs_session(self) -> bool {
        matches!(self, TransportMode::Session | TransportMode::Both)
    }

    pub fn runs_broadcast(self) -> bool {
        matches!(self, TransportMode::Broadcast | TransportMode::Both)
    }
}

fn parse_transport_mode(value: &str) -> Option<TransportMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "session" => Some(TransportMode::Session),
        "broadcast" => Some(TransportMode::Broadcast),
        "both" => Some(TransportMode::Both),
        _ => None,
    }
}

pub fn transport_mode() -> TransportMode {
    match env::var("ARENA_TRANSPORT") {
        Ok(value) => parse_transport_mode(&value).unwrap_or_else(|| {
            tracing::warn!(value = %value, "unknown ARENA_TRANSPORT; using session");
            TransportMode::Session
        }),
        Err(_) => TransportMode::Session,
    }
}

pub fn http_port() -> u16 {
    env::var("ARENA_HTTP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
}

pub fn udp_port() -> u16 {
    env::var("ARENA_UDP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(55555)
}

pub fn broadcast_addr() -> IpAddr {
    env::var("ARENA_BROADCAST_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([255, 255, 255, 255]))
}

pub fn room_name() -> String {
    env::var("ARENA_ROOM_NAME")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "Arena".to_string())
}

/// Explicit local player id for a broadcast peer, if configured.
pub fn local_player_id() -> Option<String> {
    env::var("ARENA_PLAYER_ID")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const SNAPSHOT_BROADCAST_CAPACITY: usize = 128;

pub const TICK_INTERVAL: Duration = Duration::from_millis(16);
// Minimum spacing between two broadcast sends of the same kind.
pub const SEND_INTERVAL: Duration = Duration::from_millis(30);

pub const PLAYER_CAPACITY: usize = 100;
pub const SPELL_EVENT_CAPACITY: usize = 50;
