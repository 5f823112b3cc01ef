use crate::domain::{Vec2, Vec3};
use crate::interface_adapters::http::json_error;
use crate::interface_adapters::protocol::{
    ClientMessage, GameStateUpdateDto, IdentityDto, ServerMessage, SpellEventDto,
};
use crate::interface_adapters::sessions::SessionRegistry;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::{player_id as generated_player_id, rand_id};
use crate::use_cases::{Arena, GameEvent, RoomError, RoomHandle, RoomRegistry};

use axum::{
    Error,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    #[allow(dead_code)]
    Join(RoomError),
    RoomClosed,
    InputClosed,
    SnapshotsClosed,
}

#[derive(Debug, serde::Deserialize)]
pub struct SessionQuery {
    // The room the client wants to join.
    #[serde(default)]
    room_id: Option<String>,
    // Stable player id; generated when omitted.
    #[serde(default)]
    player_id: Option<String>,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_PLAYER_ID_LEN: usize = 64;
const MAX_SPELL_NAME_LEN: usize = 64;

/// Serializes a room snapshot once per store change and fans the bytes out to sessions.
pub async fn snapshot_serializer(
    arena: Arc<Arena>,
    mut revision_rx: watch::Receiver<u64>,
    snapshot_bytes_tx: broadcast::Sender<Utf8Bytes>,
    snapshot_latest_tx: watch::Sender<Utf8Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            changed = revision_rx.changed() => {
                if changed.is_err() {
                    warn!("store revisions closed; serializer exiting");
                    break;
                }
                let Some(bytes) = encode_snapshot(&arena) else {
                    continue;
                };
                // Lagging sessions resync from the latest bytes.
                let _ = snapshot_latest_tx.send(bytes.clone());
                let _ = snapshot_bytes_tx.send(bytes);
            }
        }
    }
    debug!("snapshot serializer exiting");
}

fn encode_snapshot(arena: &Arena) -> Option<Utf8Bytes> {
    let msg = ServerMessage::GameStateUpdate(GameStateUpdateDto::from(&arena.snapshot()));
    match serde_json::to_string(&msg) {
        Ok(txt) => Some(Utf8Bytes::from(txt)),
        Err(e) => {
            error!(error = ?e, "failed to serialize snapshot");
            None
        }
    }
}

pub fn spawn_room_serializer(room: &RoomHandle) -> JoinHandle<()> {
    tokio::spawn(snapshot_serializer(
        room.arena.clone(),
        room.arena.store().subscribe(),
        room.snapshot_bytes_tx.clone(),
        room.snapshot_latest_tx.clone(),
        room.shutdown_signal(),
    ))
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    let Some(room_id) = query.room_id.filter(|id| !id.trim().is_empty()) else {
        return json_error(StatusCode::BAD_REQUEST, "room_id is required");
    };

    let room = match state.room_registry.get_room(room_id.trim()).await {
        Some(room) => room,
        None => return json_error(StatusCode::NOT_FOUND, "room not found"),
    };

    let player_id = match query.player_id.as_deref().map(str::trim) {
        None | Some("") => generated_player_id(),
        Some(id) if id.len() <= MAX_PLAYER_ID_LEN => id.to_string(),
        Some(_) => return json_error(StatusCode::BAD_REQUEST, "player_id too long"),
    };

    let registry = state.room_registry.clone();
    let sessions = state.sessions.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, room, registry, sessions, player_id))
}

async fn handle_socket(
    mut socket: WebSocket,
    room: RoomHandle,
    registry: Arc<RoomRegistry>,
    sessions: Arc<SessionRegistry>,
    player_id: String,
) {
    // Separate connection id for correlating logs across replaced sessions.
    let conn_id = rand_id();
    let span = info_span!("session", conn_id, player_id = %player_id, room_id = %room.room_id);

    async move {
        let mut ctx =
            match bootstrap_session(&mut socket, room, &registry, &sessions, player_id).await {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!(error = ?e, "failed to bootstrap session");
                    return;
                }
            };

        info!(live_sessions = sessions.live_count(), "client connected");

        if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
            warn!(error = ?e, "client loop exited with error");
        }

        disconnect_cleanup(&ctx, &registry, &sessions).await;
    }
    .instrument(span)
    .await
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

struct ConnCtx {
    player_id: String,
    // Token used to verify ownership of the player's session slot.
    token: u64,
    room: RoomHandle,
    input_tx: mpsc::Sender<GameEvent>,
    snapshot_rx: broadcast::Receiver<Utf8Bytes>,
    snapshot_latest_rx: watch::Receiver<Utf8Bytes>,
    room_shutdown: watch::Receiver<bool>,
    // Fires when a newer session for the same player takes over.
    kick: Arc<Notify>,
    lag_recovery_count: u64,

    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,

    invalid_json: u32,

    last_input_full_log: Instant,
    last_snapshot_lag_log: Instant,
    last_invalid_input_log: Instant,

    close_frame: Option<CloseFrame>,
}

async fn bootstrap_session(
    socket: &mut WebSocket,
    room: RoomHandle,
    registry: &RoomRegistry,
    sessions: &SessionRegistry,
    player_id: String,
) -> Result<ConnCtx, NetError> {
    // Subscribe before the first await so no snapshot published during the handshake is lost.
    let snapshot_rx = room.snapshot_bytes_tx.subscribe();
    let snapshot_latest_rx = room.snapshot_latest_tx.subscribe();
    let room_shutdown = room.shutdown_signal();
    if *room_shutdown.borrow() {
        let _ = send_close_with_reason(socket, close_code::AWAY, "room closed").await;
        return Err(NetError::RoomClosed);
    }

    // A player seated in a different room is refused before any live session is disturbed.
    if let Some(current) = registry.room_of(&player_id).await {
        if current != *room.room_id {
            let _ =
                send_close_with_reason(socket, close_code::POLICY, "already in another room").await;
            return Err(NetError::Join(RoomError::AlreadyInRoom { current }));
        }
    }

    // Claim the player id first so an older session's cleanup cannot remove the new player.
    let token = rand_id();
    let claim = sessions.register_or_replace(&player_id, room.room_id.clone(), token);

    if let Err(e) = registry.join_room(&room.room_id, &player_id).await {
        sessions.unregister_if_owner(&player_id, token);
        // The kicked session will skip removal because it no longer owns the id.
        if claim.displaced && !sessions.is_live(&player_id) {
            registry.leave_room(&player_id).await;
        }
        let reason = match e {
            RoomError::AlreadyInRoom { .. } => "already in another room",
            RoomError::NotFound(_) => "room unavailable",
        };
        let _ = send_close_with_reason(socket, close_code::POLICY, reason).await;
        return Err(NetError::Join(e));
    }

    let mut msgs_out = 0;
    let mut bytes_out = 0;

    // Identity, then recent casts for late joiners, then the current snapshot.
    let identity = ServerMessage::Identity(IdentityDto {
        player_id: player_id.clone(),
        room_id: room.room_id.to_string(),
    });
    let recent: Vec<SpellEventDto> = room
        .arena
        .recent_spell_events()
        .iter()
        .map(SpellEventDto::from)
        .collect();
    let mut greeting = vec![identity];
    if !recent.is_empty() {
        greeting.push(ServerMessage::SpellEvents(recent));
    }
    greeting.push(ServerMessage::GameStateUpdate(GameStateUpdateDto::from(
        &room.arena.snapshot(),
    )));

    for msg in &greeting {
        match send_message(socket, msg).await {
            Ok(bytes) => {
                msgs_out += 1;
                bytes_out += bytes as u64;
            }
            Err(e) => {
                // Free the player slot if the handshake fails early.
                release_player(registry, sessions, &player_id, token).await;
                return Err(e);
            }
        }
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        player_id,
        token,
        input_tx: room.input_tx.clone(),
        room,
        snapshot_rx,
        snapshot_latest_rx,
        room_shutdown,
        kick: claim.kick,
        lag_recovery_count: 0,

        msgs_in: 0,
        msgs_out,
        bytes_in: 0,
        bytes_out,

        invalid_json: 0,

        last_input_full_log: now,
        last_snapshot_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

fn forward_input(
    player_id: &str,
    input_tx: &mpsc::Sender<GameEvent>,
    event: GameEvent,
    last_input_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_evt)) => {
            if should_log(last_input_full_log) {
                warn!(player_id, "input channel full; dropping input");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    // Borrow fields individually; the select arms need them at the same time.
    let ConnCtx {
        player_id,
        input_tx,
        snapshot_rx,
        snapshot_latest_rx,
        room_shutdown,
        kick,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        last_input_full_log,
        last_snapshot_lag_log,
        last_invalid_input_log,
        close_frame,
        ..
    } = ctx;
    let player_id = player_id.as_str();

    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            // Client input
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    player_id,
                    input_tx,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    last_input_full_log,
                    last_invalid_input_log,
                    close_frame,
                ) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Room snapshots
            snapshot = snapshot_rx.recv() => {
                match snapshot {
                    Ok(bytes) => match forward_snapshot(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_snapshot_lag_log) {
                            warn!(missed = n, "snapshots lagged; sending latest");
                        }

                        // Resync strategy: only the newest snapshot matters.
                        let latest = snapshot_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            *lag_recovery_count += 1;
                            match forward_snapshot(latest, socket, msgs_out, bytes_out).await {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::SnapshotsClosed);
                        true
                    }
                }
            }

            // A newer session took this player id.
            _ = kick.notified() => {
                *close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "connection replaced".into(),
                });
                info!("connection replaced by newer session");
                true
            }

            // Room closed (last member left elsewhere or server shutdown).
            changed = room_shutdown.changed() => {
                if changed.is_err() || *room_shutdown.borrow() {
                    *close_frame = Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "room closed".into(),
                    });
                    true
                } else {
                    false
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    player_id: &str,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    last_input_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::UpdatePosition(update)) => {
                        if update.player_id.as_deref().is_some_and(|id| id != player_id) {
                            if should_log(last_invalid_input_log) {
                                warn!(player_id, "movement for another player ignored");
                            }
                            return Ok(LoopControl::Continue);
                        }
                        let direction = Vec2::from(update.velocity);
                        if !direction.is_finite() {
                            if should_log(last_invalid_input_log) {
                                warn!(player_id, "invalid input values (NaN/inf); dropping");
                            }
                            return Ok(LoopControl::Continue);
                        }
                        forward_input(
                            player_id,
                            input_tx,
                            GameEvent::Move {
                                player_id: player_id.to_string(),
                                direction,
                            },
                            last_input_full_log,
                        )
                    }
                    Ok(ClientMessage::SpellCastRequest(request)) => {
                        let spell_name = request.spell_name.trim();
                        if spell_name.is_empty() || spell_name.len() > MAX_SPELL_NAME_LEN {
                            if should_log(last_invalid_input_log) {
                                warn!(player_id, "invalid spell name; dropping");
                            }
                            return Ok(LoopControl::Continue);
                        }
                        let target = request.target.map(Vec3::from).filter(|t| t.is_finite());
                        forward_input(
                            player_id,
                            input_tx,
                            GameEvent::Cast {
                                player_id: player_id.to_string(),
                                spell_name: spell_name.to_string(),
                                target,
                            },
                            last_input_full_log,
                        )
                    }
                    Err(parse_err) => {
                        *invalid_json += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(
                                player_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if *invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(player_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(player_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_snapshot(
    snapshot: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = snapshot.len();
    match socket.send(Message::Text(snapshot)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send snapshot");
            LoopControl::Disconnect
        }
    }
}

// Removes the player only while this connection still owns the id.
async fn release_player(
    registry: &RoomRegistry,
    sessions: &SessionRegistry,
    player_id: &str,
    token: u64,
) -> bool {
    if !sessions.unregister_if_owner(player_id, token) {
        // A replacement that failed its join leaves the id unowned; nobody else will remove it.
        if !sessions.is_live(player_id) {
            registry.leave_room(player_id).await;
        }
        return false;
    }
    if let Some(closed) = registry.leave_room(player_id).await {
        info!(room_id = %closed.id, "last player left; room closed");
    }
    true
}

async fn disconnect_cleanup(ctx: &ConnCtx, registry: &RoomRegistry, sessions: &SessionRegistry) {
    let owned = release_player(registry, sessions, &ctx.player_id, ctx.token).await;

    debug!(
        room_id = %ctx.room.room_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    if owned {
        info!("client disconnected");
    } else {
        info!("replaced client disconnected; player kept");
    }
}
