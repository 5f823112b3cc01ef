// Framework bootstrap for the arena runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{
    BroadcastSettings, UdpSyncService, create_room_handler, get_room_handler, list_rooms_handler,
    open_room, ws_handler,
};
use crate::interface_adapters::sessions::SessionRegistry;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::{clock::SystemClock, rng};
use crate::use_cases::{
    ArenaSettings, LocalPeer, RoomRegistry, RoomReplicaSink, RoomSettings, StoreLimits,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::{io, io::Result, sync::Arc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    let installed = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

fn build_registry() -> Arc<RoomRegistry> {
    // Setup Room Registry
    // This owns every room's arena, world task and serializer.
    Arc::new(RoomRegistry::new(
        RoomSettings {
            input_channel_capacity: config::INPUT_CHANNEL_CAPACITY,
            snapshot_broadcast_capacity: config::SNAPSHOT_BROADCAST_CAPACITY,
            tick_interval: config::TICK_INTERVAL,
            arena: ArenaSettings {
                limits: StoreLimits {
                    player_capacity: config::PLAYER_CAPACITY,
                    spell_event_capacity: config::SPELL_EVENT_CAPACITY,
                },
                ..ArenaSettings::default()
            },
        },
        Arc::new(SystemClock::new()),
    ))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/rooms", post(create_room_handler).get(list_rooms_handler))
        .route("/rooms/{room_id}", get(get_room_handler))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Serves session mode on `listener` until ctrl-c.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_until(listener, shutdown_signal()).await
}

/// Serves session mode until `shutdown` resolves, then closes every room.
pub async fn run_until<F>(listener: tokio::net::TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    serve_sessions(listener, build_registry(), shutdown).await
}

async fn serve_sessions<F>(
    listener: tokio::net::TcpListener,
    registry: Arc<RoomRegistry>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    let state = Arc::new(AppState {
        room_registry: registry.clone(),
        sessions: Arc::new(SessionRegistry::new()),
    });
    let app = router(state);

    tracing::info!(%address, "listening");

    // Closing the rooms is what ends upgraded sessions; plain HTTP drains on its own.
    let graceful = async move {
        shutdown.await;
        registry.shutdown().await;
    };

    // Serve app and report errors rather than panicking
    axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        })
}

struct BroadcastPeer {
    service: Arc<UdpSyncService>,
    publisher: JoinHandle<()>,
}

impl BroadcastPeer {
    async fn stop(self) {
        if let Err(e) = self.publisher.await {
            tracing::warn!(error = %e, "state publisher failed");
        }
        self.service.stop().await;
        let stats = self.service.stats();
        tracing::info!(
            sent = stats.sent,
            gated = stats.gated,
            send_errors = stats.send_errors,
            received = stats.received,
            malformed = stats.malformed,
            "broadcast transport stopped"
        );
    }
}

async fn start_broadcast_peer(
    registry: &Arc<RoomRegistry>,
    shutdown: watch::Receiver<bool>,
) -> Result<BroadcastPeer> {
    let room = open_room(registry, &config::room_name()).await;
    let player_id = config::local_player_id().unwrap_or_else(rng::player_id);
    let peer = LocalPeer::join(registry, &room.room_id, &player_id)
        .await
        .map_err(io::Error::other)?;

    let sink = Arc::new(RoomReplicaSink::new(
        registry.clone(),
        room.room_id.to_string(),
        [player_id.clone()],
    ));
    let port = config::udp_port();
    let settings = BroadcastSettings {
        bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        destination: SocketAddr::new(config::broadcast_addr(), port),
        send_interval: config::SEND_INTERVAL,
    };
    let service = UdpSyncService::start(settings, Arc::new(SystemClock::new()), sink)
        .await
        .inspect_err(|e| {
            tracing::error!(port, error = %e, "failed to start broadcast transport");
        })?;
    if !room.arena.set_replicator(service.clone()) {
        tracing::warn!(room_id = %room.room_id, "room already had a replicator");
    }

    tracing::info!(room_id = %room.room_id, player_id = %player_id, "broadcast peer joined");

    let publisher = tokio::spawn(publish_state_loop(peer, shutdown));
    Ok(BroadcastPeer { service, publisher })
}

// Offers the local player's state every send interval; the transport gate drops extras.
async fn publish_state_loop(peer: LocalPeer, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(config::SEND_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                peer.publish_state();
            }
        }
    }
}

/// Entry point for the binary: reads the environment and runs the configured transports.
pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let mode = config::transport_mode();
    tracing::info!(?mode, "starting arena");

    let registry = build_registry();
    let (stop_tx, stop_rx) = watch::channel(false);

    let broadcast = if mode.runs_broadcast() {
        Some(start_broadcast_peer(&registry, stop_rx).await?)
    } else {
        None
    };

    let served = if mode.runs_session() {
        let address = SocketAddr::from(([0, 0, 0, 0], config::http_port()));

        // Bind TCP listener with error handling
        match tokio::net::TcpListener::bind(address).await {
            Ok(listener) => serve_sessions(listener, registry.clone(), shutdown_signal()).await,
            Err(e) => {
                tracing::error!(%address, error = %e, "failed to bind");
                Err(e)
            }
        }
    } else {
        shutdown_signal().await;
        Ok(())
    };

    let _ = stop_tx.send(true);
    if let Some(peer) = broadcast {
        peer.stop().await;
    }
    registry.shutdown().await;

    served
}
