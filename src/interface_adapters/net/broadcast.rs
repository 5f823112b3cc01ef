// Broadcast-mode transport: best-effort UDP datagrams to every peer on the segment.

use crate::domain::ports::{Clock, ReplicaSink, Replicator};
use crate::domain::{PlayerState, SpellEvent};
use crate::interface_adapters::wire::{self, Envelope, EnvelopeKind};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Largest datagram the listener accepts.
const MAX_DATAGRAM: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct BroadcastSettings {
    /// Local address the listener binds (port shared by every peer).
    pub bind_addr: SocketAddr,
    /// Where outbound datagrams go, normally the limited broadcast address.
    pub destination: SocketAddr,
    /// Minimum spacing between two sends of the same envelope kind.
    pub send_interval: Duration,
}

/// Drop-on-busy rate limiter: one pass per interval, extra calls are refused.
#[derive(Debug)]
struct SendGate {
    // Millisecond timestamp of the last pass; u64::MAX until the first one.
    last: AtomicU64,
}

impl SendGate {
    fn new() -> Self {
        Self {
            last: AtomicU64::new(u64::MAX),
        }
    }

    fn try_pass(&self, now: u64, interval_millis: u64) -> bool {
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            if last != u64::MAX && now.saturating_sub(last) < interval_millis {
                return false;
            }
            match self
                .last
                .compare_exchange_weak(last, now, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(current) => last = current,
            }
        }
    }
}

/// Transport counters.
#[derive(Debug, Default)]
struct BroadcastCounters {
    sent: AtomicU64,
    send_errors: AtomicU64,
    gated: AtomicU64,
    received: AtomicU64,
    malformed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub sent: u64,
    pub send_errors: u64,
    /// Sends dropped by the rate limiter.
    pub gated: u64,
    pub received: u64,
    /// Datagrams dropped because they did not decode.
    pub malformed: u64,
}

pub struct UdpSyncService {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    destination: SocketAddr,
    interval_millis: u64,
    state_gate: SendGate,
    spell_gate: SendGate,
    clock: Arc<dyn Clock>,
    counters: Arc<BroadcastCounters>,
    runtime: Handle,
    shutdown_tx: watch::Sender<bool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl UdpSyncService {
    /// Binds the socket, enables broadcast, and starts the listening loop.
    pub async fn start(
        settings: BroadcastSettings,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn ReplicaSink>,
    ) -> io::Result<Arc<Self>> {
        let socket = UdpSocket::bind(settings.bind_addr).await?;
        socket.set_broadcast(true)?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let counters = Arc::new(BroadcastCounters::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = tokio::spawn(listen(
            socket.clone(),
            sink,
            shutdown_rx,
            counters.clone(),
        ));

        info!(%local_addr, destination = %settings.destination, "broadcast transport started");

        Ok(Arc::new(Self {
            socket,
            local_addr,
            destination: settings.destination,
            interval_millis: u64::try_from(settings.send_interval.as_millis()).unwrap_or(u64::MAX),
            state_gate: SendGate::new(),
            spell_gate: SendGate::new(),
            clock,
            counters,
            runtime: Handle::current(),
            shutdown_tx,
            listener: Mutex::new(Some(listener)),
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> BroadcastStats {
        let c = &self.counters;
        BroadcastStats {
            sent: c.sent.load(Ordering::Relaxed),
            send_errors: c.send_errors.load(Ordering::Relaxed),
            gated: c.gated.load(Ordering::Relaxed),
            received: c.received.load(Ordering::Relaxed),
            malformed: c.malformed.load(Ordering::Relaxed),
        }
    }

    /// Stops the listener and waits for it. No sink call happens after this returns.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            if let Err(e) = listener.await {
                warn!(error = %e, "broadcast listener failed");
            }
            info!(local_addr = %self.local_addr, "broadcast transport stopped");
        }
    }

    fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    // Checked before encoding so dropped sends cost nothing.
    fn admit(&self, kind: EnvelopeKind) -> bool {
        if self.is_stopped() {
            return false;
        }
        let gate = match kind {
            EnvelopeKind::State => &self.state_gate,
            EnvelopeKind::Spell => &self.spell_gate,
        };
        let passed = gate.try_pass(self.clock.now_millis(), self.interval_millis);
        if !passed {
            self.counters.gated.fetch_add(1, Ordering::Relaxed);
        }
        passed
    }

    // Socket I/O happens on the runtime, never on the caller's thread.
    fn dispatch(&self, kind: EnvelopeKind, text: String) {
        let socket = self.socket.clone();
        let destination = self.destination;
        let counters = self.counters.clone();
        self.runtime.spawn(async move {
            match socket.send_to(text.as_bytes(), destination).await {
                Ok(_) => {
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.send_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(kind = kind.as_str(), %destination, error = %e, "broadcast send failed");
                }
            }
        });
    }
}

impl Replicator for UdpSyncService {
    fn replicate_players(&self, players: &[PlayerState]) {
        if players.is_empty() || !self.admit(EnvelopeKind::State) {
            return;
        }
        match wire::encode_state(players) {
            Ok(text) => self.dispatch(EnvelopeKind::State, text),
            Err(e) => warn!(error = %e, "failed to encode state envelope"),
        }
    }

    fn replicate_spell(&self, event: &SpellEvent) {
        if !self.admit(EnvelopeKind::Spell) {
            return;
        }
        match wire::encode_spells(std::slice::from_ref(event)) {
            Ok(text) => self.dispatch(EnvelopeKind::Spell, text),
            Err(e) => warn!(error = %e, "failed to encode spell envelope"),
        }
    }
}

async fn listen(
    socket: Arc<UdpSocket>,
    sink: Arc<dyn ReplicaSink>,
    mut shutdown: watch::Receiver<bool>,
    counters: Arc<BroadcastCounters>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let received = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            received = socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((len, from)) => {
                counters.received.fetch_add(1, Ordering::Relaxed);
                if !handle_datagram(&buf[..len], from, sink.as_ref()).await {
                    counters.malformed.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                // Typically ICMP feedback from an earlier send; the socket stays usable.
                warn!(error = %e, "broadcast receive failed");
            }
        }
    }

    debug!("broadcast listener exiting");
}

// Returns false when the datagram was dropped as malformed.
async fn handle_datagram(data: &[u8], from: SocketAddr, sink: &dyn ReplicaSink) -> bool {
    let Ok(text) = std::str::from_utf8(data) else {
        debug!(%from, bytes = data.len(), "dropping non-utf8 datagram");
        return false;
    };

    let envelope = match wire::decode(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(%from, bytes = data.len(), error = %e, "dropping malformed datagram");
            return false;
        }
    };

    trace!(%from, kind = envelope.kind().as_str(), "datagram received");
    match envelope {
        Envelope::State(players) => sink.apply_players(players).await,
        Envelope::Spell(events) => sink.apply_spells(events).await,
    }
    true
}
