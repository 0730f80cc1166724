//! One proxy and two backends sharing an in-process bus.
//!
//! Run with `RUST_LOG=debug cargo run -p local-handoff` to see every hop.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use handoff::prelude::*;
use handoff::telemetry::init_tracing;
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// A game server that "saves" by sleeping for a while.
struct Backend {
    name: ServerId,
    players: Mutex<HashSet<EntityId>>,
    save_time: Duration,
}

impl Backend {
    fn new(name: &str, save_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: ServerId::from(name),
            players: Mutex::new(HashSet::new()),
            save_time,
        })
    }
}

impl PlayerSaver for Backend {
    type Error = Infallible;

    fn hosts(&self, id: EntityId) -> bool {
        self.players.lock().contains(&id)
    }

    async fn save(&self, id: EntityId) -> Result<(), Infallible> {
        tokio::time::sleep(self.save_time).await;
        tracing::info!(server = %self.name, player = %id, "saved");
        Ok(())
    }
}

struct Chat(ServerId);

impl BroadcastSink for Chat {
    fn deliver(&self, msg: BroadcastMessage) {
        tracing::info!(
            server = %self.0,
            from = %msg.origin,
            sender = msg.sender.as_deref().unwrap_or("-"),
            text = %msg.text,
            "broadcast"
        );
    }
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

/// Moves players between the two backends.
struct Network {
    backends: Vec<Arc<Backend>>,
}

impl Reconnector for Network {
    async fn connect(&self, id: EntityId, target: &ServerId) -> ReconnectResult {
        let mut success = false;
        for backend in &self.backends {
            if &backend.name == target {
                success = backend.players.lock().insert(id) || success;
            } else {
                backend.players.lock().remove(&id);
            }
        }
        ReconnectResult { success }
    }
}

#[tokio::main]
async fn main() -> Result<(), HandoffError> {
    init_tracing("info,handoff=debug");

    let config = HandoffConfig::default();
    let bus = LocalBus::new();

    let lobby = Backend::new("lobby", Duration::from_millis(300));
    let dungeon = Backend::new("dungeon", Duration::from_millis(100));
    for backend in [&lobby, &dungeon] {
        bus.subscribe(
            &config.channels.save_request,
            Arc::new(SaveRequestResponder::new(
                Arc::new(bus.clone()),
                Arc::clone(backend),
                config.channels.save_ack.clone(),
            )),
        );
        bus.subscribe(
            &config.channels.broadcast,
            Arc::new(BroadcastRelay::new(
                backend.name.clone(),
                Chat(backend.name.clone()),
            )),
        );
    }

    let player = EntityId::random();
    lobby.players.lock().insert(player);

    let proxy = HandoffProxy::start(
        bus.clone(),
        Network {
            backends: vec![Arc::clone(&lobby), Arc::clone(&dungeon)],
        },
        &config,
    )?;

    // First attempt: denied while the lobby saves.
    let mut event = RoutingEvent::new(
        player,
        Some(lobby.name.clone()),
        Some(dungeon.name.clone()),
    );
    match proxy.handle(&mut event) {
        GateOutcome::Deferred(task) => match task.await {
            Ok(report) => tracing::info!(
                player = %report.entity_id,
                confirmed = report.confirmation.is_confirmed(),
                reconnected = report.reconnected,
                "hand-off finished"
            ),
            Err(e) => tracing::error!(error = %e, "hand-off task failed"),
        },
        other => tracing::warn!(outcome = ?other, "switch was not deferred"),
    }

    // The replayed switch the reconnect triggers would now pass straight through.
    let mut replay = RoutingEvent::new(
        player,
        Some(lobby.name.clone()),
        Some(dungeon.name.clone()),
    );
    let outcome = proxy.handle(&mut replay);
    tracing::info!(
        allowed = outcome.allowed(),
        in_dungeon = dungeon.hosts(player),
        "replayed switch"
    );

    let chat = BroadcastPublisher::new(
        Arc::new(bus.clone()),
        dungeon.name.clone(),
        config.channels.broadcast.clone(),
    );
    if let Err(e) = chat.broadcast(Some("gatekeeper"), "a player arrived") {
        tracing::error!(error = %e, "broadcast failed");
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    proxy.shutdown().await;
    bus.shutdown().await;
    Ok(())
}
