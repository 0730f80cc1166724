//! Integration tests for the channel handlers and the legacy save barrier.

use std::sync::Arc;
use std::time::Duration;

use handoff::prelude::*;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

// =========================================================================
// Mocks
// =========================================================================

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

/// A backend whose saves can be made to fail.
struct ScriptedSaver {
    hosted: Vec<EntityId>,
    fail: bool,
    saved: Arc<Mutex<Vec<EntityId>>>,
}

impl PlayerSaver for ScriptedSaver {
    type Error = DiskFull;

    fn hosts(&self, id: EntityId) -> bool {
        self.hosted.contains(&id)
    }

    async fn save(&self, id: EntityId) -> Result<(), DiskFull> {
        if self.fail {
            return Err(DiskFull);
        }
        self.saved.lock().push(id);
        Ok(())
    }
}

/// Collects relayed broadcasts.
#[derive(Clone, Default)]
struct CollectingSink {
    received: Arc<Mutex<Vec<BroadcastMessage>>>,
}

impl BroadcastSink for CollectingSink {
    fn deliver(&self, msg: BroadcastMessage) {
        self.received.lock().push(msg);
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn ack_listener(
    bus: &LocalBus,
    channel: &str,
) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    bus.subscribe(
        channel,
        Arc::new(move |_: &str, payload: &str| {
            let _ = tx.send(payload.to_string());
        }),
    );
    rx
}

// =========================================================================
// SaveAckHandler
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ack_handler_resolves_matching_waiter() {
    let pending = PendingConfirmations::new();
    let handler = SaveAckHandler::new(pending.clone());
    let player = EntityId::random();
    let wait = pending.register(player, Duration::from_secs(2));

    handler.handle("handoff:save-ack", &player.to_string());

    assert_eq!(wait.wait().await, Confirmation::Confirmed);
}

#[tokio::test(start_paused = true)]
async fn test_ack_handler_malformed_payload_resolves_nothing() {
    let pending = PendingConfirmations::new();
    let handler = SaveAckHandler::new(pending.clone());
    let player = EntityId::random();
    let wait = pending.register(player, Duration::from_secs(2));

    handler.handle("handoff:save-ack", "definitely-not-a-uuid");
    handler.handle("handoff:save-ack", "");
    handler.handle("handoff:save-ack", "{\"id\": 7}");

    assert!(pending.contains(&player));
    assert_eq!(wait.wait().await, Confirmation::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_ack_subscriber_survives_malformed_message() {
    let bus = LocalBus::new();
    let config = HandoffConfig::default();
    let pending = PendingConfirmations::new();
    bus.subscribe(
        &config.channels.save_ack,
        Arc::new(SaveAckHandler::new(pending.clone())),
    );
    let player = EntityId::random();
    let wait = pending.register(player, Duration::from_secs(2));

    bus.publish(&config.channels.save_ack, "garbage".into());
    bus.publish(&config.channels.save_ack, player.to_string());

    assert_eq!(wait.wait().await, Confirmation::Confirmed);
}

#[test]
fn test_ack_handler_unknown_player_is_noop() {
    let pending = PendingConfirmations::new();
    let handler = SaveAckHandler::new(pending.clone());

    handler.handle("handoff:save-ack", &EntityId::random().to_string());

    assert!(pending.is_empty());
}

// =========================================================================
// SaveRequestResponder
// =========================================================================

#[tokio::test]
async fn test_responder_saves_hosted_player_and_acks() {
    let bus = LocalBus::new();
    let config = HandoffConfig::default();
    let player = EntityId::random();
    let saved = Arc::new(Mutex::new(Vec::new()));
    let responder = SaveRequestResponder::new(
        Arc::new(bus.clone()),
        Arc::new(ScriptedSaver {
            hosted: vec![player],
            fail: false,
            saved: Arc::clone(&saved),
        }),
        config.channels.save_ack.clone(),
    );
    bus.subscribe(&config.channels.save_request, Arc::new(responder));
    let mut acks = ack_listener(&bus, &config.channels.save_ack);

    bus.publish(&config.channels.save_request, player.to_string());

    let ack = tokio::time::timeout(Duration::from_secs(1), acks.recv())
        .await
        .expect("ack should be published")
        .unwrap();
    assert_eq!(ack, player.to_string());
    assert_eq!(*saved.lock(), vec![player]);
}

#[tokio::test(start_paused = true)]
async fn test_responder_ignores_players_hosted_elsewhere() {
    let bus = LocalBus::new();
    let config = HandoffConfig::default();
    let saved = Arc::new(Mutex::new(Vec::new()));
    let responder = SaveRequestResponder::new(
        Arc::new(bus.clone()),
        Arc::new(ScriptedSaver {
            hosted: vec![EntityId::random()],
            fail: false,
            saved: Arc::clone(&saved),
        }),
        config.channels.save_ack.clone(),
    );
    bus.subscribe(&config.channels.save_request, Arc::new(responder));
    let mut acks = ack_listener(&bus, &config.channels.save_ack);

    bus.publish(&config.channels.save_request, EntityId::random().to_string());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(acks.try_recv().is_err());
    assert!(saved.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_responder_failed_save_sends_no_ack() {
    let bus = LocalBus::new();
    let config = HandoffConfig::default();
    let player = EntityId::random();
    let responder = SaveRequestResponder::new(
        Arc::new(bus.clone()),
        Arc::new(ScriptedSaver {
            hosted: vec![player],
            fail: true,
            saved: Arc::default(),
        }),
        config.channels.save_ack.clone(),
    );
    bus.subscribe(&config.channels.save_request, Arc::new(responder));
    let mut acks = ack_listener(&bus, &config.channels.save_ack);

    bus.publish(&config.channels.save_request, player.to_string());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(acks.try_recv().is_err());
}

// =========================================================================
// SaveBarrier (legacy variant)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_barrier_waits_for_ack() {
    let bus = LocalBus::new();
    let config = HandoffConfig::default();
    let pending = PendingConfirmations::new();
    bus.subscribe(
        &config.channels.save_ack,
        Arc::new(SaveAckHandler::new(pending.clone())),
    );
    let player = EntityId::random();
    let responder = SaveRequestResponder::new(
        Arc::new(bus.clone()),
        Arc::new(ScriptedSaver {
            hosted: vec![player],
            fail: false,
            saved: Arc::default(),
        }),
        config.channels.save_ack.clone(),
    );
    bus.subscribe(&config.channels.save_request, Arc::new(responder));
    let barrier = SaveBarrier::new(Arc::new(bus.clone()), pending.clone(), &config);

    let outcome = barrier.on_server_switch(player).await;

    assert_eq!(outcome, Some(Confirmation::Confirmed));
    assert!(pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_barrier_without_ack_proceeds_after_timeout() {
    let bus = LocalBus::new();
    let config = HandoffConfig::default();
    let barrier =
        SaveBarrier::new(Arc::new(bus), PendingConfirmations::new(), &config);
    let start = Instant::now();

    let outcome = barrier.on_server_switch(EntityId::random()).await;

    assert_eq!(outcome, Some(Confirmation::TimedOut));
    assert_eq!(start.elapsed(), config.ack_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_barrier_unavailable_transport_skips_wait() {
    let config = HandoffConfig::default();
    let pending = PendingConfirmations::new();
    let barrier =
        SaveBarrier::new(Arc::new(LocalBus::disabled()), pending.clone(), &config);
    let start = Instant::now();

    let outcome = barrier.on_server_switch(EntityId::random()).await;

    assert_eq!(outcome, None);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(pending.is_empty());
}

// =========================================================================
// Broadcast relay
// =========================================================================

#[tokio::test]
async fn test_broadcast_reaches_other_servers_only() {
    let bus = LocalBus::new();
    let config = HandoffConfig::default();
    let lobby_sink = CollectingSink::default();
    let arena_sink = CollectingSink::default();
    bus.subscribe(
        &config.channels.broadcast,
        Arc::new(BroadcastRelay::new(ServerId::from("lobby"), lobby_sink.clone())),
    );
    bus.subscribe(
        &config.channels.broadcast,
        Arc::new(BroadcastRelay::new(ServerId::from("arena"), arena_sink.clone())),
    );
    let publisher = BroadcastPublisher::new(
        Arc::new(bus.clone()),
        ServerId::from("lobby"),
        config.channels.broadcast.clone(),
    );

    publisher.broadcast(Some("alice"), "gg").unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while arena_sink.received.lock().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("arena should receive the broadcast");

    let received = arena_sink.received.lock().clone();
    assert_eq!(
        received,
        vec![BroadcastMessage {
            origin: ServerId::from("lobby"),
            sender: Some("alice".into()),
            text: "gg".into(),
        }]
    );
    assert!(lobby_sink.received.lock().is_empty(), "origin skips its own");
}

#[test]
fn test_broadcast_relay_drops_malformed_payload() {
    let sink = CollectingSink::default();
    let relay = BroadcastRelay::new(ServerId::from("lobby"), sink.clone());

    relay.handle("handoff:broadcast", "not json");
    relay.handle("handoff:broadcast", r#"{"origin":"","text":"x"}"#);
    relay.handle("handoff:broadcast", r#"{"origin":"arena","text":"ok"}"#);

    let received = sink.received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].text, "ok");
}
