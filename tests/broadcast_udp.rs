use arena_sync::interface_adapters::net::{BroadcastSettings, UdpSyncService, open_room};
use arena_sync::interface_adapters::utils::clock::SystemClock;
use arena_sync::use_cases::{
    ArenaSettings, LocalPeer, RoomRegistry, RoomReplicaSink, RoomSettings,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

fn registry() -> Arc<RoomRegistry> {
    Arc::new(RoomRegistry::new(
        RoomSettings {
            input_channel_capacity: 64,
            snapshot_broadcast_capacity: 16,
            tick_interval: Duration::from_millis(16),
            arena: ArenaSettings::default(),
        },
        Arc::new(SystemClock::new()),
    ))
}

fn loopback_settings(destination: SocketAddr) -> BroadcastSettings {
    BroadcastSettings {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        destination,
        send_interval: Duration::from_millis(30),
    }
}

#[tokio::test]
async fn when_remote_peer_sends_state_then_it_joins_the_room_and_local_player_is_kept() {
    let registry = registry();
    let room = open_room(&registry, "lan").await;
    let peer = LocalPeer::join(&registry, &room.room_id, "local")
        .await
        .expect("local player joins");

    let remote = UdpSocket::bind("127.0.0.1:0").await.expect("bind remote");
    let sink = Arc::new(RoomReplicaSink::new(
        registry.clone(),
        room.room_id.to_string(),
        ["local".to_string()],
    ));
    let service = UdpSyncService::start(
        loopback_settings(remote.local_addr().expect("remote addr")),
        Arc::new(SystemClock::new()),
        sink,
    )
    .await
    .expect("service starts");

    let datagram = r#"state:[{"id":"remote","x":2.0,"y":3.0,"z":0.0,"hp":70,"mana":40},{"id":"local","x":9.0,"y":9.0,"z":0.0,"hp":1,"mana":1}]"#;
    remote
        .send_to(datagram.as_bytes(), service.local_addr())
        .await
        .expect("datagram sent");

    let players = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let players = peer.current_players();
            if players.iter().any(|p| p.id == "remote") {
                return players;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("remote player arrives");

    let remote_player = players.iter().find(|p| p.id == "remote").expect("remote");
    assert_eq!(remote_player.hp, 70);
    let local_player = players.iter().find(|p| p.id == "local").expect("local");
    assert_eq!(local_player.hp, 100);
    assert!(registry.is_member(&room.room_id, "remote").await);

    service.stop().await;
    registry.shutdown().await;
}

#[tokio::test]
async fn when_local_peer_casts_then_spell_datagram_reaches_the_segment() {
    let registry = registry();
    let room = open_room(&registry, "lan").await;
    let peer = LocalPeer::join(&registry, &room.room_id, "caster")
        .await
        .expect("caster joins");

    let listener = UdpSocket::bind("127.0.0.1:0").await.expect("bind listener");
    let sink = Arc::new(RoomReplicaSink::new(
        registry.clone(),
        room.room_id.to_string(),
        ["caster".to_string()],
    ));
    let service = UdpSyncService::start(
        loopback_settings(listener.local_addr().expect("listener addr")),
        Arc::new(SystemClock::new()),
        sink,
    )
    .await
    .expect("service starts");
    assert!(room.arena.set_replicator(service.clone()));

    peer.cast_request("stone").expect("stone is cast");

    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), listener.recv_from(&mut buf))
        .await
        .expect("datagram arrives")
        .expect("recv succeeds");
    let text = std::str::from_utf8(&buf[..len]).expect("utf-8 datagram");
    assert!(text.starts_with("spell:"), "unexpected datagram {text}");
    assert!(text.contains(r#""casterId":"caster""#));
    assert!(text.contains(r#""spellName":"Stone""#));

    service.stop().await;
    registry.shutdown().await;
}
