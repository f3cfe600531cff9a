//! End-to-end login over a loopback transport.

use std::net::SocketAddr;
use std::time::Duration;

use basalt::{Client, ClientOptions, RakNetLink, Server, ServerConfig, ServerEvent, SessionState};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[tokio::test]
async fn offline_client_handshake() {
    let (client_link, server_link) = RakNetLink::pair(addr(19132), addr(50200));

    let session = Server::accept(ServerConfig::default(), server_link).unwrap();
    let connection = timeout(
        Duration::from_secs(5),
        Client::connect(client_link, ClientOptions::offline("Steve", "127.0.0.1:19132")),
    )
    .await
    .expect("handshake timed out")
    .unwrap();

    // The profile is deterministic for offline players.
    assert_eq!(connection.profile.name, "Steve");
    assert_eq!(connection.profile.uuid, Uuid::new_v3(&Uuid::NAMESPACE_URL, b"Steve"));
    assert_eq!(connection.profile.xuid, 0);

    // StartGame data made it through.
    assert_eq!(connection.start_game.runtime_id, 1);

    // Both sides finished the handshake encrypted.
    timeout(Duration::from_secs(5), session.wait_for(SessionState::Spawned))
        .await
        .expect("server spawn timed out")
        .unwrap();
    assert!(connection.session.encrypted());
    assert!(session.encrypted());

    // The server agrees on who connected.
    let profile = session.profile().unwrap();
    assert_eq!(profile.name, "Steve");
    assert_eq!(profile.uuid, connection.profile.uuid);
}

#[tokio::test]
async fn two_usernames_get_distinct_identities() {
    let (client_link, server_link) = RakNetLink::pair(addr(19132), addr(50201));
    let _session = Server::accept(ServerConfig::default(), server_link).unwrap();
    let steve = Client::connect(client_link, ClientOptions::offline("Steve", "127.0.0.1:19132"))
        .await
        .unwrap();

    let (client_link, server_link) = RakNetLink::pair(addr(19132), addr(50202));
    let _session = Server::accept(ServerConfig::default(), server_link).unwrap();
    let alex = Client::connect(client_link, ClientOptions::offline("Alex", "127.0.0.1:19132"))
        .await
        .unwrap();

    assert_ne!(steve.profile.uuid, alex.profile.uuid);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (client_link, server_link) = RakNetLink::pair(addr(19132), addr(50203));

    let session = Server::accept(ServerConfig::default(), server_link).unwrap();
    let connection = Client::connect(client_link, ClientOptions::offline("Steve", "127.0.0.1:19132"))
        .await
        .unwrap();

    connection.session.disconnect(None);
    connection.session.disconnect(None);
    connection.session.disconnect(Some("again"));

    assert_eq!(connection.session.state(), SessionState::Disconnected);

    // The server notices the closed link and tears down once.
    timeout(Duration::from_secs(5), session.wait_for(SessionState::Disconnected))
        .await
        .expect("teardown timed out")
        .unwrap();
}

#[tokio::test]
async fn server_emits_connect_and_disconnect_events() {
    let (connections_tx, connections_rx) = mpsc::channel(4);
    let mut events = Server::start(ServerConfig::default(), connections_rx);

    let (client_link, server_link) = RakNetLink::pair(addr(19132), addr(50204));
    connections_tx.send(server_link).await.unwrap();

    let connection = Client::connect(client_link, ClientOptions::offline("Steve", "127.0.0.1:19132"))
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
    let ServerEvent::PlayerConnect(session) = event else {
        panic!("Expected a connect event first");
    };
    assert_eq!(session.profile().unwrap().name, "Steve");

    connection.session.disconnect(None);

    let event = timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
    let ServerEvent::PlayerDisconnect(name, _) = event else {
        panic!("Expected a disconnect event");
    };
    assert_eq!(name, "Steve");
}
