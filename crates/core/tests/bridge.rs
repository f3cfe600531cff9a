//! End-to-end interception: a real client, the bridge, a real server.

use std::net::SocketAddr;
use std::time::Duration;

use basalt::{
    Bridge, BridgeConfig, Client, ClientOptions, Direction, ListenKey, RakNetLink, Server,
    ServerConfig, SessionState,
};
use proto::bedrock::{GamePacket, PacketName, TextData, TextMessage};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn chat(message: &str) -> TextMessage {
    TextMessage {
        data: TextData::Chat { source: "Steve".to_owned(), message: message.to_owned() },
        needs_translation: false,
        xuid: String::new(),
        platform_chat_id: String::new(),
    }
}

struct Proxied {
    connection: basalt::Connection,
    pair: std::sync::Arc<basalt::BridgePair>,
    server_session: std::sync::Arc<basalt::Session>,
}

/// Wires client ↔ bridge ↔ server over loopback links and runs the
/// whole stack to the spawned state.
async fn proxied_session(port_base: u16) -> Proxied {
    let (client_link, down_link) = RakNetLink::pair(addr(19132), addr(port_base));
    let (up_link, server_link) = RakNetLink::pair(addr(port_base + 1), addr(19144));

    let server_session = Server::accept(ServerConfig::default(), server_link).unwrap();

    let couple = tokio::spawn(Bridge::couple(
        down_link,
        BridgeConfig::new("127.0.0.1:19144"),
        async move { Ok(up_link) },
    ));

    let connection = timeout(
        Duration::from_secs(5),
        Client::connect(client_link, ClientOptions::offline("Steve", "127.0.0.1:19132")),
    )
    .await
    .expect("proxied handshake timed out")
    .unwrap();

    let pair = couple.await.unwrap().unwrap();

    timeout(Duration::from_secs(5), server_session.wait_for(SessionState::Spawned))
        .await
        .expect("server spawn timed out")
        .unwrap();

    Proxied { connection, pair, server_session }
}

#[tokio::test]
async fn bridge_transparent_passthrough() {
    let proxied = proxied_session(50400).await;

    // The real server sees the real player, not the bridge.
    assert_eq!(proxied.connection.profile.name, "Steve");
    let server_profile = proxied.server_session.profile().unwrap();
    assert_eq!(server_profile.name, "Steve");
    assert_eq!(server_profile.uuid, Uuid::new_v3(&Uuid::NAMESPACE_URL, b"Steve"));

    // The payload the server received is the client's, readdressed.
    let payload = proxied.server_session.user_payload().unwrap();
    assert_eq!(payload.server_address, "127.0.0.1:19144");

    // StartGame travelled through the bridge.
    assert!(proxied.pair.post_start_game());
    assert_eq!(proxied.connection.start_game.runtime_id, 1);

    // Clientbound traffic arrives unchanged with no listeners anywhere.
    let (text_tx, mut text_rx) = mpsc::unbounded_channel();
    proxied.connection.session.dispatcher().on(
        ListenKey::Packet(PacketName::Text),
        move |packet, _| {
            if let GamePacket::Text(text) = packet {
                let _ = text_tx.send(text.clone());
            }
        },
    );

    proxied.server_session.send(chat("welcome")).unwrap();

    let received = timeout(Duration::from_secs(5), text_rx.recv()).await.unwrap().unwrap();
    assert_eq!(received, chat("welcome"));
}

#[tokio::test]
async fn bridge_modifies_serverbound_text() {
    let proxied = proxied_session(50402).await;

    proxied.pair.on(
        Direction::Serverbound,
        ListenKey::Packet(PacketName::Text),
        |packet, signal| {
            if let GamePacket::Text(text) = packet {
                text.data.message_mut().push('.');
                signal.modified = true;
            }
        },
    );

    let (text_tx, mut text_rx) = mpsc::unbounded_channel();
    proxied.server_session.dispatcher().on(
        ListenKey::Packet(PacketName::Text),
        move |packet, _| {
            if let GamePacket::Text(text) = packet {
                let _ = text_tx.send(text.data.message().to_owned());
            }
        },
    );

    proxied.connection.session.send(chat("hello")).unwrap();

    let received = timeout(Duration::from_secs(5), text_rx.recv()).await.unwrap().unwrap();
    assert_eq!(received, "hello.");
}

#[tokio::test]
async fn bridge_pair_dies_together() {
    let proxied = proxied_session(50404).await;

    proxied.connection.session.disconnect(None);

    timeout(Duration::from_secs(5), proxied.pair.upstream().wait_for(SessionState::Disconnected))
        .await
        .expect("upstream teardown timed out")
        .unwrap();
    timeout(Duration::from_secs(5), proxied.server_session.wait_for(SessionState::Disconnected))
        .await
        .expect("server teardown timed out")
        .unwrap();
}
