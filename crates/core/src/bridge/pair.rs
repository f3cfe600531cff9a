use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use proto::bedrock::{
    catalog, ClientCacheStatus, ConnectedPacket, GamePacket, Header, LevelChunk, PacketName,
    StartGame,
};
use util::Deserialize;

use crate::dispatcher::{Dispatcher, ListenKey, Signal};
use crate::session::Session;

/// Which way a packet travels through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the real server towards the real client.
    Clientbound,
    /// From the real client towards the real server.
    Serverbound,
}

/// The two coupled sessions of one intercepted connection.
///
/// Packets nobody observes are forwarded byte for byte. Registered
/// listeners can cancel or modify packets; modification costs one round
/// trip through the catalog. Clientbound chunk packets received before
/// StartGame are held back and replayed in arrival order.
pub struct BridgePair {
    downstream: Arc<Session>,
    upstream: Arc<Session>,
    post_start_game: AtomicBool,
    deferred_chunks: Mutex<Vec<Vec<u8>>>,
    upstream_ready: AtomicBool,
    pending_serverbound: Mutex<Vec<Vec<u8>>>,
    clientbound: Dispatcher,
    serverbound: Dispatcher,
    reserialize_cache: DashMap<(u32, String), Vec<u8>>,
}

impl BridgePair {
    pub(crate) fn new(downstream: Arc<Session>, upstream: Arc<Session>) -> Arc<Self> {
        Arc::new(Self {
            downstream,
            upstream,
            post_start_game: AtomicBool::new(false),
            deferred_chunks: Mutex::new(Vec::new()),
            upstream_ready: AtomicBool::new(false),
            pending_serverbound: Mutex::new(Vec::new()),
            clientbound: Dispatcher::new(),
            serverbound: Dispatcher::new(),
            reserialize_cache: DashMap::new(),
        })
    }

    /// The session facing the real client.
    pub fn downstream(&self) -> &Arc<Session> {
        &self.downstream
    }

    /// The session facing the real server.
    pub fn upstream(&self) -> &Arc<Session> {
        &self.upstream
    }

    /// Whether StartGame has passed through towards the client.
    pub fn post_start_game(&self) -> bool {
        self.post_start_game.load(Ordering::Acquire)
    }

    /// Registers an interception listener for one direction.
    pub fn on<F>(&self, direction: Direction, key: ListenKey, listener: F)
    where
        F: FnMut(&mut GamePacket, &mut Signal) + Send + 'static,
    {
        match direction {
            Direction::Clientbound => self.clientbound.on(key, listener),
            Direction::Serverbound => self.serverbound.on(key, listener),
        }
    }

    /// Processes one frame arriving from the real server.
    pub(crate) fn handle_clientbound(&self, frame: &[u8]) -> anyhow::Result<()> {
        let header = Header::deserialize(frame)?;

        // Chunks may not reach the client before it knows the world.
        if !self.post_start_game() && header.id == LevelChunk::ID {
            self.deferred_chunks.lock().push(frame.to_vec());
            return Ok(());
        }

        if let Some(bytes) = self.intercept(&self.clientbound, header.id, frame)? {
            self.downstream.send_serialized(bytes)?;
        }

        if header.id == StartGame::ID && !self.post_start_game.swap(true, Ordering::AcqRel) {
            self.replay_deferred_chunks()?;
        }

        Ok(())
    }

    /// Processes one frame arriving from the real client.
    pub(crate) fn handle_serverbound(&self, frame: &[u8]) -> anyhow::Result<()> {
        if !self.upstream_ready.load(Ordering::Acquire) {
            let mut pending = self.pending_serverbound.lock();
            // The queue may have been released while taking the lock.
            if !self.upstream_ready.load(Ordering::Acquire) {
                pending.push(frame.to_vec());
                return Ok(());
            }
        }

        let header = Header::deserialize(frame)?;
        if let Some(bytes) = self.intercept(&self.serverbound, header.id, frame)? {
            self.upstream.send_serialized(bytes)?;
        }

        Ok(())
    }

    /// Releases serverbound traffic that piled up while the upstream
    /// session was still logging in.
    ///
    /// The queue lock is held across the flush so frames arriving
    /// concurrently cannot overtake the queued ones.
    pub(crate) fn mark_upstream_ready(&self) -> anyhow::Result<()> {
        let mut pending = self.pending_serverbound.lock();
        self.upstream_ready.store(true, Ordering::Release);

        for frame in pending.drain(..) {
            let header = Header::deserialize(&frame)?;
            if let Some(bytes) = self.intercept(&self.serverbound, header.id, &frame)? {
                self.upstream.send_serialized(bytes)?;
            }
        }

        Ok(())
    }

    fn replay_deferred_chunks(&self) -> anyhow::Result<()> {
        let deferred = std::mem::take(&mut *self.deferred_chunks.lock());
        for frame in deferred {
            self.handle_clientbound(&frame)?;
        }

        Ok(())
    }

    /// Runs one frame through the listeners of a direction.
    ///
    /// Returns the bytes to forward, or `None` when a listener cancelled
    /// the packet. Unobserved packets come back untouched.
    fn intercept(
        &self,
        listeners: &Dispatcher,
        id: u32,
        frame: &[u8],
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let name = PacketName::from_id(id);
        // The blob cache cannot work through a relay; this packet is
        // always intercepted and forced off.
        let force_intercept = id == ClientCacheStatus::ID;

        if !listeners.observes(name) && !force_intercept {
            return Ok(Some(frame.to_vec()));
        }

        let mut packet = match catalog().decode(frame) {
            Ok(packet) => packet,
            Err(err) => {
                tracing::warn!("Forwarding {name:?} packet that failed to decode | {err:#}");
                return Ok(Some(frame.to_vec()));
            }
        };

        let mut normalized = false;
        if let GamePacket::ClientCacheStatus(status) = &mut packet {
            if status.enabled {
                status.enabled = false;
                normalized = true;
            }
        }

        let signal = listeners.dispatch(&mut packet);
        if signal.cancelled {
            return Ok(None);
        }

        if !signal.modified && !normalized {
            return Ok(Some(frame.to_vec()));
        }

        let key = (id, to_hex(frame));
        if let Some(cached) = self.reserialize_cache.get(&key) {
            return Ok(Some(cached.clone()));
        }

        let serialized = packet.serialize()?;
        self.reserialize_cache.insert(key, serialized.clone());
        Ok(Some(serialized))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use proto::bedrock::{TextData, TextMessage};
    use tokio::time::timeout;

    use super::*;
    use crate::client::Client;
    use crate::config::{ClientOptions, ServerConfig};
    use crate::server::Server;
    use crate::transport::{RakNetEvent, RakNetLink};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    struct Fixture {
        pair: Arc<BridgePair>,
        /// The wire the real client would be attached to.
        client_side: RakNetLink,
        /// The wire the real server would be attached to.
        server_side: RakNetLink,
    }

    async fn fixture() -> Fixture {
        let (client_side, down_link) = RakNetLink::pair(addr(19132), addr(50130));
        let (up_link, mut server_side) = RakNetLink::pair(addr(50131), addr(19133));

        let downstream = Server::accept_with(ServerConfig::default(), down_link, true).unwrap();
        let upstream = Client::open(
            up_link,
            ClientOptions::offline("Steve", "127.0.0.1:19133"),
            true,
        )
        .unwrap();

        // Swallow the RequestNetworkSettings the upstream session sent on
        // creation; the tests only care about forwarded frames.
        let _ = server_side.events.recv().await.unwrap();

        let pair = BridgePair::new(downstream, upstream);
        pair.mark_upstream_ready().unwrap();

        Fixture { pair, client_side, server_side }
    }

    /// Receives one forwarded sub-packet from an uncompressed batch.
    async fn recv_frame(link: &mut RakNetLink) -> Vec<u8> {
        match timeout(Duration::from_secs(1), link.events.recv()).await.unwrap().unwrap() {
            RakNetEvent::Datagram(datagram) => {
                assert_eq!(datagram[0], 0xfe);
                let frames = proto::framer::unframe(&datagram[1..]).unwrap();
                assert_eq!(frames.len(), 1);
                frames[0].to_vec()
            }
            RakNetEvent::Closed => panic!("Link closed unexpectedly"),
        }
    }

    async fn assert_nothing_forwarded(link: &mut RakNetLink) {
        assert!(timeout(Duration::from_millis(50), link.events.recv()).await.is_err());
    }

    fn chunk_frame(x: i32) -> Vec<u8> {
        GamePacket::LevelChunk(LevelChunk {
            x,
            z: 0,
            sub_chunk_count: 1,
            cache_enabled: false,
            blob_hashes: Vec::new(),
            payload: vec![x as u8],
        })
        .serialize()
        .unwrap()
    }

    fn start_game_frame() -> Vec<u8> {
        GamePacket::StartGame(StartGame::default()).serialize().unwrap()
    }

    fn text_frame(message: &str) -> Vec<u8> {
        GamePacket::Text(TextMessage {
            data: TextData::Chat { source: "Steve".to_owned(), message: message.to_owned() },
            needs_translation: false,
            xuid: String::new(),
            platform_chat_id: String::new(),
        })
        .serialize()
        .unwrap()
    }

    #[test]
    fn hex_encoding() {
        assert_eq!(to_hex(&[0x00, 0xfe, 0x0a]), "00fe0a");
        assert_eq!(to_hex(&[]), "");
    }

    #[tokio::test]
    async fn unobserved_packets_pass_through_byte_identical() {
        let mut fixture = fixture().await;

        let frame = GamePacket::Unknown { id: 0x1f0, body: vec![9, 8, 7, 6] }.serialize().unwrap();
        fixture.pair.handle_clientbound(&frame).unwrap();

        assert_eq!(recv_frame(&mut fixture.client_side).await, frame);
    }

    #[tokio::test]
    async fn chunks_defer_until_start_game() {
        let mut fixture = fixture().await;

        for x in 0..3 {
            fixture.pair.handle_clientbound(&chunk_frame(x)).unwrap();
        }
        assert_nothing_forwarded(&mut fixture.client_side).await;
        assert!(!fixture.pair.post_start_game());

        fixture.pair.handle_clientbound(&start_game_frame()).unwrap();
        assert!(fixture.pair.post_start_game());

        // StartGame first, then the chunks in arrival order.
        assert_eq!(recv_frame(&mut fixture.client_side).await, start_game_frame());
        for x in 0..3 {
            assert_eq!(recv_frame(&mut fixture.client_side).await, chunk_frame(x));
        }
    }

    #[tokio::test]
    async fn chunks_flow_directly_after_start_game() {
        let mut fixture = fixture().await;

        fixture.pair.handle_clientbound(&start_game_frame()).unwrap();
        let _ = recv_frame(&mut fixture.client_side).await;

        fixture.pair.handle_clientbound(&chunk_frame(7)).unwrap();
        assert_eq!(recv_frame(&mut fixture.client_side).await, chunk_frame(7));
    }

    #[tokio::test]
    async fn cache_status_is_always_forced_off() {
        let mut fixture = fixture().await;

        let frame = GamePacket::ClientCacheStatus(ClientCacheStatus { enabled: true })
            .serialize()
            .unwrap();
        fixture.pair.handle_serverbound(&frame).unwrap();

        let forwarded = recv_frame(&mut fixture.server_side).await;
        let decoded = catalog().decode(&forwarded).unwrap();
        assert_eq!(
            decoded,
            GamePacket::ClientCacheStatus(ClientCacheStatus { enabled: false })
        );
    }

    #[tokio::test]
    async fn listeners_can_modify_packets() {
        let mut fixture = fixture().await;

        fixture.pair.on(
            Direction::Serverbound,
            ListenKey::Packet(PacketName::Text),
            |packet, signal| {
                if let GamePacket::Text(text) = packet {
                    text.data.message_mut().push('.');
                    signal.modified = true;
                }
            },
        );

        fixture.pair.handle_serverbound(&text_frame("hello")).unwrap();

        let forwarded = recv_frame(&mut fixture.server_side).await;
        match catalog().decode(&forwarded).unwrap() {
            GamePacket::Text(text) => assert_eq!(text.data.message(), "hello."),
            other => panic!("Expected a text message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn listeners_can_cancel_packets() {
        let mut fixture = fixture().await;

        fixture.pair.on(Direction::Clientbound, ListenKey::Packet(PacketName::Text), |_, signal| {
            signal.cancelled = true;
        });

        fixture.pair.handle_clientbound(&text_frame("dropped")).unwrap();

        // A marker behind the cancelled packet is the only thing that
        // arrives.
        let marker = GamePacket::Unknown { id: 0x1f0, body: vec![1] }.serialize().unwrap();
        fixture.pair.handle_clientbound(&marker).unwrap();
        assert_eq!(recv_frame(&mut fixture.client_side).await, marker);
    }

    #[tokio::test]
    async fn serverbound_queue_holds_until_upstream_ready() {
        let (client_side, down_link) = RakNetLink::pair(addr(19132), addr(50140));
        let (up_link, mut server_side) = RakNetLink::pair(addr(50141), addr(19133));

        let downstream = Server::accept_with(ServerConfig::default(), down_link, true).unwrap();
        let upstream = Client::open(
            up_link,
            ClientOptions::offline("Steve", "127.0.0.1:19133"),
            true,
        )
        .unwrap();
        let _ = server_side.events.recv().await.unwrap();

        let pair = BridgePair::new(downstream, upstream);

        pair.handle_serverbound(&text_frame("early")).unwrap();
        assert_nothing_forwarded(&mut server_side).await;

        pair.mark_upstream_ready().unwrap();
        assert_eq!(recv_frame(&mut server_side).await, text_frame("early"));

        drop(client_side);
    }
}
