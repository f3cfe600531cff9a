//! The per-connection state machine.

mod client;
mod server;
mod state;

pub use state::{SessionKind, SessionState};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use proto::auth::{LoginChain, Profile, UserPayload};
use proto::bedrock::{
    catalog, ConnectedPacket, Disconnect, Header, PacketName, RequestNetworkSettings, StartGame,
    GAME_PACKET_ID,
};
use proto::compress::{self, Compression, CompressionMethod};
use proto::crypto::{BedrockIdentity, Encryptor};
use proto::crypto::KeyPair;
use proto::framer;
use proto::CodecError;
use util::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::SessionError;
use crate::transport::{RakNetCommand, RakNetEvent};

/// Receives raw sub-packet frames once a bridge takes over a session.
pub type FrameTap = Box<dyn Fn(&[u8]) -> anyhow::Result<()> + Send + Sync>;

/// Role-specific session data.
pub(crate) enum SessionRole {
    /// An outbound connection with a prepared login chain.
    Client {
        chain: LoginChain,
        payload: UserPayload,
        protocol_version: i32,
    },
    /// An accepted connection.
    Server { config: ServerConfig },
}

/// One connection's worth of protocol state.
///
/// The session owns its framing, compression and encryption exclusively;
/// towards RakNet it only holds a command channel, never the socket. All
/// packet processing for a session happens on its pump task, one datagram
/// at a time.
pub struct Session {
    addr: SocketAddr,
    role: SessionRole,
    keys: KeyPair,
    commands: mpsc::UnboundedSender<RakNetCommand>,
    token: CancellationToken,
    state: watch::Sender<SessionState>,
    compression: Mutex<Option<Compression>>,
    encryptor: Mutex<Option<Encryptor>>,
    send_queue: Mutex<Vec<Vec<u8>>>,
    dispatcher: Dispatcher,
    identity: OnceLock<BedrockIdentity>,
    user_payload: OnceLock<UserPayload>,
    profile: OnceLock<Profile>,
    start_game: OnceLock<StartGame>,
    cache_status: OnceLock<bool>,
    disconnect_reason: Mutex<Option<String>>,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    /// Bridge mode: stop handling packets once the session is past login
    /// and hand them to the tap instead.
    cancel_past_login: AtomicBool,
    tap: OnceLock<FrameTap>,
    pending_tap: Mutex<Vec<Vec<u8>>>,
}

impl Session {
    pub(crate) fn new(
        addr: SocketAddr,
        commands: mpsc::UnboundedSender<RakNetCommand>,
        role: SessionRole,
        keys: KeyPair,
    ) -> Arc<Self> {
        Arc::new(Self {
            addr,
            role,
            keys,
            commands,
            token: CancellationToken::new(),
            state: watch::Sender::new(SessionState::Connecting),
            compression: Mutex::new(None),
            encryptor: Mutex::new(None),
            send_queue: Mutex::new(Vec::new()),
            dispatcher: Dispatcher::new(),
            identity: OnceLock::new(),
            user_payload: OnceLock::new(),
            profile: OnceLock::new(),
            start_game: OnceLock::new(),
            cache_status: OnceLock::new(),
            disconnect_reason: Mutex::new(None),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            cancel_past_login: AtomicBool::new(false),
            tap: OnceLock::new(),
            pending_tap: Mutex::new(Vec::new()),
        })
    }

    /// Starts the task that feeds RakNet events into this session.
    pub(crate) fn spawn_pump(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<RakNetEvent>) {
        let session = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = session.token.cancelled() => break,
                    event = events.recv() => match event {
                        Some(RakNetEvent::Datagram(datagram)) => {
                            eprintln!("DEBUG pump got datagram len {}", datagram.len());
                            if let Err(err) = session.handle_datagram(&datagram) {
                                eprintln!("DEBUG handle_datagram ERROR: {err:#}");
                                session.handle_fatal(&err);
                                break;
                            }
                        }
                        Some(RakNetEvent::Closed) | None => {
                            session.close();
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Address of the remote peer.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Which side of the connection this session plays.
    pub fn kind(&self) -> SessionKind {
        match self.role {
            SessionRole::Client { .. } => SessionKind::Client,
            SessionRole::Server { .. } => SessionKind::Server,
        }
    }

    /// The session's event bus.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The peer identity, available once login completed (server side)
    /// or taken from the prepared chain (client side).
    pub fn identity(&self) -> Option<&BedrockIdentity> {
        self.identity.get()
    }

    /// The user payload received in the login (server side).
    pub fn user_payload(&self) -> Option<&UserPayload> {
        self.user_payload.get()
    }

    /// The player profile of this session.
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.get()
    }

    /// The StartGame packet received from the server (client side).
    pub fn start_game(&self) -> Option<&StartGame> {
        self.start_game.get()
    }

    /// The blob-cache preference announced by the client.
    pub fn cache_status(&self) -> Option<bool> {
        self.cache_status.get().copied()
    }

    /// The Disconnect message received from the peer, if any.
    pub fn disconnect_reason(&self) -> Option<String> {
        self.disconnect_reason.lock().clone()
    }

    /// Amount of sub-packets sent over this session.
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    /// Amount of sub-packets received over this session.
    pub fn packets_received(&self) -> u64 {
        self.packets_received.load(Ordering::Relaxed)
    }

    pub(crate) fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!("[{}] Session state {previous:?} -> {next:?}", self.addr);
        }
    }

    /// Waits until the session reaches (or has passed) the given state.
    ///
    /// Fails when the session disconnects first, carrying the peer's
    /// Disconnect message when one was received.
    pub async fn wait_for(&self, target: SessionState) -> anyhow::Result<()> {
        let mut receiver = self.subscribe_state();

        loop {
            let state = *receiver.borrow_and_update();
            if target == SessionState::Disconnected {
                if state == target {
                    return Ok(());
                }
            } else {
                if state == SessionState::Disconnected {
                    let reason = self
                        .disconnect_reason()
                        .unwrap_or_else(|| "connection closed".to_owned());
                    return Err(SessionError::Transport(reason).into());
                }
                // States advance strictly forward; the caller must not
                // block when the target was crossed before subscribing.
                if state >= target {
                    return Ok(());
                }
            }

            if receiver.changed().await.is_err() {
                return Err(SessionError::Transport("session dropped".to_owned()).into());
            }
        }
    }

    pub(crate) fn server_config(&self) -> &ServerConfig {
        match &self.role {
            SessionRole::Server { config } => config,
            SessionRole::Client { .. } => unreachable!("server handler on a client session"),
        }
    }

    pub(crate) fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub(crate) fn set_compression(&self, compression: Compression) {
        *self.compression.lock() = Some(compression);
    }

    /// Negotiated compression settings, if any.
    pub fn compression(&self) -> Option<Compression> {
        *self.compression.lock()
    }

    pub(crate) fn install_encryptor(&self, encryptor: Encryptor) {
        *self.encryptor.lock() = Some(encryptor);
        tracing::debug!("[{}] Encryption enabled", self.addr);
    }

    /// Whether encryption is active.
    pub fn encrypted(&self) -> bool {
        self.encryptor.lock().is_some()
    }

    pub(crate) fn set_identity(&self, identity: BedrockIdentity) {
        let _ = self.identity.set(identity);
    }

    pub(crate) fn set_user_payload(&self, payload: UserPayload) {
        let _ = self.user_payload.set(payload);
    }

    pub(crate) fn set_profile(&self, profile: Profile) {
        let _ = self.profile.set(profile);
    }

    pub(crate) fn set_start_game(&self, start_game: StartGame) {
        let _ = self.start_game.set(start_game);
    }

    pub(crate) fn set_cache_status(&self, enabled: bool) {
        let _ = self.cache_status.set(enabled);
    }

    pub(crate) fn set_disconnect_reason(&self, reason: String) {
        self.disconnect_reason.lock().get_or_insert(reason);
    }

    /// Puts the session into bridge mode: once past login, frames are
    /// diverted to the tap instead of the built-in handlers.
    pub(crate) fn set_bridge_mode(&self) {
        self.cancel_past_login.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_bridge_mode(&self) -> bool {
        self.cancel_past_login.load(Ordering::Relaxed)
    }

    /// Installs the bridge tap, draining any frames that arrived between
    /// login completion and this call.
    pub(crate) fn install_tap(&self, tap: FrameTap) {
        let mut pending = self.pending_tap.lock();
        let _ = self.tap.set(tap);

        let tap = self.tap.get().expect("tap was just installed");
        for frame in pending.drain(..) {
            if let Err(err) = tap(&frame) {
                tracing::error!("[{}] Tap failed on deferred frame | {err:#}", self.addr);
            }
        }
    }

    fn tap_frame(&self, frame: &[u8]) -> anyhow::Result<()> {
        if let Some(tap) = self.tap.get() {
            return tap(frame);
        }

        let mut pending = self.pending_tap.lock();
        // The tap may have been installed while acquiring the lock.
        if let Some(tap) = self.tap.get() {
            return tap(frame);
        }

        pending.push(frame.to_vec());
        Ok(())
    }

    /// Client only: kicks off the connection sequence.
    pub(crate) fn begin_connect(&self) -> anyhow::Result<()> {
        let SessionRole::Client { protocol_version, .. } = &self.role else {
            unreachable!("begin_connect on a server session");
        };

        // The state advances before the request leaves; the reply races
        // this function otherwise.
        self.set_state(SessionState::AwaitNetworkSettings);
        self.send(RequestNetworkSettings { protocol_version: *protocol_version })?;
        Ok(())
    }

    /// Serialises a packet and queues it for the next batch.
    pub fn queue<T: ConnectedPacket + Serialize>(&self, packet: T) -> anyhow::Result<()> {
        let serialized = proto::bedrock::serialize_packet(&packet)?;
        self.queue_serialized(serialized);
        Ok(())
    }

    /// Queues an already serialised sub-packet (header included).
    pub fn queue_serialized(&self, frame: Vec<u8>) {
        self.send_queue.lock().push(frame);
    }

    /// Sends a packet in its own batch.
    pub fn send<T: ConnectedPacket + Serialize>(&self, packet: T) -> anyhow::Result<()> {
        self.queue(packet)?;
        self.flush()
    }

    /// Sends an already serialised sub-packet, bypassing re-serialisation.
    /// Bridges use this to forward observed frames byte for byte.
    pub fn send_serialized(&self, frame: Vec<u8>) -> anyhow::Result<()> {
        self.queue_serialized(frame);
        self.flush()
    }

    /// Assembles all queued sub-packets into one outgoing batch.
    ///
    /// The batch always leads with `0xfe`. With encryption off and
    /// compression negotiated, a method byte follows; with encryption on
    /// the ciphertext follows directly and hides the method.
    pub fn flush(&self) -> anyhow::Result<()> {
        let frames = {
            let mut queue = self.send_queue.lock();
            if queue.is_empty() {
                return Ok(());
            }
            std::mem::take(&mut *queue)
        };

        self.packets_sent.fetch_add(frames.len() as u64, Ordering::Relaxed);
        let framed = framer::frame(&frames)?;

        // The cipher lock is held until the batch is handed over, so the
        // counter sequence matches network order.
        let encryptor = self.encryptor.lock();
        let batch = if let Some(encryptor) = encryptor.as_ref() {
            // Deflate before encrypting; the method byte is omitted under
            // encryption, so the receiver detects compression instead.
            let compression = *self.compression.lock();
            let payload = match compression {
                Some(compression)
                    if compression.threshold != 0
                        && framed.len() > compression.threshold as usize =>
                {
                    compress::deflate(&framed)?
                }
                _ => framed,
            };

            let ciphertext = encryptor.encrypt(payload);
            let mut batch = Vec::with_capacity(1 + ciphertext.len());
            batch.push(GAME_PACKET_ID);
            batch.extend_from_slice(&ciphertext);
            batch
        } else if let Some(compression) = *self.compression.lock() {
            let (method, payload) = compression.compress(framed)?;
            let mut batch = Vec::with_capacity(2 + payload.len());
            batch.push(GAME_PACKET_ID);
            batch.push(method.to_byte());
            batch.extend_from_slice(&payload);
            batch
        } else {
            let mut batch = Vec::with_capacity(1 + framed.len());
            batch.push(GAME_PACKET_ID);
            batch.extend_from_slice(&framed);
            batch
        };

        self.commands
            .send(RakNetCommand::Send(batch))
            .map_err(|_| SessionError::Transport("RakNet worker is gone".to_owned()))?;
        Ok(())
    }

    /// Processes one encapsulated datagram to completion.
    pub fn handle_datagram(&self, datagram: &[u8]) -> anyhow::Result<()> {
        eprintln!("DEBUG handle_datagram entered, datagram={:?}", datagram);
        let Some((&lead, body)) = datagram.split_first() else {
            tracing::debug!("[{}] Dropped empty datagram", self.addr);
            return Ok(());
        };

        if lead != GAME_PACKET_ID {
            tracing::debug!("[{}] Dropped non-game datagram {lead:#04x}", self.addr);
            return Ok(());
        }

        eprintln!("DEBUG before encryptor lock, lead={:#x}", lead);
        let batch = {
            let encryptor = self.encryptor.lock();
            eprintln!("DEBUG got encryptor lock, is_some={}", encryptor.is_some());
            if let Some(encryptor) = encryptor.as_ref() {
                let plaintext = encryptor.decrypt(body.to_vec())?;
                eprintln!("DEBUG plaintext after decrypt: {:?}", plaintext);
                compress::inflate_or_passthrough(&plaintext)
            } else if self.compression.lock().is_some() {
                let Some((&method, payload)) = body.split_first() else {
                    anyhow::bail!("Batch is missing its compression method byte");
                };

                let method = CompressionMethod::from_byte(method)?;
                Compression::decompress(method, payload)?
            } else {
                body.to_vec()
            }
        };

        eprintln!("DEBUG batch after decrypt/decompress: {:?}", batch);
        for frame in framer::unframe(&batch)? {
            self.handle_frame(frame)?;
        }

        Ok(())
    }

    fn handle_frame(&self, frame: &[u8]) -> anyhow::Result<()> {
        let mut reader = frame;
        let header = match Header::deserialize_from(&mut reader) {
            Ok(header) => header,
            Err(err) => {
                tracing::warn!("[{}] Dropped packet with malformed header | {err:#}", self.addr);
                return Ok(());
            }
        };
        let body = reader;
        eprintln!("DEBUG handle_frame header.id={:#x}", header.id);

        self.packets_received.fetch_add(1, Ordering::Relaxed);

        // A bridge owns everything past login.
        if self.cancel_past_login.load(Ordering::Relaxed) && self.state().past_login() {
            return self.tap_frame(frame);
        }

        match self.kind() {
            SessionKind::Server => self.handle_serverbound(header, body, frame)?,
            SessionKind::Client => self.handle_clientbound(header, body, frame)?,
        }

        self.dispatch_frame(header, frame);
        Ok(())
    }

    /// Hands a packet to the dispatcher, skipping deserialisation when
    /// nothing listens.
    fn dispatch_frame(&self, header: Header, frame: &[u8]) {
        let name = PacketName::from_id(header.id);
        if !self.dispatcher.observes(name) {
            return;
        }

        match catalog().decode(frame) {
            Ok(mut packet) => {
                self.dispatcher.dispatch(&mut packet);
            }
            Err(err) => {
                tracing::warn!(
                    "[{}] Dropped {name:?} packet that failed to decode | {err:#}",
                    self.addr
                );
            }
        }
    }

    pub(crate) fn expect_state(
        &self,
        expected: SessionState,
        packet: &'static str,
    ) -> anyhow::Result<()> {
        let state = self.state();
        if state != expected {
            let _ = self.kick(proto::bedrock::DISCONNECTED_PROTOCOL);
            return Err(SessionError::Protocol { packet, state }.into());
        }

        Ok(())
    }

    /// Decodes a packet body, kicking the peer when it is malformed in a
    /// phase where tolerating garbage is not an option.
    pub(crate) fn decode_strict<'a, T: Deserialize<'a>>(
        &self,
        body: &'a [u8],
        reason: &str,
    ) -> anyhow::Result<T> {
        match T::deserialize(body) {
            Ok(packet) => Ok(packet),
            Err(err) => {
                let _ = self.kick(reason);
                Err(err)
            }
        }
    }

    /// Sends a Disconnect with the given reason and tears the session
    /// down.
    pub fn kick(&self, reason: &str) -> anyhow::Result<()> {
        if self.state() == SessionState::Disconnected {
            return Ok(());
        }

        tracing::debug!("[{}] Kicked: {reason}", self.addr);
        let _ = self.send(Disconnect { hide_message: false, message: reason.to_owned() });
        self.close();
        Ok(())
    }

    /// Idempotent teardown. The first call wins; key material is
    /// dropped and the RakNet layer is told to close.
    pub fn disconnect(&self, reason: Option<&str>) {
        if let Some(reason) = reason {
            let _ = self.kick(reason);
        } else {
            self.close();
        }
    }

    /// Tears down without sending a Disconnect packet.
    pub(crate) fn close(&self) {
        if self.state() == SessionState::Disconnected {
            return;
        }

        self.set_state(SessionState::Disconnected);
        // Zeroise the cipher state.
        self.encryptor.lock().take();
        let _ = self.commands.send(RakNetCommand::Disconnect);
        self.token.cancel();
    }

    fn handle_fatal(&self, err: &anyhow::Error) {
        if let Some(codec) = err.downcast_ref::<CodecError>() {
            // Cipher and framing failures leave the stream ambiguous:
            // close immediately, without a Disconnect packet.
            tracing::error!("[{}] Fatal stream error | {codec}", self.addr);
        } else {
            tracing::error!("[{}] Fatal session error | {err:#}", self.addr);
        }

        self.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
