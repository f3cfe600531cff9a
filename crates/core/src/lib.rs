//! The Bedrock session pipeline: per-connection state machines with
//! three personas built on top of them.
//!
//! A [`Session`](session::Session) owns the framing, compression and
//! encryption of one connection and drives the Login/Handshake sequence.
//! The [`Client`](client::Client) and [`Server`](server::Server) facades
//! wrap RakNet connections in sessions; the [`Bridge`](bridge::Bridge)
//! couples two sessions into a man-in-the-middle pair that can observe
//! and rewrite every game packet.

pub mod bridge;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod server;
pub mod session;
pub mod transport;

pub use bridge::{Bridge, BridgePair, Direction};
pub use client::{Client, Connection};
pub use config::{BridgeConfig, ClientOptions, ServerConfig};
pub use dispatcher::{Dispatcher, ListenKey, Signal};
pub use error::SessionError;
pub use server::{Server, ServerEvent};
pub use session::{Session, SessionKind, SessionState};
pub use transport::{RakNetCommand, RakNetEvent, RakNetLink};
