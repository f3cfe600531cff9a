//! The man-in-the-middle persona: a server to the real client, a client
//! to the real server.

mod pair;

pub use pair::{BridgePair, Direction};

use std::future::Future;
use std::sync::{Arc, Once};

use proto::bedrock::{catalog, ClientCacheStatus, ConnectedPacket, LevelChunk};
use proto::bedrock::DISCONNECTED_NO_REASON;
use tokio::sync::mpsc;
use util::Deserialize;

use crate::client::Client;
use crate::config::{BridgeConfig, ClientOptions};
use crate::error::SessionError;
use crate::server::Server;
use crate::session::{Session, SessionState};
use crate::transport::RakNetLink;

static CATALOG_OVERRIDES: Once = Once::new();

/// Swaps in decoders that tolerate payload revisions; a relay must never
/// drop a packet because the format moved under it.
fn install_catalog_overrides() {
    CATALOG_OVERRIDES.call_once(|| {
        catalog().register(LevelChunk::ID, |body| {
            LevelChunk::deserialize_lenient(body).map(Into::into)
        });
        catalog().register(ClientCacheStatus::ID, |body| {
            if body.is_empty() {
                Ok(ClientCacheStatus { enabled: false }.into())
            } else {
                ClientCacheStatus::deserialize(body).map(Into::into)
            }
        });
    });
}

/// Builds intercepted connection pairs.
pub struct Bridge;

impl Bridge {
    /// Couples one accepted downstream connection with an upstream
    /// connection to the real server.
    ///
    /// The downstream session runs its own login handshake first; only
    /// once it is logged in does `connect_upstream` get awaited, and the
    /// upstream session logs in with the downstream player's payload.
    pub async fn couple<F>(
        down_link: RakNetLink,
        config: BridgeConfig,
        connect_upstream: F,
    ) -> anyhow::Result<Arc<BridgePair>>
    where
        F: Future<Output = anyhow::Result<RakNetLink>>,
    {
        install_catalog_overrides();

        let downstream = Server::accept_with(config.downstream.clone(), down_link, true)?;
        downstream.wait_for(SessionState::LoggedIn).await?;

        let mut payload = downstream
            .user_payload()
            .cloned()
            .ok_or_else(|| SessionError::Auth("Downstream login left no payload".to_owned()))?;
        // The real server checks this against its own advertised address.
        payload.server_address = config.upstream_address.clone();

        let username = downstream
            .profile()
            .map(|profile| profile.name.clone())
            .unwrap_or_default();

        let up_link = connect_upstream.await?;
        let upstream = Client::open(
            up_link,
            ClientOptions {
                offline: config.provider.is_none(),
                provider: config.provider.clone(),
                payload: Some(payload),
                ..ClientOptions::offline(username, config.upstream_address.clone())
            },
            true,
        )?;

        let pair = BridgePair::new(downstream.clone(), upstream.clone());

        let tap_pair = Arc::downgrade(&pair);
        upstream.install_tap(Box::new(move |frame| {
            match tap_pair.upgrade() {
                Some(pair) => pair.handle_clientbound(frame),
                None => Ok(()),
            }
        }));

        let tap_pair = Arc::downgrade(&pair);
        downstream.install_tap(Box::new(move |frame| {
            match tap_pair.upgrade() {
                Some(pair) => pair.handle_serverbound(frame),
                None => Ok(()),
            }
        }));

        // Serverbound traffic is released once the upstream session has
        // logged itself in.
        let ready_pair = pair.clone();
        tokio::spawn(async move {
            if ready_pair.upstream().wait_for(SessionState::LoggedIn).await.is_ok() {
                if let Err(err) = ready_pair.mark_upstream_ready() {
                    tracing::error!("Failed to flush queued serverbound packets | {err:#}");
                }
            }
        });

        // The pair is atomic: either side dying takes the other with it.
        Self::bind_teardown(downstream.clone(), upstream.clone());
        Self::bind_teardown(upstream, downstream);

        Ok(pair)
    }

    /// Accept loop: every downstream connection is paired with a fresh
    /// upstream connection produced by the connector.
    pub fn start<C, Fut>(
        config: BridgeConfig,
        mut connections: mpsc::Receiver<RakNetLink>,
        connector: C,
    ) -> mpsc::Receiver<Arc<BridgePair>>
    where
        C: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RakNetLink>> + Send + 'static,
    {
        let (pairs_tx, pairs_rx) = mpsc::channel(16);
        let connector = Arc::new(connector);

        tokio::spawn(async move {
            while let Some(link) = connections.recv().await {
                let config = config.clone();
                let connector = connector.clone();
                let pairs = pairs_tx.clone();

                tokio::spawn(async move {
                    match Self::couple(link, config, connector()).await {
                        Ok(pair) => {
                            let _ = pairs.send(pair).await;
                        }
                        Err(err) => {
                            tracing::error!("Failed to establish bridge pair | {err:#}");
                        }
                    }
                });
            }
        });

        pairs_rx
    }

    /// Propagates the death of one session to its counterpart, carrying
    /// the observed Disconnect reason along.
    fn bind_teardown(watched: Arc<Session>, other: Arc<Session>) {
        tokio::spawn(async move {
            let mut receiver = watched.subscribe_state();
            loop {
                if *receiver.borrow_and_update() == SessionState::Disconnected {
                    break;
                }
                if receiver.changed().await.is_err() {
                    break;
                }
            }

            if other.state() != SessionState::Disconnected {
                let reason = watched
                    .disconnect_reason()
                    .unwrap_or_else(|| DISCONNECTED_NO_REASON.to_owned());
                other.disconnect(Some(&reason));
            }
        });
    }
}
