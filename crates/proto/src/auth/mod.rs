//! Produces the identity and user token chains sent inside a Login packet.

pub mod cache;
pub mod offline;
pub mod payload;

pub use cache::{CachedUserToken, TokenCache};
pub use offline::{create_offline, offline_profile};
pub use payload::{DeviceOS, UserPayload};

use uuid::Uuid;

use crate::crypto::{jwt, KeyPair};

/// A player identity as the rest of the stack sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Display name.
    pub name: String,
    /// Platform UUID.
    pub uuid: Uuid,
    /// Xbox user id, zero for offline players.
    pub xuid: u64,
}

/// The two token artifacts carried by a Login packet.
#[derive(Debug, Clone)]
pub struct LoginChain {
    /// The identity JWT chain, innermost token last.
    pub identity: Vec<String>,
    /// The user data JWT.
    pub user: String,
}

/// Supplies pre-signed identity chains for online authentication.
///
/// Implementations wrap the Xbox Live device-code flow and its HTTP
/// endpoints; this crate only consumes their output. The chain must be
/// bound to the session key whose `x5u` is passed in.
pub trait IdentityProvider: Send + Sync {
    /// Returns the identity chain for the given session public key.
    fn identity_chain(&self, session_x5u: &str) -> anyhow::Result<Vec<String>>;
}

/// Builds a login chain from an external identity provider.
///
/// The returned chain has already been verified; the profile is taken
/// from the innermost token.
pub fn create_online(
    provider: &dyn IdentityProvider,
    keys: &KeyPair,
    payload: &UserPayload,
) -> anyhow::Result<(LoginChain, Profile)> {
    let identity = provider.identity_chain(keys.x5u())?;

    let verified = jwt::verify_chain(&identity)?;
    if !verified.verified {
        anyhow::bail!("Identity chain was not signed by Mojang");
    }

    let user = jwt::sign(payload, keys)?;
    let profile = Profile {
        name: verified.identity.name,
        uuid: verified.identity.uuid,
        xuid: verified.identity.xuid,
    };

    Ok((LoginChain { identity, user }, profile))
}
