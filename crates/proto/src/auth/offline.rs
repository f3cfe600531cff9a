use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::auth::{LoginChain, Profile, UserPayload};
use crate::crypto::{jwt, KeyPair};

/// Title id claimed by self-signed identity tokens, matching the value
/// the Windows client sends.
const OFFLINE_TITLE_ID: &str = "89692877";

/// Lifetime of a self-signed identity token.
const OFFLINE_TOKEN_LIFETIME: u64 = 3600;

#[derive(Serialize, Debug)]
struct ExtraData<'a> {
    #[serde(rename = "displayName")]
    display_name: &'a str,
    identity: Uuid,
    #[serde(rename = "XUID")]
    xuid: &'a str,
    #[serde(rename = "titleId")]
    title_id: &'a str,
}

#[derive(Serialize, Debug)]
struct OfflineClaims<'a> {
    #[serde(rename = "extraData")]
    extra_data: ExtraData<'a>,
    #[serde(rename = "certificateAuthority")]
    certificate_authority: bool,
    #[serde(rename = "identityPublicKey")]
    identity_public_key: &'a str,
    exp: u64,
    nbf: u64,
    iss: &'a str,
}

/// The deterministic profile of an offline player.
///
/// The UUID is a v3 hash of the username, so the same name always maps
/// to the same identity.
pub fn offline_profile(name: &str) -> Profile {
    Profile {
        name: name.to_owned(),
        uuid: Uuid::new_v3(&Uuid::NAMESPACE_URL, name.as_bytes()),
        xuid: 0,
    }
}

/// Synthesises a self-signed login chain for the given username.
pub fn create_offline(
    name: &str,
    keys: &KeyPair,
    payload: &UserPayload,
) -> anyhow::Result<(LoginChain, Profile)> {
    let profile = offline_profile(name);

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let claims = OfflineClaims {
        extra_data: ExtraData {
            display_name: name,
            identity: profile.uuid,
            xuid: "0",
            title_id: OFFLINE_TITLE_ID,
        },
        certificate_authority: true,
        identity_public_key: keys.x5u(),
        exp: now + OFFLINE_TOKEN_LIFETIME,
        nbf: 0,
        iss: "self",
    };

    let identity = jwt::sign(&claims, keys)?;
    let user = jwt::sign(payload, keys)?;

    Ok((LoginChain { identity: vec![identity], user }, profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::jwt::verify_chain;

    #[test]
    fn offline_uuid_is_deterministic() {
        let steve = offline_profile("Steve");

        assert_eq!(steve, offline_profile("Steve"));
        assert_ne!(steve.uuid, offline_profile("Alex").uuid);
        assert_eq!(steve.xuid, 0);
    }

    #[test]
    fn offline_chain_verifies_as_unverified() {
        let keys = KeyPair::generate().unwrap();
        let payload = UserPayload::for_address("127.0.0.1:19132", "Steve");

        let (chain, profile) = create_offline("Steve", &keys, &payload).unwrap();
        let verified = verify_chain(&chain.identity).unwrap();

        assert!(!verified.verified);
        assert_eq!(verified.identity.name, "Steve");
        assert_eq!(verified.identity.uuid, profile.uuid);
        assert_eq!(verified.identity.xuid, 0);
        assert_eq!(verified.identity.public_key, keys.x5u());
    }

    #[test]
    fn user_token_verifies_against_identity_key() {
        let keys = KeyPair::generate().unwrap();
        let payload = UserPayload::for_address("127.0.0.1:19132", "Steve");

        let (chain, _) = create_offline("Steve", &keys, &payload).unwrap();
        let verified = verify_chain(&chain.identity).unwrap();

        let decoded: UserPayload =
            jwt::verify_user_token(&chain.user, &verified.identity.public_key).unwrap();
        assert_eq!(decoded, payload);
    }
}
