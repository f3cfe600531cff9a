use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use p384::elliptic_curve::sec1::ToEncodedPoint;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::keys::{public_key_from_x5u, KeyPair};

/// Mojang's public key, used to recognise identity chains signed by
/// Mojang's authentication servers.
pub const MOJANG_PUBLIC_KEY: &str = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAECRXueJeTDqNRRgJi/vlRufByu/2G0i2Ebt6YMar5QX/R0DIIyrJMcUpruK4QveTfJSTp3Shlq4Gk34cD/4GUWwkv0DVuzeuB+tXija7HBxii03NHDbPAD0AKnLr2wdAp";

/// Base64 without padding, the format x5u headers travel in.
const BASE64_ENGINE: base64::engine::GeneralPurpose =
    base64::engine::general_purpose::STANDARD_NO_PAD;

/// Decodes base64 regardless of whether the sender padded it.
fn decode_base64(value: &str) -> anyhow::Result<Vec<u8>> {
    Ok(BASE64_ENGINE.decode(value.trim_end_matches('='))?)
}

/// Builds a JOSE verification key from a base64 SPKI public key.
fn decoding_key(x5u: &str) -> anyhow::Result<DecodingKey> {
    let public_key = public_key_from_x5u(x5u)?;
    let point = public_key.to_encoded_point(false);

    Ok(DecodingKey::from_ec_der(point.as_bytes()))
}

/// Signs a set of claims with ES384.
///
/// The header carries the signer's public key as `x5u` and omits `typ`,
/// matching what the game's own tokens look like.
pub fn sign<T: Serialize>(claims: &T, keys: &KeyPair) -> anyhow::Result<String> {
    let mut header = Header::new(Algorithm::ES384);
    header.typ = None;
    header.x5u = Some(keys.x5u().to_owned());

    let encoding_key = EncodingKey::from_ec_der(&keys.private_key_der()?);
    Ok(jsonwebtoken::encode(&header, claims, &encoding_key)?)
}

/// Used to extract the public key from the identity tokens.
#[derive(Deserialize, Debug)]
struct KeyTokenPayload {
    #[serde(rename = "identityPublicKey")]
    pub public_key: String,
}

/// Data extracted from the "extraData" field in the last token in the
/// identity chain.
#[derive(Deserialize, Debug)]
pub struct RawIdentityData {
    #[serde(rename = "XUID")]
    pub xuid: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "identity")]
    pub uuid: Uuid,
}

/// Used to extract the identity data and public key from the last
/// identity token.
#[derive(Deserialize, Debug)]
pub struct IdentityTokenPayload {
    #[serde(rename = "extraData")]
    pub client_data: RawIdentityData,
    #[serde(rename = "identityPublicKey")]
    pub public_key: String,
}

/// Data contained in the identity token chain.
#[derive(Debug, Clone)]
pub struct BedrockIdentity {
    /// Xbox account ID. Zero for offline players.
    pub xuid: u64,
    /// UUID unique for this player.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Public key used for token verification and encryption.
    pub public_key: String,
}

/// The outcome of walking an identity chain.
#[derive(Debug, Clone)]
pub struct VerifiedChain {
    /// Whether Mojang's key appeared in the chain. Self-signed chains
    /// parse fine but stay unverified.
    pub verified: bool,
    /// The player identity from the innermost token.
    pub identity: BedrockIdentity,
}

/// Walks an identity chain, verifying each token with the key announced
/// by its predecessor.
///
/// The first token is verified against the key in its own `x5u` header;
/// every subsequent token is verified against the `identityPublicKey`
/// claim of the previous, verified token.
pub fn verify_chain(chain: &[String]) -> anyhow::Result<VerifiedChain> {
    let Some(first) = chain.first() else {
        anyhow::bail!("Identity chain is empty");
    };

    let header = jsonwebtoken::decode_header(first)?;
    let Some(mut key) = header.x5u else {
        anyhow::bail!("Missing X.509 certificate in initial JWT");
    };

    let mut validation = Validation::new(Algorithm::ES384);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let mut verified = key == MOJANG_PUBLIC_KEY;
    let mut last_claims = None;

    for token in chain {
        let payload = match jsonwebtoken::decode::<serde_json::Value>(
            token,
            &decoding_key(&key)?,
            &validation,
        ) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!("Unable to verify identity JWT | {err:#}");
                anyhow::bail!("Unable to verify identity JWT | {err:#}");
            }
        };

        let next: KeyTokenPayload = serde_json::from_value(payload.claims.clone())?;
        if next.public_key == MOJANG_PUBLIC_KEY {
            verified = true;
        }

        key = next.public_key;
        last_claims = Some(payload.claims);
    }

    // The loop ran at least once.
    let innermost: IdentityTokenPayload = serde_json::from_value(last_claims.unwrap())?;
    let xuid = if innermost.client_data.xuid.is_empty() {
        0
    } else {
        innermost.client_data.xuid.parse()?
    };

    Ok(VerifiedChain {
        verified,
        identity: BedrockIdentity {
            xuid,
            uuid: innermost.client_data.uuid,
            name: innermost.client_data.display_name,
            public_key: innermost.public_key,
        },
    })
}

/// Verifies and decodes the user data token against the identity key
/// taken from the chain. The token carries no timestamp claims.
pub fn verify_user_token<T: DeserializeOwned>(token: &str, key_x5u: &str) -> anyhow::Result<T> {
    let mut validation = Validation::new(Algorithm::ES384);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;

    let payload = match jsonwebtoken::decode::<T>(token, &decoding_key(key_x5u)?, &validation) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!("Unable to decode user data JWT | {err:#}");
            anyhow::bail!("Unable to decode user data JWT | {err:#}");
        }
    };

    Ok(payload.claims)
}

#[derive(Serialize, Deserialize, Debug)]
struct HandshakeClaims {
    /// Base64 of the key-derivation salt.
    salt: String,
    #[serde(rename = "signedToken", skip_serializing_if = "Option::is_none")]
    signed_token: Option<String>,
}

/// The decoded contents of a ServerToClientHandshake token.
#[derive(Debug, Clone)]
pub struct HandshakeToken {
    /// The server's public key from the token header.
    pub server_x5u: String,
    /// The key-derivation salt chosen by the server.
    pub salt: Vec<u8>,
}

/// Creates the token carried by a ServerToClientHandshake packet.
pub fn sign_handshake_token(keys: &KeyPair, salt: &[u8]) -> anyhow::Result<String> {
    let claims = HandshakeClaims {
        salt: base64::engine::general_purpose::STANDARD.encode(salt),
        signed_token: Some(keys.x5u().to_owned()),
    };

    sign(&claims, keys)
}

/// Verifies and splits a ServerToClientHandshake token.
pub fn decode_handshake_token(token: &str) -> anyhow::Result<HandshakeToken> {
    let header = jsonwebtoken::decode_header(token)?;
    let Some(server_x5u) = header.x5u else {
        anyhow::bail!("Missing X.509 certificate in handshake JWT");
    };

    let mut validation = Validation::new(Algorithm::ES384);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;

    let payload = jsonwebtoken::decode::<HandshakeClaims>(
        token,
        &decoding_key(&server_x5u)?,
        &validation,
    )?;

    Ok(HandshakeToken { server_x5u, salt: decode_base64(&payload.claims.salt)? })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_SALT;

    #[test]
    fn handshake_token_roundtrip() {
        let keys = KeyPair::generate().unwrap();
        let token = sign_handshake_token(&keys, KEY_SALT).unwrap();

        let decoded = decode_handshake_token(&token).unwrap();
        assert_eq!(decoded.server_x5u, keys.x5u());
        assert_eq!(decoded.salt, KEY_SALT);
    }

    #[test]
    fn handshake_token_has_no_typ() {
        let keys = KeyPair::generate().unwrap();
        let token = sign_handshake_token(&keys, KEY_SALT).unwrap();

        let header_b64 = token.split('.').next().unwrap();
        let header =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(header_b64).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header).unwrap();

        assert!(header.get("typ").is_none());
        assert_eq!(header["alg"], "ES384");
        assert_eq!(header["x5u"], keys.x5u());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let keys = KeyPair::generate().unwrap();
        let token = sign_handshake_token(&keys, KEY_SALT).unwrap();

        // Flip a character inside the payload section.
        let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
        let mut payload = parts[1].clone().into_bytes();
        payload[4] = if payload[4] == b'A' { b'B' } else { b'A' };
        parts[1] = String::from_utf8(payload).unwrap();

        assert!(decode_handshake_token(&parts.join(".")).is_err());
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(verify_chain(&[]).is_err());
    }
}
