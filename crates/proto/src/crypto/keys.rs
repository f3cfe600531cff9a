use base64::Engine;
use p384::ecdh;
use p384::elliptic_curve::sec1::FromEncodedPoint;
use p384::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use p384::{EncodedPoint, PublicKey, SecretKey};
use serde::Deserialize;

/// Use the default Base64 format with no padding.
const BASE64_ENGINE: base64::engine::GeneralPurpose =
    base64::engine::general_purpose::STANDARD_NO_PAD;

/// A session's secp384r1 key pair.
///
/// The private key never leaves this type; everything that needs to sign
/// or agree on secrets goes through its methods.
pub struct KeyPair {
    secret: SecretKey,
    /// Base64 SPKI DER encoding of the public key, carried as the `x5u`
    /// JOSE header.
    x5u: String,
}

impl KeyPair {
    /// Generates a fresh key pair.
    pub fn generate() -> anyhow::Result<Self> {
        let secret = SecretKey::random(&mut rand::rngs::OsRng);
        let spki = secret.public_key().to_public_key_der()?;
        let x5u = BASE64_ENGINE.encode(spki.as_bytes());

        Ok(Self { secret, x5u })
    }

    /// The public key as base64 SPKI DER, ready for an `x5u` header.
    pub fn x5u(&self) -> &str {
        &self.x5u
    }

    /// The public half of the pair.
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// PKCS#8 DER encoding of the private key, used to construct JOSE
    /// signing keys.
    pub fn private_key_der(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.secret.to_pkcs8_der()?.as_bytes().to_vec())
    }

    /// Computes the raw 48-byte ECDH shared secret with a peer key.
    pub fn shared_secret(&self, peer: &PublicKey) -> [u8; 48] {
        let shared = ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());

        let mut secret = [0; 48];
        secret.copy_from_slice(shared.raw_secret_bytes());
        secret
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        // The private key stays out of logs.
        fmt.debug_struct("KeyPair").field("x5u", &self.x5u).finish_non_exhaustive()
    }
}

/// Decodes a base64 SPKI DER public key, the format used by `x5u`
/// headers and `identityPublicKey` claims.
pub fn public_key_from_x5u(x5u: &str) -> anyhow::Result<PublicKey> {
    let der = BASE64_ENGINE.decode(x5u.trim_end_matches('='))?;
    PublicKey::from_public_key_der(&der)
        .map_err(|err| anyhow::anyhow!("Invalid SPKI public key: {err}"))
}

/// The affine-coordinate form of a public key, as carried in JWKs.
#[derive(Deserialize, Debug)]
pub struct JsonWebKey {
    /// Key type, must be `EC`.
    pub kty: String,
    /// Curve name; aliases of secp384r1 are accepted.
    pub crv: String,
    /// Base64url X coordinate.
    pub x: String,
    /// Base64url Y coordinate.
    pub y: String,
}

/// Decodes a JWK `{x, y}` public key, normalising curve aliases.
pub fn public_key_from_jwk(jwk: &JsonWebKey) -> anyhow::Result<PublicKey> {
    if !jwk.kty.eq_ignore_ascii_case("ec") {
        anyhow::bail!("Expected an EC key, got {}", jwk.kty);
    }

    match jwk.crv.to_ascii_lowercase().as_str() {
        "p-384" | "secp384r1" => (),
        other => anyhow::bail!("Expected a secp384r1 key, got {other}"),
    }

    let url_engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let x = url_engine.decode(&jwk.x)?;
    let y = url_engine.decode(&jwk.y)?;
    if x.len() != 48 || y.len() != 48 {
        anyhow::bail!("JWK coordinates must be 48 bytes each");
    }

    let point = EncodedPoint::from_affine_coordinates(
        x.as_slice().into(),
        y.as_slice().into(),
        false,
    );

    let maybe_key: Option<PublicKey> = PublicKey::from_encoded_point(&point).into();
    maybe_key.ok_or_else(|| anyhow::anyhow!("JWK coordinates are not on the curve"))
}

/// Re-encodes any accepted public key as base64 SPKI DER.
pub fn public_key_to_x5u(key: &PublicKey) -> anyhow::Result<String> {
    let der = key.to_public_key_der()?;
    Ok(BASE64_ENGINE.encode(der.as_bytes()))
}

#[cfg(test)]
mod tests {
    use p384::elliptic_curve::sec1::ToEncodedPoint;

    use super::*;

    #[test]
    fn x5u_roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let decoded = public_key_from_x5u(pair.x5u()).unwrap();

        assert_eq!(decoded, pair.public_key());
        assert_eq!(public_key_to_x5u(&decoded).unwrap(), pair.x5u());
    }

    #[test]
    fn ecdh_agreement_is_symmetric() {
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();

        let ab = alice.shared_secret(&bob.public_key());
        let ba = bob.shared_secret(&alice.public_key());

        assert_eq!(ab, ba);

        let eve = KeyPair::generate().unwrap();
        assert_ne!(ab, eve.shared_secret(&alice.public_key()));
    }

    #[test]
    fn jwk_aliases_normalised() {
        let pair = KeyPair::generate().unwrap();
        let point = pair.public_key().to_encoded_point(false);

        let url_engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        for crv in ["P-384", "secp384r1"] {
            let jwk = JsonWebKey {
                kty: "EC".to_owned(),
                crv: crv.to_owned(),
                x: url_engine.encode(point.x().unwrap()),
                y: url_engine.encode(point.y().unwrap()),
            };

            assert_eq!(public_key_from_jwk(&jwk).unwrap(), pair.public_key());
        }
    }

    #[test]
    fn rejects_wrong_curve() {
        let jwk = JsonWebKey {
            kty: "EC".to_owned(),
            crv: "P-256".to_owned(),
            x: String::new(),
            y: String::new(),
        };

        assert!(public_key_from_jwk(&jwk).is_err());
    }
}
