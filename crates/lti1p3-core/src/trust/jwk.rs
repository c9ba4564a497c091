// crates/lti1p3-core/src/trust/jwk.rs
// ============================================================================
// Module: LTI JWK Derivation
// Description: JSON Web Key derivation from PEM-encoded RSA public keys.
// Purpose: Provide deterministic public JWKs with protocol-mandated alg/use/kid.
// Dependencies: rsa, serde, serde_jcs, sha2, base64
// ============================================================================

//! ## Overview
//! LTI 1.3 tools publish their public keys as a JWKS document. This module
//! derives one [`Jwk`] from one PEM RSA public key and whole [`JwkSet`]s from
//! sequences of keys. The `alg` and `use` members are always `RS256` and
//! `sig` regardless of anything embedded in the source material, and the key
//! id is the RFC 7638 thumbprint of the canonical `{e, kty, n}` member set,
//! so identical keys always publish under identical ids. Derivation is pure;
//! callers may cache results keyed on the PEM string.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Signing algorithm published for every derived key.
pub const JWK_ALGORITHM: &str = "RS256";

/// Key use published for every derived key.
pub const JWK_USE: &str = "sig";

/// PEM label marking PKCS#1 public key material.
const PKCS1_PUBLIC_LABEL: &str = "-----BEGIN RSA PUBLIC KEY-----";

// ============================================================================
// SECTION: JWK Types
// ============================================================================

/// Public JSON Web Key derived from one RSA public key.
///
/// # Invariants
/// - `alg` is always `RS256` and `key_use` always `sig`; both are
///   protocol-mandated overrides, never passthrough from the source key.
/// - `kid` is deterministic for a given public key (RFC 7638 thumbprint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `RSA`.
    pub kty: String,
    /// RSA modulus, unsigned big-endian bytes, base64url without padding.
    pub n: String,
    /// RSA public exponent, unsigned big-endian bytes, base64url without padding.
    pub e: String,
    /// Signing algorithm, always `RS256`.
    pub alg: String,
    /// Key use, always `sig`.
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key id, the RFC 7638 SHA-256 thumbprint of the canonical key members.
    pub kid: String,
}

/// JSON Web Key Set, the literal payload shape of a tool's JWKS endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published public keys.
    pub keys: Vec<Jwk>,
}

/// Canonical thumbprint input per RFC 7638: the required RSA members only,
/// serialized in lexicographic member order.
#[derive(Serialize)]
struct ThumbprintMembers<'a> {
    /// Public exponent, base64url without padding.
    e: &'a str,
    /// Key type.
    kty: &'a str,
    /// Modulus, base64url without padding.
    n: &'a str,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error raised when PEM material cannot be used as an RSA public key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pem material is not a parsable rsa public key: {detail}")]
pub struct KeyFormatError {
    /// Parser diagnostic for the rejected material.
    detail: String,
}

impl KeyFormatError {
    /// Creates a key format error with the given diagnostic.
    pub(crate) fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

// ============================================================================
// SECTION: Derivation
// ============================================================================

/// Derives a public JWK from one PEM-encoded RSA public key.
///
/// Accepts PKCS#8 (`BEGIN PUBLIC KEY`) and PKCS#1 (`BEGIN RSA PUBLIC KEY`)
/// encodings. The result always carries `alg = "RS256"`, `use = "sig"`, and
/// the deterministic RFC 7638 `kid`.
///
/// # Errors
///
/// Returns [`KeyFormatError`] when the PEM cannot be parsed as an RSA public
/// key or the thumbprint members cannot be canonicalized.
pub fn derive_jwk(pem_public_key: &str) -> Result<Jwk, KeyFormatError> {
    let key = parse_rsa_public_key(pem_public_key)?;
    let n = URL_SAFE_NO_PAD.encode(key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(key.e().to_bytes_be());
    let kid = thumbprint(&n, &e)?;
    Ok(Jwk {
        kty: "RSA".to_string(),
        n,
        e,
        alg: JWK_ALGORITHM.to_string(),
        key_use: JWK_USE.to_string(),
        kid,
    })
}

/// Derives a JWK set from a sequence of PEM-encoded RSA public keys.
///
/// Entries are deduplicated by raw PEM content before derivation, preserving
/// first-seen order, so byte-identical keys publish exactly once.
///
/// # Errors
///
/// Returns [`KeyFormatError`] when any distinct entry fails derivation.
pub fn derive_jwk_set<I, S>(pem_public_keys: I) -> Result<JwkSet, KeyFormatError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut distinct: Vec<String> = Vec::new();
    for pem in pem_public_keys {
        let pem = pem.as_ref();
        if !distinct.iter().any(|seen| seen == pem) {
            distinct.push(pem.to_string());
        }
    }
    let mut keys = Vec::with_capacity(distinct.len());
    for pem in &distinct {
        keys.push(derive_jwk(pem)?);
    }
    Ok(JwkSet {
        keys,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses PEM material as an RSA public key, accepting PKCS#8 and PKCS#1.
fn parse_rsa_public_key(pem: &str) -> Result<RsaPublicKey, KeyFormatError> {
    if pem.contains(PKCS1_PUBLIC_LABEL) {
        return RsaPublicKey::from_pkcs1_pem(pem)
            .map_err(|err| KeyFormatError::new(err.to_string()));
    }
    RsaPublicKey::from_public_key_pem(pem).map_err(|err| KeyFormatError::new(err.to_string()))
}

/// Computes the RFC 7638 thumbprint over the canonical `{e, kty, n}` members.
fn thumbprint(n: &str, e: &str) -> Result<String, KeyFormatError> {
    let members = ThumbprintMembers {
        e,
        kty: "RSA",
        n,
    };
    let canonical = serde_jcs::to_vec(&members)
        .map_err(|err| KeyFormatError::new(format!("thumbprint canonicalization failed: {err}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let digest = hasher.finalize();
    Ok(URL_SAFE_NO_PAD.encode(digest))
}
