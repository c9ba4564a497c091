// crates/lti1p3-core/src/trust/registration.rs
// ============================================================================
// Module: LTI Registration
// Description: Per-issuer trust bundle binding a tool to one platform client.
// Purpose: Carry endpoints and key material needed to validate and sign launches.
// Dependencies: serde_json, trust::identifiers, trust::jwk
// ============================================================================

//! ## Overview
//! A [`Registration`] is the unit of trust between a tool and a platform: the
//! issuer and client id pair, the platform's OIDC endpoints, the platform's
//! key set (inline document or URL), and the tool's own RSA keypair. Resolvers
//! return registrations; signing and JWKS publication read them. The tool
//! private key is required, the public key optional; a registration without a
//! public key simply publishes an empty key set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use core::fmt;

use crate::trust::identifiers::ClientId;
use crate::trust::identifiers::Issuer;
use crate::trust::jwk::Jwk;
use crate::trust::jwk::JwkSet;
use crate::trust::jwk::KeyFormatError;
use crate::trust::jwk::derive_jwk;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Trust bundle for one issuer and client id pair.
///
/// # Invariants
/// - `tool_private_key` is never emitted by the [`fmt::Debug`] implementation.
/// - `auth_audience` is preserved exactly as configured; absent stays absent.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    /// Platform issuer this registration belongs to.
    pub issuer: Issuer,
    /// Client id the platform assigned to the tool.
    pub client_id: ClientId,
    /// Platform OIDC login initiation endpoint.
    pub auth_login_url: String,
    /// Platform OAuth2 token endpoint.
    pub auth_token_url: String,
    /// Audience override for token requests, when the platform mandates one.
    pub auth_audience: Option<String>,
    /// Platform public key set document, when configured inline.
    pub key_set: Option<serde_json::Value>,
    /// Platform public key set URL, when fetched remotely.
    pub key_set_url: Option<String>,
    /// Tool RSA private key in PEM form, used to sign client assertions.
    pub tool_private_key: String,
    /// Tool RSA public key in PEM form, when the tool publishes one.
    pub tool_public_key: Option<String>,
}

impl Registration {
    /// Derives the tool's public JWK, when a public key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`KeyFormatError`] when the configured public key cannot be
    /// parsed as an RSA public key.
    pub fn jwk(&self) -> Result<Option<Jwk>, KeyFormatError> {
        match self.tool_public_key.as_deref() {
            Some(pem) => Ok(Some(derive_jwk(pem)?)),
            None => Ok(None),
        }
    }

    /// Derives the tool's published key set: one key, or empty when no public
    /// key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`KeyFormatError`] when the configured public key cannot be
    /// parsed as an RSA public key.
    pub fn jwks(&self) -> Result<JwkSet, KeyFormatError> {
        match self.jwk()? {
            Some(jwk) => Ok(JwkSet {
                keys: vec![jwk],
            }),
            None => Ok(JwkSet::default()),
        }
    }

    /// Derives the deterministic key id of the tool's public key, when one is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`KeyFormatError`] when the configured public key cannot be
    /// parsed as an RSA public key.
    pub fn kid(&self) -> Result<Option<String>, KeyFormatError> {
        Ok(self.jwk()?.map(|jwk| jwk.kid))
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("auth_login_url", &self.auth_login_url)
            .field("auth_token_url", &self.auth_token_url)
            .field("auth_audience", &self.auth_audience)
            .field("key_set", &self.key_set)
            .field("key_set_url", &self.key_set_url)
            .field("tool_private_key", &"<redacted>")
            .field("tool_public_key", &self.tool_public_key)
            .finish()
    }
}
