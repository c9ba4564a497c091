// crates/lti1p3-core/src/resolve/contract.rs
// ============================================================================
// Module: Tool Configuration Contract
// Description: Pluggable resolver trait from issuer to registration/deployment.
// Purpose: Define the lookup surface, launch context, and error taxonomy.
// Dependencies: serde_json, thiserror, trust
// ============================================================================

//! ## Overview
//! A [`ToolConfiguration`] answers the trust questions a launch pipeline
//! asks: which [`Registration`] covers this issuer (and client id), is this
//! deployment id known, and which public JWKs does the tool publish. The
//! issuer's [`IssuerClientPolicy`] relation selects between the
//! single-client lookup (`find_registration_by_issuer`) and the multi-client
//! lookup (`find_registration_by_params`); the provided `get_jwks` follows
//! the same selection. Implementations back the trait with whatever storage
//! they like; [`SharedToolConfiguration`] wraps any of them in a clonable
//! `Arc` handle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::trust::deployment::Deployment;
use crate::trust::identifiers::ClientId;
use crate::trust::identifiers::DeploymentId;
use crate::trust::identifiers::Issuer;
use crate::trust::jwk::JwkSet;
use crate::trust::jwk::KeyFormatError;
use crate::trust::policy::IssuerClientPolicy;
use crate::trust::registration::Registration;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error raised by tool configuration construction and lookup.
///
/// Every variant surfaces to the caller unchanged; resolution is
/// all-or-nothing with no internal retries or partial results.
#[derive(Debug, Error)]
pub enum ToolConfigError {
    /// Static configuration document rejected during construction.
    #[error("invalid tool configuration for {issuer}: {reason}")]
    InvalidConfig {
        /// Issuer key of the offending record, or `document root`.
        issuer: String,
        /// What the record is missing or malforming.
        reason: String,
    },
    /// Configuration file could not be read.
    #[error("failed to read tool configuration from {path}")]
    ConfigRead {
        /// Path the configuration was read from.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Configuration text was not valid JSON.
    #[error("tool configuration is not valid json")]
    ConfigParse {
        /// Underlying JSON parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// No trust record matches the issuer, or the issuer and client id pair.
    #[error("registration not found for {}", lookup_scope(.issuer, .client_id))]
    RegistrationNotFound {
        /// Issuer the lookup asked for.
        issuer: Issuer,
        /// Client id the lookup asked for, when one was supplied.
        client_id: Option<ClientId>,
    },
    /// A multi-client issuer was queried without a client id and no
    /// configured record is marked default.
    #[error("issuer {issuer} has many client ids and no default record; a client id is required")]
    AmbiguousClient {
        /// Issuer whose records could not be disambiguated.
        issuer: Issuer,
    },
    /// A client id was omitted where the issuer's relation requires one.
    #[error("a client id is required for issuer {issuer}")]
    MissingClientId {
        /// Issuer whose relation requires a client id.
        issuer: Issuer,
    },
    /// A trust record matched but its tool private key was never stored.
    #[error("private key not found for issuer {issuer} and client id {client_id}")]
    PrivateKeyNotFound {
        /// Issuer of the matched record.
        issuer: Issuer,
        /// Client id of the matched record.
        client_id: ClientId,
    },
    /// PEM key material could not be used during JWK derivation.
    #[error(transparent)]
    KeyFormat(#[from] KeyFormatError),
    /// The implementation does not support this lookup shape.
    #[error("operation {operation} is not supported by this tool configuration")]
    NotSupported {
        /// Name of the unsupported operation.
        operation: String,
    },
}

/// Formats the issuer, and client id when present, of a failed lookup.
fn lookup_scope(issuer: &Issuer, client_id: &Option<ClientId>) -> String {
    match client_id {
        Some(client_id) => format!("issuer {issuer} and client id {client_id}"),
        None => format!("issuer {issuer}"),
    }
}

// ============================================================================
// SECTION: Launch Context
// ============================================================================

/// Optional resolution context extracted from an incoming launch.
///
/// The core never parses or verifies tokens; `decoded_token_body` arrives
/// pre-decoded and unverified from the caller's JOSE layer.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    /// Client id the caller already extracted, when known.
    pub client_id: Option<ClientId>,
    /// Decoded, signature-unverified claims of the launch token.
    pub decoded_token_body: Option<serde_json::Value>,
}

impl LaunchContext {
    /// Creates an empty launch context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a known client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Attaches the decoded, unverified token claims.
    #[must_use]
    pub fn with_decoded_token_body(mut self, decoded_token_body: serde_json::Value) -> Self {
        self.decoded_token_body = Some(decoded_token_body);
        self
    }
}

// ============================================================================
// SECTION: Contract
// ============================================================================

/// Resolver from issuer (and optional client id) to trust records.
///
/// The policy relation of an issuer selects the lookup path: one-client
/// issuers resolve by issuer alone, many-client issuers require a client id.
/// Registration lookups fail when nothing matches; deployment lookups return
/// `Ok(None)` for unknown deployment ids, which is an expected outcome.
pub trait ToolConfiguration {
    /// Returns the issuer-to-client-id relation policy of this configuration.
    fn policy(&self) -> &IssuerClientPolicy;

    /// Reports whether the issuer assigned exactly one client id.
    fn issuer_has_one_client(&self, issuer: &Issuer) -> bool {
        self.policy().is_one(issuer)
    }

    /// Reports whether the issuer assigned several client ids.
    fn issuer_has_many_clients(&self, issuer: &Issuer) -> bool {
        self.policy().is_many(issuer)
    }

    /// Records that the issuer assigned exactly one client id.
    fn set_issuer_has_one_client(&self, issuer: &Issuer) {
        self.policy().set_one(issuer);
    }

    /// Records that the issuer assigned several client ids.
    fn set_issuer_has_many_clients(&self, issuer: &Issuer) {
        self.policy().set_many(issuer);
    }

    /// Resolves the registration of a single-client issuer.
    ///
    /// Implementations without a single-client lookup may keep the provided
    /// default, whose policy must then never report one-client for an issuer
    /// they serve.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::NotSupported`] from the provided default;
    /// implementations return [`ToolConfigError::RegistrationNotFound`] when
    /// the issuer has no trust record.
    fn find_registration_by_issuer(
        &self,
        issuer: &Issuer,
        context: Option<&LaunchContext>,
    ) -> Result<Registration, ToolConfigError> {
        let _ = issuer;
        let _ = context;
        Err(ToolConfigError::NotSupported {
            operation: "find_registration_by_issuer".to_string(),
        })
    }

    /// Resolves the registration of an issuer and client id pair.
    ///
    /// With no client id, implementations backed by declarative records apply
    /// their default-record selection. `context` optionally carries the
    /// decoded token body for implementations that derive trust from claims.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::RegistrationNotFound`] when nothing
    /// matches, [`ToolConfigError::AmbiguousClient`] when no client id was
    /// given and no record selection applies.
    fn find_registration_by_params(
        &self,
        issuer: &Issuer,
        client_id: Option<&ClientId>,
        context: Option<&LaunchContext>,
    ) -> Result<Registration, ToolConfigError>;

    /// Looks up a deployment of a single-client issuer.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::NotSupported`] from the provided default;
    /// implementations fail only on issuer or client resolution, never for an
    /// unknown deployment id, which is `Ok(None)`.
    fn find_deployment(
        &self,
        issuer: &Issuer,
        deployment_id: Option<&DeploymentId>,
    ) -> Result<Option<Deployment>, ToolConfigError> {
        let _ = issuer;
        let _ = deployment_id;
        Err(ToolConfigError::NotSupported {
            operation: "find_deployment".to_string(),
        })
    }

    /// Looks up a deployment of an issuer and client id pair.
    ///
    /// Returns `Ok(None)` when the deployment id is absent or not in the
    /// matched registration's configured set; a missing deployment is an
    /// expected, recoverable outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::RegistrationNotFound`] when the issuer or
    /// client id has no trust record.
    fn find_deployment_by_params(
        &self,
        issuer: &Issuer,
        deployment_id: Option<&DeploymentId>,
        client_id: Option<&ClientId>,
    ) -> Result<Option<Deployment>, ToolConfigError>;

    /// Derives the published JWK set.
    ///
    /// With an issuer, resolves its registration via the policy-selected
    /// path and derives that registration's keys. With no issuer, the
    /// provided default returns an empty set; implementations with
    /// enumerable key storage override this to publish the deduplicated
    /// union of every stored public key.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConfigError::AmbiguousClient`] when the issuer is
    /// multi-client and no client id was supplied, and any resolution or
    /// [`ToolConfigError::KeyFormat`] failure from the selected path.
    fn get_jwks(
        &self,
        issuer: Option<&Issuer>,
        client_id: Option<&ClientId>,
    ) -> Result<JwkSet, ToolConfigError> {
        policy_selected_jwks(self, issuer, client_id)
    }
}

/// Resolves the JWK set of one issuer along the policy-selected lookup path,
/// or an empty set when no issuer is given.
///
/// Shared between the trait's provided `get_jwks` and implementations that
/// override only the no-argument shape.
///
/// # Errors
///
/// Returns [`ToolConfigError::AmbiguousClient`] when the issuer is
/// multi-client and no client id was supplied, and any failure of the
/// selected registration lookup or of JWK derivation.
pub(crate) fn policy_selected_jwks<C>(
    config: &C,
    issuer: Option<&Issuer>,
    client_id: Option<&ClientId>,
) -> Result<JwkSet, ToolConfigError>
where
    C: ToolConfiguration + ?Sized,
{
    let Some(issuer) = issuer else {
        return Ok(JwkSet::default());
    };
    let registration = if config.issuer_has_one_client(issuer) {
        config.find_registration_by_issuer(issuer, None)?
    } else if let Some(client_id) = client_id {
        config.find_registration_by_params(issuer, Some(client_id), None)?
    } else {
        return Err(ToolConfigError::AmbiguousClient {
            issuer: issuer.clone(),
        });
    };
    Ok(registration.jwks()?)
}

// ============================================================================
// SECTION: Shared Handle
// ============================================================================

/// Shared tool configuration backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedToolConfiguration {
    /// Inner configuration implementation.
    inner: Arc<dyn ToolConfiguration + Send + Sync>,
}

impl SharedToolConfiguration {
    /// Wraps a tool configuration in a shared, clonable wrapper.
    #[must_use]
    pub fn from_config(config: impl ToolConfiguration + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(config),
        }
    }

    /// Wraps an existing shared configuration.
    #[must_use]
    pub const fn new(config: Arc<dyn ToolConfiguration + Send + Sync>) -> Self {
        Self {
            inner: config,
        }
    }
}

impl ToolConfiguration for SharedToolConfiguration {
    fn policy(&self) -> &IssuerClientPolicy {
        self.inner.policy()
    }

    fn issuer_has_one_client(&self, issuer: &Issuer) -> bool {
        self.inner.issuer_has_one_client(issuer)
    }

    fn issuer_has_many_clients(&self, issuer: &Issuer) -> bool {
        self.inner.issuer_has_many_clients(issuer)
    }

    fn set_issuer_has_one_client(&self, issuer: &Issuer) {
        self.inner.set_issuer_has_one_client(issuer);
    }

    fn set_issuer_has_many_clients(&self, issuer: &Issuer) {
        self.inner.set_issuer_has_many_clients(issuer);
    }

    fn find_registration_by_issuer(
        &self,
        issuer: &Issuer,
        context: Option<&LaunchContext>,
    ) -> Result<Registration, ToolConfigError> {
        self.inner.find_registration_by_issuer(issuer, context)
    }

    fn find_registration_by_params(
        &self,
        issuer: &Issuer,
        client_id: Option<&ClientId>,
        context: Option<&LaunchContext>,
    ) -> Result<Registration, ToolConfigError> {
        self.inner.find_registration_by_params(issuer, client_id, context)
    }

    fn find_deployment(
        &self,
        issuer: &Issuer,
        deployment_id: Option<&DeploymentId>,
    ) -> Result<Option<Deployment>, ToolConfigError> {
        self.inner.find_deployment(issuer, deployment_id)
    }

    fn find_deployment_by_params(
        &self,
        issuer: &Issuer,
        deployment_id: Option<&DeploymentId>,
        client_id: Option<&ClientId>,
    ) -> Result<Option<Deployment>, ToolConfigError> {
        self.inner.find_deployment_by_params(issuer, deployment_id, client_id)
    }

    fn get_jwks(
        &self,
        issuer: Option<&Issuer>,
        client_id: Option<&ClientId>,
    ) -> Result<JwkSet, ToolConfigError> {
        self.inner.get_jwks(issuer, client_id)
    }
}
