// crates/lti1p3-core/src/trust/mod.rs
// ============================================================================
// Module: LTI Trust Model Types
// Description: Canonical trust-material types for platform-tool relationships.
// Purpose: Provide stable value objects for registrations, deployments, keys, and policy.
// Dependencies: serde, rsa, serde_jcs, sha2, base64
// ============================================================================

//! ## Overview
//! Trust model types describe one platform-tool relationship: the issuer and
//! client identifiers, the endpoint and key material bundled into a
//! [`Registration`], the [`Deployment`] binding inside it, the per-issuer
//! client-multiplicity policy, and the JWK derivation used to publish the
//! tool's public keys. These types are the canonical source of truth for any
//! resolver implementation.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod deployment;
pub mod identifiers;
pub mod jwk;
pub mod policy;
pub mod registration;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use deployment::Deployment;
pub use identifiers::ClientId;
pub use identifiers::DeploymentId;
pub use identifiers::Issuer;
pub use jwk::Jwk;
pub use jwk::JwkSet;
pub use jwk::KeyFormatError;
pub use jwk::derive_jwk;
pub use jwk::derive_jwk_set;
pub use policy::IssuerClientPolicy;
pub use policy::IssuerClientRelation;
pub use registration::Registration;
