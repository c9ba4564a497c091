// crates/lti1p3-core/src/lib.rs
// ============================================================================
// Module: LTI 1.3 Core Library
// Description: Public API surface for the LTI 1.3 tool trust core.
// Purpose: Expose trust-model types, the resolver contract, and implementations.
// Dependencies: crate::{trust, resolve}
// ============================================================================

//! ## Overview
//! This crate implements the tool-side trust core of LTI 1.3: registration
//! and deployment resolution, per-issuer client disambiguation, and JWK/JWKS
//! derivation from PEM-encoded RSA keys. It is framework-agnostic and
//! performs no token verification itself; callers hand in pre-decoded claims
//! and verify signatures with the key material resolved here.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod resolve;
pub mod trust;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use resolve::LaunchContext;
pub use resolve::PermissiveConfig;
pub use resolve::PermissiveToolConfiguration;
pub use resolve::SharedToolConfiguration;
pub use resolve::StaticToolConfiguration;
pub use resolve::ToolConfigError;
pub use resolve::ToolConfiguration;
pub use trust::ClientId;
pub use trust::Deployment;
pub use trust::DeploymentId;
pub use trust::Issuer;
pub use trust::IssuerClientPolicy;
pub use trust::IssuerClientRelation;
pub use trust::Jwk;
pub use trust::JwkSet;
pub use trust::KeyFormatError;
pub use trust::Registration;
pub use trust::derive_jwk;
pub use trust::derive_jwk_set;
