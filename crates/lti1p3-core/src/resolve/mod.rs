// crates/lti1p3-core/src/resolve/mod.rs
// ============================================================================
// Module: Resolution
// Description: Tool configuration resolvers mapping issuers to trust records.
// Purpose: Group the resolver contract and its concrete implementations.
// Dependencies: trust
// ============================================================================

//! ## Overview
//! Resolution turns an issuer (and optionally a client id and launch
//! context) into a [`crate::trust::Registration`] or
//! [`crate::trust::Deployment`]. The [`contract`] module defines the
//! pluggable [`ToolConfiguration`] trait and its error taxonomy;
//! [`static_config`] resolves from a declarative JSON document and
//! [`permissive`] fabricates trust for development use.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod contract;
pub mod permissive;
pub mod static_config;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use contract::LaunchContext;
pub use contract::SharedToolConfiguration;
pub use contract::ToolConfigError;
pub use contract::ToolConfiguration;
pub use permissive::PermissiveConfig;
pub use permissive::PermissiveToolConfiguration;
pub use static_config::StaticToolConfiguration;
