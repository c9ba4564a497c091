// crates/lti1p3-core/src/trust/deployment.rs
// ============================================================================
// Module: LTI Deployment
// Description: Binding of a tool registration to one platform deployment.
// Purpose: Represent the deployment scope a launch arrives under.
// Dependencies: serde, trust::identifiers
// ============================================================================

//! ## Overview
//! Platforms deploy a registered tool one or more times, and every launch
//! names the deployment it belongs to. A [`Deployment`] is that binding:
//! resolvers answer "is this deployment id known for this issuer and client"
//! by returning one, or nothing when the id is not configured.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::trust::identifiers::DeploymentId;

// ============================================================================
// SECTION: Deployment
// ============================================================================

/// One platform deployment of a registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment id the platform assigned.
    pub deployment_id: DeploymentId,
}

impl Deployment {
    /// Creates a deployment binding for the given id.
    #[must_use]
    pub fn new(deployment_id: DeploymentId) -> Self {
        Self {
            deployment_id,
        }
    }
}
