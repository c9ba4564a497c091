// crates/lti1p3-core/src/trust/policy.rs
// ============================================================================
// Module: Issuer Client Policy
// Description: Per-issuer record of the issuer-to-client-id relation.
// Purpose: Disambiguate registration lookup when a client id is not supplied.
// Dependencies: serde, trust::identifiers
// ============================================================================

//! ## Overview
//! An issuer either assigns the tool exactly one client id or several. That
//! relation decides how a registration lookup without an explicit client id
//! behaves: under [`IssuerClientRelation::One`] the issuer alone identifies
//! the registration, under [`IssuerClientRelation::Many`] a client id is
//! required. [`IssuerClientPolicy`] records the relation per issuer with a
//! configurable fallback for issuers never recorded. Handles are cheap to
//! clone and share one underlying map.

// ============================================================================
// SECTION: Imports
// ============================================================================

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;

use crate::trust::identifiers::Issuer;

// ============================================================================
// SECTION: Relation
// ============================================================================

/// Relation between an issuer and the client ids it assigned to the tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuerClientRelation {
    /// The issuer assigned exactly one client id.
    #[default]
    #[serde(rename = "one-issuer-one-client-id")]
    One,
    /// The issuer assigned several client ids.
    #[serde(rename = "one-issuer-many-client-ids")]
    Many,
}

impl IssuerClientRelation {
    /// Returns the wire name of the relation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::One => "one-issuer-one-client-id",
            Self::Many => "one-issuer-many-client-ids",
        }
    }
}

impl fmt::Display for IssuerClientRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Shared per-issuer relation map with a fallback for unrecorded issuers.
///
/// # Invariants
/// - An issuer with no recorded relation reports the fallback relation.
/// - Recording a relation replaces any earlier record for that issuer.
#[derive(Debug, Clone, Default)]
pub struct IssuerClientPolicy {
    /// Recorded relations keyed by issuer.
    relations: Arc<Mutex<BTreeMap<Issuer, IssuerClientRelation>>>,
    /// Relation reported for issuers without a record.
    fallback: IssuerClientRelation,
}

impl IssuerClientPolicy {
    /// Creates an empty policy whose fallback is [`IssuerClientRelation::One`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty policy with the given fallback relation.
    #[must_use]
    pub fn with_fallback(fallback: IssuerClientRelation) -> Self {
        Self {
            relations: Arc::new(Mutex::new(BTreeMap::new())),
            fallback,
        }
    }

    /// Returns the relation recorded for the issuer, or the fallback.
    #[must_use]
    pub fn relation(&self, issuer: &Issuer) -> IssuerClientRelation {
        let relations = self
            .relations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        relations.get(issuer).copied().unwrap_or(self.fallback)
    }

    /// Records a relation for the issuer.
    pub fn set_relation(&self, issuer: &Issuer, relation: IssuerClientRelation) {
        let mut relations = self
            .relations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        relations.insert(issuer.clone(), relation);
    }

    /// Records that the issuer assigned exactly one client id.
    pub fn set_one(&self, issuer: &Issuer) {
        self.set_relation(issuer, IssuerClientRelation::One);
    }

    /// Records that the issuer assigned several client ids.
    pub fn set_many(&self, issuer: &Issuer) {
        self.set_relation(issuer, IssuerClientRelation::Many);
    }

    /// Reports whether the issuer assigned exactly one client id.
    #[must_use]
    pub fn is_one(&self, issuer: &Issuer) -> bool {
        self.relation(issuer) == IssuerClientRelation::One
    }

    /// Reports whether the issuer assigned several client ids.
    #[must_use]
    pub fn is_many(&self, issuer: &Issuer) -> bool {
        self.relation(issuer) == IssuerClientRelation::Many
    }
}
