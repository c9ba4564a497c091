// crates/lti1p3-services/src/lib.rs
// ============================================================================
// Module: LTI 1.3 Services Library
// Description: Public API surface for authenticated LTI service access.
// Purpose: Expose the service connector, course groups client, and grades.
// Dependencies: crate::{connector, grade, groups}
// ============================================================================

//! ## Overview
//! This crate layers LTI Advantage service access on top of the trust core:
//! a [`ServiceConnector`] that obtains OAuth2 client-credentials tokens with
//! signed RS256 client assertions and performs authenticated paginated
//! requests, a [`CourseGroupsService`] client for the context group service,
//! and a [`Grade`] builder producing Assignment and Grade Services score
//! payloads. All HTTP is performed with a blocking client configured with a
//! request timeout, a fixed user agent, and redirects disabled.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod connector;
pub mod grade;
pub mod groups;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use connector::ServiceConnector;
pub use connector::ServiceConnectorConfig;
pub use connector::ServiceError;
pub use connector::ServicePage;
pub use grade::Grade;
pub use grade::GradeError;
pub use groups::CourseGroupsService;
pub use groups::GroupsServiceData;
