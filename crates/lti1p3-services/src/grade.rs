// crates/lti1p3-services/src/grade.rs
// ============================================================================
// Module: Grade Payload
// Description: Builder for Assignment and Grade Services score payloads.
// Purpose: Validate scores at set time and render the camelCase JSON body.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`Grade`] collects the members of an Assignment and Grade Services
//! score publish request. Score values are validated when set, so an
//! invalid grade cannot be built in the first place. The rendered body uses
//! the service's camelCase member names, omits unset members, and flattens
//! any extra claims into the top-level object.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while building a grade payload.
#[derive(Debug, Error)]
pub enum GradeError {
    /// A score value was negative or not finite.
    #[error("{field} must be a finite number of at least zero, got {value}")]
    InvalidScore {
        /// Name of the rejected field.
        field: &'static str,
        /// Value that failed validation.
        value: f64,
    },
    /// The payload could not be serialized to JSON.
    #[error("grade payload serialization failed: {detail}")]
    Serialization {
        /// Serializer message.
        detail: String,
    },
}

// ============================================================================
// SECTION: Grade Builder
// ============================================================================

/// Score payload for an Assignment and Grade Services publish request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    /// Points awarded to the learner.
    #[serde(skip_serializing_if = "Option::is_none")]
    score_given: Option<f64>,
    /// Maximum points available.
    #[serde(skip_serializing_if = "Option::is_none")]
    score_maximum: Option<f64>,
    /// Progress of the scored activity.
    #[serde(skip_serializing_if = "Option::is_none")]
    activity_progress: Option<String>,
    /// Progress of the grading process.
    #[serde(skip_serializing_if = "Option::is_none")]
    grading_progress: Option<String>,
    /// ISO 8601 timestamp of the score event.
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    /// Platform user id the score belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    /// Free-form comment accompanying the score.
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    /// Additional members merged into the payload.
    #[serde(flatten)]
    extra_claims: Map<String, Value>,
}

impl Grade {
    /// Creates an empty grade payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the points awarded to the learner.
    ///
    /// # Errors
    ///
    /// Returns [`GradeError::InvalidScore`] when the value is negative or
    /// not finite.
    pub fn set_score_given(mut self, score_given: f64) -> Result<Self, GradeError> {
        validate_score("score_given", score_given)?;
        self.score_given = Some(score_given);
        Ok(self)
    }

    /// Sets the maximum points available.
    ///
    /// # Errors
    ///
    /// Returns [`GradeError::InvalidScore`] when the value is negative or
    /// not finite.
    pub fn set_score_maximum(mut self, score_maximum: f64) -> Result<Self, GradeError> {
        validate_score("score_maximum", score_maximum)?;
        self.score_maximum = Some(score_maximum);
        Ok(self)
    }

    /// Sets the progress of the scored activity.
    #[must_use]
    pub fn set_activity_progress(mut self, activity_progress: impl Into<String>) -> Self {
        self.activity_progress = Some(activity_progress.into());
        self
    }

    /// Sets the progress of the grading process.
    #[must_use]
    pub fn set_grading_progress(mut self, grading_progress: impl Into<String>) -> Self {
        self.grading_progress = Some(grading_progress.into());
        self
    }

    /// Sets the ISO 8601 timestamp of the score event.
    #[must_use]
    pub fn set_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Sets the platform user id the score belongs to.
    #[must_use]
    pub fn set_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the comment accompanying the score.
    #[must_use]
    pub fn set_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Merges one extra member into the payload.
    #[must_use]
    pub fn set_extra_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_claims.insert(key.into(), value);
        self
    }

    /// Renders the payload as the JSON body of a score publish request.
    ///
    /// # Errors
    ///
    /// Returns [`GradeError::Serialization`] when the payload cannot be
    /// rendered.
    pub fn to_request_body(&self) -> Result<String, GradeError> {
        serde_json::to_string(self).map_err(|err| GradeError::Serialization {
            detail: err.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates that a score value is finite and at least zero.
fn validate_score(field: &'static str, value: f64) -> Result<(), GradeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GradeError::InvalidScore {
            field,
            value,
        })
    }
}
