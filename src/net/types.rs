//! Wire DTOs for the trial-management backend.
//!
//! DESIGN
//! ======
//! The backend is inconsistent about envelopes: a list may arrive bare or
//! under a named field, and a single record may or may not be nested.
//! [`list_from`] and [`object_from`] absorb that at the adapter boundary so
//! consumers only ever see one typed shape per endpoint.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::collections::BTreeSet;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::ApiError;

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Decode a list that is either a bare array or nested under `field`.
///
/// An object without `field` yields an empty list; a `field` holding a
/// non-array is a decode error.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] if the items do not match `T`.
pub fn list_from<T: DeserializeOwned>(value: Value, field: &str) -> Result<Vec<T>, ApiError> {
    let items = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(inner) => inner,
        },
        Value::Null => return Ok(Vec::new()),
        other => return Err(ApiError::Decode(format!("expected list for `{field}`, got {other}"))),
    };
    serde_json::from_value(items).map_err(|e| ApiError::Decode(format!("{field}: {e}")))
}

/// Decode a record that is either the body itself or nested under `field`.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] if neither shape matches `T`.
pub fn object_from<T: DeserializeOwned>(value: Value, field: &str) -> Result<T, ApiError> {
    let inner = match value {
        Value::Object(mut map) if matches!(map.get(field), Some(Value::Object(_))) => {
            map.remove(field).unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(inner).map_err(|e| ApiError::Decode(format!("{field}: {e}")))
}

// =============================================================================
// AUTH + PROFILE
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Login response; any credential-less body is rejected by the session manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl LoginResponse {
    /// The bearer credential, if the body carried a non-blank one.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.access_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// The signed-in user's identity and role tags.
///
/// Replaced wholesale whenever the profile is re-fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: BTreeSet<String>,
}

impl UserProfile {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True when any of the user's roles appears in `allowed`.
    #[must_use]
    pub fn has_any_role(&self, allowed: &BTreeSet<String>) -> bool {
        !self.roles.is_disjoint(allowed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

// =============================================================================
// TRIALS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sponsor: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub objectives: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTrial {
    pub name: String,
    pub sponsor: String,
    pub phase: String,
    pub start_date: String,
    pub end_date: String,
    pub objectives: String,
    pub status: String,
}

/// Partial trial update; `None` fields are left out of the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrialUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objectives: Option<String>,
}

impl TrialUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// =============================================================================
// PROTOCOLS + IRB
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolDraftRequest {
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrbSubmission {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub approved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIrbSubmission {
    pub name: String,
    /// `YYYY-MM-DD`.
    pub submission_date: String,
    pub status: String,
}

// =============================================================================
// SITES + PATIENTS
// =============================================================================

/// A site associated with one trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub principal_investigator: Option<String>,
}

/// A site from the global registry, not yet tied to a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSite {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteAssociation {
    pub site_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub patient_identifier: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub enrollment_date: Option<String>,
    #[serde(default)]
    pub screening_date: Option<String>,
    #[serde(default)]
    pub identification_date: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientIdentificationRequest {
    pub criteria_details: String,
}

// =============================================================================
// MONITORING + REPORTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSummary {
    #[serde(default)]
    pub total_adverse_events: Option<u64>,
    #[serde(default)]
    pub data_quality_score: Option<f64>,
    #[serde(default)]
    pub enrollment_rate: Option<f64>,
    /// Metrics this client does not model yet.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringEvent {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegulatoryReportRequest {
    pub report_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// =============================================================================
// LONG-RUNNING TASKS
// =============================================================================

/// Acknowledgement of a queued backend job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTicket {
    #[serde(deserialize_with = "deserialize_id")]
    pub task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Running,
    Completed,
    Failed,
}

impl TaskPhase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl TaskStatus {
    #[must_use]
    pub fn phase(&self) -> TaskPhase {
        if self.status.eq_ignore_ascii_case("COMPLETED") {
            TaskPhase::Completed
        } else if self.status.eq_ignore_ascii_case("FAILED") {
            TaskPhase::Failed
        } else {
            TaskPhase::Running
        }
    }

    /// One-line progress text, e.g. `Drafting status: RUNNING. Details: Processing...`.
    #[must_use]
    pub fn status_line(&self, label: &str) -> String {
        let details = self.message.as_deref().filter(|m| !m.is_empty()).unwrap_or("Processing...");
        format!("{label} status: {}. Details: {details}", self.status)
    }
}

/// Which backend job family a task id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    ProtocolDraft,
    PatientIdentification,
    RegulatoryReport,
}

impl TaskKind {
    #[must_use]
    pub fn status_path(self, task_id: &str) -> String {
        match self {
            Self::ProtocolDraft => format!("/protocols/generation-status/{task_id}"),
            Self::PatientIdentification => format!("/patients/identification-status/{task_id}"),
            Self::RegulatoryReport => format!("/regulatory-reports/generation-status/{task_id}"),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ProtocolDraft => "Drafting",
            Self::PatientIdentification => "Identification",
            Self::RegulatoryReport => "Report generation",
        }
    }
}

// =============================================================================
// ADMIN USERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_login_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// =============================================================================
// DESERIALIZERS
// =============================================================================

/// Accept string or integer identifiers and keep them as strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

/// Accept `["a", "b"]`, a single `"a"`, or `null`.
fn deserialize_roles<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(BTreeSet::new()),
        Value::String(role) => Ok(BTreeSet::from([role])),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(role) => Ok(role),
                other => Err(D::Error::custom(format!("expected role name, got {other}"))),
            })
            .collect(),
        other => Err(D::Error::custom(format!("expected role list, got {other}"))),
    }
}
