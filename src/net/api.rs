//! Typed endpoint methods for the trial-management REST API.
//!
//! Each method is a thin pass-through over [`ApiClient`]: build the path,
//! send, normalize the response envelope. No method touches session state.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use serde_json::Value;

use super::client::{ApiClient, Auth, decode};
use super::error::ApiError;
use super::transport::Method;
use super::types::{
    AdminUser, GlobalSite, IrbSubmission, LoginRequest, LoginResponse, MonitoringEvent, MonitoringSummary,
    NewIrbSubmission, NewTrial, NewUser, PasswordChange, Patient, PatientIdentificationRequest, Protocol,
    ProtocolDraftRequest, RegulatoryReportRequest, Site, SiteAssociation, TaskKind, TaskStatus, TaskTicket, Trial,
    TrialUpdate, UserProfile, UserUpdate, list_from, object_from,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/users/me/profile";
pub const PASSWORD_PATH: &str = "/users/me/password";

fn query_pairs(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

impl ApiClient {
    // =========================================================================
    // AUTH
    // =========================================================================

    /// `POST /auth/login`. Sent without the default header.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors; a body without a token is
    /// *not* an error here.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest { username, password };
        let value = self.write_value(Method::Post, LOGIN_PATH, &body, Auth::Anonymous).await?;
        decode(value)
    }

    /// `POST /auth/logout`.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.request(Method::Post, LOGOUT_PATH, None).await.map(|_| ())
    }

    /// `GET /users/me/profile`, accepting a bare or `user`-nested body.
    ///
    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        object_from(self.get_value(PROFILE_PATH, Vec::new()).await?, "user")
    }

    /// `PUT /users/me/password`.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn update_password(&self, change: &PasswordChange) -> Result<(), ApiError> {
        self.write_value(Method::Put, PASSWORD_PATH, change, Auth::Default).await.map(|_| ())
    }

    // =========================================================================
    // TRIALS
    // =========================================================================

    /// `GET /trials` with optional filter parameters.
    ///
    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn list_trials(&self, params: &[(&str, &str)]) -> Result<Vec<Trial>, ApiError> {
        list_from(self.get_value("/trials", query_pairs(params)).await?, "trials")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn get_trial(&self, trial_id: &str) -> Result<Trial, ApiError> {
        object_from(self.get_value(&format!("/trials/{trial_id}"), Vec::new()).await?, "trial")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn create_trial(&self, trial: &NewTrial) -> Result<Trial, ApiError> {
        object_from(self.write_value(Method::Post, "/trials", trial, Auth::Default).await?, "trial")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn update_trial(&self, trial_id: &str, update: &TrialUpdate) -> Result<Trial, ApiError> {
        let path = format!("/trials/{trial_id}");
        object_from(self.write_value(Method::Put, &path, update, Auth::Default).await?, "trial")
    }

    // =========================================================================
    // PROTOCOLS
    // =========================================================================

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn list_protocols(&self, trial_id: &str) -> Result<Vec<Protocol>, ApiError> {
        list_from(self.get_value(&format!("/trials/{trial_id}/protocols"), Vec::new()).await?, "protocols")
    }

    /// `POST /trials/{id}/protocols/draft`, returning the queued task.
    ///
    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn draft_protocol(&self, trial_id: &str, request: &ProtocolDraftRequest) -> Result<TaskTicket, ApiError> {
        self.post_json(&format!("/trials/{trial_id}/protocols/draft"), request).await
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn protocol_generation_status(&self, task_id: &str) -> Result<TaskStatus, ApiError> {
        self.task_status(TaskKind::ProtocolDraft, task_id).await
    }

    // =========================================================================
    // IRB SUBMISSIONS
    // =========================================================================

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn list_irb_submissions(&self, trial_id: &str) -> Result<Vec<IrbSubmission>, ApiError> {
        let value = self.get_value(&format!("/trials/{trial_id}/irb-submissions"), Vec::new()).await?;
        list_from(value, "irb_submissions")
    }

    /// The response body is not modelled; callers re-list afterwards.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn create_irb_submission(&self, trial_id: &str, submission: &NewIrbSubmission) -> Result<Value, ApiError> {
        let path = format!("/trials/{trial_id}/irb-submissions");
        self.write_value(Method::Post, &path, submission, Auth::Default).await
    }

    // =========================================================================
    // SITES
    // =========================================================================

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn list_global_sites(&self, params: &[(&str, &str)]) -> Result<Vec<GlobalSite>, ApiError> {
        list_from(self.get_value("/sites", query_pairs(params)).await?, "sites")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn list_trial_sites(&self, trial_id: &str) -> Result<Vec<Site>, ApiError> {
        list_from(self.get_value(&format!("/trials/{trial_id}/sites"), Vec::new()).await?, "sites")
    }

    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn associate_site(&self, trial_id: &str, association: &SiteAssociation) -> Result<Value, ApiError> {
        let path = format!("/trials/{trial_id}/sites");
        self.write_value(Method::Post, &path, association, Auth::Default).await
    }

    // =========================================================================
    // PATIENTS
    // =========================================================================

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn list_patients(&self, trial_id: &str) -> Result<Vec<Patient>, ApiError> {
        list_from(self.get_value(&format!("/trials/{trial_id}/patients"), Vec::new()).await?, "patients")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn identify_patients(
        &self,
        trial_id: &str,
        request: &PatientIdentificationRequest,
    ) -> Result<TaskTicket, ApiError> {
        self.post_json(&format!("/trials/{trial_id}/patients/identify"), request).await
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn patient_identification_status(&self, task_id: &str) -> Result<TaskStatus, ApiError> {
        self.task_status(TaskKind::PatientIdentification, task_id).await
    }

    // =========================================================================
    // MONITORING + REPORTS
    // =========================================================================

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn monitoring_summary(&self, trial_id: &str) -> Result<MonitoringSummary, ApiError> {
        let value = self.get_value(&format!("/trials/{trial_id}/monitoring/summary"), Vec::new()).await?;
        object_from(value, "summary")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn monitoring_events(&self, trial_id: &str) -> Result<Vec<MonitoringEvent>, ApiError> {
        let value = self.get_value(&format!("/trials/{trial_id}/monitoring/events"), Vec::new()).await?;
        list_from(value, "events")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn generate_regulatory_report(
        &self,
        trial_id: &str,
        request: &RegulatoryReportRequest,
    ) -> Result<TaskTicket, ApiError> {
        self.post_json(&format!("/trials/{trial_id}/regulatory-reports/generate"), request).await
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn regulatory_report_status(&self, task_id: &str) -> Result<TaskStatus, ApiError> {
        self.task_status(TaskKind::RegulatoryReport, task_id).await
    }

    /// Status of any long-running job by kind.
    ///
    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn task_status(&self, kind: TaskKind, task_id: &str) -> Result<TaskStatus, ApiError> {
        self.get_json(&kind.status_path(task_id)).await
    }

    // =========================================================================
    // ADMIN USERS
    // =========================================================================

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn list_users(&self, params: &[(&str, &str)]) -> Result<Vec<AdminUser>, ApiError> {
        list_from(self.get_value("/admin/users", query_pairs(params)).await?, "users")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn create_user(&self, user: &NewUser) -> Result<AdminUser, ApiError> {
        object_from(self.write_value(Method::Post, "/admin/users", user, Auth::Default).await?, "user")
    }

    /// # Errors
    ///
    /// Propagates transport, status, and decode errors.
    pub async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<AdminUser, ApiError> {
        let path = format!("/admin/users/{user_id}");
        object_from(self.write_value(Method::Put, &path, update, Auth::Default).await?, "user")
    }
}
