use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifier wrapper for submitted jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of filings and operations the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    UnlockCodeRequest,
    UnlockCodeActivation,
    UnlockCodeRevocation,
    TaxNumberValidity,
    IncomeTaxReturn,
    PropertyTaxReturn,
}

impl JobType {
    pub const fn label(self) -> &'static str {
        match self {
            JobType::UnlockCodeRequest => "unlock_code_request",
            JobType::UnlockCodeActivation => "unlock_code_activation",
            JobType::UnlockCodeRevocation => "unlock_code_revocation",
            JobType::TaxNumberValidity => "tax_number_validity",
            JobType::IncomeTaxReturn => "income_tax_return",
            JobType::PropertyTaxReturn => "property_tax_return",
        }
    }
}

/// Lifecycle state of a job. Transitions are monotonic except that
/// `Processing` re-enters itself on a retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Scheduled,
    Processing,
    Success,
    Failed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Processing => "processing",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum JobStateError {
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
    #[error("result is already recorded")]
    ResultAlreadySet,
    #[error("error outcome is already recorded")]
    ErrorAlreadySet,
}

/// Persisted record of one submission request.
///
/// `payload` is set at creation and never mutated; `result` is set exactly
/// once on the transition to `Success`, the error fields exactly once on the
/// transition to `Failed`, and the two are mutually exclusive. The transfer
/// ticket is recorded on first authority contact so a retry can continue
/// the existing transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: Value,
    pub result: Option<Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub transfer_ticket: Option<String>,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job_type: JobType, payload: Value, creator_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::random(),
            job_type,
            status: JobStatus::New,
            payload,
            result: None,
            error_code: None,
            error_message: None,
            transfer_ticket: None,
            creator_id: creator_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn allowed(from: JobStatus, to: JobStatus) -> bool {
        matches!(
            (from, to),
            (JobStatus::New, JobStatus::Scheduled)
                | (JobStatus::Scheduled, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Success)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    /// Move the record to `to`, refreshing `updated_at`. Terminal states and
    /// skipped stages are rejected.
    pub fn transition(&mut self, to: JobStatus) -> Result<(), JobStateError> {
        if !Self::allowed(self.status, to) {
            return Err(JobStateError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the successful outcome and finish the job.
    pub fn complete(&mut self, result: Value) -> Result<(), JobStateError> {
        if self.result.is_some() {
            return Err(JobStateError::ResultAlreadySet);
        }
        if self.error_code.is_some() || self.error_message.is_some() {
            return Err(JobStateError::ErrorAlreadySet);
        }
        self.transition(JobStatus::Success)?;
        self.result = Some(result);
        Ok(())
    }

    /// Record the final classified error and finish the job.
    pub fn fail(
        &mut self,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Result<(), JobStateError> {
        if self.error_code.is_some() || self.error_message.is_some() {
            return Err(JobStateError::ErrorAlreadySet);
        }
        if self.result.is_some() {
            return Err(JobStateError::ResultAlreadySet);
        }
        self.transition(JobStatus::Failed)?;
        self.error_code = Some(error_code.into());
        self.error_message = Some(error_message.into());
        Ok(())
    }

    /// Keep the first transfer ticket the authority issued; later attempts
    /// must continue that transaction, not open a new one.
    pub fn record_transfer_ticket(&mut self, ticket: &str) {
        if self.transfer_ticket.is_none() {
            self.transfer_ticket = Some(ticket.to_string());
        }
    }
}
