use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::processor::{
    CallProtocol, NativeBridge, ProcessorConfig, ProcessorError, ProcessorHandle,
};

use super::domain::{JobId, JobRecord, JobStateError, JobStatus, JobType};
use super::mapping::{AuthorityMapper, MappingError};
use super::queue::{Attempt, QueueError, QueueTransport, RetryPolicy};
use super::repository::{JobRepository, RepositoryError};

/// Error raised by the job service.
#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    State(#[from] JobStateError),
}

impl JobServiceError {
    /// Only a processing failure classified as business/transient is worth
    /// another attempt; everything else is terminal on first sight.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobServiceError::Processor(err) if err.is_retryable())
    }

    pub fn error_code(&self) -> String {
        match self {
            JobServiceError::Processor(err) => err.error_code(),
            JobServiceError::Mapping(_) => "mapping_error".to_string(),
            JobServiceError::Repository(_) => "repository_error".to_string(),
            JobServiceError::Queue(_) => "queue_error".to_string(),
            JobServiceError::State(_) => "state_error".to_string(),
        }
    }

    pub fn error_message(&self) -> String {
        match self {
            JobServiceError::Processor(err) => err.error_message(),
            other => other.to_string(),
        }
    }

    fn transfer_ticket(&self) -> Option<&str> {
        match self {
            JobServiceError::Processor(err) => err.transfer_ticket(),
            _ => None,
        }
    }
}

/// Status projection handed back to API callers. Result and error fields
/// are populated only for terminal jobs; everything still in flight reports
/// a bare processing state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub process_status: &'static str,
    pub result: Option<Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl JobStatusView {
    fn from_record(record: &JobRecord) -> Self {
        let process_status = match record.status {
            JobStatus::Success => "Success",
            JobStatus::Failed => "Failure",
            _ => "Processing",
        };
        Self {
            process_status,
            result: record.result.clone(),
            error_code: record.error_code.clone(),
            error_message: record.error_message.clone(),
        }
    }
}

/// Queues submissions, executes them against the native processor, applies
/// the retry contract, and persists the terminal outcome.
pub struct JobService<R, Q, N> {
    repository: Arc<R>,
    queue: Arc<Q>,
    native: Arc<N>,
    mapper: Arc<dyn AuthorityMapper>,
    processor: ProcessorConfig,
    retry: RetryPolicy,
}

impl<R, Q, N> JobService<R, Q, N>
where
    R: JobRepository + 'static,
    Q: QueueTransport + 'static,
    N: NativeBridge + 'static,
{
    pub fn new(
        repository: Arc<R>,
        queue: Arc<Q>,
        native: Arc<N>,
        mapper: Arc<dyn AuthorityMapper>,
        processor: ProcessorConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            queue,
            native,
            mapper,
            processor,
            retry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Persist a fresh job and hand it to the queue transport.
    pub fn submit(
        &self,
        job_type: JobType,
        payload: Value,
        creator_id: &str,
    ) -> Result<JobRecord, JobServiceError> {
        let record = JobRecord::new(job_type, payload, creator_id);
        let mut record = self.repository.create(record)?;

        self.queue.enqueue(record.id, self.retry)?;
        record.transition(JobStatus::Scheduled)?;
        self.repository.update(record.clone())?;

        info!(job_id = %record.id, job_type = job_type.label(), "job scheduled");
        Ok(record)
    }

    pub fn get_by_id(&self, id: &JobId) -> Result<JobRecord, JobServiceError> {
        Ok(self.repository.get_by_id(id)?)
    }

    pub fn status(&self, id: &JobId) -> Result<JobStatusView, JobServiceError> {
        let record = self.repository.get_by_id(id)?;
        Ok(JobStatusView::from_record(&record))
    }

    /// Run one attempt of a job. Called by the queue transport, which owns
    /// the attempt counter and the pause between attempts.
    ///
    /// A retryable failure with attempts remaining propagates without
    /// touching the terminal fields, so the transport can try again; the
    /// final attempt and every non-retryable failure persist the classified
    /// error and move the job to `Failed`.
    pub fn execute(&self, id: &JobId, attempt: Attempt) -> Result<(), JobServiceError> {
        let mut job = self.repository.get_by_id(id)?;
        job.transition(JobStatus::Processing)?;
        self.repository.update(job.clone())?;

        match self.run_operation(&job) {
            Ok(result) => {
                job.complete(result)?;
                self.repository.update(job)?;
                info!(job_id = %id, "job succeeded");
                Ok(())
            }
            Err(err) => {
                if let Some(ticket) = err.transfer_ticket() {
                    job.record_transfer_ticket(ticket);
                }
                if err.is_retryable() && !attempt.is_last() {
                    self.repository.update(job)?;
                    warn!(
                        job_id = %id,
                        attempt = attempt.number,
                        code = %err.error_code(),
                        "attempt failed, leaving retry to the transport"
                    );
                    return Err(err);
                }
                job.fail(err.error_code(), err.error_message())?;
                self.repository.update(job)?;
                error!(job_id = %id, code = %err.error_code(), "job failed terminally");
                Err(err)
            }
        }
    }

    fn run_operation(&self, job: &JobRecord) -> Result<Value, JobServiceError> {
        let handle = ProcessorHandle::open(self.native(), &self.processor)?;
        let protocol = CallProtocol::new(&handle);
        let version = self.mapper.data_type_version(job.job_type);

        let result = match job.job_type {
            JobType::UnlockCodeRequest
            | JobType::UnlockCodeActivation
            | JobType::UnlockCodeRevocation => {
                let xml = self.mapper.to_authority_xml(job)?;
                let decoded =
                    protocol.process_verfahren(&xml, version, job.transfer_ticket.as_deref())?;
                json!({
                    "transfer_ticket": decoded.transfer_ticket,
                    "idnr": job.payload.get("idnr").cloned().unwrap_or(Value::Null),
                })
            }
            JobType::TaxNumberValidity => {
                let tax_number = job
                    .payload
                    .get("tax_number")
                    .and_then(Value::as_str)
                    .ok_or(MappingError::MissingField("tax_number"))?;
                json!({ "is_valid": protocol.check_tax_number(tax_number)? })
            }
            JobType::IncomeTaxReturn | JobType::PropertyTaxReturn => {
                let xml = self.mapper.to_authority_xml(job)?;
                let with_pdf = job
                    .payload
                    .get("include_pdf")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let outcome = protocol.validate_and_send(&xml, version, with_pdf)?;
                json!({
                    "transfer_ticket": outcome.decoded.transfer_ticket,
                    "pdf": outcome.pdf.map(|bytes| BASE64.encode(bytes)),
                })
            }
        };

        Ok(result)
    }

    /// Reference data: the tax offices of one federal state.
    pub fn tax_offices(&self, state_id: &str) -> Result<String, JobServiceError> {
        let handle = ProcessorHandle::open(self.native(), &self.processor)?;
        Ok(CallProtocol::new(&handle).tax_offices(state_id)?)
    }

    /// Reference data: the list of federal state identifiers.
    pub fn state_id_list(&self) -> Result<String, JobServiceError> {
        let handle = ProcessorHandle::open(self.native(), &self.processor)?;
        Ok(CallProtocol::new(&handle).state_id_list()?)
    }

    /// Properties of the configured client certificate.
    pub fn certificate_properties(&self) -> Result<String, JobServiceError> {
        let handle = ProcessorHandle::open(self.native(), &self.processor)?;
        Ok(CallProtocol::new(&handle).certificate_properties()?)
    }

    fn native(&self) -> Arc<dyn NativeBridge> {
        self.native.clone()
    }
}
