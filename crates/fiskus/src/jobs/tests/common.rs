use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::jobs::domain::{JobId, JobRecord, JobType};
use crate::jobs::mapping::{AuthorityMapper, MappingError};
use crate::jobs::queue::{QueueError, QueueTransport, RetryPolicy};
use crate::jobs::repository::{JobRepository, RepositoryError};
use crate::jobs::service::JobService;
use crate::processor::tests::common::{test_config, Script, ScriptedBridge};

#[derive(Default)]
pub(crate) struct MemoryRepository {
    records: Mutex<HashMap<JobId, JobRecord>>,
}

impl JobRepository for MemoryRepository {
    fn create(&self, record: JobRecord) -> Result<JobRecord, RepositoryError> {
        let mut records = self.records.lock().expect("repository mutex poisoned");
        if records.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    fn get_by_id(&self, id: &JobId) -> Result<JobRecord, RepositoryError> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
            .ok_or(RepositoryError::EntityNotFound)
    }

    fn update(&self, record: JobRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().expect("repository mutex poisoned");
        if !records.contains_key(&record.id) {
            return Err(RepositoryError::EntityNotFound);
        }
        records.insert(record.id, record);
        Ok(())
    }
}

/// Queue that only records what was enqueued; tests drive execution
/// themselves so they can control the attempt counter.
#[derive(Default)]
pub(crate) struct RecordingQueue {
    pub(crate) enqueued: Mutex<Vec<(JobId, RetryPolicy)>>,
    pub(crate) unavailable: bool,
}

impl QueueTransport for RecordingQueue {
    fn enqueue(&self, job_id: JobId, policy: RetryPolicy) -> Result<(), QueueError> {
        if self.unavailable {
            return Err(QueueError::Unavailable("broker down".to_string()));
        }
        self.enqueued
            .lock()
            .expect("queue mutex poisoned")
            .push((job_id, policy));
        Ok(())
    }
}

/// Fixed-template mapper: enough structure for the service to exercise the
/// protocol, strict enough to surface missing payload fields.
pub(crate) struct TemplateMapper;

impl AuthorityMapper for TemplateMapper {
    fn to_authority_xml(&self, job: &JobRecord) -> Result<String, MappingError> {
        let idnr = job
            .payload
            .get("idnr")
            .and_then(Value::as_str)
            .ok_or(MappingError::MissingField("idnr"))?;
        Ok(format!(
            "<Vorgang art=\"{}\" idnr=\"{idnr}\"/>",
            job.job_type.label()
        ))
    }

    fn data_type_version(&self, job_type: JobType) -> &'static str {
        match job_type {
            JobType::UnlockCodeRequest => "SpezRechtAntrag",
            JobType::UnlockCodeActivation => "SpezRechtFreischaltung",
            JobType::UnlockCodeRevocation => "SpezRechtStorno",
            JobType::TaxNumberValidity => "SteuernummerPruefung",
            JobType::IncomeTaxReturn => "ESt_2024",
            JobType::PropertyTaxReturn => "Grundsteuerwert",
        }
    }
}

pub(crate) struct Harness {
    pub(crate) service: JobService<MemoryRepository, RecordingQueue, ScriptedBridge>,
    pub(crate) queue: Arc<RecordingQueue>,
    pub(crate) bridge: Arc<ScriptedBridge>,
}

pub(crate) fn harness(script: Script) -> Harness {
    harness_with_queue(script, RecordingQueue::default())
}

pub(crate) fn harness_with_queue(script: Script, queue: RecordingQueue) -> Harness {
    let queue = Arc::new(queue);
    let bridge = Arc::new(ScriptedBridge::new(script));
    let service = JobService::new(
        Arc::new(MemoryRepository::default()),
        queue.clone(),
        bridge.clone(),
        Arc::new(TemplateMapper),
        test_config(),
        RetryPolicy::default(),
    );
    Harness {
        service,
        queue,
        bridge,
    }
}
