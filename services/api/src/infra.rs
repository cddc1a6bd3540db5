use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use fiskus::jobs::{
    Attempt, AuthorityMapper, JobId, JobRecord, JobRepository, JobService, JobType, MappingError,
    QueueError, QueueTransport, RepositoryError, RetryPolicy,
};
use fiskus::processor::errors::{RC_INVALID_TAX_NUMBER, RC_OK};
use fiskus::processor::NativeBridge;

pub(crate) type ApiJobService = JobService<InMemoryJobRepository, TokioJobQueue, LocalBridge>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) jobs: Arc<ApiJobService>,
}

#[derive(Default)]
pub(crate) struct InMemoryJobRepository {
    records: Mutex<HashMap<JobId, JobRecord>>,
}

impl JobRepository for InMemoryJobRepository {
    fn create(&self, record: JobRecord) -> Result<JobRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id, record.clone());
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
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if !guard.contains_key(&record.id) {
            return Err(RepositoryError::EntityNotFound);
        }
        guard.insert(record.id, record);
        Ok(())
    }
}

/// Queue transport backed by an in-process channel. The worker side lives in
/// [`run_queue_worker`]; once it stops, enqueueing reports the outage.
pub(crate) struct TokioJobQueue {
    tx: UnboundedSender<(JobId, RetryPolicy)>,
}

impl TokioJobQueue {
    pub(crate) fn new(tx: UnboundedSender<(JobId, RetryPolicy)>) -> Self {
        Self { tx }
    }
}

impl QueueTransport for TokioJobQueue {
    fn enqueue(&self, job_id: JobId, policy: RetryPolicy) -> Result<(), QueueError> {
        self.tx
            .send((job_id, policy))
            .map_err(|_| QueueError::Unavailable("queue worker stopped".to_string()))
    }
}

/// Drains the queue one job at a time, owning the attempt counter and the
/// pause between attempts. Executions run on the blocking pool because the
/// native call surface is synchronous.
pub(crate) async fn run_queue_worker(
    mut rx: UnboundedReceiver<(JobId, RetryPolicy)>,
    service: Arc<ApiJobService>,
) {
    while let Some((job_id, policy)) = rx.recv().await {
        let mut attempt = Attempt::first(policy);
        loop {
            let runner = service.clone();
            let outcome =
                tokio::task::spawn_blocking(move || runner.execute(&job_id, attempt)).await;
            match outcome {
                Ok(Ok(())) => break,
                Ok(Err(err)) if err.is_retryable() && !attempt.is_last() => {
                    tokio::time::sleep(policy.interval).await;
                    attempt = attempt.next();
                }
                // Terminal outcomes are already persisted by the service.
                Ok(Err(_)) => break,
                Err(join_err) => {
                    tracing::error!(%job_id, %join_err, "job execution task aborted");
                    break;
                }
            }
        }
    }
}

/// Self-contained stand-in for the authority's native library: accepts every
/// call, answers with structurally faithful envelopes, and applies a
/// syntax-only tax number check. Lets the gateway run end to end on machines
/// without the vendor runtime installed.
pub(crate) struct LocalBridge {
    next_id: AtomicU64,
    buffers: Mutex<HashMap<u64, Vec<u8>>>,
}

impl Default for LocalBridge {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            buffers: Mutex::new(HashMap::new()),
        }
    }
}

impl LocalBridge {
    fn write(&self, buffer: u64, content: Vec<u8>) {
        self.buffers
            .lock()
            .expect("buffer mutex poisoned")
            .insert(buffer, content);
    }

    fn envelope(ticket: &str) -> Vec<u8> {
        format!(
            concat!(
                r#"<Elster><TransferHeader>"#,
                r#"<TransferTicket>{ticket}</TransferTicket>"#,
                r#"<RC><Rueckgabe><Code>0</Code><Text></Text></Rueckgabe></RC>"#,
                r#"</TransferHeader>"#,
                r#"<DatenTeil><Nutzdatenblock><NutzdatenHeader>"#,
                r#"<RC><Rueckgabe><Code>0</Code><Text></Text></Rueckgabe></RC>"#,
                r#"</NutzdatenHeader></Nutzdatenblock></DatenTeil></Elster>"#,
            ),
            ticket = ticket
        )
        .into_bytes()
    }
}

impl NativeBridge for LocalBridge {
    fn init(&self, _log_path: &Path, _plugin_path: &Path) -> i32 {
        0
    }

    fn shutdown(&self) -> i32 {
        0
    }

    fn create_buffer(&self) -> Option<u64> {
        Some(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn read_buffer(&self, buffer: u64) -> Vec<u8> {
        self.buffers
            .lock()
            .expect("buffer mutex poisoned")
            .get(&buffer)
            .cloned()
            .unwrap_or_default()
    }

    fn free_buffer(&self, buffer: u64) -> i32 {
        self.buffers
            .lock()
            .expect("buffer mutex poisoned")
            .remove(&buffer);
        0
    }

    fn open_certificate(&self, _path: &Path, _pin: Option<&str>) -> (i32, Option<u64>) {
        (0, Some(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn close_certificate(&self, _certificate: u64) -> i32 {
        0
    }

    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        _xml: &str,
        _data_type_version: &str,
        _flags: u32,
        transfer_ticket: Option<&str>,
        _certificate: Option<u64>,
        local_buffer: u64,
        server_buffer: u64,
        pdf_buffer: Option<u64>,
    ) -> i32 {
        // A continued transaction keeps its ticket; a fresh one gets a new one.
        let ticket = transfer_ticket
            .map(str::to_owned)
            .unwrap_or_else(|| format!("et{}", Uuid::new_v4().simple()));
        self.write(local_buffer, b"local validation report".to_vec());
        self.write(server_buffer, Self::envelope(&ticket));
        if let Some(pdf) = pdf_buffer {
            self.write(pdf, b"%PDF-1.4 transfer transcript".to_vec());
        }
        0
    }

    fn check_tax_number(&self, tax_number: &str) -> i32 {
        let digits = tax_number.trim();
        if digits.len() == 13 && digits.bytes().all(|byte| byte.is_ascii_digit()) {
            RC_OK
        } else {
            RC_INVALID_TAX_NUMBER
        }
    }

    fn decrypt(&self, _certificate: u64, _pin: Option<&str>, data: &[u8], out: u64) -> i32 {
        self.write(out, data.to_vec());
        0
    }

    fn certificate_properties(&self, _certificate: u64, _pin: Option<&str>, out: u64) -> i32 {
        self.write(
            out,
            br#"<CertificateProperties><Type>Portal</Type><Verified>false</Verified></CertificateProperties>"#
                .to_vec(),
        );
        0
    }

    fn tax_offices(&self, state_id: &str, out: u64) -> i32 {
        self.write(
            out,
            format!(
                r#"<TaxOffices state="{state_id}"><Office code="{state_id}01">Finanzamt Mitte</Office></TaxOffices>"#
            )
            .into_bytes(),
        );
        0
    }

    fn state_id_list(&self, out: u64) -> i32 {
        self.write(
            out,
            br#"<StateIds><State id="28">Berlin</State><State id="91">Bayern</State></StateIds>"#
                .to_vec(),
        );
        0
    }

    fn electronic_case_number(&self, tax_number: &str, state_id: &str, out: u64) -> i32 {
        self.write(out, format!("{state_id}-{tax_number}").into_bytes());
        0
    }
}

/// Renders job payloads into the authority's submission XML. Field coverage
/// is the minimum the simulated bridge accepts; a production deployment
/// swaps in the full schema mapping.
pub(crate) struct BlueprintMapper;

impl AuthorityMapper for BlueprintMapper {
    fn to_authority_xml(&self, job: &JobRecord) -> Result<String, MappingError> {
        let idnr = job
            .payload
            .get("idnr")
            .and_then(Value::as_str)
            .ok_or(MappingError::MissingField("idnr"))?;

        let mut fields = String::new();
        if let Some(dob) = job.payload.get("dob").and_then(Value::as_str) {
            fields.push_str(&format!("<Geburtsdatum>{dob}</Geburtsdatum>"));
        }
        if let Some(code) = job.payload.get("unlock_code").and_then(Value::as_str) {
            fields.push_str(&format!("<Freischaltcode>{code}</Freischaltcode>"));
        }

        Ok(format!(
            "<Vorgang art=\"{}\"><IdNr>{idnr}</IdNr>{fields}</Vorgang>",
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
