use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::processor::native::{NativeBridge, RawBuffer, RawCertificate};
use crate::processor::ProcessorConfig;

/// Scripted stand-in for the native library. Each call records what happened
/// in [`Stats`] and answers according to the [`Script`], so tests can inject
/// a failure at any step and then assert that every acquisition was paired
/// with a release.
pub(crate) struct ScriptedBridge {
    pub(crate) script: Script,
    pub(crate) stats: Mutex<Stats>,
    next_id: AtomicU64,
    buffers: Mutex<HashMap<RawBuffer, Vec<u8>>>,
}

#[derive(Clone)]
pub(crate) struct Script {
    pub(crate) init_rc: i32,
    pub(crate) shutdown_rc: i32,
    pub(crate) open_certificate_rc: i32,
    pub(crate) certificate_null: bool,
    /// 1-based index of the `create_buffer` call that returns no handle.
    pub(crate) null_buffer_at: Option<u64>,
    pub(crate) process_rc: i32,
    pub(crate) server_response: Vec<u8>,
    pub(crate) pdf_bytes: Vec<u8>,
    pub(crate) check_tax_number_rc: i32,
    pub(crate) dedicated_rc: i32,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            init_rc: 0,
            shutdown_rc: 0,
            open_certificate_rc: 0,
            certificate_null: false,
            null_buffer_at: None,
            process_rc: 0,
            server_response: success_envelope("tt-0001").into_bytes(),
            pdf_bytes: b"%PDF-1.4 stub".to_vec(),
            check_tax_number_rc: 0,
            dedicated_rc: 0,
        }
    }
}

#[derive(Default)]
pub(crate) struct Stats {
    pub(crate) init_calls: u32,
    pub(crate) shutdown_calls: u32,
    pub(crate) buffers_created: u32,
    pub(crate) buffers_freed: u32,
    pub(crate) certificates_opened: u32,
    pub(crate) certificates_closed: u32,
    pub(crate) process_calls: u32,
    pub(crate) last_flags: Option<u32>,
    pub(crate) last_transfer_ticket: Option<Option<String>>,
}

impl ScriptedBridge {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            stats: Mutex::new(Stats::default()),
            next_id: AtomicU64::new(1),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn succeeding() -> Self {
        Self::new(Script::default())
    }

    fn write_buffer(&self, buffer: RawBuffer, content: Vec<u8>) {
        self.buffers
            .lock()
            .expect("buffer mutex poisoned")
            .insert(buffer, content);
    }
}

impl NativeBridge for ScriptedBridge {
    fn init(&self, _log_path: &Path, _plugin_path: &Path) -> i32 {
        self.stats.lock().expect("stats mutex poisoned").init_calls += 1;
        self.script.init_rc
    }

    fn shutdown(&self) -> i32 {
        self.stats.lock().expect("stats mutex poisoned").shutdown_calls += 1;
        self.script.shutdown_rc
    }

    fn create_buffer(&self) -> Option<RawBuffer> {
        let mut stats = self.stats.lock().expect("stats mutex poisoned");
        let index = u64::from(stats.buffers_created) + 1;
        if self.script.null_buffer_at == Some(index) {
            return None;
        }
        stats.buffers_created += 1;
        Some(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn read_buffer(&self, buffer: RawBuffer) -> Vec<u8> {
        self.buffers
            .lock()
            .expect("buffer mutex poisoned")
            .get(&buffer)
            .cloned()
            .unwrap_or_default()
    }

    fn free_buffer(&self, buffer: RawBuffer) -> i32 {
        self.buffers
            .lock()
            .expect("buffer mutex poisoned")
            .remove(&buffer);
        self.stats.lock().expect("stats mutex poisoned").buffers_freed += 1;
        0
    }

    fn open_certificate(&self, _path: &Path, _pin: Option<&str>) -> (i32, Option<RawCertificate>) {
        if self.script.open_certificate_rc != 0 {
            return (self.script.open_certificate_rc, None);
        }
        if self.script.certificate_null {
            return (0, None);
        }
        let mut stats = self.stats.lock().expect("stats mutex poisoned");
        stats.certificates_opened += 1;
        (0, Some(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn close_certificate(&self, _certificate: RawCertificate) -> i32 {
        self.stats
            .lock()
            .expect("stats mutex poisoned")
            .certificates_closed += 1;
        0
    }

    fn process(
        &self,
        _xml: &str,
        _data_type_version: &str,
        flags: u32,
        transfer_ticket: Option<&str>,
        _certificate: Option<RawCertificate>,
        local_buffer: RawBuffer,
        server_buffer: RawBuffer,
        pdf_buffer: Option<RawBuffer>,
    ) -> i32 {
        {
            let mut stats = self.stats.lock().expect("stats mutex poisoned");
            stats.process_calls += 1;
            stats.last_flags = Some(flags);
            stats.last_transfer_ticket = Some(transfer_ticket.map(str::to_owned));
        }
        self.write_buffer(local_buffer, b"local validation report".to_vec());
        self.write_buffer(server_buffer, self.script.server_response.clone());
        if let Some(pdf) = pdf_buffer {
            self.write_buffer(pdf, self.script.pdf_bytes.clone());
        }
        self.script.process_rc
    }

    fn check_tax_number(&self, _tax_number: &str) -> i32 {
        self.script.check_tax_number_rc
    }

    fn decrypt(
        &self,
        _certificate: RawCertificate,
        _pin: Option<&str>,
        data: &[u8],
        out: RawBuffer,
    ) -> i32 {
        self.write_buffer(out, data.to_vec());
        self.script.dedicated_rc
    }

    fn certificate_properties(
        &self,
        _certificate: RawCertificate,
        _pin: Option<&str>,
        out: RawBuffer,
    ) -> i32 {
        self.write_buffer(out, b"<CertificateProperties/>".to_vec());
        self.script.dedicated_rc
    }

    fn tax_offices(&self, state_id: &str, out: RawBuffer) -> i32 {
        self.write_buffer(out, format!("<TaxOffices state=\"{state_id}\"/>").into_bytes());
        self.script.dedicated_rc
    }

    fn state_id_list(&self, out: RawBuffer) -> i32 {
        self.write_buffer(out, b"<StateIds/>".to_vec());
        self.script.dedicated_rc
    }

    fn electronic_case_number(&self, tax_number: &str, state_id: &str, out: RawBuffer) -> i32 {
        self.write_buffer(out, format!("{state_id}-{tax_number}").into_bytes());
        self.script.dedicated_rc
    }
}

pub(crate) fn test_config() -> ProcessorConfig {
    ProcessorConfig {
        certificate_path: PathBuf::from("instances/blueprint/cert.pfx"),
        certificate_pin: Some("123456".to_string()),
        log_dir: PathBuf::from("."),
        plugin_dir: PathBuf::from("plugins"),
    }
}

/// A minimal but structurally faithful success envelope.
pub(crate) fn success_envelope(ticket: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<Elster xmlns="http://www.elster.de/elsterxml/schema/v11">"#,
            r#"<TransferHeader version="11">"#,
            r#"<TransferTicket>{ticket}</TransferTicket>"#,
            r#"<RC><Rueckgabe><Code>0</Code><Text></Text></Rueckgabe>"#,
            r#"<Stack><Code>0</Code><Text></Text></Stack></RC>"#,
            r#"</TransferHeader>"#,
            r#"<DatenTeil><Nutzdatenblock><NutzdatenHeader version="11">"#,
            r#"<RC><Rueckgabe><Code>0</Code><Text></Text></Rueckgabe>"#,
            r#"<Stack><Code>0</Code><Text></Text></Stack></RC>"#,
            r#"</NutzdatenHeader><Nutzdaten/></Nutzdatenblock></DatenTeil>"#,
            r#"</Elster>"#,
        ),
        ticket = ticket
    )
}

/// An envelope carrying a business rejection, as the authority reports one.
pub(crate) fn rejection_envelope(ticket: &str, business_code: &str, message: &str) -> String {
    format!(
        concat!(
            r#"<Elster><TransferHeader>"#,
            r#"<TransferTicket>{ticket}</TransferTicket>"#,
            r#"<RC><Rueckgabe><Code>42</Code><Text>This is the world we live in</Text></Rueckgabe></RC>"#,
            r#"</TransferHeader>"#,
            r#"<DatenTeil><Nutzdatenblock><NutzdatenHeader>"#,
            r#"<RC><Rueckgabe><Code>{code}</Code><Text>{message}</Text></Rueckgabe></RC>"#,
            r#"</NutzdatenHeader></Nutzdatenblock></DatenTeil></Elster>"#,
        ),
        ticket = ticket,
        code = business_code,
        message = message
    )
}
