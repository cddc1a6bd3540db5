use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use super::errors::{check_rc, ProcessorError, RC_OK};
use super::native::{NativeBridge, RawBuffer, RawCertificate};

/// Settings the handle needs to talk to the native library.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub certificate_path: PathBuf,
    pub certificate_pin: Option<String>,
    pub log_dir: PathBuf,
    pub plugin_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Initialised,
    Closed,
}

/// One initialised connection to the native library.
///
/// A handle is private to the execution that opened it: the library keeps
/// per-connection state and supports at most one logical operation in
/// flight. Shutdown is guaranteed through `Drop`, so early returns and error
/// paths cannot leak the connection; callers that care about the shutdown
/// return code use [`ProcessorHandle::close`] instead.
pub struct ProcessorHandle {
    native: Arc<dyn NativeBridge>,
    config: ProcessorConfig,
    state: HandleState,
}

impl std::fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ProcessorHandle {
    /// Initialise a fresh connection. Failure is fatal for this handle; the
    /// caller retries by opening a new one.
    pub fn open(
        native: Arc<dyn NativeBridge>,
        config: &ProcessorConfig,
    ) -> Result<Self, ProcessorError> {
        let rc = native.init(&config.log_dir, &config.plugin_dir);
        check_rc("init", rc)?;
        Ok(Self {
            native,
            config: config.clone(),
            state: HandleState::Initialised,
        })
    }

    /// Shut the connection down, reporting the library's verdict. Dropping
    /// the handle performs the same release without the report.
    pub fn close(mut self) -> Result<(), ProcessorError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), ProcessorError> {
        if self.state == HandleState::Closed {
            return Ok(());
        }
        self.state = HandleState::Closed;
        check_rc("shutdown", self.native.shutdown())
    }

    /// Allocate a native output buffer. An absent handle from the library is
    /// a fatal resource condition, distinct from a nonzero return code.
    pub fn buffer(&self) -> Result<BufferGuard<'_>, ProcessorError> {
        match self.native.create_buffer() {
            Some(raw) => Ok(BufferGuard { handle: self, raw }),
            None => Err(ProcessorError::NullReturned {
                call: "create_buffer",
            }),
        }
    }

    /// Open the configured client certificate for an authenticated call.
    pub fn certificate(&self) -> Result<CertificateGuard<'_>, ProcessorError> {
        let (rc, raw) = self
            .native
            .open_certificate(&self.config.certificate_path, self.pin());
        check_rc("open_certificate", rc)?;
        match raw {
            Some(raw) => Ok(CertificateGuard { handle: self, raw }),
            None => Err(ProcessorError::NullReturned {
                call: "open_certificate",
            }),
        }
    }

    /// Run the generic processing call, reading back every buffer the call
    /// filled. Buffers are created before the call and released when the
    /// guards leave this scope, whatever the return code was; classifying
    /// that code is the protocol layer's job since it owns the decode step.
    pub fn process(
        &self,
        xml: &str,
        data_type_version: &str,
        flags: u32,
        transfer_ticket: Option<&str>,
        certificate: Option<&CertificateGuard<'_>>,
        with_pdf: bool,
    ) -> Result<RawResponse, ProcessorError> {
        let local = self.buffer()?;
        let server = self.buffer()?;
        let pdf = if with_pdf { Some(self.buffer()?) } else { None };

        let rc = self.native.process(
            xml,
            data_type_version,
            flags,
            transfer_ticket,
            certificate.map(CertificateGuard::raw),
            local.raw(),
            server.raw(),
            pdf.as_ref().map(BufferGuard::raw),
        );

        Ok(RawResponse {
            rc,
            local: local.read(),
            server: server.read(),
            pdf: pdf.as_ref().map(BufferGuard::read),
        })
    }

    pub(super) fn native(&self) -> &dyn NativeBridge {
        self.native.as_ref()
    }

    pub(super) fn pin(&self) -> Option<&str> {
        self.config.certificate_pin.as_deref()
    }
}

impl Drop for ProcessorHandle {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(%err, "native connection shutdown reported an error");
        }
    }
}

/// Raw product of one processing call: the library's return code, the local
/// validation output, the server response envelope, and the printable
/// confirmation when one was requested.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub rc: i32,
    pub local: Vec<u8>,
    pub server: Vec<u8>,
    pub pdf: Option<Vec<u8>>,
}

/// A native output buffer, released exactly once when the guard drops.
pub struct BufferGuard<'a> {
    handle: &'a ProcessorHandle,
    raw: RawBuffer,
}

impl std::fmt::Debug for BufferGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferGuard")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

impl BufferGuard<'_> {
    pub fn raw(&self) -> RawBuffer {
        self.raw
    }

    pub fn read(&self) -> Vec<u8> {
        self.handle.native.read_buffer(self.raw)
    }
}

impl Drop for BufferGuard<'_> {
    fn drop(&mut self) {
        let rc = self.handle.native.free_buffer(self.raw);
        if rc != RC_OK {
            warn!(code = rc, "native buffer release reported an error");
        }
    }
}

/// An open certificate session, closed exactly once when the guard drops.
pub struct CertificateGuard<'a> {
    handle: &'a ProcessorHandle,
    raw: RawCertificate,
}

impl std::fmt::Debug for CertificateGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateGuard")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

impl CertificateGuard<'_> {
    pub fn raw(&self) -> RawCertificate {
        self.raw
    }
}

impl Drop for CertificateGuard<'_> {
    fn drop(&mut self) {
        let rc = self.handle.native.close_certificate(self.raw);
        if rc != RC_OK {
            warn!(code = rc, "certificate close reported an error");
        }
    }
}
