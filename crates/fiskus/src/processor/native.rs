use std::path::Path;

/// Opaque identifier for a native output buffer. The native library hands
/// these out from `create_buffer` and expects every one of them back through
/// `free_buffer`.
pub type RawBuffer = u64;

/// Opaque identifier for an open certificate session.
pub type RawCertificate = u64;

/// Run the local plausibility checks on the payload.
pub const FLAG_VALIDATE: u32 = 1 << 1;
/// Transmit the payload to the authority.
pub const FLAG_SEND: u32 = 1 << 2;
/// Produce a printable confirmation document alongside the transmission.
pub const FLAG_PRINT: u32 = 1 << 5;

/// Low-level surface of the proprietary processing library.
///
/// The real library is a stateful native dependency; this trait captures the
/// calls the rest of the crate composes, so the protocol layer can be
/// exercised against scripted implementations. Return values follow the
/// library's convention: an `i32` code where zero is success, and allocation
/// calls that can come back empty-handed return `None` instead of a handle.
pub trait NativeBridge: Send + Sync {
    /// Establish the connection. Must precede every other call.
    fn init(&self, log_path: &Path, plugin_path: &Path) -> i32;

    /// Release the connection.
    fn shutdown(&self) -> i32;

    fn create_buffer(&self) -> Option<RawBuffer>;
    fn read_buffer(&self, buffer: RawBuffer) -> Vec<u8>;
    fn free_buffer(&self, buffer: RawBuffer) -> i32;

    /// Open the client certificate used to authenticate send operations.
    /// Returns the library code plus the handle when one was produced.
    fn open_certificate(&self, path: &Path, pin: Option<&str>) -> (i32, Option<RawCertificate>);
    fn close_certificate(&self, certificate: RawCertificate) -> i32;

    /// The single generic processing call: validates and/or transmits the
    /// payload depending on `flags`, filling the output buffers the caller
    /// allocated. `transfer_ticket` continues a previously started
    /// authority-side transaction instead of opening a new one.
    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        xml: &str,
        data_type_version: &str,
        flags: u32,
        transfer_ticket: Option<&str>,
        certificate: Option<RawCertificate>,
        local_buffer: RawBuffer,
        server_buffer: RawBuffer,
        pdf_buffer: Option<RawBuffer>,
    ) -> i32;

    /// Dedicated syntactic validity check for a tax number.
    fn check_tax_number(&self, tax_number: &str) -> i32;

    /// Decrypt data that the authority encrypted against our certificate.
    fn decrypt(
        &self,
        certificate: RawCertificate,
        pin: Option<&str>,
        data: &[u8],
        out: RawBuffer,
    ) -> i32;

    /// Dump the properties of the opened certificate into `out`.
    fn certificate_properties(
        &self,
        certificate: RawCertificate,
        pin: Option<&str>,
        out: RawBuffer,
    ) -> i32;

    /// Reference data: the tax offices of one federal state.
    fn tax_offices(&self, state_id: &str, out: RawBuffer) -> i32;

    /// Reference data: the list of federal state identifiers.
    fn state_id_list(&self, out: RawBuffer) -> i32;

    /// Compute the electronic case number for a tax number within a state.
    fn electronic_case_number(&self, tax_number: &str, state_id: &str, out: RawBuffer) -> i32;
}
