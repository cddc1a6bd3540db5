use super::decoder::{decode_response, DecodedResponse};
use super::errors::{check_rc, check_rc_with_response, ProcessorError, RC_INVALID_TAX_NUMBER, RC_OK};
use super::handle::{ProcessorHandle, RawResponse};
use super::native::{FLAG_PRINT, FLAG_SEND, FLAG_VALIDATE};

/// Result of a successful validate-and-send: the decoded envelope plus the
/// printable confirmation when one was requested.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub decoded: DecodedResponse,
    pub pdf: Option<Vec<u8>>,
}

/// Composes handle primitives into complete logical operations.
///
/// Every operation either returns a decoded success payload or a classified
/// [`ProcessorError`]; buffers and certificate handles acquired along the
/// way are guard-scoped, so they are released on every exit path including
/// the ones where an earlier step already failed.
pub struct CallProtocol<'a> {
    handle: &'a ProcessorHandle,
}

impl<'a> CallProtocol<'a> {
    pub fn new(handle: &'a ProcessorHandle) -> Self {
        Self { handle }
    }

    /// Run only the local plausibility checks. No certificate involved.
    pub fn validate(&self, xml: &str, data_type_version: &str) -> Result<RawResponse, ProcessorError> {
        let response = self
            .handle
            .process(xml, data_type_version, FLAG_VALIDATE, None, None, false)?;
        check_rc_with_response("process", response.rc, &response.server)?;
        Ok(response)
    }

    /// Validate and transmit a filing, optionally producing the printable
    /// confirmation document.
    pub fn validate_and_send(
        &self,
        xml: &str,
        data_type_version: &str,
        with_pdf: bool,
    ) -> Result<SubmissionOutcome, ProcessorError> {
        let certificate = self.handle.certificate()?;
        let mut flags = FLAG_SEND | FLAG_VALIDATE;
        if with_pdf {
            flags |= FLAG_PRINT;
        }
        let response = self.handle.process(
            xml,
            data_type_version,
            flags,
            None,
            Some(&certificate),
            with_pdf,
        )?;
        check_rc_with_response("process", response.rc, &response.server)?;
        let decoded = decode_response(&response.server)?;
        Ok(SubmissionOutcome {
            decoded,
            pdf: response.pdf,
        })
    }

    /// Run an authority-side procedure (unlock-code handling, reference
    /// retrievals). Passing the transfer ticket from an earlier attempt
    /// continues that transaction instead of opening a duplicate one.
    pub fn process_verfahren(
        &self,
        xml: &str,
        data_type_version: &str,
        transfer_ticket: Option<&str>,
    ) -> Result<DecodedResponse, ProcessorError> {
        let certificate = self.handle.certificate()?;
        let response = self.handle.process(
            xml,
            data_type_version,
            FLAG_SEND | FLAG_VALIDATE,
            transfer_ticket,
            Some(&certificate),
            false,
        )?;
        check_rc_with_response("process", response.rc, &response.server)?;
        Ok(decode_response(&response.server)?)
    }

    /// Syntactic validity of a tax number. The invalid-number code is a
    /// plain `false`; the dedicated primitive has no business response, so
    /// any other nonzero code is escalated as a global error.
    pub fn check_tax_number(&self, tax_number: &str) -> Result<bool, ProcessorError> {
        match self.handle.native().check_tax_number(tax_number) {
            RC_OK => Ok(true),
            RC_INVALID_TAX_NUMBER => Ok(false),
            code => Err(ProcessorError::Global {
                call: "check_tax_number",
                code,
            }),
        }
    }

    /// Decrypt data the authority encrypted against our certificate.
    pub fn decrypt_data(&self, data: &[u8]) -> Result<Vec<u8>, ProcessorError> {
        let certificate = self.handle.certificate()?;
        let out = self.handle.buffer()?;
        let rc = self
            .handle
            .native()
            .decrypt(certificate.raw(), self.handle.pin(), data, out.raw());
        check_rc("decrypt", rc)?;
        Ok(out.read())
    }

    /// Properties of the configured client certificate.
    pub fn certificate_properties(&self) -> Result<String, ProcessorError> {
        let certificate = self.handle.certificate()?;
        let out = self.handle.buffer()?;
        let rc = self.handle.native().certificate_properties(
            certificate.raw(),
            self.handle.pin(),
            out.raw(),
        );
        check_rc("certificate_properties", rc)?;
        Ok(String::from_utf8_lossy(&out.read()).into_owned())
    }

    /// Reference data: the tax offices of one federal state.
    pub fn tax_offices(&self, state_id: &str) -> Result<String, ProcessorError> {
        let out = self.handle.buffer()?;
        let rc = self.handle.native().tax_offices(state_id, out.raw());
        check_rc("tax_offices", rc)?;
        Ok(String::from_utf8_lossy(&out.read()).into_owned())
    }

    /// Reference data: the list of federal state identifiers.
    pub fn state_id_list(&self) -> Result<String, ProcessorError> {
        let out = self.handle.buffer()?;
        let rc = self.handle.native().state_id_list(out.raw());
        check_rc("state_id_list", rc)?;
        Ok(String::from_utf8_lossy(&out.read()).into_owned())
    }

    /// Compute the electronic case number for a tax number within a state.
    pub fn electronic_case_number(
        &self,
        tax_number: &str,
        state_id: &str,
    ) -> Result<String, ProcessorError> {
        let out = self.handle.buffer()?;
        let rc = self
            .handle
            .native()
            .electronic_case_number(tax_number, state_id, out.raw());
        check_rc("electronic_case_number", rc)?;
        Ok(String::from_utf8_lossy(&out.read()).into_owned())
    }
}
