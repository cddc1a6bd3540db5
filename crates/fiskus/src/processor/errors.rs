use super::decoder::{decode_response, DecodedResponse};

/// Call completed.
pub const RC_OK: i32 = 0;
/// The payload failed the authority's plausibility checks.
pub const RC_VALIDATION_FAILED: i32 = 610_001_002;
/// The tax number is syntactically invalid. A normal negative outcome for
/// the validity check, not an exception.
pub const RC_INVALID_TAX_NUMBER: i32 = 610_001_034;
/// The transfer to the authority was interrupted; safe to retry.
pub const RC_TRANSFER_INTERRUPTED: i32 = 610_101_200;
/// The library reported an unknown internal error.
pub const RC_UNKNOWN: i32 = 610_001_001;
/// The library ran out of memory.
pub const RC_OUT_OF_MEMORY: i32 = 610_001_004;
/// A call was made before `init` succeeded.
pub const RC_NOT_INITIALISED: i32 = 610_001_056;

/// Codes the library documents as systemic conditions. Everything else that
/// is nonzero and non-negative counts as a normal processing failure;
/// unrecognized negative codes are escalated rather than guessed at.
const GLOBAL_CODES: &[i32] = &[RC_UNKNOWN, RC_OUT_OF_MEMORY, RC_NOT_INITIALISED];

/// Classified failure of a native call.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// An allocation primitive returned an absent handle. Fatal for the
    /// operation; never retried.
    #[error("{call} returned a null handle")]
    NullReturned { call: &'static str },

    /// The call returned a code classified as a normal business or transient
    /// failure. Carries the decoded server response when one was available.
    #[error("{call} was not successful (code {code})")]
    NotSuccessful {
        call: &'static str,
        code: i32,
        response: Option<DecodedResponse>,
    },

    /// A systemic condition: a documented global code or an unrecognized
    /// negative one. Never retried.
    #[error("{call} failed with global error code {code}")]
    Global { call: &'static str, code: i32 },

    /// The server responded but the envelope could not be parsed. Treated as
    /// fatal because the outcome of the submission is unknowable from it.
    #[error(transparent)]
    Decode(#[from] super::decoder::DecodeError),
}

impl ProcessorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessorError::NotSuccessful { .. })
    }

    /// The most specific error code available: the business section's code,
    /// then the transport header's, then the raw library code.
    pub fn error_code(&self) -> String {
        match self {
            ProcessorError::NullReturned { .. } => "null_returned".to_string(),
            ProcessorError::NotSuccessful { code, response, .. } => response
                .as_ref()
                .and_then(|decoded| {
                    decoded
                        .business
                        .as_ref()
                        .or(decoded.transport.as_ref())
                        .map(|section| section.code.clone())
                })
                .unwrap_or_else(|| code.to_string()),
            ProcessorError::Global { code, .. } => code.to_string(),
            ProcessorError::Decode(_) => "malformed_response".to_string(),
        }
    }

    pub fn error_message(&self) -> String {
        match self {
            ProcessorError::NotSuccessful { response: Some(decoded), .. } => decoded
                .business
                .as_ref()
                .or(decoded.transport.as_ref())
                .map(|section| section.message.clone())
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| self.to_string()),
            _ => self.to_string(),
        }
    }

    /// The transfer ticket decoded from a failed call, when the authority
    /// got far enough to issue one. Recorded so a retry can continue the
    /// existing transaction instead of resubmitting.
    pub fn transfer_ticket(&self) -> Option<&str> {
        match self {
            ProcessorError::NotSuccessful { response: Some(decoded), .. } => {
                decoded.transfer_ticket.as_deref()
            }
            _ => None,
        }
    }
}

/// Map a raw return code to the error taxonomy. Tie-break order: zero is
/// success, documented global codes and unrecognized negative codes are
/// global, everything else is a normal processing failure.
pub fn check_rc(call: &'static str, code: i32) -> Result<(), ProcessorError> {
    if code == RC_OK {
        return Ok(());
    }
    if code < 0 || GLOBAL_CODES.contains(&code) {
        return Err(ProcessorError::Global { call, code });
    }
    Err(ProcessorError::NotSuccessful {
        call,
        code,
        response: None,
    })
}

/// Like [`check_rc`], but attaches the decoded server envelope to a
/// processing failure so the caller can surface the authority's own code and
/// message. A server response that does not parse is left off the error.
pub fn check_rc_with_response(
    call: &'static str,
    code: i32,
    server_xml: &[u8],
) -> Result<(), ProcessorError> {
    match check_rc(call, code) {
        Err(ProcessorError::NotSuccessful { call, code, .. }) => {
            Err(ProcessorError::NotSuccessful {
                call,
                code,
                response: decode_response(server_xml).ok(),
            })
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert!(check_rc("process", RC_OK).is_ok());
    }

    #[test]
    fn invalid_tax_number_is_a_business_outcome() {
        match check_rc("check_tax_number", RC_INVALID_TAX_NUMBER) {
            Err(ProcessorError::NotSuccessful { code, .. }) => {
                assert_eq!(code, RC_INVALID_TAX_NUMBER);
            }
            other => panic!("expected business failure, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_positive_codes_default_to_not_successful() {
        let err = check_rc("process", 123_456).expect_err("nonzero fails");
        assert!(err.is_retryable());
    }

    #[test]
    fn documented_global_codes_escalate() {
        for code in [RC_UNKNOWN, RC_OUT_OF_MEMORY, RC_NOT_INITIALISED] {
            match check_rc("process", code) {
                Err(ProcessorError::Global { .. }) => {}
                other => panic!("expected global error for {code}, got {other:?}"),
            }
        }
    }

    #[test]
    fn unrecognized_negative_codes_escalate() {
        match check_rc("process", -7) {
            Err(err @ ProcessorError::Global { .. }) => assert!(!err.is_retryable()),
            other => panic!("expected global error, got {other:?}"),
        }
    }

    #[test]
    fn attached_response_supplies_code_and_message() {
        let xml = r#"<Elster><TransferHeader>
            <TransferTicket>tt-1</TransferTicket>
            <RC><Rueckgabe><Code>42</Code><Text>header text</Text></Rueckgabe></RC>
            </TransferHeader>
            <DatenTeil><Nutzdatenblock><NutzdatenHeader>
            <RC><Rueckgabe><Code>371015223</Code><Text>rejected</Text></Rueckgabe></RC>
            </NutzdatenHeader></Nutzdatenblock></DatenTeil></Elster>"#;

        let err = check_rc_with_response("process", RC_VALIDATION_FAILED, xml.as_bytes())
            .expect_err("nonzero fails");
        assert_eq!(err.error_code(), "371015223");
        assert_eq!(err.error_message(), "rejected");
        assert_eq!(err.transfer_ticket(), Some("tt-1"));
    }

    #[test]
    fn unparseable_server_response_leaves_error_bare() {
        let err = check_rc_with_response("process", 7, b"<Elster><RC></Elster>")
            .expect_err("nonzero fails");
        match err {
            ProcessorError::NotSuccessful { response: None, code: 7, .. } => {}
            other => panic!("expected bare failure, got {other:?}"),
        }
    }
}
