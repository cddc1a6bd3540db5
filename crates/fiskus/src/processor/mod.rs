//! Integration with the authority's native processing library: the raw call
//! surface, the handle lifecycle, the call protocol that composes primitives
//! into logical operations, and the response envelope decoder.

pub mod decoder;
pub mod errors;
pub mod handle;
pub mod native;
pub mod protocol;

pub use decoder::{decode_response, DecodedResponse, ReturnSection};
pub use errors::ProcessorError;
pub use handle::{ProcessorConfig, ProcessorHandle, RawResponse};
pub use native::NativeBridge;
pub use protocol::{CallProtocol, SubmissionOutcome};

#[cfg(test)]
pub(crate) mod tests;
