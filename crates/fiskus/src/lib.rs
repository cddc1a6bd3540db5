//! Gateway core for electronic tax filings.
//!
//! The `processor` module wraps the authority's native processing library
//! behind a scriptable call surface; `jobs` layers the asynchronous
//! submission lifecycle on top of it. Host services wire in their own
//! storage, queue transport, and payload mapping through the traits those
//! modules expose.

pub mod config;
pub mod error;
pub mod jobs;
pub mod processor;
pub mod telemetry;

pub use error::AppError;
