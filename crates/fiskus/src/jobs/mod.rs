//! Submission lifecycle: persisted job records, the queue contract, and the
//! service that drives filings through the native processor.

pub mod domain;
pub mod mapping;
pub mod queue;
pub mod repository;
pub mod service;

pub use domain::{JobId, JobRecord, JobStateError, JobStatus, JobType};
pub use mapping::{AuthorityMapper, MappingError};
pub use queue::{Attempt, QueueError, QueueTransport, RetryPolicy};
pub use repository::{JobRepository, RepositoryError};
pub use service::{JobService, JobServiceError, JobStatusView};

#[cfg(test)]
mod tests;
