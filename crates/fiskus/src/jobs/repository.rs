use super::domain::{JobId, JobRecord};

/// Storage abstraction for job records. The concrete store (relational,
/// in-memory, ...) is wired in by the host service; the core only relies on
/// this contract.
pub trait JobRepository: Send + Sync {
    fn create(&self, record: JobRecord) -> Result<JobRecord, RepositoryError>;
    fn get_by_id(&self, id: &JobId) -> Result<JobRecord, RepositoryError>;
    fn update(&self, record: JobRecord) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("a record with this id already exists")]
    Conflict,
    #[error("entity not found")]
    EntityNotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
