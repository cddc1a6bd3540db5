use super::domain::{JobRecord, JobType};

/// Translation seam to the authority's filing schemas. The field-by-field
/// mapping tables live outside this crate; the core only needs the rendered
/// payload and the schema version tag to send alongside it.
pub trait AuthorityMapper: Send + Sync {
    fn to_authority_xml(&self, job: &JobRecord) -> Result<String, MappingError>;
    fn data_type_version(&self, job_type: JobType) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("payload field '{0}' is missing or malformed")]
    MissingField(&'static str),
    #[error("payload cannot be mapped: {0}")]
    Invalid(String),
}
