use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Duplicate external id: {0}")]
    DuplicateExternalId(String),

    #[error("Invalid preferences: {0}")]
    Configuration(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
