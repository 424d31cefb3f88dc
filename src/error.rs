use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid loan terms: {field} - {reason}")]
    InvalidLoanTerms { field: String, reason: String },

    #[error("Invalid assumption: {field} - {reason}")]
    InvalidAssumption { field: String, reason: String },

    #[error("Unsupported file type '{extension}' for {file}")]
    UnsupportedSource { file: String, extension: String },

    #[error("Ingestion error in {file}: {details}")]
    Ingestion { file: String, details: String },

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
