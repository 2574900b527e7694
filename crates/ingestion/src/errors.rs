//! Ingestion error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Document contains no usable text")]
    EmptyDocument,

    #[error("Duplicate evidence ID in document: {id}")]
    DuplicateId { id: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<veridoc_common::errors::AppError> for IngestionError {
    fn from(e: veridoc_common::errors::AppError) -> Self {
        match e {
            veridoc_common::errors::AppError::DuplicateEvidenceId { id } => {
                IngestionError::DuplicateId { id }
            }
            other => IngestionError::PdfParseError {
                path: String::new(),
                message: other.to_string(),
            },
        }
    }
}

impl From<IngestionError> for veridoc_common::errors::AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::DuplicateId { id } => {
                veridoc_common::errors::AppError::DuplicateEvidenceId { id }
            }
            other => veridoc_common::errors::AppError::IngestionFailed {
                message: other.to_string(),
            },
        }
    }
}
