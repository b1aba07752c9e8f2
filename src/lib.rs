use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiagError>;

#[derive(Error, Debug)]
pub enum DiagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Backend unavailable: {0}")]
    Backend(String),

    #[error("Vector index error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod request;
pub mod segmenter;
