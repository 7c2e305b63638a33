//! Error types for the personal assistant orchestrator

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Remote Model Faults
    // =============================

    #[error("Model transport error: {0}")]
    Transport(String),

    #[error("Model quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Model rejected credentials: {0}")]
    AuthRejected(String),

    #[error("Model API key not configured")]
    MissingApiKey,

    #[error("Empty model response: {0}")]
    EmptyResponse(String),

    // =============================
    // Tool Faults
    // =============================

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    // =============================
    // Storage Faults
    // =============================

    #[error("Record store not initialized")]
    StorageUnavailable,

    #[error("Storage error: {0}")]
    StorageError(String),

    // =============================
    // Cancellation
    // =============================

    #[error("Request cancelled by caller")]
    Cancelled,

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
