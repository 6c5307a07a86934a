use thiserror::Error;

/// Main error type for Schemagraph
#[derive(Error, Debug)]
pub enum SchemaGraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using SchemaGraphError
pub type Result<T> = std::result::Result<T, SchemaGraphError>;
