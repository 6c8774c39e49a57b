use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The path resolves outside the library root.
    #[error("Path escapes the library root: {0}")]
    PathViolation(String),

    #[error("Invalid path provided: {0}")]
    InvalidPath(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Document has no front matter block: {0}")]
    MissingFrontMatter(String),

    #[error("Document has no title heading: {0}")]
    MissingTitle(String),

    #[error("Field '{field}' has unknown type '{type_name}'")]
    UnknownFieldType { field: String, type_name: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// The key cannot be written to a front matter block and read back.
    #[error("Invalid front matter key: '{0}'")]
    InvalidKey(String),

    /// Reserved file and directory names cannot be used as records.
    #[error("Path uses a reserved name: {0}")]
    ReservedName(String),

    /// The destination of a write or move already exists.
    #[error("Destination already exists: {0}")]
    Conflict(String),

    #[error("Record is not inside an archive collection: {0}")]
    NotArchived(String),

    #[error("Library configuration file is invalid: {0}")]
    InvalidConfig(PathBuf),

    #[error("JSON serialization/deserialization error")]
    Json(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
