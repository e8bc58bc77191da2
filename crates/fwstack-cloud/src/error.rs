//! Construct graph error types

use thiserror::Error;

/// Construct graph errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid construct id '{0}': ids must be non-empty and must not contain '/'")]
    InvalidConstructId(String),

    #[error("Construct already exists: {0}")]
    DuplicateConstruct(String),

    #[error("Logical ID collision: {logical_id} (paths {first} and {second})")]
    LogicalIdCollision {
        logical_id: String,
        first: String,
        second: String,
    },

    #[error("Unresolved reference from {from} to {target}: target must be declared first")]
    UnresolvedReference { from: String, target: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid override path: {0}")]
    InvalidOverridePath(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Assembly error: {0}")]
    AssemblyError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
