use thiserror::Error;

use crate::definition::{DefinitionError, DefinitionId};
use crate::result::StoreError;

#[derive(Error, Debug)]
pub enum RugradeError {
    #[error("project {0} not found")]
    ProjectNotFound(DefinitionId),

    #[error("dependency cycle: {0}")]
    DependsOnCycle(String),

    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("failed to persist result: {0}")]
    Persistence(#[from] StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

/// Result type for rugrade crate
pub type Result<T> = std::result::Result<T, RugradeError>;
