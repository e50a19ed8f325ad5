//! Error type shared by every DiagLock crate.

use thiserror::Error;

/// Failures surfaced by configuration, control and bootstrap paths.
///
/// Decision queries never fail; they deny instead.
#[derive(Debug, Error)]
pub enum DiagLockError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("identity record: {0}")]
    Identity(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("component registration failed: {0}")]
    Registration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to render TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("failed to process YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type DiagLockResult<T> = Result<T, DiagLockError>;
