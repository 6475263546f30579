use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// A caller broke an operation's preconditions. Nothing was committed.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    EncodingError(#[from] bincode::Error),

    #[error("Config parse error: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl SimError {
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::ContractViolation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
