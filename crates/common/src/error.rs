use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewardenError {
    #[error("policy source error: {0}")]
    Source(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type GatewardenResult<T> = Result<T, GatewardenError>;
