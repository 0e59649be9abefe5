use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index '{index}' failed: {message}")]
    IndexOperation { index: String, message: String },

    #[error("External call to {service} failed: {message}")]
    ExternalCall { service: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse classification callers use to decide whether to fix, retry or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fix the configuration before trying again.
    Configuration,
    /// The input itself is wrong; retrying with the same data fails again.
    Data,
    /// A collaborator or index failed; the same call may succeed later.
    Transient,
}

impl Error {
    pub fn index(index: impl Into<String>, message: impl ToString) -> Self {
        Self::IndexOperation { index: index.into(), message: message.to_string() }
    }

    pub fn external(service: impl Into<String>, message: impl ToString) -> Self {
        Self::ExternalCall { service: service.into(), message: message.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::DimensionMismatch { .. } | Self::InvalidInput(_) => ErrorKind::Data,
            Self::IndexOperation { .. } | Self::ExternalCall { .. } => ErrorKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
