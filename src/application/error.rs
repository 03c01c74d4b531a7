use std::error::Error as StdError;

use thiserror::Error;

use crate::{domain::error::DomainError, infra::error::InfraError};

/// Error chain flattened for structured logging.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    /// All messages joined outermost first, as stored in `last_error`.
    pub fn joined(&self) -> String {
        self.messages.join(": ")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code reported by the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::NotFound => 2,
            AppError::Domain(_) | AppError::Validation(_) => 3,
            AppError::Infra(InfraError::Configuration { .. }) => 78,
            AppError::Infra(_) | AppError::Unexpected(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_walks_source_chain() {
        let io = std::io::Error::other("disk full");
        let infra = InfraError::from(io);
        let report = ErrorReport::from_error("test", &infra);
        assert_eq!(report.messages[0], "io error: disk full");
        assert!(report.joined().starts_with("io error: disk full"));
    }

    #[test]
    fn exit_codes_distinguish_configuration() {
        let error = AppError::from(InfraError::configuration("missing url"));
        assert_eq!(error.exit_code(), 78);
        assert_eq!(AppError::NotFound.exit_code(), 2);
    }
}
