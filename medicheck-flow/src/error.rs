use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while driving a symptom-analysis run
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{contract} output violated its contract: {reason}")]
    SchemaViolation { contract: String, reason: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Illegal transition: {0}")]
    StateMachine(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Serialisable classification of a [`FlowError`], recorded on failed checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    SchemaViolation,
    Provider,
    RateLimited,
    Timeout,
    StateMachine,
    SessionNotFound,
    Storage,
}

impl FlowError {
    pub fn schema(contract: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            contract: contract.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Self::Provider(_) => ErrorKind::Provider,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::StateMachine(_) => ErrorKind::StateMachine,
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Failures of an LLM call that a step is allowed to retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation { .. } | Self::Provider(_) | Self::RateLimited(_) | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
