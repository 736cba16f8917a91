//! Engine Error Taxonomy
//!
//! Every caller-facing operation maps its failure to one of these variants.
//! Codes are stable strings; internal detail never leaks past `Internal`.

use thiserror::Error;

/// Fatal precondition failures: the caller must change state before retrying.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionKind {
    #[error("user has not completed KYC verification")]
    NotVerified,
    #[error("user is self-excluded")]
    SelfExcluded,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("responsible-gaming limit exceeded")]
    LimitExceeded,
    #[error("operation not permitted in current state")]
    WrongState,
}

impl PreconditionKind {
    pub fn code(&self) -> &'static str {
        match self {
            PreconditionKind::NotVerified => "NOT_VERIFIED",
            PreconditionKind::SelfExcluded => "SELF_EXCLUDED",
            PreconditionKind::InsufficientFunds => "INSUFFICIENT_FUNDS",
            PreconditionKind::LimitExceeded => "LIMIT_EXCEEDED",
            PreconditionKind::WrongState => "WRONG_STATE",
        }
    }
}

/// Unified error type for the wager engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input. Fatal, no retry.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A precondition check failed inside the mutating transaction.
    #[error("{0}")]
    Precondition(PreconditionKind),

    /// Optimistic-concurrency loss after the retry budget was spent.
    #[error("conflicting concurrent update, retries exhausted")]
    Conflict,

    /// Escrow or oracle adapter failure after bounded retries.
    #[error("adapter failure: {0}")]
    Adapter(String),

    /// Unexpected failure. Logged in full, surfaced opaquely.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable error code for the API envelope.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Precondition(kind) => kind.code(),
            EngineError::Conflict => "CONFLICT",
            EngineError::Adapter(_) => "ADAPTER_FAILURE",
            EngineError::Internal(_) => "INTERNAL",
        }
    }

    pub fn precondition(kind: PreconditionKind) -> Self {
        EngineError::Precondition(kind)
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Internal(anyhow::Error::new(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
