//! # Feature: Failure Isolation
//!
//! Error taxonomy for the monitoring layer and the safe-execution boundary that
//! keeps storage and sampling failures away from the command that triggered them.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use log::error;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong inside the monitoring layer
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Store unreachable or a write failed
    #[error("storage error: {0}")]
    Storage(String),

    /// A process or host resource query failed
    #[error("sampling error: {0}")]
    Sampling(String),

    /// A bounded operation exceeded its limit
    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },

    /// Invalid threshold or capacity at construction time
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    pub fn storage(cause: impl fmt::Display) -> Self {
        MonitorError::Storage(cause.to_string())
    }

    pub fn sampling(cause: impl fmt::Display) -> Self {
        MonitorError::Sampling(cause.to_string())
    }

    pub fn config(cause: impl fmt::Display) -> Self {
        MonitorError::Config(cause.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, MonitorError::Timeout { .. })
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Storage(format!("{err:#}"))
    }
}

/// Result of an operation run behind the safe-execution boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The operation ran to completion
    Completed(T),
    /// The operation failed; this is the documented default
    Fallback(T),
}

impl<T> Outcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Completed(value) | Outcome::Fallback(value) => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Completed(value) | Outcome::Fallback(value) => value,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Fallback(value) => Outcome::Fallback(f(value)),
        }
    }
}

/// Bound `future` by `limit` and turn an elapsed deadline into a `Timeout` error
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, future: F) -> Result<T, MonitorError>
where
    F: Future<Output = Result<T, MonitorError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(MonitorError::Timeout {
            operation: operation.to_string(),
            limit,
        }),
    }
}

/// Run `future` behind the safe-execution boundary.
///
/// Failures (including timeouts) are logged with the operation name and the
/// caller-supplied context, then replaced by `default`.
pub async fn safe_execute<T, F>(
    operation: &str,
    context: &str,
    limit: Duration,
    default: T,
    future: F,
) -> Outcome<T>
where
    F: Future<Output = Result<T, MonitorError>>,
{
    match with_timeout(operation, limit, future).await {
        Ok(value) => Outcome::Completed(value),
        Err(e) => {
            error!("Error in {operation} ({context}): {e}");
            Outcome::Fallback(default)
        }
    }
}
