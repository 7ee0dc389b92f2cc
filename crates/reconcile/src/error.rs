//! Error types for reconciliation.
//!
//! Only connection, concurrency, and whole-ledger failures abort a pass.
//! Everything else degrades: a failed broker query shrinks the snapshot,
//! a failed write leaves one discrepancy unresolved for the next pass.

use thiserror::Error;

/// Errors that can occur while running a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The broker connection is not available; the pass cannot start.
    #[error("broker connection unavailable: {0}")]
    Connection(String),

    /// Another pass is already running against the same window.
    #[error("a reconciliation pass is already in progress")]
    PassInProgress,

    /// The local ledger could not be read.
    #[error("trade store error: {0}")]
    Store(String),

    /// A single broker query failed or timed out.
    #[error("broker source unavailable: {query}: {reason}")]
    SourceUnavailable {
        /// Which query degraded (e.g. "completed_orders").
        query: String,
        /// Underlying failure.
        reason: String,
    },

    /// Writing one correction to the ledger failed.
    #[error("persistence failure for order {order_id}: {reason}")]
    Persistence {
        /// Ledger id of the record that could not be updated.
        order_id: i64,
        /// Underlying failure.
        reason: String,
    },
}

impl ReconcileError {
    /// Creates a connection error.
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection(reason.into())
    }

    /// Creates a source-unavailable error.
    pub fn source_unavailable(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            query: source.into(),
            reason: reason.into(),
        }
    }

    /// Creates a persistence error for one record.
    pub fn persistence(order_id: i64, reason: impl Into<String>) -> Self {
        Self::Persistence {
            order_id,
            reason: reason.into(),
        }
    }

    /// True when the error aborts the whole pass rather than degrading it.
    #[must_use]
    pub fn is_pass_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::PassInProgress | Self::Store(_)
        )
    }

    /// True when rerunning the pass is expected to succeed without
    /// operator action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::PassInProgress)
    }
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(ReconcileError::connection("refused").is_pass_fatal());
        assert!(ReconcileError::PassInProgress.is_pass_fatal());
        assert!(ReconcileError::Store("pool closed".to_string()).is_pass_fatal());
        assert!(!ReconcileError::source_unavailable("fills", "timeout").is_pass_fatal());
        assert!(!ReconcileError::persistence(42, "lock wait").is_pass_fatal());
    }

    #[test]
    fn display_includes_identifiers() {
        let err = ReconcileError::persistence(42, "deadlock");
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("deadlock"));

        let err = ReconcileError::source_unavailable("completed_orders", "timed out");
        assert!(err.to_string().contains("completed_orders"));
    }
}
