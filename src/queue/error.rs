//! Error types for queue operations.
//!
//! Only store failures are errors. Expected outcomes such as a duplicate
//! chapter or a failure recorded for a chapter that was already removed
//! are reported through return values, not through [`QueueError`].

use std::fmt;

use thiserror::Error;

/// Structured classification for queue store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure other than the handled chapter uniqueness.
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Filesystem or transport IO failure.
    Io,
    /// Row could not be decoded into an entry.
    Decode,
    /// Unclassified database failure.
    Other,
}

impl QueueDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Decode,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }

    /// Whether retrying the same operation later could succeed.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::BusyOrLocked | Self::PoolTimeout)
    }
}

impl fmt::Display for QueueDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::Io => "io",
            Self::Decode => "decode",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> QueueDbErrorKind {
    let code = database_error.code();
    // SQLITE_BUSY = 5, SQLITE_LOCKED = 6
    if matches!(code.as_deref(), Some("5" | "6" | "SQLITE_BUSY" | "SQLITE_LOCKED")) {
        return QueueDbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation() || database_error.is_check_violation() {
        return QueueDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked") || message.contains("database is busy") {
        return QueueDbErrorKind::BusyOrLocked;
    }

    QueueDbErrorKind::Other
}

/// Errors that can occur during queue operations.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// Store operation failed.
    #[error("queue store error ({kind}): {message}")]
    Database {
        /// Typed classification used by callers deciding whether to retry.
        kind: QueueDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// No entry with this id.
    #[error(
        "queue entry not found: id {0}\n  Suggestion: The entry may have been removed or cleared"
    )]
    ItemNotFound(i64),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: QueueDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl QueueError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<QueueDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::ItemNotFound(_) => None,
        }
    }

    /// Whether retrying the failed operation later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.database_kind().is_some_and(QueueDbErrorKind::is_transient)
    }

    /// Returns true when this error is a database busy/locked condition.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        self.database_kind() == Some(QueueDbErrorKind::BusyOrLocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_database_message() {
        let err = QueueError::Database {
            kind: QueueDbErrorKind::Other,
            message: "connection failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("queue store error"));
        assert!(msg.contains("other"));
        assert!(msg.contains("connection failed"));
    }

    #[test]
    fn test_queue_error_busy_flag() {
        let err = QueueError::Database {
            kind: QueueDbErrorKind::BusyOrLocked,
            message: "database is locked".to_string(),
        };
        assert!(err.is_busy_or_locked());
        assert!(QueueDbErrorKind::BusyOrLocked.is_transient());
        assert!(!QueueDbErrorKind::PoolClosed.is_transient());
    }

    #[test]
    fn test_queue_error_item_not_found_message() {
        let err = QueueError::ItemNotFound(42);
        let msg = err.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("42"));
        assert!(msg.contains("Suggestion"));
        assert_eq!(err.database_kind(), None);
    }

    #[test]
    fn test_queue_error_from_pool_closed() {
        let err = QueueError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.database_kind(), Some(QueueDbErrorKind::PoolClosed));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_queue_error_transient_classification() {
        assert!(QueueError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!QueueError::ItemNotFound(1).is_transient());
    }
}
