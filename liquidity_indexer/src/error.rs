use sea_orm::{sqlx, DbErr, RuntimeErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiquidityError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("market not found: {0}")]
    MarketNotFound(String),

    #[error("balance record not found for user {user} in market {market}")]
    BalanceNotFound { user: String, market: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected the request; replaying it would fail the same way
    #[error("store error: {0}")]
    Store(String),
}

impl LiquidityError {
    /// Only store outages are worth replaying, every other error is deterministic
    pub fn is_retryable(&self) -> bool {
        matches!(self, LiquidityError::StoreUnavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LiquidityError::MarketNotFound(_) | LiquidityError::BalanceNotFound { .. }
        )
    }
}

impl From<anyhow::Error> for LiquidityError {
    fn from(err: anyhow::Error) -> Self {
        let message = err
            .chain()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");

        let transient = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<DbErr>())
            .is_some_and(is_transient_db_error);

        if transient {
            LiquidityError::StoreUnavailable(message)
        } else {
            LiquidityError::Store(message)
        }
    }
}

/// Connection-class failures, plus the serialization failures and deadlocks
/// Postgres reports for concurrent row locks
fn is_transient_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            match e {
                sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::Protocol(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed => true,
                sqlx::Error::Database(db_err) => {
                    matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
                }
                _ => false,
            }
        }
        _ => false,
    }
}

pub type Result<T> = core::result::Result<T, LiquidityError>;

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use sea_orm::error::ConnAcquireErr;

    use super::*;

    fn from_db_err(err: DbErr) -> LiquidityError {
        Err::<(), _>(err)
            .context("Failed to apply balance delta")
            .unwrap_err()
            .into()
    }

    #[test]
    fn test_connection_failures_are_retryable() {
        let err = from_db_err(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout));
        assert!(matches!(err, LiquidityError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        let err = from_db_err(DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::PoolTimedOut)));
        assert!(err.is_retryable());

        let err = from_db_err(DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Protocol(
            "unexpected message".to_string(),
        ))));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_rejected_statements_are_not_retried() {
        let err = from_db_err(DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::ColumnNotFound(
            "supply_balance".to_string(),
        ))));
        assert!(matches!(err, LiquidityError::Store(ref message) if message.contains("Failed to apply balance delta")));
        assert!(!err.is_retryable());

        let err = from_db_err(DbErr::RecordNotInserted);
        assert!(!err.is_retryable());

        let err: LiquidityError = anyhow::anyhow!("numeric field overflow").into();
        assert!(!err.is_retryable());
    }
}
