//! Database error wrapper shared by all repositories.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database query failed: {message}")]
    Query { message: String, retryable: bool },

    #[error("database connection failed: {message}")]
    Connection { message: String },

    #[error("row not found: {entity}")]
    NotFound { entity: String },

    #[error("constraint violated: {message}")]
    Constraint { message: String },
}

impl DatabaseError {
    /// Classify a sqlx error into the buckets callers care about.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "row".to_string(),
            },
            sqlx::Error::Database(db) if db.constraint().is_some() => DatabaseError::Constraint {
                message: db.to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => DatabaseError::Connection {
                message: err.to_string(),
            },
            _ => DatabaseError::Query {
                message: err.to_string(),
                retryable: false,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DatabaseError::Connection { .. } => true,
            DatabaseError::Query { retryable, .. } => *retryable,
            DatabaseError::NotFound { .. } | DatabaseError::Constraint { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn connection_errors_are_retryable() {
        let err = DatabaseError::Connection {
            message: "pool timed out".to_string(),
        };
        assert!(err.is_retryable());
    }
}
