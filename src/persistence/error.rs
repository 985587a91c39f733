/// Store error types

use thiserror::Error;

/// Errors raised by the SQLite-backed stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched the identity of an update
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A row with the same identity already exists
    #[error("{entity} already exists: {id}")]
    Conflict { entity: &'static str, id: String },

    /// A persisted value could not be mapped back to the domain model
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    /// Underlying sqlx failure
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Map an INSERT failure, turning unique violations into `Conflict`
    pub(crate) fn from_insert(error: sqlx::Error, entity: &'static str, id: impl Into<String>) -> Self {
        let is_unique_violation = error
            .as_database_error()
            .map(|db_error| db_error.is_unique_violation())
            .unwrap_or(false);

        if is_unique_violation {
            StoreError::Conflict {
                entity,
                id: id.into(),
            }
        } else {
            StoreError::Database(error)
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_cause_appears_once_in_error_chain() {
        let error = anyhow::Error::from(StoreError::from(sqlx::Error::RowNotFound));
        let rendered = format!("{:#}", error);

        assert!(rendered.starts_with("database error: "));
        assert_eq!(rendered.matches("no rows returned").count(), 1);
    }
}
