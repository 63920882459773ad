/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use certmon_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "certificate",
///     id: "42".to_string(),
/// };
/// assert!(err.to_string().contains("certificate"));
/// assert!(err.is_not_found());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The unique constraint on `certificates.domain_name` was violated.
    #[error("Storage: domain '{0}' already exists")]
    DuplicateDomain(String),

    /// A `status` column held a value outside the known status codes.
    #[error("Storage: certificate {id} has invalid status '{value}'")]
    InvalidStatus { id: i64, value: String },

    /// An underlying database error.
    #[error("Storage: database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
