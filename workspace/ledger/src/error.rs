use thiserror::Error;

/// Errors raised by ledger operations.
///
/// Every variant is terminal for the current unit of work: the caller rolls
/// the database transaction back and maps the error to a response.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed input such as a half-set link or a non-positive amount
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced transaction, goal, budget or category does not exist
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    /// The acting user does not own the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        LedgerError::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        LedgerError::Forbidden(message.into())
    }
}

/// Type alias for Result with LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;
