//! Keeps goal and budget running totals consistent with the transactions
//! linked to them.

pub mod error;
pub mod linked;
pub mod resolver;
pub mod service;
pub mod summary;

#[cfg(test)]
mod testing;

pub use error::{LedgerError, Result};
pub use linked::{LinkedEntity, link_from_parts};
pub use resolver::{Direction, delta};
pub use service::{
    TransactionDraft, TransactionPatch, create_transaction, delete_transaction,
    find_owned_transaction, update_transaction,
};

use sea_orm::{DatabaseTransaction, DbErr};
use tracing::{debug, warn};

/// Finishes a unit of work: commits when `result` is `Ok`, rolls back otherwise.
///
/// A failed commit is reported as the operation's error.
pub async fn settle<T, E>(
    txn: DatabaseTransaction,
    result: std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    E: From<DbErr> + std::fmt::Display,
{
    match result {
        Ok(value) => {
            txn.commit().await?;
            debug!("Unit of work committed");
            Ok(value)
        }
        Err(err) => {
            warn!("Rolling back unit of work: {}", err);
            txn.rollback().await?;
            Err(err)
        }
    }
}
