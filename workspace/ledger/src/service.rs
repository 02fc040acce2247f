//! Transaction mutations that keep linked aggregates consistent.
//!
//! Every function here takes the connection it should run on. Callers pass a
//! [`sea_orm::DatabaseTransaction`] spanning exactly one operation and finish
//! it with [`crate::settle`], so the transaction row and every aggregate it
//! touches are committed together or not at all.

use chrono::{DateTime, Utc};
use model::entities::{
    category,
    transaction::{self, LinkRef, TransactionType},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use tracing::{debug, info, trace, warn};

use crate::error::{LedgerError, Result};
use crate::linked;
use crate::resolver::{self, Direction};

/// Input for creating a transaction.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub category_id: i32,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    /// Defaults to now
    pub occurred_at: Option<DateTime<Utc>>,
    pub link: Option<LinkRef>,
}

/// Fields a client may change on an existing transaction.
///
/// `None` leaves a field untouched. For the nullable fields the inner option
/// is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub category_id: Option<i32>,
    pub amount: Option<Decimal>,
    pub transaction_type: Option<TransactionType>,
    pub description: Option<Option<String>>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub link: Option<Option<LinkRef>>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.amount.is_none()
            && self.transaction_type.is_none()
            && self.description.is_none()
            && self.occurred_at.is_none()
            && self.link.is_none()
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "Amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

async fn ensure_category<C: ConnectionTrait>(conn: &C, category_id: i32) -> Result<()> {
    category::Entity::find_by_id(category_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| LedgerError::not_found("Category", category_id))
}

/// Fetches a transaction and checks that `user_id` owns it.
pub async fn find_owned_transaction<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    transaction_id: i32,
) -> Result<transaction::Model> {
    let tx = transaction::Entity::find_by_id(transaction_id)
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("Transaction", transaction_id))?;

    if tx.user_id != user_id {
        warn!(
            "User {} is not the owner of transaction {} (owner {})",
            user_id, transaction_id, tx.user_id
        );
        return Err(LedgerError::forbidden(format!(
            "Transaction {} belongs to another user",
            transaction_id
        )));
    }
    Ok(tx)
}

async fn apply_effect<C: ConnectionTrait>(
    conn: &C,
    tx: &transaction::Model,
    user_id: i32,
) -> Result<()> {
    if let Some((link, delta)) = resolver::effect_of(tx, Direction::Apply) {
        linked::load_owned(conn, link, user_id).await?;
        linked::adjust(conn, link, delta).await?;
    }
    Ok(())
}

/// Reverses the effect of `tx`. A target that no longer exists has nothing
/// left to correct, so it is skipped.
async fn reverse_effect<C: ConnectionTrait>(conn: &C, tx: &transaction::Model) -> Result<()> {
    if let Some((link, delta)) = resolver::effect_of(tx, Direction::Reverse) {
        match linked::adjust(conn, link, delta).await {
            Err(LedgerError::NotFound { entity, id }) => {
                warn!(
                    "{} {} linked to transaction {} no longer exists, skipping reversal",
                    entity, id, tx.id
                );
            }
            other => other?,
        }
    }
    Ok(())
}

/// Records a new transaction for `user_id` and applies its effect to the
/// linked goal or budget.
pub async fn create_transaction<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    draft: TransactionDraft,
) -> Result<transaction::Model> {
    trace!("Creating transaction for user {}: {:?}", user_id, draft);
    validate_amount(draft.amount)?;
    ensure_category(conn, draft.category_id).await?;

    if let Some(link) = draft.link {
        linked::load_owned(conn, link, user_id).await?;
    }

    let mut active = transaction::ActiveModel {
        user_id: Set(user_id),
        category_id: Set(draft.category_id),
        amount: Set(draft.amount),
        transaction_type: Set(draft.transaction_type),
        description: Set(draft.description),
        occurred_at: Set(draft.occurred_at.unwrap_or_else(Utc::now)),
        ..Default::default()
    };
    active.set_link(draft.link);

    let tx = active.insert(conn).await?;
    apply_effect(conn, &tx, user_id).await?;

    info!(
        "Created transaction {} ({:?} {}) linked to {:?}",
        tx.id,
        tx.transaction_type,
        tx.amount,
        tx.link()
    );
    Ok(tx)
}

/// Applies `patch` to a transaction owned by `user_id`.
///
/// The old effect is reversed on the old target and the new effect applied
/// on the new target, which may be the same row, a different row, or a row
/// of a different kind.
pub async fn update_transaction<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    transaction_id: i32,
    patch: TransactionPatch,
) -> Result<transaction::Model> {
    trace!("Updating transaction {} with {:?}", transaction_id, patch);
    let old = find_owned_transaction(conn, user_id, transaction_id).await?;

    if patch.is_empty() {
        debug!("Nothing to update for transaction {}", transaction_id);
        return Ok(old);
    }

    let mut active: transaction::ActiveModel = old.clone().into();
    if let Some(category_id) = patch.category_id {
        ensure_category(conn, category_id).await?;
        active.category_id = Set(category_id);
    }
    if let Some(amount) = patch.amount {
        validate_amount(amount)?;
        active.amount = Set(amount);
    }
    if let Some(kind) = patch.transaction_type {
        active.transaction_type = Set(kind);
    }
    if let Some(description) = patch.description {
        active.description = Set(description);
    }
    if let Some(occurred_at) = patch.occurred_at {
        active.occurred_at = Set(occurred_at);
    }
    if let Some(link) = patch.link {
        active.set_link(link);
    }

    let updated = if active.is_changed() {
        active.update(conn).await?
    } else {
        old.clone()
    };

    reverse_effect(conn, &old).await?;
    apply_effect(conn, &updated, user_id).await?;

    info!(
        "Updated transaction {}: {} {:?} {:?} -> {} {:?} {:?}",
        updated.id,
        old.amount,
        old.transaction_type,
        old.link(),
        updated.amount,
        updated.transaction_type,
        updated.link()
    );
    Ok(updated)
}

/// Deletes a transaction owned by `user_id` and reverses its effect.
pub async fn delete_transaction<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    transaction_id: i32,
) -> Result<transaction::Model> {
    trace!("Deleting transaction {}", transaction_id);
    let tx = find_owned_transaction(conn, user_id, transaction_id).await?;

    transaction::Entity::delete_by_id(tx.id).exec(conn).await?;
    reverse_effect(conn, &tx).await?;

    info!("Deleted transaction {} linked to {:?}", tx.id, tx.link());
    Ok(tx)
}
