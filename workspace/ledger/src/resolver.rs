//! Sign policy for linked aggregates.
//!
//! A goal tracks savings: income linked to it adds progress, expense removes
//! it. A budget tracks consumption: expense linked to it adds to the consumed
//! amount, income gives some back. Reversal is the exact negation of
//! application, so apply followed by reverse always nets to zero.

use model::entities::transaction::{self, LinkRef, LinkedObjectType, TransactionType};
use rust_decimal::Decimal;

/// Whether a transaction's effect is being applied or taken back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Apply,
    Reverse,
}

impl Direction {
    fn sign(self) -> Decimal {
        match self {
            Direction::Apply => Decimal::ONE,
            Direction::Reverse => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Signed amount to add to a linked aggregate.
pub fn delta(
    target: LinkedObjectType,
    kind: TransactionType,
    amount: Decimal,
    direction: Direction,
) -> Decimal {
    let base = match (target, kind) {
        (LinkedObjectType::Goal, TransactionType::Income) => amount,
        (LinkedObjectType::Goal, TransactionType::Expense) => -amount,
        (LinkedObjectType::Budget, TransactionType::Expense) => amount,
        (LinkedObjectType::Budget, TransactionType::Income) => -amount,
    };
    base * direction.sign()
}

/// The link of `tx` and the delta its effect contributes in `direction`.
/// `None` for unlinked transactions.
pub fn effect_of(tx: &transaction::Model, direction: Direction) -> Option<(LinkRef, Decimal)> {
    tx.link().map(|link| {
        (
            link,
            delta(link.kind, tx.transaction_type, tx.amount, direction),
        )
    })
}
