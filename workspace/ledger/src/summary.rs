//! Read-side views of budgets and goals.
//!
//! Per-category budget amounts are never stored. They are summed from the
//! transactions of the budget's month each time a budget is read.

use std::collections::HashMap;

use common::MonthWindow;
use model::entities::{
    budget, budget_category, category, goal,
    transaction::{self, LinkRef, LinkedObjectType},
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, trace};

use crate::error::Result;
use crate::resolver::{self, Direction};

/// One category row of a budget with the amount consumed so far.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetCategoryAmount {
    pub row: budget_category::Model,
    pub category: Option<category::Model>,
    pub current_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetOverview {
    pub budget: budget::Model,
    pub categories: Vec<BudgetCategoryAmount>,
}

/// Overview restricted to transactions linked to the budget, plus those
/// transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDetails {
    pub overview: BudgetOverview,
    pub transactions: Vec<transaction::Model>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalDetails {
    pub goal: goal::Model,
    pub transactions: Vec<transaction::Model>,
}

/// Sums transactions per category with the budget sign convention.
pub fn category_totals<'a, I>(transactions: I) -> HashMap<i32, Decimal>
where
    I: IntoIterator<Item = &'a transaction::Model>,
{
    let mut totals: HashMap<i32, Decimal> = HashMap::new();
    for tx in transactions {
        let delta = resolver::delta(
            LinkedObjectType::Budget,
            tx.transaction_type,
            tx.amount,
            Direction::Apply,
        );
        *totals.entry(tx.category_id).or_insert(Decimal::ZERO) += delta;
    }
    totals
}

async fn month_transactions<C: ConnectionTrait>(
    conn: &C,
    budget: &budget::Model,
    category_ids: Vec<i32>,
    linked_only: bool,
) -> Result<Vec<transaction::Model>> {
    let window = MonthWindow::containing(budget.month);
    let mut query = transaction::Entity::find()
        .filter(transaction::Column::UserId.eq(budget.user_id))
        .filter(transaction::Column::OccurredAt.gte(window.start_utc()))
        .filter(transaction::Column::OccurredAt.lt(window.end_utc()));

    if linked_only {
        query = query
            .filter(transaction::Column::LinkedObjectType.eq(LinkedObjectType::Budget))
            .filter(transaction::Column::LinkedObjectId.eq(budget.id));
    } else {
        query = query.filter(transaction::Column::CategoryId.is_in(category_ids));
    }

    Ok(query
        .order_by_asc(transaction::Column::OccurredAt)
        .all(conn)
        .await?)
}

async fn build_overview<C: ConnectionTrait>(
    conn: &C,
    budget: budget::Model,
    linked_only: bool,
) -> Result<(BudgetOverview, Vec<transaction::Model>)> {
    let rows = budget_category::Entity::find()
        .filter(budget_category::Column::BudgetId.eq(budget.id))
        .order_by_asc(budget_category::Column::Id)
        .find_also_related(category::Entity)
        .all(conn)
        .await?;

    let category_ids = rows.iter().map(|(row, _)| row.category_id).collect();
    let transactions = month_transactions(conn, &budget, category_ids, linked_only).await?;
    let totals = category_totals(&transactions);
    debug!(
        "Budget {} has {} categories and {} transactions in {}",
        budget.id,
        rows.len(),
        transactions.len(),
        budget.month
    );

    let categories = rows
        .into_iter()
        .map(|(row, category)| BudgetCategoryAmount {
            current_amount: totals.get(&row.category_id).copied().unwrap_or(Decimal::ZERO),
            row,
            category,
        })
        .collect();

    Ok((BudgetOverview { budget, categories }, transactions))
}

/// Budget with every category's spending in the budget month.
pub async fn budget_overview<C: ConnectionTrait>(
    conn: &C,
    budget: budget::Model,
) -> Result<BudgetOverview> {
    trace!("Building overview for budget {}", budget.id);
    let (overview, _) = build_overview(conn, budget, false).await?;
    Ok(overview)
}

/// Budget with category amounts counted only from transactions linked to it.
pub async fn budget_details<C: ConnectionTrait>(
    conn: &C,
    budget: budget::Model,
) -> Result<BudgetDetails> {
    trace!("Building details for budget {}", budget.id);
    let (overview, transactions) = build_overview(conn, budget, true).await?;
    Ok(BudgetDetails {
        overview,
        transactions,
    })
}

/// Transactions linked to `link`, oldest first.
pub async fn linked_transactions<C: ConnectionTrait>(
    conn: &C,
    link: LinkRef,
) -> Result<Vec<transaction::Model>> {
    Ok(transaction::Entity::find()
        .filter(transaction::Column::LinkedObjectType.eq(link.kind))
        .filter(transaction::Column::LinkedObjectId.eq(link.id))
        .order_by_asc(transaction::Column::OccurredAt)
        .all(conn)
        .await?)
}

pub async fn goal_details<C: ConnectionTrait>(conn: &C, goal: goal::Model) -> Result<GoalDetails> {
    let transactions = linked_transactions(conn, LinkRef::goal(goal.id)).await?;
    Ok(GoalDetails { goal, transactions })
}
