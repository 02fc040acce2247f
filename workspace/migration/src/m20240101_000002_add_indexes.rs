use sea_orm_migration::prelude::*;

use crate::m20240101_000001_create_table::{BudgetCategories, Transactions};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // A category appears at most once per budget
        manager
            .create_index(
                Index::create()
                    .name("idx_budget_categories_budget_category")
                    .table(BudgetCategories::Table)
                    .col(BudgetCategories::BudgetId)
                    .col(BudgetCategories::CategoryId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Lookups of the transactions linked to a goal or budget
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_link")
                    .table(Transactions::Table)
                    .col(Transactions::LinkedObjectType)
                    .col(Transactions::LinkedObjectId)
                    .to_owned(),
            )
            .await?;

        // Monthly per-category sums
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_category_date")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::CategoryId)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_transactions_user_category_date")
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_transactions_link")
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_budget_categories_budget_category")
                    .table(BudgetCategories::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
