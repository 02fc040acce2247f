//! Loading and adjusting the goal or budget a transaction is linked to.

use model::entities::{
    budget, goal,
    transaction::{self, LinkRef, LinkedObjectType},
};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, UpdateStatement};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryTrait};
use tracing::{debug, trace, warn};

use crate::error::{LedgerError, Result};

/// A loaded link target.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkedEntity {
    Goal(goal::Model),
    Budget(budget::Model),
}

impl LinkedEntity {
    pub fn owner_id(&self) -> i32 {
        match self {
            LinkedEntity::Goal(goal) => goal.user_id,
            LinkedEntity::Budget(budget) => budget.user_id,
        }
    }

    pub fn current_amount(&self) -> Decimal {
        match self {
            LinkedEntity::Goal(goal) => goal.current_amount,
            LinkedEntity::Budget(budget) => budget.current_amount,
        }
    }

    pub fn link(&self) -> LinkRef {
        match self {
            LinkedEntity::Goal(goal) => LinkRef::goal(goal.id),
            LinkedEntity::Budget(budget) => LinkRef::budget(budget.id),
        }
    }
}

fn entity_name(kind: LinkedObjectType) -> &'static str {
    match kind {
        LinkedObjectType::Goal => "Goal",
        LinkedObjectType::Budget => "Budget",
    }
}

/// Builds a link from the two optional halves a client sends.
///
/// Both halves must be present or both absent.
pub fn link_from_parts(
    id: Option<i32>,
    kind: Option<LinkedObjectType>,
) -> Result<Option<LinkRef>> {
    match (id, kind) {
        (Some(id), Some(kind)) => Ok(Some(LinkRef { kind, id })),
        (None, None) => Ok(None),
        _ => Err(LedgerError::validation(
            "Both linked_object_id and linked_object_type must be set together.",
        )),
    }
}

/// Fetches the goal or budget behind `link`.
pub async fn load<C: ConnectionTrait>(conn: &C, link: LinkRef) -> Result<LinkedEntity> {
    trace!("Loading linked {:?} {}", link.kind, link.id);
    let entity = match link.kind {
        LinkedObjectType::Goal => goal::Entity::find_by_id(link.id)
            .one(conn)
            .await?
            .map(LinkedEntity::Goal),
        LinkedObjectType::Budget => budget::Entity::find_by_id(link.id)
            .one(conn)
            .await?
            .map(LinkedEntity::Budget),
    };

    entity.ok_or_else(|| LedgerError::not_found(entity_name(link.kind), link.id))
}

/// Like [`load`], but also requires `user_id` to own the target.
pub async fn load_owned<C: ConnectionTrait>(
    conn: &C,
    link: LinkRef,
    user_id: i32,
) -> Result<LinkedEntity> {
    let entity = load(conn, link).await?;
    if entity.owner_id() != user_id {
        warn!(
            "User {} tried to use {:?} {} owned by user {}",
            user_id,
            link.kind,
            link.id,
            entity.owner_id()
        );
        return Err(LedgerError::forbidden(format!(
            "{} {} belongs to another user",
            entity_name(link.kind),
            link.id
        )));
    }
    Ok(entity)
}

/// The `UPDATE ... SET current_amount = current_amount + delta` statement
/// behind [`adjust`]. The increment happens in storage, so concurrent
/// adjustments of the same row cannot overwrite each other.
pub fn adjustment(link: LinkRef, delta: Decimal) -> UpdateStatement {
    match link.kind {
        LinkedObjectType::Goal => goal::Entity::update_many()
            .col_expr(
                goal::Column::CurrentAmount,
                Expr::col(goal::Column::CurrentAmount).add(delta),
            )
            .filter(goal::Column::Id.eq(link.id))
            .into_query(),
        LinkedObjectType::Budget => budget::Entity::update_many()
            .col_expr(
                budget::Column::CurrentAmount,
                Expr::col(budget::Column::CurrentAmount).add(delta),
            )
            .filter(budget::Column::Id.eq(link.id))
            .into_query(),
    }
}

/// Adds `delta` to the target's `current_amount`.
pub async fn adjust<C: ConnectionTrait>(conn: &C, link: LinkRef, delta: Decimal) -> Result<()> {
    debug!("Adjusting {:?} {} by {}", link.kind, link.id, delta);
    let statement = conn.get_database_backend().build(&adjustment(link, delta));
    let result = conn.execute(statement).await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(entity_name(link.kind), link.id));
    }
    Ok(())
}

/// Clears the link of every transaction pointing at `link`.
/// Returns how many transactions were detached.
pub async fn detach_transactions<C: ConnectionTrait>(conn: &C, link: LinkRef) -> Result<u64> {
    let result = transaction::Entity::update_many()
        .col_expr(
            transaction::Column::LinkedObjectId,
            Expr::value(Option::<i32>::None),
        )
        .col_expr(
            transaction::Column::LinkedObjectType,
            Expr::value(Option::<String>::None),
        )
        .filter(transaction::Column::LinkedObjectType.eq(link.kind))
        .filter(transaction::Column::LinkedObjectId.eq(link.id))
        .exec(conn)
        .await?;

    debug!(
        "Detached {} transactions from {:?} {}",
        result.rows_affected, link.kind, link.id
    );
    Ok(result.rows_affected)
}

/// Deletes a goal or budget owned by `user_id`.
///
/// Transactions linked to it stay in place but lose their link, so no
/// transaction keeps pointing at a row that no longer exists.
pub async fn delete_owned<C: ConnectionTrait>(
    conn: &C,
    link: LinkRef,
    user_id: i32,
) -> Result<LinkedEntity> {
    let entity = load_owned(conn, link, user_id).await?;
    detach_transactions(conn, link).await?;

    let result = match link.kind {
        LinkedObjectType::Goal => goal::Entity::delete_by_id(link.id).exec(conn).await?,
        LinkedObjectType::Budget => budget::Entity::delete_by_id(link.id).exec(conn).await?,
    };
    if result.rows_affected == 0 {
        return Err(LedgerError::not_found(entity_name(link.kind), link.id));
    }
    Ok(entity)
}

/// Fetches a goal owned by `user_id`.
pub async fn find_owned_goal<C: ConnectionTrait>(
    conn: &C,
    goal_id: i32,
    user_id: i32,
) -> Result<goal::Model> {
    match load_owned(conn, LinkRef::goal(goal_id), user_id).await? {
        LinkedEntity::Goal(goal) => Ok(goal),
        LinkedEntity::Budget(_) => Err(LedgerError::not_found("Goal", goal_id)),
    }
}

/// Fetches a budget owned by `user_id`.
pub async fn find_owned_budget<C: ConnectionTrait>(
    conn: &C,
    budget_id: i32,
    user_id: i32,
) -> Result<budget::Model> {
    match load_owned(conn, LinkRef::budget(budget_id), user_id).await? {
        LinkedEntity::Budget(budget) => Ok(budget),
        LinkedEntity::Goal(_) => Err(LedgerError::not_found("Budget", budget_id)),
    }
}

/// Deletes a goal owned by `user_id`, unlinking its transactions.
pub async fn delete_owned_goal<C: ConnectionTrait>(
    conn: &C,
    goal_id: i32,
    user_id: i32,
) -> Result<goal::Model> {
    match delete_owned(conn, LinkRef::goal(goal_id), user_id).await? {
        LinkedEntity::Goal(goal) => Ok(goal),
        LinkedEntity::Budget(_) => Err(LedgerError::not_found("Goal", goal_id)),
    }
}

/// Deletes a budget owned by `user_id`, unlinking its transactions.
/// Its category limits go with it.
pub async fn delete_owned_budget<C: ConnectionTrait>(
    conn: &C,
    budget_id: i32,
    user_id: i32,
) -> Result<budget::Model> {
    match delete_owned(conn, LinkRef::budget(budget_id), user_id).await? {
        LinkedEntity::Budget(budget) => Ok(budget),
        LinkedEntity::Goal(_) => Err(LedgerError::not_found("Budget", budget_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_budget, create_goal, create_user, setup_db};

    #[test]
    fn test_link_from_parts() {
        assert_eq!(link_from_parts(None, None).unwrap(), None);
        assert_eq!(
            link_from_parts(Some(3), Some(LinkedObjectType::Goal)).unwrap(),
            Some(LinkRef::goal(3))
        );
        assert!(matches!(
            link_from_parts(Some(3), None),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            link_from_parts(None, Some(LinkedObjectType::Budget)),
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_load_dispatches_on_kind() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let goal = create_goal(&db, user.id, "Bike").await;
        let budget = create_budget(&db, user.id, 2025, 3).await;

        let loaded = load(&db, LinkRef::goal(goal.id)).await.unwrap();
        assert!(matches!(loaded, LinkedEntity::Goal(ref g) if g.id == goal.id));

        let loaded = load(&db, LinkRef::budget(budget.id)).await.unwrap();
        assert!(matches!(loaded, LinkedEntity::Budget(ref b) if b.id == budget.id));
    }

    #[tokio::test]
    async fn test_load_missing_target() {
        let db = setup_db().await;
        let result = load(&db, LinkRef::goal(404)).await;
        assert!(matches!(
            result,
            Err(LedgerError::NotFound { entity: "Goal", id: 404 })
        ));
    }

    #[tokio::test]
    async fn test_load_owned_rejects_other_user() {
        let db = setup_db().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let goal = create_goal(&db, alice.id, "Bike").await;

        let result = load_owned(&db, LinkRef::goal(goal.id), bob.id).await;
        assert!(matches!(result, Err(LedgerError::Forbidden(_))));
    }

    #[test]
    fn test_adjustment_increments_in_storage() {
        use sea_orm::DbBackend;

        let delta = Decimal::new(25, 0);
        let goal_sql = DbBackend::Postgres.build(&adjustment(LinkRef::goal(7), delta)).sql;
        assert_eq!(
            goal_sql,
            r#"UPDATE "goals" SET "current_amount" = "current_amount" + $1 WHERE "goals"."id" = $2"#
        );

        let budget_sql = DbBackend::Sqlite.build(&adjustment(LinkRef::budget(7), delta)).sql;
        assert_eq!(
            budget_sql,
            r#"UPDATE "budgets" SET "current_amount" = "current_amount" + ? WHERE "budgets"."id" = ?"#
        );
    }

    #[tokio::test]
    async fn test_adjust_is_incremental() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let budget = create_budget(&db, user.id, 2025, 3).await;
        let link = LinkRef::budget(budget.id);

        adjust(&db, link, Decimal::new(40, 0)).await.unwrap();
        adjust(&db, link, Decimal::new(-15, 0)).await.unwrap();

        let reloaded = load(&db, link).await.unwrap();
        assert_eq!(reloaded.current_amount(), Decimal::new(25, 0));
    }

    #[tokio::test]
    async fn test_adjust_missing_target() {
        let db = setup_db().await;
        let result = adjust(&db, LinkRef::budget(77), Decimal::ONE).await;
        assert!(matches!(
            result,
            Err(LedgerError::NotFound { entity: "Budget", id: 77 })
        ));
    }

    #[tokio::test]
    async fn test_delete_owned_budget_checks_owner() {
        let db = setup_db().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let budget = create_budget(&db, alice.id, 2025, 3).await;

        let result = delete_owned_budget(&db, budget.id, bob.id).await;
        assert!(matches!(result, Err(LedgerError::Forbidden(_))));

        let removed = delete_owned_budget(&db, budget.id, alice.id).await.unwrap();
        assert_eq!(removed.id, budget.id);
        assert!(matches!(
            load(&db, LinkRef::budget(budget.id)).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_owned_goal_missing() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let result = find_owned_goal(&db, 12, user.id).await;
        assert!(matches!(
            result,
            Err(LedgerError::NotFound { entity: "Goal", id: 12 })
        ));
    }
}
