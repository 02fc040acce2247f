use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use ledger::linked;
use model::entities::{budget, budget_category};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

/// A category limit inside a budget
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct BudgetCategoryResponse {
    pub id: i32,
    pub budget_id: i32,
    pub category_id: i32,
    pub limit_amount: Decimal,
}

impl From<budget_category::Model> for BudgetCategoryResponse {
    fn from(model: budget_category::Model) -> Self {
        Self {
            id: model.id,
            budget_id: model.budget_id,
            category_id: model.category_id,
            limit_amount: model.limit_amount,
        }
    }
}

/// Loads a budget category row whose budget belongs to `user_id`.
async fn find_owned_row<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    user_id: i32,
) -> Result<budget_category::Model, ApiError> {
    let row = budget_category::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "BudgetCategory",
            id,
        })?;

    linked::find_owned_budget(conn, row.budget_id, user_id).await?;
    Ok(row)
}

/// List the category limits of the authenticated user's budgets
#[utoipa::path(
    get,
    path = "/api/v1/budget-categories",
    tag = "budget-categories",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Budget categories retrieved successfully", body = ApiResponse<Vec<BudgetCategoryResponse>>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budget_categories(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<BudgetCategoryResponse>>>, ApiError> {
    let rows = budget_category::Entity::find()
        .join(JoinType::InnerJoin, budget_category::Relation::Budget.def())
        .filter(budget::Column::UserId.eq(auth.id))
        .order_by_asc(budget_category::Column::Id)
        .all(&state.db)
        .await?;

    debug!("Retrieved {} budget categories for user {}", rows.len(), auth.id);
    Ok(Json(ApiResponse::ok(
        rows.into_iter().map(BudgetCategoryResponse::from).collect(),
        "Budget categories retrieved successfully",
    )))
}

/// Get a budget category by ID
#[utoipa::path(
    get,
    path = "/api/v1/budget-categories/{id}",
    tag = "budget-categories",
    params(
        ("id" = i32, Path, description = "Budget category ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Budget category retrieved successfully", body = ApiResponse<BudgetCategoryResponse>),
        (status = 403, description = "Budget belongs to another user", body = ErrorResponse),
        (status = 404, description = "Budget category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budget_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<BudgetCategoryResponse>>, ApiError> {
    let row = find_owned_row(&state.db, id, auth.id).await?;
    Ok(Json(ApiResponse::ok(
        BudgetCategoryResponse::from(row),
        "Budget category retrieved successfully",
    )))
}

/// Remove a category limit from a budget
#[utoipa::path(
    delete,
    path = "/api/v1/budget-categories/{id}",
    tag = "budget-categories",
    params(
        ("id" = i32, Path, description = "Budget category ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Budget category deleted successfully"),
        (status = 403, description = "Budget belongs to another user", body = ErrorResponse),
        (status = 404, description = "Budget category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_budget_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    let row = find_owned_row(&state.db, id, auth.id).await?;
    budget_category::Entity::delete_by_id(row.id)
        .exec(&state.db)
        .await?;

    info!("Budget category {} removed from budget {}", row.id, row.budget_id);
    Ok(StatusCode::NO_CONTENT)
}
