use std::collections::HashSet;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::categories::CategoryResponse;
use crate::handlers::transactions::TransactionResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use common::first_of_month;
use ledger::{linked, settle, summary};
use model::entities::{budget, budget_category, category};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Request body for creating a monthly budget
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateBudgetRequest {
    /// Any day of the budgeted month
    pub month: NaiveDate,
    /// Categories to budget, each starting with a zero limit
    #[serde(default)]
    #[validate(custom(function = "distinct_category_ids"))]
    pub categories: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct BudgetCategoryLimit {
    pub category_id: i32,
    #[validate(custom(function = "non_negative"))]
    pub limit_amount: Decimal,
}

/// Replaces the month and every category limit of a budget
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[validate(schema(function = "distinct_limit_categories"))]
pub struct UpdateBudgetRequest {
    pub month: NaiveDate,
    #[validate(nested)]
    pub categories: Vec<BudgetCategoryLimit>,
}

fn validation_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::ZERO {
        return Err(validation_error(
            "non_negative",
            "limit_amount must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn distinct_category_ids(category_ids: &[i32]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    match category_ids.iter().find(|id| !seen.insert(**id)) {
        Some(id) => Err(validation_error(
            "distinct",
            format!("Category {} is listed more than once", id),
        )),
        None => Ok(()),
    }
}

fn distinct_limit_categories(request: &UpdateBudgetRequest) -> Result<(), ValidationError> {
    let category_ids: Vec<i32> = request.categories.iter().map(|c| c.category_id).collect();
    distinct_category_ids(&category_ids)
}

/// A budgeted category and the amount consumed in the budget month
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct BudgetCategoryAmountResponse {
    pub id: i32,
    pub budget_id: i32,
    pub category_id: i32,
    pub limit_amount: Decimal,
    pub category: Option<CategoryResponse>,
    pub current_amount: Decimal,
}

impl From<summary::BudgetCategoryAmount> for BudgetCategoryAmountResponse {
    fn from(amount: summary::BudgetCategoryAmount) -> Self {
        Self {
            id: amount.row.id,
            budget_id: amount.row.budget_id,
            category_id: amount.row.category_id,
            limit_amount: amount.row.limit_amount,
            category: amount.category.map(CategoryResponse::from),
            current_amount: amount.current_amount,
        }
    }
}

/// Budget response model
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct BudgetResponse {
    pub id: i32,
    pub user_id: i32,
    /// First day of the budgeted month
    pub month: NaiveDate,
    /// Consumed amount from transactions linked to this budget
    pub current_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub categories: Vec<BudgetCategoryAmountResponse>,
}

impl From<summary::BudgetOverview> for BudgetResponse {
    fn from(overview: summary::BudgetOverview) -> Self {
        let budget = overview.budget;
        Self {
            id: budget.id,
            user_id: budget.user_id,
            month: budget.month,
            current_amount: budget.current_amount,
            created_at: budget.created_at,
            categories: overview
                .categories
                .into_iter()
                .map(BudgetCategoryAmountResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct BudgetDetailsResponse {
    pub budget: BudgetResponse,
    /// Transactions linked to the budget within its month
    pub transactions: Vec<TransactionResponse>,
}

impl From<summary::BudgetDetails> for BudgetDetailsResponse {
    fn from(details: summary::BudgetDetails) -> Self {
        Self {
            budget: BudgetResponse::from(details.overview),
            transactions: details
                .transactions
                .into_iter()
                .map(TransactionResponse::from)
                .collect(),
        }
    }
}

async fn ensure_categories_exist<C: ConnectionTrait>(
    conn: &C,
    category_ids: &[i32],
) -> Result<(), ApiError> {
    for &id in category_ids {
        if category::Entity::find_by_id(id).one(conn).await?.is_none() {
            return Err(ApiError::NotFound {
                entity: "Category",
                id,
            });
        }
    }
    Ok(())
}

async fn insert_limits<C: ConnectionTrait>(
    conn: &C,
    budget_id: i32,
    limits: &[BudgetCategoryLimit],
) -> Result<(), ApiError> {
    for limit in limits {
        budget_category::ActiveModel {
            budget_id: Set(budget_id),
            category_id: Set(limit.category_id),
            limit_amount: Set(limit.limit_amount),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn create_budget_rows<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    request: CreateBudgetRequest,
) -> Result<budget::Model, ApiError> {
    ensure_categories_exist(conn, &request.categories).await?;

    let budget = budget::ActiveModel {
        user_id: Set(user_id),
        month: Set(first_of_month(request.month)),
        current_amount: Set(Decimal::ZERO),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let limits: Vec<BudgetCategoryLimit> = request
        .categories
        .into_iter()
        .map(|category_id| BudgetCategoryLimit {
            category_id,
            limit_amount: Decimal::ZERO,
        })
        .collect();
    insert_limits(conn, budget.id, &limits).await?;

    Ok(budget)
}

async fn replace_budget_rows<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    budget_id: i32,
    request: UpdateBudgetRequest,
) -> Result<budget::Model, ApiError> {
    let budget = linked::find_owned_budget(conn, budget_id, user_id).await?;

    let category_ids: Vec<i32> = request.categories.iter().map(|c| c.category_id).collect();
    ensure_categories_exist(conn, &category_ids).await?;

    let month = first_of_month(request.month);
    let budget = if budget.month != month {
        let mut active: budget::ActiveModel = budget.into();
        active.month = Set(month);
        active.update(conn).await?
    } else {
        budget
    };

    let removed = budget_category::Entity::delete_many()
        .filter(budget_category::Column::BudgetId.eq(budget.id))
        .exec(conn)
        .await?;
    debug!(
        "Replacing {} category limits of budget {}",
        removed.rows_affected, budget.id
    );
    insert_limits(conn, budget.id, &request.categories).await?;

    Ok(budget)
}

/// Create a budget for the authenticated user
#[utoipa::path(
    post,
    path = "/api/v1/budgets",
    tag = "budgets",
    request_body = CreateBudgetRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Budget created successfully", body = ApiResponse<BudgetResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_budget(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Json(request)): Valid<Json<CreateBudgetRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<BudgetResponse>>), ApiError> {
    trace!("Entering create_budget function");
    let txn = state.db.begin().await?;
    let result = create_budget_rows(&txn, auth.id, request).await;
    let budget = settle(txn, result).await?;

    info!("Budget {} created for user {}", budget.id, auth.id);
    let overview = summary::budget_overview(&state.db, budget).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            BudgetResponse::from(overview),
            "Budget created successfully",
        )),
    ))
}

/// List the authenticated user's budgets with category spending
#[utoipa::path(
    get,
    path = "/api/v1/budgets",
    tag = "budgets",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Budgets retrieved successfully", body = ApiResponse<Vec<BudgetResponse>>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budgets(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<BudgetResponse>>>, ApiError> {
    let budgets = budget::Entity::find()
        .filter(budget::Column::UserId.eq(auth.id))
        .order_by_desc(budget::Column::Month)
        .all(&state.db)
        .await?;

    let mut responses = Vec::with_capacity(budgets.len());
    for budget in budgets {
        let overview = summary::budget_overview(&state.db, budget).await?;
        responses.push(BudgetResponse::from(overview));
    }

    debug!("Retrieved {} budgets for user {}", responses.len(), auth.id);
    Ok(Json(ApiResponse::ok(
        responses,
        "Budgets retrieved successfully",
    )))
}

/// Get a budget with category spending for its month
#[utoipa::path(
    get,
    path = "/api/v1/budgets/{budget_id}",
    tag = "budgets",
    params(
        ("budget_id" = i32, Path, description = "Budget ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Budget retrieved successfully", body = ApiResponse<BudgetResponse>),
        (status = 403, description = "Budget belongs to another user", body = ErrorResponse),
        (status = 404, description = "Budget not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budget(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<BudgetResponse>>, ApiError> {
    let budget = linked::find_owned_budget(&state.db, budget_id, auth.id).await?;
    let overview = summary::budget_overview(&state.db, budget).await?;
    Ok(Json(ApiResponse::ok(
        BudgetResponse::from(overview),
        "Budget retrieved successfully",
    )))
}

/// Replace a budget's month and category limits
#[utoipa::path(
    put,
    path = "/api/v1/budgets/{budget_id}",
    tag = "budgets",
    params(
        ("budget_id" = i32, Path, description = "Budget ID"),
    ),
    request_body = UpdateBudgetRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Budget updated successfully", body = ApiResponse<BudgetResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 403, description = "Budget belongs to another user", body = ErrorResponse),
        (status = 404, description = "Budget or category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_budget(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Json(request)): Valid<Json<UpdateBudgetRequest>>,
) -> Result<Json<ApiResponse<BudgetResponse>>, ApiError> {
    let txn = state.db.begin().await?;
    let result = replace_budget_rows(&txn, auth.id, budget_id, request).await;
    let budget = settle(txn, result).await?;

    info!("Budget {} updated", budget.id);
    let overview = summary::budget_overview(&state.db, budget).await?;
    Ok(Json(ApiResponse::ok(
        BudgetResponse::from(overview),
        "Budget updated successfully",
    )))
}

/// Delete a budget. Its transactions are kept but unlinked.
#[utoipa::path(
    delete,
    path = "/api/v1/budgets/{budget_id}",
    tag = "budgets",
    params(
        ("budget_id" = i32, Path, description = "Budget ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Budget deleted successfully"),
        (status = 403, description = "Budget belongs to another user", body = ErrorResponse),
        (status = 404, description = "Budget not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_budget(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    let txn = state.db.begin().await?;
    let result = linked::delete_owned_budget(&txn, budget_id, auth.id).await;
    settle(txn, result).await?;

    info!("Budget {} deleted by user {}", budget_id, auth.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Get a budget counting only transactions linked to it
#[utoipa::path(
    get,
    path = "/api/v1/budgets/{budget_id}/details",
    tag = "budgets",
    params(
        ("budget_id" = i32, Path, description = "Budget ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Budget details retrieved successfully", body = ApiResponse<BudgetDetailsResponse>),
        (status = 403, description = "Budget belongs to another user", body = ErrorResponse),
        (status = 404, description = "Budget not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budget_details(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<BudgetDetailsResponse>>, ApiError> {
    let budget = linked::find_owned_budget(&state.db, budget_id, auth.id).await?;
    let details = summary::budget_details(&state.db, budget).await?;
    Ok(Json(ApiResponse::ok(
        BudgetDetailsResponse::from(details),
        "Budget details retrieved successfully",
    )))
}
