use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::transactions::TransactionResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use ledger::{linked, settle, summary};
use model::entities::goal;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for creating a savings goal.
///
/// Progress always starts at zero and only moves through linked transactions.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateGoalRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub target_amount: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateGoalRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub target_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}

/// Goal response model
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct GoalResponse {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub target_amount: Decimal,
    /// Net of linked income minus linked expenses
    pub current_amount: Decimal,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<goal::Model> for GoalResponse {
    fn from(model: goal::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            title: model.title,
            target_amount: model.target_amount,
            current_amount: model.current_amount,
            due_date: model.due_date,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct GoalDetailsResponse {
    pub goal: GoalResponse,
    pub transactions: Vec<TransactionResponse>,
}

impl From<summary::GoalDetails> for GoalDetailsResponse {
    fn from(details: summary::GoalDetails) -> Self {
        Self {
            goal: GoalResponse::from(details.goal),
            transactions: details
                .transactions
                .into_iter()
                .map(TransactionResponse::from)
                .collect(),
        }
    }
}

fn ensure_positive_target(amount: Decimal) -> Result<(), ApiError> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "target_amount: must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Create a goal for the authenticated user
#[utoipa::path(
    post,
    path = "/api/v1/goals",
    tag = "goals",
    request_body = CreateGoalRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Goal created successfully", body = ApiResponse<GoalResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Json(request)): Valid<Json<CreateGoalRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<GoalResponse>>), ApiError> {
    trace!("Entering create_goal function");
    ensure_positive_target(request.target_amount)?;

    let goal = goal::ActiveModel {
        user_id: Set(auth.id),
        title: Set(request.title),
        target_amount: Set(request.target_amount),
        current_amount: Set(Decimal::ZERO),
        due_date: Set(request.due_date),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Goal {} created for user {}", goal.id, auth.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(GoalResponse::from(goal), "Goal created successfully")),
    ))
}

/// List the authenticated user's goals
#[utoipa::path(
    get,
    path = "/api/v1/goals",
    tag = "goals",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Goals retrieved successfully", body = ApiResponse<Vec<GoalResponse>>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<GoalResponse>>>, ApiError> {
    let goals = goal::Entity::find()
        .filter(goal::Column::UserId.eq(auth.id))
        .order_by_asc(goal::Column::DueDate)
        .all(&state.db)
        .await?;

    debug!("Retrieved {} goals for user {}", goals.len(), auth.id);
    Ok(Json(ApiResponse::ok(
        goals.into_iter().map(GoalResponse::from).collect(),
        "Goals retrieved successfully",
    )))
}

/// Get a goal by ID
#[utoipa::path(
    get,
    path = "/api/v1/goals/{goal_id}",
    tag = "goals",
    params(
        ("goal_id" = i32, Path, description = "Goal ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Goal retrieved successfully", body = ApiResponse<GoalResponse>),
        (status = 403, description = "Goal belongs to another user", body = ErrorResponse),
        (status = 404, description = "Goal not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_goal(
    Path(goal_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<GoalResponse>>, ApiError> {
    let goal = linked::find_owned_goal(&state.db, goal_id, auth.id).await?;
    Ok(Json(ApiResponse::ok(
        GoalResponse::from(goal),
        "Goal retrieved successfully",
    )))
}

/// Update a goal's title, target or due date
#[utoipa::path(
    put,
    path = "/api/v1/goals/{goal_id}",
    tag = "goals",
    params(
        ("goal_id" = i32, Path, description = "Goal ID"),
    ),
    request_body = UpdateGoalRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Goal updated successfully", body = ApiResponse<GoalResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 403, description = "Goal belongs to another user", body = ErrorResponse),
        (status = 404, description = "Goal not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_goal(
    Path(goal_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Json(request)): Valid<Json<UpdateGoalRequest>>,
) -> Result<Json<ApiResponse<GoalResponse>>, ApiError> {
    let goal = linked::find_owned_goal(&state.db, goal_id, auth.id).await?;

    let mut active: goal::ActiveModel = goal.clone().into();
    if let Some(title) = request.title {
        active.title = Set(title);
    }
    if let Some(target_amount) = request.target_amount {
        ensure_positive_target(target_amount)?;
        active.target_amount = Set(target_amount);
    }
    if let Some(due_date) = request.due_date {
        active.due_date = Set(due_date);
    }

    let updated = if active.is_changed() {
        active.update(&state.db).await?
    } else {
        goal
    };

    info!("Goal {} updated", updated.id);
    Ok(Json(ApiResponse::ok(
        GoalResponse::from(updated),
        "Goal updated successfully",
    )))
}

/// Delete a goal. Its transactions are kept but unlinked.
#[utoipa::path(
    delete,
    path = "/api/v1/goals/{goal_id}",
    tag = "goals",
    params(
        ("goal_id" = i32, Path, description = "Goal ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Goal deleted successfully", body = ApiResponse<GoalResponse>),
        (status = 403, description = "Goal belongs to another user", body = ErrorResponse),
        (status = 404, description = "Goal not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_goal(
    Path(goal_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<GoalResponse>>, ApiError> {
    let txn = state.db.begin().await?;
    let result = linked::delete_owned_goal(&txn, goal_id, auth.id).await;
    let goal = settle(txn, result).await?;

    info!("Goal {} deleted by user {}", goal_id, auth.id);
    Ok(Json(ApiResponse::ok(
        GoalResponse::from(goal),
        "Goal deleted successfully",
    )))
}

/// Get a goal together with its linked transactions
#[utoipa::path(
    get,
    path = "/api/v1/goals/{goal_id}/details",
    tag = "goals",
    params(
        ("goal_id" = i32, Path, description = "Goal ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Goal details retrieved successfully", body = ApiResponse<GoalDetailsResponse>),
        (status = 403, description = "Goal belongs to another user", body = ErrorResponse),
        (status = 404, description = "Goal not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_goal_details(
    Path(goal_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<GoalDetailsResponse>>, ApiError> {
    let goal = linked::find_owned_goal(&state.db, goal_id, auth.id).await?;
    let details = summary::goal_details(&state.db, goal).await?;

    debug!(
        "Goal {} has {} linked transactions",
        goal_id,
        details.transactions.len()
    );
    Ok(Json(ApiResponse::ok(
        GoalDetailsResponse::from(details),
        "Goal details retrieved successfully",
    )))
}
