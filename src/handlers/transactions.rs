use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use ledger::{TransactionDraft, TransactionPatch, link_from_parts, settle};
use model::entities::transaction::{self, LinkedObjectType, TransactionType};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

/// Distinguishes a field that was sent as `null` from one that was omitted.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Request body for recording a transaction
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateTransactionRequest {
    pub category_id: i32,
    /// Positive amount
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    /// When the money moved, defaults to now
    pub occurred_at: Option<DateTime<Utc>>,
    /// Must be set together with `linked_object_type`
    pub linked_object_id: Option<i32>,
    pub linked_object_type: Option<LinkedObjectType>,
}

/// Partial update of a transaction.
///
/// Omitted fields stay as they are. `description` may be `null` to clear it.
/// The link fields must be sent together, both `null` to unlink.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateTransactionRequest {
    pub category_id: Option<i32>,
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = 255))]
    pub description: Option<Option<String>>,
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i32>)]
    pub linked_object_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<LinkedObjectType>)]
    pub linked_object_type: Option<Option<LinkedObjectType>>,
}

impl UpdateTransactionRequest {
    fn into_patch(self) -> Result<TransactionPatch, ApiError> {
        let link = match (self.linked_object_id, self.linked_object_type) {
            (None, None) => None,
            (Some(id), Some(kind)) => Some(link_from_parts(id, kind)?),
            _ => {
                return Err(ApiError::Validation(
                    "linked_object_id and linked_object_type must be sent together".to_string(),
                ));
            }
        };

        Ok(TransactionPatch {
            category_id: self.category_id,
            amount: self.amount,
            transaction_type: self.transaction_type,
            description: self.description,
            occurred_at: self.occurred_at,
            link,
        })
    }
}

/// Transaction response model
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: i32,
    pub user_id: i32,
    pub category_id: i32,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub linked_object_id: Option<i32>,
    pub linked_object_type: Option<LinkedObjectType>,
}

impl From<transaction::Model> for TransactionResponse {
    fn from(model: transaction::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            category_id: model.category_id,
            amount: model.amount,
            transaction_type: model.transaction_type,
            description: model.description,
            occurred_at: model.occurred_at,
            linked_object_id: model.linked_object_id,
            linked_object_type: model.linked_object_type,
        }
    }
}

/// Record a transaction and update the goal or budget it is linked to
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    tag = "transactions",
    request_body = CreateTransactionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Transaction created successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid amount or incomplete link", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Linked goal or budget belongs to another user", body = ErrorResponse),
        (status = 404, description = "Category, goal or budget not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Json(request)): Valid<Json<CreateTransactionRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResponse>>), ApiError> {
    trace!("Entering create_transaction function");
    let link = link_from_parts(request.linked_object_id, request.linked_object_type)?;

    let draft = TransactionDraft {
        category_id: request.category_id,
        amount: request.amount,
        transaction_type: request.transaction_type,
        description: request.description,
        occurred_at: request.occurred_at,
        link,
    };

    let txn = state.db.begin().await?;
    let result = ledger::create_transaction(&txn, auth.id, draft).await;
    let created = settle(txn, result).await?;

    info!("Transaction {} created for user {}", created.id, auth.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            TransactionResponse::from(created),
            "Transaction created successfully",
        )),
    ))
}

/// List the authenticated user's transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = ApiResponse<Vec<TransactionResponse>>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, ApiError> {
    let transactions = transaction::Entity::find()
        .filter(transaction::Column::UserId.eq(auth.id))
        .order_by_desc(transaction::Column::OccurredAt)
        .order_by_desc(transaction::Column::Id)
        .all(&state.db)
        .await?;

    debug!("Retrieved {} transactions for user {}", transactions.len(), auth.id);
    Ok(Json(ApiResponse::ok(
        transactions.into_iter().map(TransactionResponse::from).collect(),
        "Transactions retrieved successfully",
    )))
}

/// Get a specific transaction by ID
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transaction retrieved successfully", body = ApiResponse<TransactionResponse>),
        (status = 403, description = "Transaction belongs to another user", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let found = ledger::find_owned_transaction(&state.db, auth.id, transaction_id).await?;
    Ok(Json(ApiResponse::ok(
        TransactionResponse::from(found),
        "Transaction retrieved successfully",
    )))
}

/// Update a transaction and move its effect between goals and budgets
#[utoipa::path(
    patch,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    request_body = UpdateTransactionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transaction updated successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid amount or incomplete link", body = ErrorResponse),
        (status = 403, description = "Transaction or new link target belongs to another user", body = ErrorResponse),
        (status = 404, description = "Transaction, category, goal or budget not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Json(request)): Valid<Json<UpdateTransactionRequest>>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    trace!("Entering update_transaction for {}", transaction_id);
    let patch = request.into_patch()?;

    let txn = state.db.begin().await?;
    let result = ledger::update_transaction(&txn, auth.id, transaction_id, patch).await;
    let updated = settle(txn, result).await?;

    info!("Transaction {} updated by user {}", updated.id, auth.id);
    Ok(Json(ApiResponse::ok(
        TransactionResponse::from(updated),
        "Transaction updated successfully",
    )))
}

/// Delete a transaction and reverse its effect
#[utoipa::path(
    delete,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transaction deleted successfully", body = ApiResponse<TransactionResponse>),
        (status = 403, description = "Transaction belongs to another user", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let txn = state.db.begin().await?;
    let result = ledger::delete_transaction(&txn, auth.id, transaction_id).await;
    let deleted = settle(txn, result).await?;

    info!("Transaction {} deleted by user {}", deleted.id, auth.id);
    Ok(Json(ApiResponse::ok(
        TransactionResponse::from(deleted),
        "Transaction deleted successfully",
    )))
}
