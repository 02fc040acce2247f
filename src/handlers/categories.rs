use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use model::entities::{category, transaction};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request structure for creating a new category
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Whether the category normally carries income
    #[serde(default)]
    pub is_income: bool,
}

/// Response structure for category operations
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub is_income: bool,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            is_income: model.is_income,
        }
    }
}

/// Create a new category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CreateCategoryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Category created successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "categories"
)]
#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    _auth: AuthUser,
    Valid(Json(request)): Valid<Json<CreateCategoryRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), ApiError> {
    debug!("Creating category with name: {}", request.name);

    let category = category::ActiveModel {
        name: Set(request.name),
        is_income: Set(request.is_income),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Category created successfully with ID: {}", category.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            CategoryResponse::from(category),
            "Category created successfully",
        )),
    ))
}

/// Get all categories
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of all categories", body = ApiResponse<Vec<CategoryResponse>>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "categories"
)]
#[instrument(skip(state))]
pub async fn get_categories(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, ApiError> {
    let categories = category::Entity::find()
        .order_by_asc(category::Column::Id)
        .all(&state.db)
        .await?;

    info!("Retrieved {} categories", categories.len());
    Ok(Json(ApiResponse::ok(
        categories.into_iter().map(CategoryResponse::from).collect(),
        "Categories retrieved successfully",
    )))
}

/// Get a single category by ID
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category found", body = ApiResponse<CategoryResponse>),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "categories"
)]
#[instrument(skip(state))]
pub async fn get_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ApiResponse<CategoryResponse>>, ApiError> {
    let category = category::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Category {} not found", id);
            ApiError::NotFound {
                entity: "Category",
                id,
            }
        })?;

    Ok(Json(ApiResponse::ok(
        CategoryResponse::from(category),
        "Category retrieved successfully",
    )))
}

/// Delete a category
///
/// Categories still used by transactions cannot be deleted. Budget limits for
/// the category are removed with it.
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category deleted", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Category still used by transactions", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "categories"
)]
#[instrument(skip(state))]
pub async fn delete_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ApiResponse<CategoryResponse>>, ApiError> {
    let category = category::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Category",
            id,
        })?;

    let in_use = transaction::Entity::find()
        .filter(transaction::Column::CategoryId.eq(id))
        .count(&state.db)
        .await?;
    if in_use > 0 {
        warn!("Category {} is used by {} transactions", id, in_use);
        return Err(ApiError::Validation(format!(
            "Category {} is used by {} transactions",
            id, in_use
        )));
    }

    category::Entity::delete_by_id(id).exec(&state.db).await?;
    info!("Category {} deleted", id);
    Ok(Json(ApiResponse::ok(
        CategoryResponse::from(category),
        "Category deleted successfully",
    )))
}
