use crate::auth::{AuthUser, verify_password};
use crate::error::{ApiError, is_unique_violation};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for registering a new user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// Username (must be unique)
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    /// Email address (must be unique)
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Serialize, ToSchema, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 6, max = 128))]
    pub new_password: String,
}

/// Bearer token returned by a successful login
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
}

/// User response model
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            created_at: model.created_at,
        }
    }
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request or username/email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    trace!("Entering register function");

    let email_taken = user::Entity::find()
        .filter(user::Column::Email.eq(request.email.as_str()))
        .one(&state.db)
        .await?
        .is_some();
    if email_taken {
        warn!("Email {} already registered", request.email);
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let username_taken = user::Entity::find()
        .filter(user::Column::Username.eq(request.username.as_str()))
        .one(&state.db)
        .await?
        .is_some();
    if username_taken {
        warn!("Username {} already registered", request.username);
        return Err(ApiError::Conflict("Username already registered".to_string()));
    }

    let new_user = user::ActiveModel {
        username: Set(request.username.clone()),
        email: Set(request.email.clone()),
        password_hash: Set(state.auth.hash_password(&request.password).await?),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    // The unique indexes still catch a registration racing this one
    let user_model = new_user.insert(&state.db).await.map_err(|db_error| {
        if is_unique_violation(&db_error) {
            ApiError::Conflict("Username or email already registered".to_string())
        } else {
            ApiError::Database(db_error)
        }
    })?;

    info!(
        "User registered with ID: {}, username: {}",
        user_model.id, user_model.username
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            UserResponse::from(user_model),
            "User registered successfully",
        )),
    ))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<LoginRequest>>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    trace!("Entering login function");

    let found = user::Entity::find()
        .filter(user::Column::Username.eq(request.username.as_str()))
        .one(&state.db)
        .await?;

    let verified = match found {
        Some(user_model) => verify_password(&request.password, &user_model.password_hash)
            .await?
            .then_some(user_model),
        None => None,
    };

    let user_model = match verified {
        Some(user_model) => user_model,
        None => {
            warn!("Failed login for {}", request.username);
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    let token = state.auth.issue_token(&user_model)?;
    info!("User {} logged in", user_model.id);
    Ok(Json(ApiResponse::ok(
        TokenResponse {
            access_token: token,
            token_type: "bearer".to_string(),
        },
        "Login successful",
    )))
}

/// Get the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    debug!("Fetching user {}", auth.id);
    let user_model = user::Entity::find_by_id(auth.id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "User",
            id: auth.id,
        })?;

    Ok(Json(ApiResponse::ok(
        UserResponse::from(user_model),
        "User retrieved successfully",
    )))
}

/// Change a user's password. Users may only change their own.
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/change-password",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not the same user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn change_password(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Json(request)): Valid<Json<ChangePasswordRequest>>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering change_password for user {}", user_id);

    let user_model = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "User",
            id: user_id,
        })?;

    if user_model.id != auth.id {
        warn!("User {} tried to change password of user {}", auth.id, user_id);
        return Err(ApiError::Forbidden(
            "Not authorized to change this password".to_string(),
        ));
    }

    let mut active: user::ActiveModel = user_model.into();
    active.password_hash = Set(state.auth.hash_password(&request.new_password).await?);
    let updated = active.update(&state.db).await?;

    info!("Password updated for user {}", updated.id);
    Ok(Json(ApiResponse::ok(
        UserResponse::from(updated),
        "Password updated successfully",
    )))
}
