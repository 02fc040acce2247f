use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

pub use common::{ApiResponse, ErrorResponse};
use model::entities::transaction::{LinkedObjectType, TransactionType};

use crate::auth::AuthKeys;
use crate::handlers::{
    budget_categories::BudgetCategoryResponse,
    budgets::{
        BudgetCategoryAmountResponse, BudgetCategoryLimit, BudgetDetailsResponse, BudgetResponse,
        CreateBudgetRequest, UpdateBudgetRequest,
    },
    categories::{CategoryResponse, CreateCategoryRequest},
    goals::{CreateGoalRequest, GoalDetailsResponse, GoalResponse, UpdateGoalRequest},
    transactions::{CreateTransactionRequest, TransactionResponse, UpdateTransactionRequest},
    users::{ChangePasswordRequest, LoginRequest, RegisterRequest, TokenResponse, UserResponse},
};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Token signing keys and password hashing settings
    pub auth: AuthKeys,
    /// Per-request timeout applied by the router
    pub request_timeout: Duration,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::users::register,
        crate::handlers::users::login,
        crate::handlers::users::get_current_user,
        crate::handlers::users::change_password,
        crate::handlers::categories::create_category,
        crate::handlers::categories::get_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::delete_category,
        crate::handlers::goals::create_goal,
        crate::handlers::goals::get_goals,
        crate::handlers::goals::get_goal,
        crate::handlers::goals::update_goal,
        crate::handlers::goals::delete_goal,
        crate::handlers::goals::get_goal_details,
        crate::handlers::budgets::create_budget,
        crate::handlers::budgets::get_budgets,
        crate::handlers::budgets::get_budget,
        crate::handlers::budgets::update_budget,
        crate::handlers::budgets::delete_budget,
        crate::handlers::budgets::get_budget_details,
        crate::handlers::budget_categories::get_budget_categories,
        crate::handlers::budget_categories::get_budget_category,
        crate::handlers::budget_categories::delete_budget_category,
        crate::handlers::transactions::create_transaction,
        crate::handlers::transactions::get_transactions,
        crate::handlers::transactions::get_transaction,
        crate::handlers::transactions::update_transaction,
        crate::handlers::transactions::delete_transaction,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            RegisterRequest,
            LoginRequest,
            ChangePasswordRequest,
            TokenResponse,
            UserResponse,
            CreateCategoryRequest,
            CategoryResponse,
            CreateGoalRequest,
            UpdateGoalRequest,
            GoalResponse,
            GoalDetailsResponse,
            CreateBudgetRequest,
            UpdateBudgetRequest,
            BudgetCategoryLimit,
            BudgetCategoryAmountResponse,
            BudgetResponse,
            BudgetDetailsResponse,
            BudgetCategoryResponse,
            CreateTransactionRequest,
            UpdateTransactionRequest,
            TransactionResponse,
            TransactionType,
            LinkedObjectType,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "Current user and password management"),
        (name = "categories", description = "Transaction categories"),
        (name = "goals", description = "Savings goals fed by linked transactions"),
        (name = "budgets", description = "Monthly budgets with category limits"),
        (name = "budget-categories", description = "Category limits inside budgets"),
        (name = "transactions", description = "Transactions and their effect on goals and budgets"),
    ),
    info(
        title = "FinLedger API",
        description = "Personal finance tracker with goals and budgets kept consistent with their transactions",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
