use crate::handlers::{
    budget_categories::{delete_budget_category, get_budget_categories, get_budget_category},
    budgets::{
        create_budget, delete_budget, get_budget, get_budget_details, get_budgets, update_budget,
    },
    categories::{create_category, delete_category, get_categories, get_category},
    goals::{create_goal, delete_goal, get_goal, get_goal_details, get_goals, update_goal},
    health::health_check,
    transactions::{
        create_transaction, delete_transaction, get_transaction, get_transactions,
        update_transaction,
    },
    users::{change_password, get_current_user, login, register},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    Router,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/users/me", get(get_current_user))
        .route("/users/:user_id/change-password", put(change_password))
        // Categories
        .route("/categories", post(create_category).get(get_categories))
        .route("/categories/:id", get(get_category).delete(delete_category))
        // Goals
        .route("/goals", post(create_goal).get(get_goals))
        .route(
            "/goals/:goal_id",
            get(get_goal).put(update_goal).delete(delete_goal),
        )
        .route("/goals/:goal_id/details", get(get_goal_details))
        // Budgets
        .route("/budgets", post(create_budget).get(get_budgets))
        .route(
            "/budgets/:budget_id",
            get(get_budget).put(update_budget).delete(delete_budget),
        )
        .route("/budgets/:budget_id/details", get(get_budget_details))
        .route("/budget-categories", get(get_budget_categories))
        .route(
            "/budget-categories/:id",
            get(get_budget_category).delete(delete_budget_category),
        )
        // Transactions
        .route(
            "/transactions",
            post(create_transaction).get(get_transactions),
        )
        .route(
            "/transactions/:transaction_id",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // The metrics recorder is process-global and tests build many routers
    #[cfg(not(test))]
    let router = {
        let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();
        router
            .route(
                "/metrics",
                get(move || std::future::ready(metric_handle.render())),
            )
            .layer(prometheus_layer)
    };

    let timeout = state.request_timeout;
    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
