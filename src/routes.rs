// src/routes.rs

use std::time::Duration;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, dashboard, orders, services, users},
    state::AppState,
    utils::jwt::auth_middleware,
};

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Assembles the main application router.
///
/// * Public: health, auth, user profiles, service browsing.
/// * Protected (bearer token): own profile, listing management, orders, dashboard.
/// * Global middleware: Trace, CORS, request timeout.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let user_routes = Router::new()
        .route("/{id}", get(users::get_user))
        .merge(
            Router::new()
                .route("/me", get(users::get_me).put(users::update_me))
                .layer(auth_layer.clone()),
        );

    let service_routes = Router::new()
        .route("/", get(services::list_services))
        .route("/{id}", get(services::get_service))
        .merge(
            Router::new()
                .route("/", post(services::create_service))
                .route(
                    "/{id}",
                    put(services::update_service).delete(services::delete_service),
                )
                .layer(auth_layer.clone()),
        );

    let order_routes = Router::new()
        .route("/", get(orders::list_orders).post(orders::create_order))
        .route("/{id}", get(orders::get_order))
        .route("/{id}/status", put(orders::update_status))
        .route("/{id}/complete", put(orders::complete_order))
        .route("/{id}/payment", put(orders::update_payment))
        .route("/{id}/messages", post(orders::add_message))
        .route("/{id}/rating", post(orders::add_rating))
        .layer(auth_layer.clone());

    let dashboard_routes = Router::new()
        .route("/stats", get(dashboard::get_stats))
        .route("/activity", get(dashboard::get_activity))
        .route("/earnings", get(dashboard::get_earnings))
        .layer(auth_layer);

    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/services", service_routes)
        .nest("/api/orders", order_routes)
        .nest("/api/dashboard", dashboard_routes)
        // Global Middleware (applied from outside in)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
