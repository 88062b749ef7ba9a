//! Bizdesk
//!
//! Staff, task and community management: a SQLite-backed REST backend, a typed client for it,
//! and the list-query and view-model layer that screens are built on.

pub mod api;
pub mod auth;
pub mod client;
pub mod community;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod query;
pub mod views;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone token for the auth layer
    let token = state.config.api_token.clone();

    let api_routes = Router::new()
        // Staff
        .route("/staff", get(api::list_staff).post(api::create_staff))
        .route("/staff/deleted", get(api::list_deleted_staff))
        .route(
            "/staff/{id}",
            get(api::get_staff)
                .put(api::update_staff)
                .delete(api::delete_staff),
        )
        .route("/staff/{id}/restore", post(api::restore_staff))
        // Tasks
        .route("/tasks", get(api::list_tasks).post(api::create_task))
        .route("/tasks/statistics", get(api::task_statistics))
        .route("/tasks/bulk-assign", post(api::bulk_assign_tasks))
        .route("/tasks/today", get(api::tasks_due_today))
        .route("/tasks/overdue", get(api::overdue_tasks))
        .route("/tasks/reminders", get(api::task_reminders))
        .route(
            "/tasks/{id}",
            get(api::get_task)
                .put(api::update_task)
                .delete(api::delete_task),
        )
        .route("/tasks/{id}/status", patch(api::update_task_status))
        .route("/tasks/{id}/progress", patch(api::update_task_progress))
        .route("/tasks/{id}/notes", post(api::add_task_note))
        // Apply bearer token auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::token_auth_layer(token.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
