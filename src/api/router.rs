use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{
    auth::{login, me, require_principal},
    handlers::{
        AppState, create_book, create_fine, create_loan, create_member, get_book, get_books,
        get_dashboard_stats, get_fines, get_loans, get_member, get_members, return_book, settle,
    },
};

/// Creates the API router
///
/// Public endpoints:
/// - GET /health
/// - POST /auth/login
///
/// Everything else requires `Authorization: Bearer <token>`:
/// - GET /auth/me
/// - GET, POST /books; GET /books/:code
/// - GET, POST /members; GET /members/:number
/// - GET, POST /loans; POST /loans/:id/return
/// - GET, POST /fines; POST /fines/:id/settle
/// - GET /dashboard/stats
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/books", get(get_books).post(create_book))
        .route("/books/:code", get(get_book))
        .route("/members", get(get_members).post(create_member))
        .route("/members/:number", get(get_member))
        .route("/loans", get(get_loans).post(create_loan))
        .route("/loans/:id/return", post(return_book))
        .route("/fines", get(get_fines).post(create_fine))
        .route("/fines/:id/settle", post(settle))
        .route("/dashboard/stats", get(get_dashboard_stats))
        // Authentication runs before any protected handler
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_principal,
        ));

    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .merge(protected)
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
