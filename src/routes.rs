//! HTTP router assembly.

use crate::audit::audit_middleware;
use crate::handlers::{self, AppState};
use crate::rate_limit::rate_limit_middleware;
use crate::{admin_handler, dispute_handler};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Permissive CORS when no origins are configured, otherwise an explicit allow-list.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the full application router.
///
/// Every `/api/v1` route passes through the audit trail, then rate limiting, then the body
/// limit on extractors. `/health` is exempt from throttling and auditing.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    let api = Router::new()
        .route("/auth/me", get(handlers::auth_me))
        // Consumers
        .route("/consumers", post(handlers::create_consumer))
        .route(
            "/consumers/me/credit-report",
            get(handlers::get_own_credit_report),
        )
        .route(
            "/consumers/:id",
            get(handlers::get_consumer).put(handlers::update_consumer),
        )
        .route("/consumers/:id/freeze", put(handlers::freeze_credit))
        .route(
            "/consumers/:id/consents",
            get(handlers::list_consents).post(handlers::grant_consent),
        )
        .route("/consents/:id/revoke", post(handlers::revoke_consent))
        // Credit data and reports
        .route(
            "/credit-data",
            get(handlers::list_credit_data).post(handlers::submit_credit_data),
        )
        .route(
            "/credit-data/:id",
            put(handlers::update_credit_data).delete(handlers::delete_credit_data),
        )
        .route("/credit-reports", post(handlers::generate_credit_report))
        .route("/credit-reports/:id", get(handlers::get_credit_report))
        .route(
            "/inquiries",
            get(handlers::list_inquiries).post(handlers::create_inquiry),
        )
        // Disputes
        .route(
            "/disputes",
            get(dispute_handler::list_disputes).post(dispute_handler::create_dispute),
        )
        .route(
            "/disputes/:id/resolve",
            post(dispute_handler::resolve_dispute),
        )
        // Administration
        .route(
            "/banks",
            get(admin_handler::list_banks).post(admin_handler::create_bank),
        )
        .route(
            "/banks/:id",
            get(admin_handler::get_bank).put(admin_handler::update_bank),
        )
        .route("/banks/:id/approve", post(admin_handler::approve_bank))
        .route(
            "/users",
            get(admin_handler::list_users).post(admin_handler::create_user),
        )
        .route(
            "/users/:id",
            get(admin_handler::get_user)
                .put(admin_handler::update_user)
                .delete(admin_handler::delete_user),
        )
        .route("/users/:id/token", post(admin_handler::issue_token))
        .route("/audit-logs", get(admin_handler::list_audit_logs))
        .layer(DefaultBodyLimit::max(max_body_bytes));

    // Audit wraps the limiter so 429 and 413 responses are recorded too.
    let protected = Router::new().nest("/api/v1", api).layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn_with_state(
                state.clone(),
                audit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            )),
    );

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state.clone())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

