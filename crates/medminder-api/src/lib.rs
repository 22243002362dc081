pub mod account;
pub mod auth;
pub mod doses;
pub mod error;
pub mod medications;
pub mod middleware;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

use medminder_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// All HTTP routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email", get(account::verify_email))
        .route("/user/resend-verification", post(account::resend_verification))
        .route("/user/forgot-password", post(account::forgot_password))
        .route("/user/reset-password", post(account::reset_password));

    let protected_routes = Router::new()
        .route("/user/me", get(users::me))
        .route("/medications", get(medications::list_medications))
        .route("/medications/add", post(medications::add_medication))
        .route("/medications/run-medication-reminders", get(medications::run_reminders))
        .route(
            "/medications/{id}",
            patch(medications::update_medication).delete(medications::delete_medication),
        )
        .route("/doses", get(doses::list_doses))
        .route("/doses/{id}", patch(doses::update_dose))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .nest("/v1", public_routes.merge(protected_routes))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Run a blocking database call off the async runtime.
pub(crate) async fn with_db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::Internal)
}
