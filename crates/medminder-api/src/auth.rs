use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use medminder_db::{Database, NewUser};
use medminder_notify::Notifier;
use medminder_reminders::ReminderScheduler;
use medminder_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};

use crate::account::{self, AccountLinks};
use crate::error::ApiError;
use crate::with_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub account: AccountLinks,
    /// Account emails. Reminders go through the scheduler's own notifier.
    pub notifier: Arc<dyn Notifier>,
    pub scheduler: ReminderScheduler,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let email = normalize_email(&req.email);
    if req.full_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Full name is required".into()));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".into()));
    }
    if req.phone_number.trim().is_empty() {
        return Err(ApiError::BadRequest("Phone number is required".into()));
    }
    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    // The UNIQUE index decides duplicates, so concurrent sign-ups cannot both win
    let user_id = Uuid::new_v4();
    let created = with_db(&state, move |db| {
        let inserted = db.create_user(&NewUser {
            id: user_id,
            full_name: req.full_name.trim(),
            email: &email,
            phone_number: req.phone_number.trim(),
            password_hash: &password_hash,
            dob: req.dob,
            gender: req.gender.trim(),
        })?;
        if !inserted {
            return Ok(None);
        }
        db.get_user_by_id(user_id)?
            .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", user_id))
            .map(Some)
    })
    .await?;

    let user = created.ok_or_else(|| ApiError::Conflict("Email is already registered".into()))?;
    let token = create_token(&state, user.id, &user.email)?;
    info!("Registered user {} ({})", user.id, user.email);

    if let Err(e) = account::send_verification(&state, &user).await {
        warn!("Registered {} without a verification email: {}", user.email, e);
    }

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let email = normalize_email(&req.email);

    let (user, hash) = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&hash).map_err(|e| anyhow::anyhow!("Stored hash for {} is corrupt: {}", user.id, e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let token = create_token(&state, user.id, &user.email)?;
    Ok(Json(AuthResponse { user, token }))
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::BadRequest("Password must be at least 8 characters".into()));
    }
    Ok(())
}

/// Argon2id with a fresh salt.
pub(crate) fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string())
}

fn create_token(state: &AppStateInner, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(state.token_ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}
