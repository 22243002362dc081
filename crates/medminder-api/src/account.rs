//! Emailed account links: address verification and password reset.
//!
//! Link tokens are JWTs signed with a per-purpose secret and carry the
//! purpose as their audience, so neither kind is accepted as a session token
//! or in place of the other.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use medminder_types::api::{EmailRequest, LinkTokenQuery, MessageResponse, ResetPasswordRequest};
use medminder_types::models::User;

use crate::auth::{AppState, AppStateInner, hash_password, normalize_email, validate_password};
use crate::error::ApiError;
use crate::with_db;

/// Where emailed links point and the secrets that sign them.
#[derive(Debug, Clone)]
pub struct AccountLinks {
    /// Front-end base URL, e.g. `https://app.example.com`.
    pub app_url: String,
    pub email_secret: String,
    pub reset_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPurpose {
    VerifyEmail,
    ResetPassword,
}

impl LinkPurpose {
    fn audience(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify-email",
            Self::ResetPassword => "reset-password",
        }
    }

    fn ttl(self) -> Duration {
        match self {
            Self::VerifyEmail => Duration::hours(1),
            Self::ResetPassword => Duration::minutes(15),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkClaims {
    pub sub: Uuid,
    pub email: String,
    pub aud: String,
    pub exp: usize,
}

impl AccountLinks {
    fn secret(&self, purpose: LinkPurpose) -> &[u8] {
        match purpose {
            LinkPurpose::VerifyEmail => self.email_secret.as_bytes(),
            LinkPurpose::ResetPassword => self.reset_secret.as_bytes(),
        }
    }

    pub fn issue(&self, purpose: LinkPurpose, user: &User) -> anyhow::Result<String> {
        let claims = LinkClaims {
            sub: user.id,
            email: user.email.clone(),
            aud: purpose.audience().to_string(),
            exp: (Utc::now() + purpose.ttl()).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret(purpose)))?)
    }

    /// `None` for a bad signature, the wrong purpose, or an expired token.
    pub fn verify(&self, purpose: LinkPurpose, token: &str) -> Option<LinkClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[purpose.audience()]);
        match decode::<LinkClaims>(token, &DecodingKey::from_secret(self.secret(purpose)), &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!("Rejected {} token: {}", purpose.audience(), e);
                None
            }
        }
    }

    pub fn url(&self, purpose: LinkPurpose, token: &str) -> String {
        format!(
            "{}/{}?token={}",
            self.app_url.trim_end_matches('/'),
            purpose.audience(),
            token
        )
    }
}

pub const VERIFY_SUBJECT: &str = "Email Verification";
pub const RESET_SUBJECT: &str = "Reset Your Password";

fn verify_body(name: &str, url: &str) -> String {
    format!(
        "Hello {name},\n\n\
         Click the link below to verify your email:\n{url}\n\n\
         This link will expire in 1 hour."
    )
}

fn reset_body(name: &str, url: &str) -> String {
    format!(
        "Hello {name},\n\n\
         Click the link below to reset your password:\n{url}\n\n\
         This link will expire in 15 minutes."
    )
}

/// Email a fresh verification link to `user`.
pub(crate) async fn send_verification(state: &AppStateInner, user: &User) -> Result<(), ApiError> {
    let token = state.account.issue(LinkPurpose::VerifyEmail, user)?;
    let body = verify_body(&user.full_name, &state.account.url(LinkPurpose::VerifyEmail, &token));
    state
        .notifier
        .send_email(&user.email, VERIFY_SUBJECT, &body)
        .await
        .map_err(|e| anyhow::anyhow!("Verification email to {} failed: {}", user.email, e))?;
    info!("Verification email sent to {}", user.email);
    Ok(())
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

async fn user_by_email(state: &AppState, email: &str) -> Result<User, ApiError> {
    let email = normalize_email(email);
    with_db(state, move |db| db.get_user_by_email(&email))
        .await?
        .map(|(user, _)| user)
        .ok_or(ApiError::NotFound("User"))
}

pub async fn verify_email(
    State(state): State<AppState>,
    query: Result<Query<LinkTokenQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Query(query) = query?;
    let invalid = || ApiError::BadRequest("Invalid or expired token".into());
    let claims = state
        .account
        .verify(LinkPurpose::VerifyEmail, &query.token)
        .ok_or_else(invalid)?;

    let user_id = claims.sub;
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .filter(|u| u.email == claims.email)
        .ok_or_else(invalid)?;
    if user.is_email_verified {
        return Ok(message("Email already verified."));
    }

    with_db(&state, move |db| db.mark_email_verified(user_id)).await?;
    info!("User {} verified {}", user.id, user.email);
    Ok(message("Email verified successfully."))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let user = user_by_email(&state, &req.email).await?;
    if user.is_email_verified {
        return Ok(message("Email is already verified."));
    }

    send_verification(&state, &user).await?;
    Ok(message("Verification email sent."))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let user = user_by_email(&state, &req.email).await?;

    let token = state.account.issue(LinkPurpose::ResetPassword, &user)?;
    let body = reset_body(&user.full_name, &state.account.url(LinkPurpose::ResetPassword, &token));
    state
        .notifier
        .send_email(&user.email, RESET_SUBJECT, &body)
        .await
        .map_err(|e| anyhow::anyhow!("Password reset email to {} failed: {}", user.email, e))?;

    info!("Password reset link sent to {}", user.email);
    Ok(message("Password reset link sent to your email."))
}

pub async fn reset_password(
    State(state): State<AppState>,
    query: Result<Query<LinkTokenQuery>, QueryRejection>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Query(query) = query?;
    let Json(req) = payload?;

    let invalid = || ApiError::BadRequest("Invalid or expired reset token".into());
    let claims = state
        .account
        .verify(LinkPurpose::ResetPassword, &query.token)
        .ok_or_else(invalid)?;
    validate_password(&req.new_password)?;

    let password_hash = hash_password(&req.new_password)?;
    let user_id = claims.sub;
    let updated = with_db(&state, move |db| db.update_password(user_id, &password_hash)).await?;
    if !updated {
        warn!("Reset token for missing user {}", user_id);
        return Err(invalid());
    }

    info!("Password reset for user {}", user_id);
    Ok(message("Password reset successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> AccountLinks {
        AccountLinks {
            app_url: "https://app.example.com/".into(),
            email_secret: "email-secret".into(),
            reset_secret: "reset-secret".into(),
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            full_name: "Ada Obi".into(),
            email: "ada@example.com".into(),
            phone_number: "+2348011111111".into(),
            dob: None,
            gender: "female".into(),
            is_email_verified: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tokens_only_verify_for_their_own_purpose() {
        let links = links();
        let user = user();
        let token = links.issue(LinkPurpose::VerifyEmail, &user).unwrap();

        let claims = links.verify(LinkPurpose::VerifyEmail, &token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert!(links.verify(LinkPurpose::ResetPassword, &token).is_none());

        // Same secret, wrong audience
        let shared = AccountLinks {
            reset_secret: "email-secret".into(),
            ..links.clone()
        };
        assert!(shared.verify(LinkPurpose::ResetPassword, &token).is_none());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let links = links();
        let claims = LinkClaims {
            sub: Uuid::new_v4(),
            email: "ada@example.com".into(),
            aud: "reset-password".into(),
            exp: (Utc::now() - Duration::minutes(20)).timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"reset-secret")).unwrap();
        assert!(links.verify(LinkPurpose::ResetPassword, &token).is_none());
    }

    #[test]
    fn link_urls_join_cleanly() {
        assert_eq!(
            links().url(LinkPurpose::ResetPassword, "abc"),
            "https://app.example.com/reset-password?token=abc"
        );
    }
}
