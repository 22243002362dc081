use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use reqwest::{Method, RequestBuilder, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;

use medminder_types::api::{
    AuthResponse, Claims, CreateMedicationRequest, EmailRequest, LoginRequest, MessageResponse,
    RegisterRequest, ResetPasswordRequest, UpdateDoseStatusRequest, UpdateMedicationRequest,
};
use medminder_types::models::{Dose, DoseStatus, Medication, User};

use crate::error::ClientError;
use crate::storage::{AUTH_TOKEN_KEY, LocalStore, USER_KEY, read_json, write_json};

/// Where the reminder mirror gets its medication list from.
#[async_trait]
pub trait MedicationSource: Send + Sync {
    async fn medications(&self) -> Result<Vec<Medication>, ClientError>;
}

/// Error body produced by the server.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Typed client for the MedMinder HTTP API. The session token and user live
/// in the local store so they survive restarts.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn LocalStore>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
        }
    }

    // -- Session --

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let auth: AuthResponse = self.send(self.request(Method::POST, "/v1/auth/register").json(req)).await?;
        self.save_session(&auth)?;
        info!("Registered and signed in as {}", auth.user.email);
        Ok(auth)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self.send(self.request(Method::POST, "/v1/auth/login").json(&body)).await?;
        self.save_session(&auth)?;
        info!("Signed in as {}", auth.user.email);
        Ok(auth)
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.store.remove(AUTH_TOKEN_KEY)?;
        self.store.remove(USER_KEY)?;
        info!("Signed out");
        Ok(())
    }

    pub fn token(&self) -> Result<Option<String>, ClientError> {
        read_json(self.store.as_ref(), AUTH_TOKEN_KEY)
    }

    /// Expiry of the stored token, read from its `exp` claim. The signature is
    /// not checked here; the server does that.
    pub fn token_expiry(&self) -> Result<Option<DateTime<Utc>>, ClientError> {
        Ok(self.token()?.as_deref().and_then(read_expiry))
    }

    /// True while a stored token has not expired. An expired or unreadable
    /// token signs the client out.
    pub fn is_authenticated(&self) -> Result<bool, ClientError> {
        let Some(token) = self.token()? else {
            return Ok(false);
        };
        match read_expiry(&token) {
            Some(expiry) if Utc::now() < expiry => Ok(true),
            _ => {
                info!("Stored session is expired or unreadable");
                self.logout()?;
                Ok(false)
            }
        }
    }

    /// The user saved at the last sign-in, without a network call.
    pub fn current_user(&self) -> Result<Option<User>, ClientError> {
        read_json(self.store.as_ref(), USER_KEY)
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.send(self.authed(Method::GET, "/v1/user/me")?).await
    }

    // -- Account links --

    pub async fn verify_email(&self, token: &str) -> Result<MessageResponse, ClientError> {
        self.send(self.request(Method::GET, "/v1/auth/verify-email").query(&[("token", token)]))
            .await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.send(self.request(Method::POST, "/v1/user/resend-verification").json(&body))
            .await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.send(self.request(Method::POST, "/v1/user/forgot-password").json(&body))
            .await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<MessageResponse, ClientError> {
        let body = ResetPasswordRequest {
            new_password: new_password.to_string(),
        };
        let req = self
            .request(Method::POST, "/v1/user/reset-password")
            .query(&[("token", token)])
            .json(&body);
        self.send(req).await
    }

    // -- Medications --

    pub async fn list_medications(&self) -> Result<Vec<Medication>, ClientError> {
        self.send(self.authed(Method::GET, "/v1/medications")?).await
    }

    pub async fn add_medication(&self, req: &CreateMedicationRequest) -> Result<Medication, ClientError> {
        self.send(self.authed(Method::POST, "/v1/medications/add")?.json(req)).await
    }

    pub async fn update_medication(
        &self,
        id: Uuid,
        req: &UpdateMedicationRequest,
    ) -> Result<Medication, ClientError> {
        self.send(self.authed(Method::PATCH, &format!("/v1/medications/{id}"))?.json(req))
            .await
    }

    pub async fn delete_medication(&self, id: Uuid) -> Result<MessageResponse, ClientError> {
        self.send(self.authed(Method::DELETE, &format!("/v1/medications/{id}"))?)
            .await
    }

    // -- Doses --

    pub async fn list_doses(&self, status: Option<DoseStatus>) -> Result<Vec<Dose>, ClientError> {
        let mut req = self.authed(Method::GET, "/v1/doses")?;
        if let Some(status) = status {
            req = req.query(&[("status", status.as_str())]);
        }
        self.send(req).await
    }

    pub async fn update_dose(&self, id: Uuid, status: DoseStatus) -> Result<Dose, ClientError> {
        let body = UpdateDoseStatusRequest { status };
        self.send(self.authed(Method::PATCH, &format!("/v1/doses/{id}"))?.json(&body))
            .await
    }

    // -- Plumbing --

    fn save_session(&self, auth: &AuthResponse) -> Result<(), ClientError> {
        write_json(self.store.as_ref(), AUTH_TOKEN_KEY, &auth.token)?;
        write_json(self.store.as_ref(), USER_KEY, &auth.user)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token()?.ok_or(ClientError::NotAuthenticated)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    /// A 401 on a request that carried the session means the server no
    /// longer accepts it, so the session is dropped.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let req = req.build()?;
        let authed = req.headers().contains_key(header::AUTHORIZATION);
        let res = match check(self.http.execute(req).await?).await {
            Ok(res) => res,
            Err(ClientError::Api { status: 401, message }) if authed => {
                warn!("Server rejected the session ({}); signing out", message);
                self.logout()?;
                return Err(ClientError::Api { status: 401, message });
            }
            Err(e) => return Err(e),
        };
        Ok(res.json().await?)
    }
}

fn read_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    DateTime::from_timestamp(i64::try_from(data.claims.exp).ok()?, 0)
}

async fn check(res: Response) -> Result<Response, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    debug!("Request failed with {}: {}", status, message);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl MedicationSource for ApiClient {
    async fn medications(&self) -> Result<Vec<Medication>, ClientError> {
        self.list_medications().await
    }
}
