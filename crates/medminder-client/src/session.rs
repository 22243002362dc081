use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::ClientError;

/// How long before expiry the session is dropped.
pub const LOGOUT_MARGIN: Duration = Duration::from_secs(60);

/// Signs the client out shortly before its token expires. Dropping the timer
/// disarms it.
pub struct LogoutTimer {
    handle: Option<JoinHandle<()>>,
}

impl LogoutTimer {
    /// Arm for the currently stored token. A token already inside the margin
    /// is dropped at once; with no readable token nothing is armed.
    pub fn arm(client: ApiClient) -> Result<Self, ClientError> {
        let Some(expiry) = client.token_expiry()? else {
            return Ok(Self { handle: None });
        };

        let Ok(until_expiry) = (expiry - Utc::now()).to_std() else {
            info!("Session already expired; signing out");
            client.logout()?;
            return Ok(Self { handle: None });
        };
        let Some(delay) = until_expiry.checked_sub(LOGOUT_MARGIN) else {
            info!("Session expires within {:?}; signing out", LOGOUT_MARGIN);
            client.logout()?;
            return Ok(Self { handle: None });
        };

        debug!("Logout scheduled in {}s", delay.as_secs());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("Session about to expire; signing out");
            if let Err(e) = client.logout() {
                warn!("Timed logout failed: {}", e);
            }
        });
        Ok(Self { handle: Some(handle) })
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for LogoutTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    use medminder_types::api::Claims;

    use crate::storage::{AUTH_TOKEN_KEY, LocalStore, MemoryStore, write_json};

    fn signed_in(expires_in: chrono::Duration) -> (ApiClient, Arc<MemoryStore>) {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "ada@example.com".into(),
            exp: (Utc::now() + expires_in).timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"any")).unwrap();
        let store = Arc::new(MemoryStore::new());
        write_json(store.as_ref(), AUTH_TOKEN_KEY, &token).unwrap();
        (ApiClient::new("http://127.0.0.1:9", store.clone()), store)
    }

    #[tokio::test(start_paused = true)]
    async fn signs_out_a_minute_before_expiry() {
        let (client, store) = signed_in(chrono::Duration::minutes(5));
        let timer = LogoutTimer::arm(client.clone()).unwrap();
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_secs(3 * 60 + 50)).await;
        assert!(store.get(AUTH_TOKEN_KEY).unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(store.get(AUTH_TOKEN_KEY).unwrap().is_none());
        assert!(!timer.is_armed());
    }

    #[tokio::test]
    async fn token_inside_the_margin_signs_out_now() {
        let (client, store) = signed_in(chrono::Duration::seconds(30));
        let timer = LogoutTimer::arm(client).unwrap();
        assert!(!timer.is_armed());
        assert!(store.get(AUTH_TOKEN_KEY).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_leaves_the_session() {
        let (client, store) = signed_in(chrono::Duration::minutes(5));
        let mut timer = LogoutTimer::arm(client).unwrap();
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert!(store.get(AUTH_TOKEN_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn nothing_armed_without_a_session() {
        let store = Arc::new(MemoryStore::new());
        let client = ApiClient::new("http://127.0.0.1:9", store);
        assert!(!LogoutTimer::arm(client.clone()).unwrap().is_armed());
        assert!(!client.is_authenticated().unwrap());
    }

    #[test]
    fn expired_or_garbage_tokens_are_not_authenticated() {
        let (client, store) = signed_in(chrono::Duration::minutes(-1));
        assert!(client.token_expiry().unwrap().is_some());
        assert!(!client.is_authenticated().unwrap());
        assert!(store.get(AUTH_TOKEN_KEY).unwrap().is_none());

        let (client, store) = signed_in(chrono::Duration::hours(1));
        assert!(client.is_authenticated().unwrap());
        write_json(store.as_ref(), AUTH_TOKEN_KEY, &"not-a-jwt").unwrap();
        assert!(!client.is_authenticated().unwrap());
        assert!(store.get(AUTH_TOKEN_KEY).unwrap().is_none());
    }
}
