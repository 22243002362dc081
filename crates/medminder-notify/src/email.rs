use serde::Serialize;
use tracing::info;

use crate::NotifyError;

/// JSON mail relay (any provider exposing a "send" endpoint with a bearer key).
#[derive(Debug, Clone)]
pub struct MailApiConfig {
    pub url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub enum EmailTransport {
    MailApi(MailApiConfig),
    Log,
}

#[derive(Serialize)]
struct MailApiRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl EmailTransport {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MailApi(_) => "mail-api",
            Self::Log => "log",
        }
    }

    pub(crate) async fn send(
        &self,
        client: &reqwest::Client,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        match self {
            Self::Log => {
                info!("Email (log only) to {}: {} - {}", to, subject, body);
                Ok(())
            }
            Self::MailApi(config) => {
                let response = client
                    .post(&config.url)
                    .bearer_auth(&config.api_key)
                    .json(&MailApiRequest {
                        from: &config.from,
                        to,
                        subject,
                        text: body,
                    })
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(NotifyError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }
                Ok(())
            }
        }
    }
}
