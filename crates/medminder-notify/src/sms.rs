use tracing::info;

use crate::NotifyError;

pub const KUDI_SMS_DEFAULT_URL: &str = "https://my.kudisms.net/api/sms";

/// KudiSMS bulk API. Credentials travel as query parameters.
#[derive(Debug, Clone)]
pub struct KudiSmsConfig {
    pub url: String,
    pub token: String,
    pub sender_id: String,
}

#[derive(Debug, Clone)]
pub enum SmsTransport {
    KudiSms(KudiSmsConfig),
    Log,
}

impl SmsTransport {
    pub fn name(&self) -> &'static str {
        match self {
            Self::KudiSms(_) => "kudisms",
            Self::Log => "log",
        }
    }

    pub(crate) async fn send(
        &self,
        client: &reqwest::Client,
        to: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        match self {
            Self::Log => {
                info!("SMS (log only) to {}: {}", to, body);
                Ok(())
            }
            Self::KudiSms(config) => {
                let response = client
                    .get(&config.url)
                    .query(&[
                        ("token", config.token.as_str()),
                        ("senderID", config.sender_id.as_str()),
                        ("recipients", to),
                        ("message", body),
                    ])
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
