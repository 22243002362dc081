use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use tracing::{info, warn};

use medminder_notify::sms::KUDI_SMS_DEFAULT_URL;
use medminder_notify::{EmailTransport, KudiSmsConfig, MailApiConfig, SmsTransport};

/// Secrets that ship in sample env files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["", "changeme", "change-me", "secret", "dev-secret-change-me"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Front-end base URL used in emailed account links.
    pub app_url: String,
    pub email_link_secret: String,
    pub reset_link_secret: String,
    pub email: EmailTransport,
    pub sms: SmsTransport,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    fn load(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("MEDMINDER_JWT_SECRET").context("MEDMINDER_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            bail!("MEDMINDER_JWT_SECRET is a placeholder; set a real secret");
        }

        let email_link_secret = link_secret(&var, "MEDMINDER_EMAIL_LINK_SECRET", &jwt_secret, "verify-email")?;
        let reset_link_secret = link_secret(&var, "MEDMINDER_RESET_LINK_SECRET", &jwt_secret, "reset-password")?;

        Ok(Self {
            host: try_load(&var, "MEDMINDER_HOST", "0.0.0.0")?,
            port: try_load(&var, "MEDMINDER_PORT", "8000")?,
            db_path: try_load(&var, "MEDMINDER_DB_PATH", "medminder.db")?,
            jwt_secret,
            token_ttl_hours: try_load(&var, "MEDMINDER_TOKEN_TTL_HOURS", "720")?,
            app_url: try_load(&var, "MEDMINDER_APP_URL", "http://localhost:8080")?,
            email_link_secret,
            reset_link_secret,
            email: email_transport(&var),
            sms: sms_transport(&var),
        })
    }
}

fn try_load<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value '{raw}': {e}"))
}

/// A dedicated secret for one kind of emailed link. Without one, a key is
/// derived from the session secret so the two never coincide.
fn link_secret(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    jwt_secret: &str,
    purpose: &str,
) -> anyhow::Result<String> {
    match var(key) {
        Some(secret) if PLACEHOLDER_SECRETS.contains(&secret.trim()) => {
            bail!("{key} is a placeholder; set a real secret")
        }
        Some(secret) if secret == jwt_secret => bail!("{key} must differ from MEDMINDER_JWT_SECRET"),
        Some(secret) => Ok(secret),
        None => {
            warn!("{key} not set; deriving it from MEDMINDER_JWT_SECRET");
            Ok(format!("{jwt_secret}:{purpose}"))
        }
    }
}

fn email_transport(var: &impl Fn(&str) -> Option<String>) -> EmailTransport {
    match (
        var("MEDMINDER_MAIL_API_URL"),
        var("MEDMINDER_MAIL_API_KEY"),
        var("MEDMINDER_MAIL_FROM"),
    ) {
        (Some(url), Some(api_key), Some(from)) => EmailTransport::MailApi(MailApiConfig { url, api_key, from }),
        _ => {
            warn!("Mail API not configured; email reminders will only be logged");
            EmailTransport::Log
        }
    }
}

fn sms_transport(var: &impl Fn(&str) -> Option<String>) -> SmsTransport {
    match (var("KUDI_SMS_API_TOKEN"), var("KUDI_SMS_SENDER")) {
        (Some(token), Some(sender_id)) => SmsTransport::KudiSms(KudiSmsConfig {
            url: var("KUDI_SMS_API_URL").unwrap_or_else(|| KUDI_SMS_DEFAULT_URL.to_string()),
            token,
            sender_id,
        }),
        _ => {
            warn!("KudiSMS not configured; SMS reminders will only be logged");
            SmsTransport::Log
        }
    }
}
