use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of a user. The password hash never leaves the db crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub dob: Option<NaiveDate>,
    pub gender: String,
    #[serde(default)]
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A prescribed drug schedule owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub instruction: String,
    /// `HH:mm`, 24-hour, e.g. `["08:00", "20:00"]`.
    pub reminder_times: Vec<String>,
    pub start_date: NaiveDate,
    /// Full weekday names, e.g. `["Monday", "Thursday"]`.
    pub days_of_week: Vec<String>,
    #[serde(default)]
    pub notified_today: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Pending,
    Taken,
    Skipped,
}

impl DoseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Taken => "taken",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "taken" => Some(Self::Taken),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Only pending doses move, and only to a final state.
    pub fn can_transition_to(&self, next: DoseStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Taken) | (Self::Pending, Self::Skipped)
        )
    }
}

impl std::fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instance of a medication being due.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dose {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub user_id: Uuid,
    pub scheduled_time: DateTime<FixedOffset>,
    pub status: DoseStatus,
    pub created_at: DateTime<Utc>,
}
