//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the medminder-types API models; `into_*` does the parsing.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use medminder_types::models::{Dose, DoseStatus, Medication, User};

pub struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub dob: Option<String>,
    pub gender: String,
    pub is_email_verified: bool,
    pub created_at: String,
}

pub struct MedicationRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub dosage: String,
    pub instruction: String,
    pub reminder_times: String,
    pub start_date: String,
    pub days_of_week: String,
    pub notified_today: bool,
    pub created_at: String,
}

pub struct DoseRow {
    pub id: String,
    pub medication_id: String,
    pub user_id: String,
    pub scheduled_time: String,
    pub status: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            dob: self.dob.as_deref().map(parse_date).transpose()?,
            created_at: parse_sqlite_timestamp(&self.created_at)?,
            full_name: self.full_name,
            email: self.email,
            phone_number: self.phone_number,
            gender: self.gender,
            is_email_verified: self.is_email_verified,
        })
    }
}

impl MedicationRow {
    pub fn into_medication(self) -> Result<Medication> {
        Ok(Medication {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            reminder_times: serde_json::from_str(&self.reminder_times)
                .with_context(|| format!("Corrupt reminder_times on medication '{}'", self.id))?,
            start_date: parse_date(&self.start_date)?,
            days_of_week: serde_json::from_str(&self.days_of_week)
                .with_context(|| format!("Corrupt days_of_week on medication '{}'", self.id))?,
            created_at: parse_sqlite_timestamp(&self.created_at)?,
            notified_today: self.notified_today,
            name: self.name,
            dosage: self.dosage,
            instruction: self.instruction,
        })
    }
}

impl DoseRow {
    pub fn into_dose(self) -> Result<Dose> {
        Ok(Dose {
            id: parse_uuid(&self.id)?,
            medication_id: parse_uuid(&self.medication_id)?,
            user_id: parse_uuid(&self.user_id)?,
            scheduled_time: DateTime::<FixedOffset>::parse_from_rfc3339(&self.scheduled_time)
                .with_context(|| format!("Corrupt scheduled_time on dose '{}'", self.id))?,
            status: DoseStatus::parse(&self.status)
                .with_context(|| format!("Corrupt status '{}' on dose '{}'", self.status, self.id))?,
            created_at: parse_sqlite_timestamp(&self.created_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("Corrupt id '{}'", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Corrupt date '{}'", s))
}

/// SQLite `datetime('now')` yields "YYYY-MM-DD HH:MM:SS" in UTC without a zone.
fn parse_sqlite_timestamp(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .with_context(|| format!("Corrupt timestamp '{}'", s))
}
