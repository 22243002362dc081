//! Client-side reminder list.
//!
//! Once per local calendar day the mirror derives that day's reminders from
//! the medication list, using the same schedule rules as the server sweep, and
//! keeps them in the local store. Taken/skipped marks are local only.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use medminder_types::clock::Clock;
use medminder_types::models::Medication;
use medminder_types::schedule::{format_hhmm, is_due_on, weekday_name};

use crate::api::MedicationSource;
use crate::error::ClientError;
use crate::storage::{LAST_GENERATED_KEY, LocalStore, REMINDERS_KEY, read_json, write_json};

/// One reminder instance for a medication on a date at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// `{medicationId}-{YYYY-MM-DD}-{HH:mm}`
    pub id: String,
    pub medication_id: Uuid,
    pub time: String,
    pub date: NaiveDate,
    pub taken: bool,
    pub skipped: bool,
    #[serde(default)]
    pub notes: String,
}

impl Reminder {
    pub fn new(medication_id: Uuid, date: NaiveDate, time: &str) -> Self {
        Self {
            id: reminder_id(medication_id, date, time),
            medication_id,
            time: time.to_string(),
            date,
            taken: false,
            skipped: false,
            notes: String::new(),
        }
    }

    /// Date and time combined, if the time is well formed.
    pub fn due_at(&self) -> Option<NaiveDateTime> {
        NaiveTime::parse_from_str(&self.time, "%H:%M")
            .ok()
            .map(|t| self.date.and_time(t))
    }
}

pub fn reminder_id(medication_id: Uuid, date: NaiveDate, time: &str) -> String {
    format!("{}-{}-{}", medication_id, date.format("%Y-%m-%d"), time)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Taken,
    Skipped,
    Overdue,
    Pending,
}

/// Taken and skipped win; otherwise a reminder whose moment has arrived is
/// overdue.
pub fn reminder_status(reminder: &Reminder, now: NaiveDateTime) -> ReminderStatus {
    if reminder.taken {
        ReminderStatus::Taken
    } else if reminder.skipped {
        ReminderStatus::Skipped
    } else if reminder.due_at().is_some_and(|due| due <= now) {
        ReminderStatus::Overdue
    } else {
        ReminderStatus::Pending
    }
}

#[derive(Clone)]
pub struct ReminderMirror {
    store: Arc<dyn LocalStore>,
    source: Arc<dyn MedicationSource>,
    clock: Arc<dyn Clock>,
}

impl ReminderMirror {
    pub fn new(store: Arc<dyn LocalStore>, source: Arc<dyn MedicationSource>, clock: Arc<dyn Clock>) -> Self {
        Self { store, source, clock }
    }

    /// Make sure today's reminders exist. Returns the reminders created by this
    /// call, or today's existing ones when generation was not needed.
    ///
    /// Generation happens at most once per day: after a run that found
    /// medications, the day is marked done even if none were due.
    pub async fn ensure_today_reminders(&self) -> Result<Vec<Reminder>, ClientError> {
        let today = self.today();
        let all = self.get_reminders()?;
        let todays: Vec<Reminder> = all.iter().filter(|r| r.date == today).cloned().collect();
        if !todays.is_empty() {
            return Ok(todays);
        }

        let marker: Option<NaiveDate> = read_json(self.store.as_ref(), LAST_GENERATED_KEY)?;
        if marker == Some(today) {
            debug!("Reminders for {} already generated", today);
            return Ok(todays);
        }

        let medications = self.source.medications().await?;
        if medications.is_empty() {
            debug!("No medications; skipping reminder generation for {}", today);
            return Ok(todays);
        }

        let created = generate_reminders(&medications, today, &all);
        let mut merged = all;
        merged.extend(created.iter().cloned());
        write_json(self.store.as_ref(), REMINDERS_KEY, &merged)?;
        write_json(self.store.as_ref(), LAST_GENERATED_KEY, &today)?;

        info!("Generated {} reminders for {}", created.len(), today);
        Ok(created)
    }

    /// Everything in the store. Corrupt data is cleared and reads as empty.
    pub fn get_reminders(&self) -> Result<Vec<Reminder>, ClientError> {
        Ok(read_json(self.store.as_ref(), REMINDERS_KEY)?.unwrap_or_default())
    }

    /// Today's reminders ordered by time.
    pub fn today_reminders(&self) -> Result<Vec<Reminder>, ClientError> {
        let today = self.today();
        let mut todays: Vec<Reminder> = self
            .get_reminders()?
            .into_iter()
            .filter(|r| r.date == today)
            .collect();
        todays.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(todays)
    }

    /// Today's unhandled reminders from the current minute on.
    pub fn upcoming_reminders(&self) -> Result<Vec<Reminder>, ClientError> {
        let now = self.clock.now();
        let current = format_hhmm(now.time());
        Ok(self
            .today_reminders()?
            .into_iter()
            .filter(|r| !r.taken && !r.skipped && r.time >= current)
            .collect())
    }

    pub fn status(&self, reminder: &Reminder) -> ReminderStatus {
        reminder_status(reminder, self.clock.now().naive_local())
    }

    /// Set both flags on the reminder with `id`. Returns false if no such
    /// reminder is stored.
    pub fn update_reminder_status(&self, id: &str, taken: bool, skipped: bool) -> Result<bool, ClientError> {
        let mut all = self.get_reminders()?;
        let Some(reminder) = all.iter_mut().find(|r| r.id == id) else {
            warn!("Reminder {} not found; status unchanged", id);
            return Ok(false);
        };
        reminder.taken = taken;
        reminder.skipped = skipped;
        write_json(self.store.as_ref(), REMINDERS_KEY, &all)?;
        Ok(true)
    }

    pub fn mark_taken(&self, id: &str) -> Result<Vec<Reminder>, ClientError> {
        self.update_reminder_status(id, true, false)?;
        self.today_reminders()
    }

    pub fn mark_skipped(&self, id: &str) -> Result<Vec<Reminder>, ClientError> {
        self.update_reminder_status(id, false, true)?;
        self.today_reminders()
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }
}

/// New reminders for `date`, skipping ids already in `existing`.
fn generate_reminders(medications: &[Medication], date: NaiveDate, existing: &[Reminder]) -> Vec<Reminder> {
    let weekday = weekday_name(date.weekday());
    let mut seen: HashSet<String> = existing.iter().map(|r| r.id.clone()).collect();
    let mut created = Vec::new();

    for med in medications.iter().filter(|m| is_due_on(m, date, weekday)) {
        for time in &med.reminder_times {
            let reminder = Reminder::new(med.id, date, time);
            if !seen.insert(reminder.id.clone()) {
                continue;
            }
            debug!("New reminder: {} at {}", med.name, time);
            created.push(reminder);
        }
    }
    created
}
