#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use medminder_notify::{Notifier, NotifyError};
use medminder_reminders::{DoseLedger, MedicationDirectory, ReminderMatcher, UserDirectory};
use medminder_types::clock::Clock;
use medminder_types::models::{Dose, DoseStatus, Medication, User};
use medminder_types::schedule::is_due_on;

pub fn tz() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap()
}

/// 2024-01-01 is a Monday.
pub fn monday_at(h: u32, m: u32) -> DateTime<FixedOffset> {
    tz().with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn user(email: &str, phone: &str) -> User {
    User {
        id: Uuid::new_v4(),
        full_name: "Chidi Okeke".into(),
        email: email.into(),
        phone_number: phone.into(),
        dob: None,
        gender: "male".into(),
        is_email_verified: true,
        created_at: Utc::now(),
    }
}

pub fn medication(owner: Uuid, times: &[&str], days: &[&str], start: NaiveDate) -> Medication {
    Medication {
        id: Uuid::new_v4(),
        user_id: owner,
        name: "Metformin".into(),
        dosage: "500mg".into(),
        instruction: "with food".into(),
        reminder_times: times.iter().map(|s| s.to_string()).collect(),
        start_date: start,
        days_of_week: days.iter().map(|s| s.to_string()).collect(),
        notified_today: false,
        created_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    pub medications: Mutex<Vec<Medication>>,
    pub fail: AtomicBool,
    pub queries: AtomicUsize,
}

impl MemoryDirectory {
    pub fn with(medications: Vec<Medication>) -> Self {
        Self {
            medications: Mutex::new(medications),
            ..Default::default()
        }
    }
}

impl MedicationDirectory for MemoryDirectory {
    fn find_active_on(&self, day: &str, as_of: NaiveDate) -> anyhow::Result<Vec<Medication>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("directory unavailable");
        }
        Ok(self
            .medications
            .lock()
            .unwrap()
            .iter()
            .filter(|m| is_due_on(m, as_of, day))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    pub users: HashMap<Uuid, User>,
}

impl MemoryUsers {
    pub fn with(users: Vec<User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }
}

impl UserDirectory for MemoryUsers {
    fn find_by_owner_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    pub doses: Mutex<Vec<Dose>>,
    pub attempts: AtomicUsize,
    /// Fail writes for this medication only.
    pub fail_for: Mutex<Option<Uuid>>,
}

impl MemoryLedger {
    pub fn doses_for(&self, medication_id: Uuid) -> Vec<Dose> {
        self.doses
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.medication_id == medication_id)
            .cloned()
            .collect()
    }
}

impl DoseLedger for MemoryLedger {
    fn create_dose(
        &self,
        medication_id: Uuid,
        owner_id: Uuid,
        scheduled_time: DateTime<FixedOffset>,
        status: DoseStatus,
    ) -> anyhow::Result<Dose> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_for.lock().unwrap() == Some(medication_id) {
            anyhow::bail!("ledger write failed");
        }
        let dose = Dose {
            id: Uuid::new_v4(),
            medication_id,
            user_id: owner_id,
            scheduled_time,
            status,
            created_at: Utc::now(),
        };
        self.doses.lock().unwrap().push(dose.clone());
        Ok(dose)
    }
}

/// Records every attempt, including ones it was told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub emails: Mutex<Vec<(String, String, String)>>,
    pub sms: Mutex<Vec<(String, String)>>,
    pub fail_email_to: Mutex<Option<String>>,
    pub fail_sms: AtomicBool,
}

impl RecordingNotifier {
    pub fn email_count(&self) -> usize {
        self.emails.lock().unwrap().len()
    }

    pub fn sms_count(&self) -> usize {
        self.sms.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.emails
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        if self.fail_email_to.lock().unwrap().as_deref() == Some(to) {
            return Err(NotifyError::InvalidRecipient(to.to_string()));
        }
        Ok(())
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        self.sms.lock().unwrap().push((to.to_string(), body.to_string()));
        if self.fail_sms.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "gateway down".into(),
            });
        }
        Ok(())
    }
}

/// Parks inside `send_email` until released, so a sweep can be held open.
pub struct GatedNotifier {
    pub entered: Notify,
    pub release: Semaphore,
    pub inner: RecordingNotifier,
}

impl GatedNotifier {
    pub fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
            inner: RecordingNotifier::default(),
        }
    }
}

#[async_trait]
impl Notifier for GatedNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
        self.inner.send_email(to, subject, body).await
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        self.inner.send_sms(to, body).await
    }
}

/// Wall clock derived from tokio's (pausable) clock.
pub struct TokioClock {
    base: DateTime<FixedOffset>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(base: DateTime<FixedOffset>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.base + chrono::Duration::from_std(self.start.elapsed()).unwrap()
    }
}

pub struct Harness {
    pub directory: Arc<MemoryDirectory>,
    pub users: Arc<MemoryUsers>,
    pub ledger: Arc<MemoryLedger>,
    pub notifier: Arc<RecordingNotifier>,
    pub matcher: ReminderMatcher,
}

pub fn harness(medications: Vec<Medication>, users: Vec<User>) -> Harness {
    let directory = Arc::new(MemoryDirectory::with(medications));
    let users = Arc::new(MemoryUsers::with(users));
    let ledger = Arc::new(MemoryLedger::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let matcher = ReminderMatcher::new(
        directory.clone(),
        users.clone(),
        ledger.clone(),
        notifier.clone(),
    );
    Harness {
        directory,
        users,
        ledger,
        notifier,
        matcher,
    }
}
