use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use uuid::Uuid;

use medminder_client::storage::{LAST_GENERATED_KEY, REMINDERS_KEY};
use medminder_client::{ClientError, LocalStore, MedicationSource, MemoryStore, ReminderMirror, ReminderStatus};
use medminder_types::clock::FixedClock;
use medminder_types::models::Medication;

#[derive(Default)]
struct FakeSource {
    meds: Mutex<Vec<Medication>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FakeSource {
    fn with(meds: Vec<Medication>) -> Arc<Self> {
        Arc::new(Self {
            meds: Mutex::new(meds),
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MedicationSource for FakeSource {
    async fn medications(&self) -> Result<Vec<Medication>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(self.meds.lock().unwrap().clone())
    }
}

fn tz() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap()
}

/// 2024-01-01 is a Monday.
fn monday_at(h: u32, m: u32) -> DateTime<FixedOffset> {
    tz().with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn medication(times: &[&str], days: &[&str]) -> Medication {
    Medication {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        name: "Metformin".into(),
        dosage: "500mg".into(),
        instruction: "with food".into(),
        reminder_times: times.iter().map(|s| s.to_string()).collect(),
        start_date: NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
        days_of_week: days.iter().map(|s| s.to_string()).collect(),
        notified_today: false,
        created_at: chrono::Utc::now(),
    }
}

struct Setup {
    store: Arc<MemoryStore>,
    source: Arc<FakeSource>,
    clock: Arc<FixedClock>,
    mirror: ReminderMirror,
}

fn setup(meds: Vec<Medication>, now: DateTime<FixedOffset>) -> Setup {
    let store = Arc::new(MemoryStore::new());
    let source = FakeSource::with(meds);
    let clock = Arc::new(FixedClock::new(now));
    let mirror = ReminderMirror::new(store.clone(), source.clone(), clock.clone());
    Setup {
        store,
        source,
        clock,
        mirror,
    }
}

#[tokio::test]
async fn generates_todays_reminders_once() {
    let med = medication(&["20:00", "08:00"], &["Monday"]);
    let s = setup(vec![med.clone()], monday_at(7, 0));

    let created = s.mirror.ensure_today_reminders().await.unwrap();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|r| r.date == monday() && !r.taken && !r.skipped && r.notes.is_empty()));
    assert!(created.iter().any(|r| r.id == format!("{}-2024-01-01-08:00", med.id)));

    let again = s.mirror.ensure_today_reminders().await.unwrap();
    assert_eq!(again.len(), 2);
    assert_eq!(s.source.calls(), 1);
    assert_eq!(s.mirror.get_reminders().unwrap().len(), 2);

    let today = s.mirror.today_reminders().unwrap();
    assert_eq!(today[0].time, "08:00");
    assert_eq!(today[1].time, "20:00");
}

#[tokio::test]
async fn day_with_nothing_due_is_still_marked_done() {
    let s = setup(vec![medication(&["08:00"], &["Tuesday"])], monday_at(7, 0));

    assert!(s.mirror.ensure_today_reminders().await.unwrap().is_empty());
    assert!(s.mirror.ensure_today_reminders().await.unwrap().is_empty());
    assert_eq!(s.source.calls(), 1);
    assert_eq!(s.store.get(LAST_GENERATED_KEY).unwrap().as_deref(), Some("\"2024-01-01\""));
}

#[tokio::test]
async fn empty_medication_list_retries_later() {
    let s = setup(Vec::new(), monday_at(7, 0));

    assert!(s.mirror.ensure_today_reminders().await.unwrap().is_empty());
    assert!(s.store.get(LAST_GENERATED_KEY).unwrap().is_none());

    s.source.meds.lock().unwrap().push(medication(&["09:00"], &["Monday"]));
    assert_eq!(s.mirror.ensure_today_reminders().await.unwrap().len(), 1);
    assert_eq!(s.source.calls(), 2);
}

#[tokio::test]
async fn fetch_failure_writes_nothing() {
    let s = setup(vec![medication(&["08:00"], &["Monday"])], monday_at(7, 0));
    s.source.fail.store(true, Ordering::SeqCst);

    let err = s.mirror.ensure_today_reminders().await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 503, .. }));
    assert!(s.store.get(REMINDERS_KEY).unwrap().is_none());
    assert!(s.store.get(LAST_GENERATED_KEY).unwrap().is_none());
}

#[tokio::test]
async fn next_day_adds_without_dropping_history() {
    let s = setup(vec![medication(&["08:00", "20:00"], &["Monday", "Tuesday"])], monday_at(7, 0));
    s.mirror.ensure_today_reminders().await.unwrap();
    let first = s.mirror.today_reminders().unwrap();
    s.mirror.mark_taken(&first[0].id).unwrap();

    s.clock.advance(chrono::Duration::days(1));
    let created = s.mirror.ensure_today_reminders().await.unwrap();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|r| r.date == monday().succ_opt().unwrap()));

    let all = s.mirror.get_reminders().unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.iter().any(|r| r.id == first[0].id && r.taken));
}

#[tokio::test]
async fn marking_and_upcoming() {
    let s = setup(vec![medication(&["08:00", "12:00", "20:00"], &["Monday"])], monday_at(7, 0));
    s.mirror.ensure_today_reminders().await.unwrap();

    s.clock.set(monday_at(12, 0));
    let today = s.mirror.today_reminders().unwrap();
    assert_eq!(s.mirror.status(&today[0]), ReminderStatus::Overdue);
    assert_eq!(s.mirror.status(&today[1]), ReminderStatus::Overdue);
    assert_eq!(s.mirror.status(&today[2]), ReminderStatus::Pending);

    // 12:00 is still upcoming at 12:00
    let upcoming: Vec<String> = s.mirror.upcoming_reminders().unwrap().into_iter().map(|r| r.time).collect();
    assert_eq!(upcoming, vec!["12:00", "20:00"]);

    let after = s.mirror.mark_skipped(&today[1].id).unwrap();
    assert!(after[1].skipped && !after[1].taken);
    assert_eq!(s.mirror.status(&after[1]), ReminderStatus::Skipped);

    let after = s.mirror.mark_taken(&today[1].id).unwrap();
    assert!(after[1].taken && !after[1].skipped);

    let upcoming: Vec<String> = s.mirror.upcoming_reminders().unwrap().into_iter().map(|r| r.time).collect();
    assert_eq!(upcoming, vec!["20:00"]);

    assert!(!s.mirror.update_reminder_status("no-such-id", true, false).unwrap());
}

#[tokio::test]
async fn corrupt_reminders_are_cleared() {
    let s = setup(vec![medication(&["08:00"], &["Monday"])], monday_at(7, 0));
    s.store.set(REMINDERS_KEY, "[{\"id\": 42}]").unwrap();

    assert!(s.mirror.get_reminders().unwrap().is_empty());
    assert!(s.store.get(REMINDERS_KEY).unwrap().is_none());

    assert_eq!(s.mirror.ensure_today_reminders().await.unwrap().len(), 1);
}

#[tokio::test]
async fn late_evening_uses_the_local_date() {
    // 23:30 at -05:00 is already Tuesday in UTC
    let west = FixedOffset::west_opt(5 * 3600).unwrap();
    let now = west.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap();
    let s = setup(vec![medication(&["23:45"], &["Monday"])], now);

    let created = s.mirror.ensure_today_reminders().await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].date, monday());
}
