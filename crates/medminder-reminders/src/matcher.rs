use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use medminder_db::Database;
use medminder_notify::Notifier;
use medminder_types::models::{DoseStatus, Medication, User};
use medminder_types::schedule::{format_hhmm, matches_time, weekday_name};

use crate::directory::{DoseLedger, MedicationDirectory, UserDirectory};
use crate::message::{EMAIL_SUBJECT, email_body, sms_body};
use crate::report::{Channel, SweepReport};

/// Finds due medications and fans out their reminders.
#[derive(Clone)]
pub struct ReminderMatcher {
    medications: Arc<dyn MedicationDirectory>,
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn DoseLedger>,
    notifier: Arc<dyn Notifier>,
}

impl ReminderMatcher {
    pub fn new(
        medications: Arc<dyn MedicationDirectory>,
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn DoseLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            medications,
            users,
            ledger,
            notifier,
        }
    }

    pub fn from_database(db: Arc<Database>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(db.clone(), db.clone(), db, notifier)
    }

    /// Run one sweep at `now`. Matching uses the wall-clock minute and weekday
    /// in `now`'s offset. Never fails: every error ends up in the log and the
    /// returned report.
    pub async fn run_sweep(&self, now: DateTime<FixedOffset>) -> SweepReport {
        let current_time = format_hhmm(now.time());
        let current_day = weekday_name(now.weekday());
        let mut report = SweepReport::new(now, current_time.clone(), current_day.to_string());

        let medications = match self.find_active(current_day, now.date_naive()).await {
            Ok(meds) => meds,
            Err(e) => {
                error!("Reminder sweep at {} {} aborted: {:#}", current_day, current_time, e);
                report.error = Some(format!("{:#}", e));
                return report;
            }
        };
        report.medications_considered = medications.len();

        for med in medications.iter().filter(|m| matches_time(m, &current_time)) {
            report.medications_due += 1;
            self.remind(med, now, &current_time, current_day, &mut report).await;
        }

        if report.medications_due > 0 {
            info!(
                "Reminder sweep {} {}: {} due, {} deliveries, {} failed, {} missing users",
                current_day,
                current_time,
                report.medications_due,
                report.deliveries.len(),
                report.failures(),
                report.missing_users.len()
            );
        } else {
            debug!(
                "Reminder sweep {} {}: nothing due ({} active today)",
                current_day, current_time, report.medications_considered
            );
        }
        report
    }

    async fn remind(
        &self,
        med: &Medication,
        now: DateTime<FixedOffset>,
        time: &str,
        day: &str,
        report: &mut SweepReport,
    ) {
        info!("Processing reminder for {} ({}) at {} on {}", med.name, med.dosage, time, day);

        let user = match self.find_user(med.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("User {} not found for medication {}; skipping reminder", med.user_id, med.id);
                report.missing_users.push(med.user_id);
                return;
            }
            Err(e) => {
                warn!("Lookup of user {} failed for medication {}: {:#}; skipping reminder", med.user_id, med.id, e);
                report.missing_users.push(med.user_id);
                return;
            }
        };

        let email = self
            .notifier
            .send_email(&user.email, EMAIL_SUBJECT, &email_body(med, time, day))
            .await;
        match &email {
            Ok(()) => info!("Email reminder sent for {} to {}", med.name, user.email),
            Err(e) => error!("Failed to send email reminder for {} to {}: {}", med.name, user.email, e),
        }
        report.record(med.id, Channel::Email, email.map_err(|e| e.to_string()));

        let sms = self.notifier.send_sms(&user.phone_number, &sms_body(med, time, day)).await;
        match &sms {
            Ok(()) => info!("SMS reminder sent for {} to {}", med.name, user.phone_number),
            Err(e) => error!("Failed to send SMS reminder for {} to {}: {}", med.name, user.phone_number, e),
        }
        report.record(med.id, Channel::Sms, sms.map_err(|e| e.to_string()));

        let dose = self.create_dose(med.id, med.user_id, now).await;
        match &dose {
            Ok(()) => info!("Dose entry created for {}", med.name),
            Err(e) => error!("Failed to create dose entry for {}: {:#}", med.name, e),
        }
        report.record(med.id, Channel::Ledger, dose.map_err(|e| format!("{:#}", e)));
    }

    async fn find_active(&self, day: &str, as_of: NaiveDate) -> anyhow::Result<Vec<Medication>> {
        let medications = self.medications.clone();
        let day = day.to_string();
        blocking(move || medications.find_active_on(&day, as_of)).await
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.clone();
        blocking(move || users.find_by_owner_id(id)).await
    }

    async fn create_dose(
        &self,
        medication_id: Uuid,
        owner_id: Uuid,
        scheduled_time: DateTime<FixedOffset>,
    ) -> anyhow::Result<()> {
        let ledger = self.ledger.clone();
        blocking(move || {
            ledger
                .create_dose(medication_id, owner_id, scheduled_time, DoseStatus::Pending)
                .map(|_| ())
        })
        .await
    }
}

/// Run a blocking store call off the async runtime.
async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
}
