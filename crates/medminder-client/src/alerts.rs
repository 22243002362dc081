//! Local "time to take" alerts, fired ahead of each reminder by the user's
//! configured offset.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use medminder_types::models::Medication;

use crate::mirror::Reminder;
use crate::preferences::NotificationPreference;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAlert {
    pub reminder_id: String,
    pub medication_id: Uuid,
    /// Local wall-clock time.
    pub fire_at: NaiveDateTime,
    pub title: String,
    pub body: String,
}

/// Receives alerts as they fire.
pub trait AlertSink: Send + Sync + 'static {
    fn deliver(&self, alert: &PlannedAlert);
}

/// One alert per reminder whose medication is known, firing `offset` minutes
/// before the reminder. Nothing is planned when app alerts are off, and
/// alerts whose moment has passed are dropped.
pub fn plan_app_alerts(
    reminders: &[Reminder],
    medications: &[Medication],
    prefs: &NotificationPreference,
    now: NaiveDateTime,
) -> Vec<PlannedAlert> {
    if !prefs.app {
        return Vec::new();
    }

    let by_id: HashMap<Uuid, &Medication> = medications.iter().map(|m| (m.id, m)).collect();
    let offset = Duration::minutes(i64::from(prefs.reminder_offset_minutes));

    reminders
        .iter()
        .filter_map(|reminder| {
            let med = by_id.get(&reminder.medication_id)?;
            let fire_at = reminder.due_at()? - offset;
            (fire_at > now).then(|| PlannedAlert {
                reminder_id: reminder.id.clone(),
                medication_id: med.id,
                fire_at,
                title: format!("Time to take {}", med.name),
                body: format!("Dosage: {}, Instructions: {}", med.dosage, med.instruction),
            })
        })
        .collect()
}

/// Arms one-shot timers for planned alerts. Dropping the scheduler cancels
/// whatever has not fired yet.
pub struct AlertScheduler {
    sink: Arc<dyn AlertSink>,
    timers: Vec<JoinHandle<()>>,
}

impl AlertScheduler {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            sink,
            timers: Vec::new(),
        }
    }

    /// Arm a timer per alert, measured from `now`.
    pub fn schedule(&mut self, alerts: Vec<PlannedAlert>, now: NaiveDateTime) {
        self.timers.retain(|t| !t.is_finished());

        for alert in alerts {
            let Ok(delay) = (alert.fire_at - now).to_std() else {
                debug!("Alert for {} is already due; not arming", alert.reminder_id);
                continue;
            };
            let sink = self.sink.clone();
            self.timers.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                sink.deliver(&alert);
            }));
        }
        debug!("{} alert timers armed", self.timers.len());
    }

    pub fn armed(&self) -> usize {
        self.timers.iter().filter(|t| !t.is_finished()).count()
    }

    pub fn cancel_all(&mut self) {
        let pending = self.armed();
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        if pending > 0 {
            info!("Cancelled {} pending alerts", pending);
        }
    }
}

impl Drop for AlertScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
