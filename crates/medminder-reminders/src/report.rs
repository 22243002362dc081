use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Ledger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Outcome {
    Sent,
    Failed { reason: String },
}

/// One attempted side effect for one due medication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub medication_id: Uuid,
    pub channel: Channel,
    pub outcome: Outcome,
}

/// What a single sweep did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub swept_at: DateTime<FixedOffset>,
    pub current_time: String,
    pub current_day: String,
    /// Medications returned by the directory for today.
    pub medications_considered: usize,
    /// Of those, how many matched the current minute.
    pub medications_due: usize,
    /// Owners that could not be resolved; their medications were skipped.
    pub missing_users: Vec<Uuid>,
    pub deliveries: Vec<Delivery>,
    /// Set when the sweep ended early.
    pub error: Option<String>,
}

impl SweepReport {
    pub fn new(swept_at: DateTime<FixedOffset>, current_time: String, current_day: String) -> Self {
        Self {
            swept_at,
            current_time,
            current_day,
            medications_considered: 0,
            medications_due: 0,
            missing_users: Vec::new(),
            deliveries: Vec::new(),
            error: None,
        }
    }

    pub fn record(&mut self, medication_id: Uuid, channel: Channel, result: Result<(), String>) {
        let outcome = match result {
            Ok(()) => Outcome::Sent,
            Err(reason) => Outcome::Failed { reason },
        };
        self.deliveries.push(Delivery {
            medication_id,
            channel,
            outcome,
        });
    }

    pub fn attempts(&self, medication_id: Uuid, channel: Channel) -> usize {
        self.deliveries
            .iter()
            .filter(|d| d.medication_id == medication_id && d.channel == channel)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| matches!(d.outcome, Outcome::Failed { .. }))
            .count()
    }
}
