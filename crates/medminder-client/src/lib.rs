//! Client side of MedMinder: a typed API client plus an offline reminder list
//! kept in local storage.

pub mod alerts;
pub mod api;
pub mod error;
pub mod mirror;
pub mod preferences;
pub mod session;
pub mod storage;

pub use alerts::{AlertScheduler, AlertSink, PlannedAlert, plan_app_alerts};
pub use api::{ApiClient, MedicationSource};
pub use error::ClientError;
pub use mirror::{Reminder, ReminderMirror, ReminderStatus, reminder_status};
pub use preferences::{NotificationPreference, Preferences, UserContact};
pub use session::LogoutTimer;
pub use storage::{FileStore, LocalStore, MemoryStore};
