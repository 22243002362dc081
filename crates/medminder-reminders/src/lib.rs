//! Reminder matching and its minute scheduler.
//!
//! Every minute the scheduler asks the [`ReminderMatcher`] to sweep: find the
//! medications due at the current local minute, notify their owners by email
//! and SMS, and record a pending dose. Each of those three side effects is
//! attempted independently and reported in a [`SweepReport`].

pub mod directory;
pub mod matcher;
pub mod message;
pub mod report;
pub mod scheduler;

pub use directory::{DoseLedger, MedicationDirectory, UserDirectory};
pub use matcher::ReminderMatcher;
pub use report::{Channel, Delivery, Outcome, SweepReport};
pub use scheduler::ReminderScheduler;
