use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use uuid::Uuid;

use medminder_db::Database;
use medminder_types::models::{Dose, DoseStatus, Medication, User};

/// Read side of the medication store, as seen by the sweep.
pub trait MedicationDirectory: Send + Sync {
    /// Medications started on or before `as_of` whose schedule includes `day`.
    fn find_active_on(&self, day: &str, as_of: NaiveDate) -> Result<Vec<Medication>>;
}

pub trait UserDirectory: Send + Sync {
    fn find_by_owner_id(&self, id: Uuid) -> Result<Option<User>>;
}

pub trait DoseLedger: Send + Sync {
    fn create_dose(
        &self,
        medication_id: Uuid,
        owner_id: Uuid,
        scheduled_time: DateTime<FixedOffset>,
        status: DoseStatus,
    ) -> Result<Dose>;
}

impl MedicationDirectory for Database {
    fn find_active_on(&self, day: &str, as_of: NaiveDate) -> Result<Vec<Medication>> {
        Database::find_active_on(self, day, as_of)
    }
}

impl UserDirectory for Database {
    fn find_by_owner_id(&self, id: Uuid) -> Result<Option<User>> {
        self.get_user_by_id(id)
    }
}

impl DoseLedger for Database {
    fn create_dose(
        &self,
        medication_id: Uuid,
        owner_id: Uuid,
        scheduled_time: DateTime<FixedOffset>,
        status: DoseStatus,
    ) -> Result<Dose> {
        self.insert_dose(medication_id, owner_id, scheduled_time, status)
    }
}
