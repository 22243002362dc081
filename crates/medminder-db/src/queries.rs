use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use uuid::Uuid;

use medminder_types::models::{Dose, DoseStatus, Medication, User};

use crate::Database;
use crate::models::{DoseRow, MedicationRow, UserRow};

const USER_COLUMNS: &str = "id, full_name, email, phone_number, password, dob, gender, is_email_verified, created_at";
const MEDICATION_COLUMNS: &str = "id, user_id, name, dosage, instruction, reminder_times, start_date, days_of_week, notified_today, created_at";
const DOSE_COLUMNS: &str = "id, medication_id, user_id, scheduled_time, status, created_at";

pub struct NewUser<'a> {
    pub id: Uuid,
    pub full_name: &'a str,
    pub email: &'a str,
    pub phone_number: &'a str,
    pub password_hash: &'a str,
    pub dob: Option<NaiveDate>,
    pub gender: &'a str,
}

/// Result of a dose status change.
#[derive(Debug)]
pub enum DoseUpdate {
    Updated(Dose),
    NotFound,
    /// The dose exists but its current status does not allow the change.
    Rejected { current: DoseStatus },
}

impl Database {
    // -- Users --

    /// Insert a user. Returns false when the email is already registered.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, full_name, email, phone_number, password, dob, gender)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id.to_string(),
                    user.full_name,
                    user.email,
                    user.phone_number,
                    user.password_hash,
                    user.dob.map(|d| d.format("%Y-%m-%d").to_string()),
                    user.gender,
                ],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Returns the user together with the stored password hash.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let row = self.with_conn(|conn| query_user(conn, "email", email))?;
        row.map(|r| {
            let hash = r.password.clone();
            r.into_user().map(|u| (u, hash))
        })
        .transpose()
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))?
            .map(UserRow::into_user)
            .transpose()
    }

    /// Returns false when the user does not exist or was already verified.
    pub fn mark_email_verified(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_email_verified = 1 WHERE id = ?1 AND is_email_verified = 0",
                [id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                params![password_hash, id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Medications --

    pub fn insert_medication(&self, med: &Medication) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO medications (id, user_id, name, dosage, instruction, reminder_times, start_date, days_of_week, notified_today, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    med.id.to_string(),
                    med.user_id.to_string(),
                    med.name,
                    med.dosage,
                    med.instruction,
                    serde_json::to_string(&med.reminder_times)?,
                    med.start_date.format("%Y-%m-%d").to_string(),
                    serde_json::to_string(&med.days_of_week)?,
                    med.notified_today,
                    med.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_medications(&self, user_id: Uuid) -> Result<Vec<Medication>> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEDICATION_COLUMNS} FROM medications WHERE user_id = ?1 ORDER BY created_at, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], map_medication)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(MedicationRow::into_medication).collect()
    }

    /// Fetch a medication only if `user_id` owns it.
    pub fn get_medication(&self, user_id: Uuid, id: Uuid) -> Result<Option<Medication>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1 AND user_id = ?2");
            let row = conn
                .query_row(&sql, [id.to_string(), user_id.to_string()], map_medication)
                .optional()?;
            Ok(row)
        })?
        .map(MedicationRow::into_medication)
        .transpose()
    }

    /// Overwrite the mutable fields. Returns false when no owned row matched.
    pub fn update_medication(&self, med: &Medication) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE medications
                 SET name = ?1, dosage = ?2, instruction = ?3, reminder_times = ?4,
                     start_date = ?5, days_of_week = ?6
                 WHERE id = ?7 AND user_id = ?8",
                params![
                    med.name,
                    med.dosage,
                    med.instruction,
                    serde_json::to_string(&med.reminder_times)?,
                    med.start_date.format("%Y-%m-%d").to_string(),
                    serde_json::to_string(&med.days_of_week)?,
                    med.id.to_string(),
                    med.user_id.to_string(),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_medication(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM medications WHERE id = ?1 AND user_id = ?2",
                [id.to_string(), user_id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Medications that have started by `as_of` and list `day` among their
    /// weekdays. Minute matching is left to the caller.
    pub fn find_active_on(&self, day: &str, as_of: NaiveDate) -> Result<Vec<Medication>> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEDICATION_COLUMNS} FROM medications m
                 WHERE m.start_date <= ?1
                   AND EXISTS (SELECT 1 FROM json_each(m.days_of_week) WHERE json_each.value = ?2)
                 ORDER BY m.created_at, m.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![as_of.format("%Y-%m-%d").to_string(), day], map_medication)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(MedicationRow::into_medication).collect()
    }

    // -- Doses --

    pub fn insert_dose(
        &self,
        medication_id: Uuid,
        user_id: Uuid,
        scheduled_time: DateTime<FixedOffset>,
        status: DoseStatus,
    ) -> Result<Dose> {
        let id = Uuid::new_v4();
        let row = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO doses (id, medication_id, user_id, scheduled_time, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    medication_id.to_string(),
                    user_id.to_string(),
                    scheduled_time.to_rfc3339(),
                    status.as_str(),
                ],
            )?;
            query_dose(conn, &id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("Dose {} vanished after insert", id))
        })?;
        row.into_dose()
    }

    pub fn get_dose(&self, id: Uuid) -> Result<Option<Dose>> {
        self.with_conn(|conn| query_dose(conn, &id.to_string()))?
            .map(DoseRow::into_dose)
            .transpose()
    }

    /// Newest first by instant, optionally filtered by status. Stored times
    /// keep their original offset, so ordering goes through julianday().
    pub fn list_doses(&self, user_id: Uuid, status: Option<DoseStatus>) -> Result<Vec<Dose>> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {DOSE_COLUMNS} FROM doses
                 WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY julianday(scheduled_time) DESC, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id.to_string(), status.map(|s| s.as_str())], map_dose)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(DoseRow::into_dose).collect()
    }

    /// Apply a status change to a dose owned by `user_id`, enforcing the
    /// pending -> taken/skipped transition rule under the connection lock.
    pub fn update_dose_status(&self, user_id: Uuid, id: Uuid, next: DoseStatus) -> Result<DoseUpdate> {
        self.with_conn(|conn| {
            let Some(row) = query_dose(conn, &id.to_string())? else {
                return Ok(DoseUpdate::NotFound);
            };
            if row.user_id != user_id.to_string() {
                return Ok(DoseUpdate::NotFound);
            }
            let dose = row.into_dose()?;
            if !dose.status.can_transition_to(next) {
                return Ok(DoseUpdate::Rejected { current: dose.status });
            }

            conn.execute(
                "UPDATE doses SET status = ?1 WHERE id = ?2",
                params![next.as_str(), id.to_string()],
            )?;
            Ok(DoseUpdate::Updated(Dose { status: next, ..dose }))
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                full_name: row.get(1)?,
                email: row.get(2)?,
                phone_number: row.get(3)?,
                password: row.get(4)?,
                dob: row.get(5)?,
                gender: row.get(6)?,
                is_email_verified: row.get(7)?,
                created_at: row.get(8)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_dose(conn: &Connection, id: &str) -> Result<Option<DoseRow>> {
    let sql = format!("SELECT {DOSE_COLUMNS} FROM doses WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], map_dose).optional()?)
}

fn map_medication(row: &Row<'_>) -> rusqlite::Result<MedicationRow> {
    Ok(MedicationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        dosage: row.get(3)?,
        instruction: row.get(4)?,
        reminder_times: row.get(5)?,
        start_date: row.get(6)?,
        days_of_week: row.get(7)?,
        notified_today: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_dose(row: &Row<'_>) -> rusqlite::Result<DoseRow> {
    Ok(DoseRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        user_id: row.get(2)?,
        scheduled_time: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}
