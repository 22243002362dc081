use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                full_name       TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE,
                phone_number    TEXT NOT NULL,
                password        TEXT NOT NULL,
                dob             TEXT,
                gender          TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- reminder_times and days_of_week are JSON arrays of strings
            CREATE TABLE medications (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                dosage          TEXT NOT NULL,
                instruction     TEXT NOT NULL,
                reminder_times  TEXT NOT NULL,
                start_date      TEXT NOT NULL,
                days_of_week    TEXT NOT NULL,
                notified_today  INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_medications_user ON medications(user_id);
            CREATE INDEX idx_medications_start ON medications(start_date);

            CREATE TABLE doses (
                id              TEXT PRIMARY KEY,
                medication_id   TEXT NOT NULL,
                user_id         TEXT NOT NULL,
                scheduled_time  TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'taken', 'skipped')),
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_doses_user ON doses(user_id, scheduled_time);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (email verification)");
        conn.execute_batch(
            "
            ALTER TABLE users ADD COLUMN is_email_verified INTEGER NOT NULL DEFAULT 0;

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
