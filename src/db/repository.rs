use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{BookingRecord, ProfileUpdate, Session, Slot, SlotBooking, SlotStatus, TutorProfile, WeeklyAvailability};

// Instants are stored as unix milliseconds.
fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
        tracing::error!("stored timestamp out of range: {}", ms);
        AppError::InternalServerError
    })
}

#[derive(Debug, FromRow)]
struct TutorRow {
    id: String,
    name: String,
    bio: String,
    grade_level: String,
    subjects: String,
    availability: String,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, FromRow)]
struct SlotRow {
    tutor_id: String,
    id: String,
    day: String,
    time_range: String,
    status: String,
    offered: bool,
    student_name: Option<String>,
    subject: Option<String>,
    expiry_date: Option<i64>,
    booked_at: Option<i64>,
}

impl TryFrom<SlotRow> for Slot {
    type Error = AppError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<SlotStatus>().map_err(|e| {
            tracing::error!("{}", e);
            AppError::InternalServerError
        })?;
        Ok(Slot {
            id: row.id,
            day: row.day,
            time_range: row.time_range,
            status,
            offered: row.offered,
            student_name: row.student_name,
            subject: row.subject,
            expiry_date: row.expiry_date.map(from_millis).transpose()?,
            booked_at: row.booked_at.map(from_millis).transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct BookingRow {
    id: String,
    tutor_id: String,
    slot_id: String,
    day: String,
    time_range: String,
    student_name: String,
    subject: String,
    expiry_date: i64,
    booked_at: i64,
}

impl TryFrom<BookingRow> for BookingRecord {
    type Error = AppError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(BookingRecord {
            id: row.id,
            tutor_id: row.tutor_id,
            slot_id: row.slot_id,
            day: row.day,
            time_range: row.time_range,
            student_name: row.student_name,
            subject: row.subject,
            expiry_date: from_millis(row.expiry_date)?,
            booked_at: from_millis(row.booked_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    token: String,
    tutor_id: String,
    created_at: i64,
    expires_at: i64,
}

const TUTOR_COLUMNS: &str =
    "id, name, bio, grade_level, subjects, availability, created_at, updated_at";

const SLOT_COLUMNS: &str = "tutor_id, id, day, time_range, status, offered, student_name, subject, expiry_date, booked_at";

// Takes the write lock up front. A deferred transaction that has to upgrade
// from a read lock can fail with SQLITE_BUSY without waiting.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

const SUBJECT_FILTER: &str =
    "EXISTS (SELECT 1 FROM json_each(tutors.subjects) WHERE json_each.value = ?1)";

fn assemble(rows: Vec<TutorRow>, slot_rows: Vec<SlotRow>) -> Result<Vec<TutorProfile>, AppError> {
    let mut slots_by_tutor: HashMap<String, Vec<Slot>> = HashMap::new();
    for row in slot_rows {
        let tutor_id = row.tutor_id.clone();
        slots_by_tutor.entry(tutor_id).or_default().push(Slot::try_from(row)?);
    }

    rows.into_iter()
        .map(|row| -> Result<TutorProfile, AppError> {
            let slots = slots_by_tutor.remove(&row.id).unwrap_or_default();
            Ok(TutorProfile {
                subjects: serde_json::from_str(&row.subjects)?,
                weekly_availability: serde_json::from_str::<WeeklyAvailability>(&row.availability)?,
                id: row.id,
                name: row.name,
                slots,
                bio: row.bio,
                grade_level: row.grade_level,
                created_at: from_millis(row.created_at)?,
                updated_at: from_millis(row.updated_at)?,
            })
        })
        .collect()
}

pub async fn fetch_tutor(db: &SqlitePool, tutor_id: &str) -> Result<Option<TutorProfile>, AppError> {
    let mut conn = db.acquire().await?;
    fetch_tutor_on(&mut *conn, tutor_id).await
}

async fn fetch_tutor_on(
    conn: &mut SqliteConnection,
    tutor_id: &str,
) -> Result<Option<TutorProfile>, AppError> {
    let rows = sqlx::query_as::<_, TutorRow>(&format!(
        "SELECT {} FROM tutors WHERE id = ?1",
        TUTOR_COLUMNS
    ))
    .bind(tutor_id)
    .fetch_all(&mut *conn)
    .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    let slot_rows = sqlx::query_as::<_, SlotRow>(&format!(
        "SELECT {} FROM slots WHERE tutor_id = ?1 ORDER BY position",
        SLOT_COLUMNS
    ))
    .bind(tutor_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(assemble(rows, slot_rows)?.into_iter().next())
}

pub async fn fetch_tutors(db: &SqlitePool) -> Result<Vec<TutorProfile>, AppError> {
    let rows = sqlx::query_as::<_, TutorRow>(&format!(
        "SELECT {} FROM tutors ORDER BY rowid",
        TUTOR_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    let slot_rows = sqlx::query_as::<_, SlotRow>(&format!(
        "SELECT {} FROM slots ORDER BY tutor_id, position",
        SLOT_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    assemble(rows, slot_rows)
}

pub async fn fetch_tutors_by_subject(
    db: &SqlitePool,
    subject: &str,
) -> Result<Vec<TutorProfile>, AppError> {
    let rows = sqlx::query_as::<_, TutorRow>(&format!(
        "SELECT {} FROM tutors WHERE {} ORDER BY rowid",
        TUTOR_COLUMNS, SUBJECT_FILTER
    ))
    .bind(subject)
    .fetch_all(db)
    .await?;

    let slot_rows = sqlx::query_as::<_, SlotRow>(&format!(
        "SELECT {} FROM slots WHERE tutor_id IN (SELECT id FROM tutors WHERE {}) ORDER BY tutor_id, position",
        SLOT_COLUMNS, SUBJECT_FILTER
    ))
    .bind(subject)
    .fetch_all(db)
    .await?;

    assemble(rows, slot_rows)
}

pub async fn fetch_password(db: &SqlitePool, tutor_id: &str) -> Result<Option<String>, sqlx::Error> {
    let password: Option<Option<String>> =
        sqlx::query_scalar("SELECT password FROM tutors WHERE id = ?1")
            .bind(tutor_id)
            .fetch_optional(db)
            .await?;
    Ok(password.flatten())
}

pub async fn insert_tutor(
    db: &SqlitePool,
    tutor_id: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<Option<TutorProfile>, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO tutors (id, name, password, created_at, updated_at)
        VALUES (?1, ?1, ?2, ?3, ?3)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(tutor_id)
    .bind(password)
    .bind(to_millis(now))
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(TutorProfile::empty(tutor_id, now)))
}

/// Saves the profile and its merged slots in one write transaction, so a
/// booking lands either before the current slots are read or after the new
/// ones are written.
pub async fn save_profile(
    db: &SqlitePool,
    update: &ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<(TutorProfile, Vec<String>), AppError> {
    let mut tx = db.begin_with(BEGIN_WRITE).await?;
    let now_ms = to_millis(now);

    sqlx::query(
        r#"
        INSERT INTO tutors (id, name, bio, grade_level, subjects, availability, created_at, updated_at)
        VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ON CONFLICT(id) DO UPDATE SET
            bio = excluded.bio,
            grade_level = excluded.grade_level,
            subjects = excluded.subjects,
            availability = excluded.availability,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&update.tutor_id)
    .bind(&update.bio)
    .bind(&update.grade_level)
    .bind(serde_json::to_string(&update.subjects)?)
    .bind(serde_json::to_string(&update.weekly_availability)?)
    .bind(now_ms)
    .execute(&mut *tx)
    .await?;

    let current: Vec<Slot> = sqlx::query_as::<_, SlotRow>(&format!(
        "SELECT {} FROM slots WHERE tutor_id = ?1 ORDER BY position",
        SLOT_COLUMNS
    ))
    .bind(&update.tutor_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(Slot::try_from)
    .collect::<Result<_, _>>()?;

    let (merged, retained) = crate::store::merge_slots(&current, &update.offered, now);

    sqlx::query("DELETE FROM slots WHERE tutor_id = ?1")
        .bind(&update.tutor_id)
        .execute(&mut *tx)
        .await?;

    for (position, slot) in merged.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO slots
                (tutor_id, id, day, time_range, position, status, offered,
                student_name, subject, expiry_date, booked_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&update.tutor_id)
        .bind(&slot.id)
        .bind(&slot.day)
        .bind(&slot.time_range)
        .bind(position as i64)
        .bind(slot.status.as_str())
        .bind(slot.offered)
        .bind(&slot.student_name)
        .bind(&slot.subject)
        .bind(slot.expiry_date.map(to_millis))
        .bind(slot.booked_at.map(to_millis))
        .execute(&mut *tx)
        .await?;
    }

    let profile = fetch_tutor_on(&mut *tx, &update.tutor_id)
        .await?
        .ok_or(AppError::InternalServerError)?;

    tx.commit().await?;
    Ok((profile, retained))
}

/// Single conditional UPDATE: the bookability check and the write happen in
/// one statement, so two concurrent bookings of a slot cannot both land.
pub async fn compare_and_book(
    db: &SqlitePool,
    tutor_id: &str,
    slot_id: &str,
    booking: &SlotBooking,
) -> Result<bool, AppError> {
    let mut tx = db.begin_with(BEGIN_WRITE).await?;
    let booked_at = to_millis(booking.booked_at);
    let expiry_date = to_millis(booking.expiry_date);

    let affected = sqlx::query(
        r#"
        UPDATE slots
        SET status = 'Booked',
            student_name = ?1,
            subject = ?2,
            expiry_date = ?3,
            booked_at = ?4
        WHERE tutor_id = ?5
          AND id = ?6
          AND offered = 1
          AND (
            status = 'Available'
            OR (status = 'Booked' AND expiry_date IS NOT NULL AND expiry_date < ?4)
          )
        "#,
    )
    .bind(&booking.student_name)
    .bind(&booking.subject)
    .bind(expiry_date)
    .bind(booked_at)
    .bind(tutor_id)
    .bind(slot_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if affected == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO booking_log
            (id, tutor_id, slot_id, day, time_range, student_name, subject, expiry_date, booked_at)
        SELECT ?1, tutor_id, id, day, time_range, ?2, ?3, ?4, ?5
        FROM slots
        WHERE tutor_id = ?6 AND id = ?7
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&booking.student_name)
    .bind(&booking.subject)
    .bind(expiry_date)
    .bind(booked_at)
    .bind(tutor_id)
    .bind(slot_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn fetch_booking_history(
    db: &SqlitePool,
    limit: u32,
) -> Result<Vec<BookingRecord>, AppError> {
    sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT id, tutor_id, slot_id, day, time_range, student_name, subject, expiry_date, booked_at
        FROM booking_log
        ORDER BY booked_at DESC, rowid DESC
        LIMIT ?1
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(db)
    .await?
    .into_iter()
    .map(BookingRecord::try_from)
    .collect()
}

pub async fn insert_session(db: &SqlitePool, session: &Session) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sessions (token, tutor_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&session.token)
    .bind(&session.tutor_id)
    .bind(to_millis(session.created_at))
    .bind(to_millis(session.expires_at))
    .execute(db)
    .await?;
    Ok(())
}

pub async fn fetch_session(db: &SqlitePool, token: &str) -> Result<Option<Session>, AppError> {
    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT token, tutor_id, created_at, expires_at FROM sessions WHERE token = ?1",
    )
    .bind(token)
    .fetch_optional(db)
    .await?;

    row.map(|r| {
        Ok(Session {
            token: r.token,
            tutor_id: r.tutor_id,
            created_at: from_millis(r.created_at)?,
            expires_at: from_millis(r.expires_at)?,
        })
    })
    .transpose()
}

pub async fn delete_session(db: &SqlitePool, token: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?1")
        .bind(token)
        .execute(db)
        .await?
        .rows_affected();
    Ok(result > 0)
}

pub async fn delete_expired_sessions(db: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
        .bind(to_millis(now))
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
