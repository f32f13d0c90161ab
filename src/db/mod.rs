pub mod repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::AppError;
use crate::models::{BookingRecord, ProfileUpdate, PublishOutcome, Session, SlotBooking, TutorProfile};
use crate::store::SlotStore;

/// Opens the pool and runs the embedded migrations. An in-memory database
/// lives inside a single connection, so the pool is pinned to one.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, AppError> {
    let in_memory = database_url.contains(":memory:");
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    };

    let pool = pool_options.connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database ready at {}", database_url);
    Ok(pool)
}

#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SlotStore for SqliteStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("select 1").execute(&self.db).await?;
        Ok(())
    }

    async fn fetch_tutor(&self, tutor_id: &str) -> Result<Option<TutorProfile>, AppError> {
        repository::fetch_tutor(&self.db, tutor_id).await
    }

    async fn fetch_tutors(&self) -> Result<Vec<TutorProfile>, AppError> {
        repository::fetch_tutors(&self.db).await
    }

    async fn fetch_tutors_by_subject(&self, subject: &str) -> Result<Vec<TutorProfile>, AppError> {
        repository::fetch_tutors_by_subject(&self.db, subject).await
    }

    async fn fetch_password(&self, tutor_id: &str) -> Result<Option<String>, AppError> {
        Ok(repository::fetch_password(&self.db, tutor_id).await?)
    }

    async fn insert_tutor(
        &self,
        tutor_id: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TutorProfile>, AppError> {
        repository::insert_tutor(&self.db, tutor_id, password, now).await
    }

    async fn save_profile(
        &self,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, AppError> {
        let (profile, retained_slot_ids) = repository::save_profile(&self.db, update, now).await?;
        Ok(PublishOutcome {
            profile,
            retained_slot_ids,
        })
    }

    async fn compare_and_book(
        &self,
        tutor_id: &str,
        slot_id: &str,
        booking: &SlotBooking,
    ) -> Result<bool, AppError> {
        repository::compare_and_book(&self.db, tutor_id, slot_id, booking).await
    }

    async fn fetch_booking_history(&self, limit: u32) -> Result<Vec<BookingRecord>, AppError> {
        repository::fetch_booking_history(&self.db, limit).await
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AppError> {
        Ok(repository::insert_session(&self.db, session).await?)
    }

    async fn fetch_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        repository::fetch_session(&self.db, token).await
    }

    async fn delete_session(&self, token: &str) -> Result<bool, AppError> {
        Ok(repository::delete_session(&self.db, token).await?)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        Ok(repository::delete_expired_sessions(&self.db, now).await?)
    }
}
