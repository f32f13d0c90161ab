use axum::Json;
use axum::error_handling::HandleErrorLayer;
use axum::extract::Query;
use axum::routing::post;
use axum::{BoxError, Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tracing::warn;

use crate::auth::{self, AdminTutor, CurrentTutor};
use crate::error::AppError;
use crate::models::*;
use crate::schedule::{self, ScheduleDay};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 100;
const MAX_HISTORY_LIMIT: u32 = 1000;

#[derive(Deserialize)]
struct SearchParams {
    subject: String,
}

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<u32>,
}

#[derive(Serialize)]
struct Catalog {
    subjects: &'static [&'static str],
    week_schedule: &'static [ScheduleDay],
}

pub fn router(state: AppState) -> Router {
    let timeout = state.config.request_timeout;

    Router::new()
        .route("/health", get(health))
        .route("/catalog", get(catalog))
        .route("/tutors/search", get(search_tutors))
        .route("/bookings", post(confirm_booking))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/me", get(my_profile).put(publish_availability))
        .route("/me/bookings", get(my_bookings))
        .route("/admin/bookings", get(all_bookings))
        .route("/admin/bookings/history", get(booking_history))
        .route("/admin/tutors", post(register_tutor))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

async fn handle_timeout(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        warn!("request timed out");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Request timed out, please try again".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {}", err),
        )
    }
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.store.ping().await?;
    Ok(StatusCode::OK)
}

async fn catalog() -> Json<Catalog> {
    Json(Catalog {
        subjects: &schedule::SUBJECTS,
        week_schedule: &schedule::WEEK_SCHEDULE,
    })
}

async fn search_tutors(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<TutorAvailability>>, AppError> {
    let results = state.booking().search_available(params.subject.trim()).await?;
    Ok(Json(results))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Confirmed>), AppError> {
    let confirmed = state.booking().confirm_booking(req).await?;
    Ok((StatusCode::CREATED, Json(confirmed)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = auth::login(&state, req).await?;
    Ok(Json(response))
}

async fn logout(
    State(state): State<AppState>,
    tutor: CurrentTutor,
) -> Result<StatusCode, AppError> {
    auth::logout(&state, &tutor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn my_profile(
    State(state): State<AppState>,
    tutor: CurrentTutor,
) -> Result<Json<TutorProfile>, AppError> {
    let profile = state.profiles().profile(&tutor.tutor_id).await?;
    Ok(Json(profile))
}

async fn publish_availability(
    State(state): State<AppState>,
    tutor: CurrentTutor,
    Json(req): Json<PublishAvailabilityRequest>,
) -> Result<Json<PublishOutcome>, AppError> {
    let outcome = state
        .profiles()
        .publish_availability(&tutor.tutor_id, req)
        .await?;
    Ok(Json(outcome))
}

async fn my_bookings(
    State(state): State<AppState>,
    tutor: CurrentTutor,
) -> Result<Json<Vec<LiveBooking>>, AppError> {
    let bookings = state.booking().live_bookings(&tutor.tutor_id).await?;
    Ok(Json(bookings))
}

async fn all_bookings(
    State(state): State<AppState>,
    _admin: AdminTutor,
) -> Result<Json<Vec<LiveBooking>>, AppError> {
    let bookings = state.booking().all_live_bookings().await?;
    Ok(Json(bookings))
}

async fn booking_history(
    State(state): State<AppState>,
    _admin: AdminTutor,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<BookingRecord>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let records = state.booking().booking_history(limit).await?;
    Ok(Json(records))
}

async fn register_tutor(
    State(state): State<AppState>,
    _admin: AdminTutor,
    Json(req): Json<NewTutorRequest>,
) -> Result<(StatusCode, Json<TutorProfile>), AppError> {
    let profile = state.profiles().register_tutor(req).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}
