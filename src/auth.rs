//! Tutor sign-in and the per-request session context.
//!
//! Passwords are compared as stored. Tutors listed in the configured roster
//! may also sign in with the shared passcode until they have a password of
//! their own.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{LoginRequest, LoginResponse, Session};
use crate::state::AppState;

pub async fn login(state: &AppState, req: LoginRequest) -> Result<LoginResponse, AppError> {
    let tutor_id = req.tutor_id.trim();

    match state.store.fetch_password(tutor_id).await? {
        Some(stored) if stored == req.password => {}
        Some(_) => {
            warn!("rejected login for {}: wrong password", tutor_id);
            return Err(AppError::Unauthorized("Invalid Password".to_string()));
        }
        None => {
            let passcode_ok = state
                .config
                .roster_passcode
                .as_deref()
                .is_some_and(|code| code == req.password);
            if !(state.config.on_roster(tutor_id) && passcode_ok) {
                warn!("rejected login for {}", tutor_id);
                return Err(AppError::Unauthorized(
                    "Invalid Tutor ID or Password".to_string(),
                ));
            }
        }
    }

    let now = state.clock.now();
    let purged = state.store.delete_expired_sessions(now).await?;
    if purged > 0 {
        debug!("purged {} expired sessions", purged);
    }

    let session = Session {
        token: Uuid::new_v4().to_string(),
        tutor_id: tutor_id.to_string(),
        created_at: now,
        expires_at: now + state.config.session_ttl,
    };
    state.store.insert_session(&session).await?;
    info!("{} signed in", tutor_id);

    Ok(LoginResponse {
        token: session.token,
        is_admin: state.config.is_admin(tutor_id),
        tutor_id: session.tutor_id,
        expires_at: session.expires_at,
    })
}

pub async fn logout(state: &AppState, session: &CurrentTutor) -> Result<(), AppError> {
    state.store.delete_session(&session.token).await?;
    info!("{} signed out", session.tutor_id);
    Ok(())
}

/// The signed-in tutor, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct CurrentTutor {
    pub tutor_id: String,
    pub token: String,
    pub is_admin: bool,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for CurrentTutor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;

        let session = state
            .store
            .fetch_session(token)
            .await?
            .filter(|s| s.is_active(state.clock.now()))
            .ok_or_else(|| AppError::Unauthorized("Session expired, please sign in again".to_string()))?;

        Ok(CurrentTutor {
            is_admin: state.config.is_admin(&session.tutor_id),
            tutor_id: session.tutor_id,
            token: session.token,
        })
    }
}

/// A signed-in tutor who is also the configured admin.
#[derive(Debug, Clone)]
pub struct AdminTutor(pub CurrentTutor);

impl FromRequestParts<AppState> for AdminTutor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let tutor = CurrentTutor::from_request_parts(parts, state).await?;
        if !tutor.is_admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminTutor(tutor))
    }
}
