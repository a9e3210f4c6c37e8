use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_currency, AppState};
use crate::domain::{Event, EventId, ParticipantId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    /// Falls back to the configured default currency.
    pub currency: Option<String>,
    /// Joined as the first member when present.
    pub creator_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEventRequest {
    pub invite_code: String,
    pub participant_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    pub id: i64,
    pub title: String,
    pub invite_code: String,
    pub currency: String,
    pub members: Vec<i64>,
    pub created_at: i64,
    pub last_activity: i64,
}

impl From<Event> for EventDto {
    fn from(event: Event) -> Self {
        EventDto {
            id: event.id.as_i64(),
            title: event.title,
            invite_code: event.invite_code,
            currency: event.currency.code().to_string(),
            members: event.members.iter().map(|m| m.as_i64()).collect(),
            created_at: event.created_at.as_ms(),
            last_activity: event.last_activity.as_ms(),
        }
    }
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventDto>), AppError> {
    let currency = parse_currency(req.currency.as_deref())?;
    let event = state
        .service
        .create_event(&req.title, currency, req.creator_id.map(ParticipantId))
        .await?;
    Ok((StatusCode::CREATED, Json(event.into())))
}

pub async fn get_event(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<EventDto>, AppError> {
    let event = state.service.get_event(EventId(id)).await?;
    Ok(Json(event.into()))
}

pub async fn delete_event(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.service.delete_event(EventId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn join_event(
    State(state): State<AppState>,
    Json(req): Json<JoinEventRequest>,
) -> Result<Json<EventDto>, AppError> {
    let event = state
        .service
        .join_event(&req.invite_code, ParticipantId(req.participant_id))
        .await?;
    Ok(Json(event.into()))
}

pub async fn leave_event(
    Path((id, pid)): Path<(i64, i64)>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .leave_event(EventId(id), ParticipantId(pid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
