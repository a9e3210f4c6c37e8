use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::AppState;
use crate::domain::{Participant, ParticipantId, ParticipantProfile};
use crate::error::AppError;

pub async fn register_participant(
    State(state): State<AppState>,
    Json(profile): Json<ParticipantProfile>,
) -> Result<(StatusCode, Json<Participant>), AppError> {
    let participant = state.service.register_participant(profile).await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn get_participant(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Participant>, AppError> {
    let participant = state.service.get_participant(ParticipantId(id)).await?;
    Ok(Json(participant))
}

pub async fn update_participant(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(profile): Json<ParticipantProfile>,
) -> Result<Json<Participant>, AppError> {
    let participant = state
        .service
        .update_participant(ParticipantId(id), profile)
        .await?;
    Ok(Json(participant))
}
