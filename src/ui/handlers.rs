//! HTTP API handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::audio::device::{list_output_devices, AudioDeviceInfo};
use crate::playback::{PlaybackForm, StatusKind, StatusMessage};
use crate::ui::server::AppState;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Status text plus the is-playing flag after the call
#[derive(Serialize)]
pub struct PlaybackReply {
    pub kind: StatusKind,
    pub message: String,
    pub playing: bool,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub playing: bool,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_stop_secs: Option<f64>,
}

type PlaybackResponse = (StatusCode, Json<ApiResponse<PlaybackReply>>);

fn reply(state: &AppState, status: StatusMessage) -> PlaybackResponse {
    let code = match status.kind() {
        StatusKind::ValidationError => StatusCode::BAD_REQUEST,
        StatusKind::OutputError => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    let message = status.render(state.manager.locale());
    let body = PlaybackReply {
        kind: status.kind(),
        message: message.clone(),
        playing: state.manager.is_playing(),
    };

    let response = if status.is_error() {
        ApiResponse {
            data: Some(body),
            ..ApiResponse::error(message)
        }
    } else {
        ApiResponse::ok(body)
    };
    (code, Json(response))
}

/// Play button
pub async fn play(
    State(state): State<Arc<AppState>>,
    Json(form): Json<PlaybackForm>,
) -> PlaybackResponse {
    let status = state.manager.request_playback(&form);
    reply(&state, status)
}

/// Stop button
pub async fn stop(State(state): State<Arc<AppState>>) -> PlaybackResponse {
    let status = state.manager.stop_playback();
    reply(&state, status)
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let snapshot = state.manager.snapshot();
    Json(ApiResponse::ok(SystemStatus {
        playing: snapshot.playing,
        generation: snapshot.generation,
        scheduled_stop_secs: snapshot.scheduled_stop_secs,
    }))
}

/// Get available output devices
pub async fn get_devices() -> Json<ApiResponse<Vec<AudioDeviceInfo>>> {
    let devices = tokio::task::spawn_blocking(list_output_devices)
        .await
        .unwrap_or_default();
    Json(ApiResponse::ok(devices))
}
