//! Axum REST API handlers.
//!
//! One wizard session is hosted per process. Handlers lock the controller
//! for the duration of a single operation; submission releases the lock
//! while the create-donation-event call is in flight so the session stays
//! observable (and a second submit is rejected rather than queued).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

use crate::controller::{MediaIntake, WizardController, WizardView};
use crate::errors::WizardError;
use crate::gate::DocumentSlot;
use crate::media::SelectedFile;
use crate::notify::{Notice, NoticeBuffer, RouteRecorder};
use crate::steps::FieldError;
use crate::submit::CreatedEvent;

#[derive(Clone)]
pub struct ApiState {
    pub wizard: Arc<Mutex<WizardController>>,
    pub notices: Arc<NoticeBuffer>,
    pub routes: Arc<RouteRecorder>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/wizard", get(get_wizard))
        .route("/wizard/fields", patch(update_fields))
        .route("/wizard/next", post(next_step))
        .route("/wizard/previous", post(previous_step))
        .route(
            "/wizard/cover-image",
            put(select_cover_image).delete(remove_cover_image),
        )
        .route("/wizard/documents/confirm", post(confirm_document))
        .route("/wizard/documents/cancel", post(cancel_document))
        .route(
            "/wizard/documents/:slot",
            post(select_document).delete(remove_document),
        )
        .route("/wizard/supporting-media", post(add_supporting_media))
        .route(
            "/wizard/supporting-media/:index",
            delete(remove_supporting_media),
        )
        .route("/wizard/submit", post(submit))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

/// A file as sent by the client: base64 `data`.
#[derive(Debug, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub mime: String,
    pub data: String,
}

impl UploadedFile {
    fn decode(self) -> Result<SelectedFile, WizardError> {
        let bytes = STANDARD.decode(self.data.as_bytes()).map_err(|e| {
            WizardError::Validation(vec![FieldError::new(
                "data",
                format!("{} is not valid base64: {e}", self.name),
            )])
        })?;
        Ok(SelectedFile::new(self.name, self.mime, bytes))
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub wizard: WizardView,
    pub notices: Vec<Notice>,
    pub redirect: Option<String>,
}

#[derive(Serialize)]
pub struct StepResponse {
    pub advanced: bool,
    pub wizard: WizardView,
}

#[derive(Serialize)]
pub struct IntakeResponse {
    pub intake: MediaIntake,
    pub wizard: WizardView,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub event: CreatedEvent,
    pub redirect_in_ms: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

pub struct ApiError(WizardError);

impl From<WizardError> for ApiError {
    fn from(e: WizardError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WizardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WizardError::InvalidTransition(_) => StatusCode::CONFLICT,
            WizardError::Submission(_) => StatusCode::BAD_GATEWAY,
            WizardError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        let fields = match &self.0 {
            WizardError::Validation(fields) => fields.clone(),
            _ => Vec::new(),
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                fields,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /wizard`
///
/// Current form state plus every notice raised since the last poll.
pub async fn get_wizard(State(state): State<Arc<ApiState>>) -> Json<SessionResponse> {
    let wizard = state.wizard.lock().await.view();
    Json(SessionResponse {
        wizard,
        notices: state.notices.drain(),
        redirect: state.routes.last_route(),
    })
}

/// `PATCH /wizard/fields`
pub async fn update_fields(
    State(state): State<Arc<ApiState>>,
    Json(patch): Json<Map<String, Value>>,
) -> ApiResult<WizardView> {
    let mut wizard = state.wizard.lock().await;
    wizard.update_fields(&patch)?;
    Ok(Json(wizard.view()))
}

/// `POST /wizard/next`
pub async fn next_step(State(state): State<Arc<ApiState>>) -> Json<StepResponse> {
    let mut wizard = state.wizard.lock().await;
    let advanced = wizard.handle_next();
    Json(StepResponse {
        advanced,
        wizard: wizard.view(),
    })
}

/// `POST /wizard/previous`
pub async fn previous_step(State(state): State<Arc<ApiState>>) -> Json<WizardView> {
    let mut wizard = state.wizard.lock().await;
    wizard.handle_previous();
    Json(wizard.view())
}

/// `PUT /wizard/cover-image`
pub async fn select_cover_image(
    State(state): State<Arc<ApiState>>,
    Json(file): Json<UploadedFile>,
) -> ApiResult<WizardView> {
    let file = file.decode()?;
    let mut wizard = state.wizard.lock().await;
    wizard.select_cover_image(file).await?;
    Ok(Json(wizard.view()))
}

/// `DELETE /wizard/cover-image`
pub async fn remove_cover_image(State(state): State<Arc<ApiState>>) -> Json<WizardView> {
    let mut wizard = state.wizard.lock().await;
    wizard.remove_cover_image();
    Json(wizard.view())
}

/// `POST /wizard/documents/:slot`
///
/// Stages the document; nothing reaches the form until it is confirmed.
pub async fn select_document(
    State(state): State<Arc<ApiState>>,
    Path(slot): Path<String>,
    Json(file): Json<UploadedFile>,
) -> ApiResult<WizardView> {
    let slot = parse_slot(&slot)?;
    let file = file.decode()?;
    let mut wizard = state.wizard.lock().await;
    wizard.select_document(slot, file).await?;
    Ok(Json(wizard.view()))
}

/// `DELETE /wizard/documents/:slot`
pub async fn remove_document(
    State(state): State<Arc<ApiState>>,
    Path(slot): Path<String>,
) -> ApiResult<WizardView> {
    let slot = parse_slot(&slot)?;
    let mut wizard = state.wizard.lock().await;
    wizard.remove_document(slot);
    Ok(Json(wizard.view()))
}

/// `POST /wizard/documents/confirm`
pub async fn confirm_document(State(state): State<Arc<ApiState>>) -> ApiResult<WizardView> {
    let mut wizard = state.wizard.lock().await;
    wizard.confirm_document()?;
    Ok(Json(wizard.view()))
}

/// `POST /wizard/documents/cancel`
pub async fn cancel_document(State(state): State<Arc<ApiState>>) -> Json<WizardView> {
    let mut wizard = state.wizard.lock().await;
    wizard.cancel_document();
    Json(wizard.view())
}

/// `POST /wizard/supporting-media`
pub async fn add_supporting_media(
    State(state): State<Arc<ApiState>>,
    Json(files): Json<Vec<UploadedFile>>,
) -> ApiResult<IntakeResponse> {
    let files = files
        .into_iter()
        .map(UploadedFile::decode)
        .collect::<Result<Vec<_>, _>>()?;
    let mut wizard = state.wizard.lock().await;
    let intake = wizard.add_supporting_media(files).await;
    Ok(Json(IntakeResponse {
        intake,
        wizard: wizard.view(),
    }))
}

/// `DELETE /wizard/supporting-media/:index`
pub async fn remove_supporting_media(
    State(state): State<Arc<ApiState>>,
    Path(index): Path<usize>,
) -> ApiResult<WizardView> {
    let mut wizard = state.wizard.lock().await;
    if wizard.remove_supporting_media(index).is_none() {
        return Err(WizardError::InvalidTransition(format!(
            "no supporting media at index {index}"
        ))
        .into());
    }
    Ok(Json(wizard.view()))
}

/// `POST /wizard/submit`
///
/// The create call and its completion run on their own task, so a client
/// that disconnects mid-request cannot leave the session stuck submitting.
pub async fn submit(State(state): State<Arc<ApiState>>) -> ApiResult<SubmitResponse> {
    let (payload, api) = {
        let mut wizard = state.wizard.lock().await;
        (wizard.prepare_submission()?, wizard.api())
    };

    let wizard = state.wizard.clone();
    let task = tokio::spawn(async move {
        let result = api.create_donation_event(payload).await;
        let mut wizard = wizard.lock().await;
        let event = wizard.complete_submission(result).await?;
        Ok::<_, WizardError>((event, wizard.redirect_delay()))
    });

    let (event, redirect_delay) = match task.await {
        Ok(outcome) => outcome?,
        Err(e) => {
            // The task died before completing; release the session.
            let failed = Err(WizardError::Submission(format!("submission task failed: {e}")));
            let mut wizard = state.wizard.lock().await;
            (wizard.complete_submission(failed).await?, wizard.redirect_delay())
        }
    };
    Ok(Json(SubmitResponse {
        event,
        redirect_in_ms: u64::try_from(redirect_delay.as_millis()).unwrap_or(u64::MAX),
    }))
}

fn parse_slot(raw: &str) -> Result<DocumentSlot, WizardError> {
    raw.parse().map_err(|_| {
        WizardError::Validation(vec![FieldError::new(
            "slot",
            format!("unknown document slot: {raw}"),
        )])
    })
}
