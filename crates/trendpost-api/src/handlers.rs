//! API Handlers
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use trendpost_core::{
    validate_request, PipelineStep, PostId, PostSnapshot, Provenance, RefinementOutcome,
    SessionId, StepFields, StepKind, TrendpostError, TRENDPOST_VERSION,
};

use crate::error::ApiError;
use crate::metrics::{OUTCOME_APPLIED, OUTCOME_FAILED, OUTCOME_REJECTED};
use crate::state::{AppState, SharedSession};

type AppResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct AppendStepBody {
    pub step: StepKind,
    #[serde(default)]
    pub inputs: StepFields,
    #[serde(default)]
    pub outputs: StepFields,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Deserialize)]
pub struct RefineBody {
    pub request: String,
}

#[derive(Debug, Serialize)]
pub struct RefineReply {
    pub post: PostSnapshot,
    pub outcome: RefinementOutcome,
}

#[derive(Debug, Serialize)]
pub struct ResetReply {
    pub removed_steps: usize,
    pub post: PostSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HistoryReply {
    pub steps: usize,
    pub fingerprint: String,
    pub text: String,
}

/// Everything a session holds, as written by the snapshot endpoint.
#[derive(Debug, Serialize)]
pub struct SessionDump {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub posts: Vec<PostSnapshot>,
    pub messages: Vec<PipelineStep>,
}

fn session(state: &AppState, id: SessionId) -> AppResult<SharedSession> {
    state.sessions.get(id).ok_or(ApiError::SessionNotFound(id))
}

pub async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let (id, session) = state.sessions.create();
    let created_at = session.lock().await.created_at();
    state.metrics.sessions_created.inc();
    info!(session = %id, "session created");
    (
        StatusCode::CREATED,
        Json(json!({ "session_id": id, "created_at": created_at })),
    )
}

pub async fn append_step(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<SessionId>,
    Json(body): Json<AppendStepBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    // Refinement steps carry an owner and only come from the refine route.
    if body.step == StepKind::UserRefinement {
        return Err(ApiError::ReservedStep(body.step));
    }

    let session = session(&state, sid)?;
    let session = session.lock().await;

    let mut log = session.log().write();
    let step = log.append_step(body.step, body.inputs, body.outputs, body.rationale);
    let label = step.kind.label().to_string();
    let index = log.len();

    Ok((StatusCode::CREATED, Json(json!({ "index": index, "step": label }))))
}

pub async fn register_post(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<SessionId>,
    Json(provenance): Json<Provenance>,
) -> AppResult<(StatusCode, Json<PostSnapshot>)> {
    let session = session(&state, sid)?;
    let mut session = session.lock().await;

    let id = session.register_post(provenance);
    let snapshot = session.post(id).ok_or(ApiError::PostNotFound(id))?.snapshot();
    state.metrics.posts_registered.inc();
    info!(session = %sid, post = %id, "post registered");

    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path((sid, pid)): Path<(SessionId, PostId)>,
) -> AppResult<Json<PostSnapshot>> {
    let session = session(&state, sid)?;
    let session = session.lock().await;
    let post = session.post(pid).ok_or(ApiError::PostNotFound(pid))?;
    Ok(Json(post.snapshot()))
}

pub async fn refine_post(
    State(state): State<Arc<AppState>>,
    Path((sid, pid)): Path<(SessionId, PostId)>,
    Json(body): Json<RefineBody>,
) -> AppResult<Json<RefineReply>> {
    let request = validate_request(&body.request)
        .inspect_err(|_| state.metrics.refinement(OUTCOME_REJECTED))?;

    let session = session(&state, sid)?;
    let mut session = session.lock().await;
    let post = session.post_mut(pid).ok_or(ApiError::PostNotFound(pid))?;

    match state.refiner.refine(post, request).await {
        Ok(outcome) => {
            state.metrics.refinement(OUTCOME_APPLIED);
            Ok(Json(RefineReply {
                post: post.snapshot(),
                outcome,
            }))
        }
        Err(e) => {
            state.metrics.refinement(OUTCOME_FAILED);
            Err(e.into())
        }
    }
}

pub async fn reset_post(
    State(state): State<Arc<AppState>>,
    Path((sid, pid)): Path<(SessionId, PostId)>,
) -> AppResult<Json<ResetReply>> {
    let session = session(&state, sid)?;
    let mut session = session.lock().await;
    let post = session.post_mut(pid).ok_or(ApiError::PostNotFound(pid))?;

    let removed_steps = post.reset();
    state.metrics.resets.inc();

    Ok(Json(ResetReply {
        removed_steps,
        post: post.snapshot(),
    }))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<SessionId>,
) -> AppResult<Json<HistoryReply>> {
    let session = session(&state, sid)?;
    let session = session.lock().await;
    let log = session.log().read();

    Ok(Json(HistoryReply {
        steps: log.len(),
        fingerprint: log.fingerprint(),
        text: log.render_text(),
    }))
}

pub async fn snapshot_session(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<SessionId>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let session = session(&state, sid)?;
    let dump = {
        let session = session.lock().await;
        let messages = session.log().read().steps().to_vec();
        SessionDump {
            session_id: session.id(),
            created_at: session.created_at(),
            posts: session.posts().iter().map(|p| p.snapshot()).collect(),
            messages,
        }
    };

    let path = state.artifacts.snapshot("session", &dump)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "path": path.display().to_string() })),
    ))
}

pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": TRENDPOST_VERSION,
            "oracle": state.refiner.oracle_name(),
            "sessions": state.sessions.len(),
        })),
    )
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> AppResult<String> {
    state
        .metrics
        .encode()
        .map_err(|e| ApiError::Internal(TrendpostError::Serialize(e.to_string())))
}
