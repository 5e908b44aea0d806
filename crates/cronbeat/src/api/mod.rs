use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::models::{
    CreateMonitorRequest, ListMonitorsQuery, MonitorSummary, MonitorView, PauseRequest,
    PingRequest, PingResponse, ResumeRequest, UpdateMonitorRequest,
};
use crate::monitors::rate_limit::RateDecision;
use crate::monitors::{
    build_timeline, compute_status, stats, Clock, MonitorPatch, MonitorStore, NewMonitor, NewPing,
    PauseController, PingRateLimiter, PingRecorder,
};

pub mod error;
pub mod models;
pub mod validation;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn MonitorStore>,
    pub clock: Arc<dyn Clock>,
    pub recorder: PingRecorder,
    pub pauses: PauseController,
    pub rate_limiter: PingRateLimiter,
    pub timeline_limit: usize,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        clock: Arc<dyn Clock>,
        rate_limiter: PingRateLimiter,
        timeline_limit: usize,
    ) -> Self {
        Self {
            recorder: PingRecorder::new(store.clone(), clock.clone()),
            pauses: PauseController::new(store.clone(), clock.clone()),
            store,
            clock,
            rate_limiter,
            timeline_limit,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Ping ingestion
        .route("/api/ping/:id", get(ping_get).post(ping_post))
        // Pause state
        .route("/api/pause", post(pause_monitor))
        .route("/api/resume", post(resume_monitor))
        // Monitors
        .route("/api/monitors", get(list_monitors).post(create_monitor))
        .route(
            "/api/monitors/:id",
            get(get_monitor).patch(update_monitor).delete(delete_monitor),
        )
        .route("/api/monitors/:id/timeline", get(get_timeline))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

// ----------------------------
// Ping ingestion
// ----------------------------

fn parse_monitor_id(raw: &str) -> Result<Uuid, ApiError> {
    // a malformed id cannot name a monitor
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::monitor_not_found())
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
}

async fn check_rate(state: &ApiState, monitor_id: Uuid) -> Result<(), ApiError> {
    match state
        .rate_limiter
        .check(monitor_id, state.clock.now())
        .await?
    {
        RateDecision::Allowed { .. } => Ok(()),
        RateDecision::Limited { retry_after_secs } => {
            Err(ApiError::RateLimited { retry_after_secs })
        }
    }
}

pub async fn ping_get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response, ApiError> {
    let monitor_id = parse_monitor_id(&id)?;
    check_rate(&state, monitor_id).await?;

    let ping = NewPing {
        ip: client_ip(&headers, peer.map(|c| c.0)),
        ..NewPing::default()
    };

    match state.recorder.record_ping(monitor_id, ping).await? {
        Some(_) => Ok((StatusCode::OK, "OK").into_response()),
        None => Err(ApiError::monitor_not_found()),
    }
}

pub async fn ping_post(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<PingResponse>, ApiError> {
    let monitor_id = parse_monitor_id(&id)?;
    let req: PingRequest = validation::optional_json_body(&body)?;
    let duration_ms = validation::duration_ms(req.duration)?;
    let message = validation::message(req.message)?;

    check_rate(&state, monitor_id).await?;

    let ping = NewPing {
        success: req.success.unwrap_or(true),
        duration_ms,
        message,
        ip: client_ip(&headers, peer.map(|c| c.0)),
    };

    let recorded = state
        .recorder
        .record_ping(monitor_id, ping)
        .await?
        .ok_or_else(ApiError::monitor_not_found)?;

    // the monitor may be deleted between the two calls
    let monitor = state
        .store
        .get_monitor(monitor_id)
        .await?
        .ok_or_else(ApiError::monitor_not_found)?;

    Ok(Json(PingResponse {
        status: "ok",
        ping_id: recorded.id,
        monitor: MonitorSummary {
            id: monitor.id,
            status: compute_status(&monitor, state.clock.now()),
            name: monitor.name,
        },
    }))
}

// ----------------------------
// Pause / resume
// ----------------------------

pub async fn pause_monitor(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<MonitorView>, ApiError> {
    let req: PauseRequest = validation::required_json_body(&body)?;
    let reason = validation::pause_reason(req.reason)?;

    let monitor = state
        .pauses
        .pause(req.id, reason, req.until)
        .await?
        .ok_or_else(ApiError::monitor_not_found)?;

    Ok(Json(MonitorView::new(monitor, state.clock.now())))
}

pub async fn resume_monitor(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<MonitorView>, ApiError> {
    let req: ResumeRequest = validation::required_json_body(&body)?;

    let monitor = state
        .pauses
        .resume(req.id)
        .await?
        .ok_or_else(ApiError::monitor_not_found)?;

    Ok(Json(MonitorView::new(monitor, state.clock.now())))
}

// ----------------------------
// Monitors
// ----------------------------

pub async fn list_monitors(
    State(state): State<ApiState>,
    Query(q): Query<ListMonitorsQuery>,
) -> Result<Response, ApiError> {
    // status reads also end expired timed pauses
    let now = state.clock.now();
    state.pauses.sweep_expired_pauses(now).await?;

    if q.stats.unwrap_or(false) {
        let stats = stats::snapshot(state.store.as_ref(), now).await?;
        return Ok(Json(stats).into_response());
    }

    let monitors = state.store.list_monitors().await?;
    let views: Vec<MonitorView> = monitors
        .into_iter()
        .map(|m| MonitorView::new(m, now))
        .collect();
    Ok(Json(views).into_response())
}

pub async fn create_monitor(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MonitorView>), ApiError> {
    let req: CreateMonitorRequest = validation::required_json_body(&body)?;

    let mut new = NewMonitor::new(
        validation::name(&req.name)?,
        validation::schedule(&req.schedule)?,
    );
    if let Some(grace) = req.grace_minutes {
        new = new.with_grace(validation::grace_minutes(grace)?);
    }

    let now = state.clock.now();
    let monitor = state.store.create_monitor(new, now).await?;
    tracing::info!(
        monitor_id = %monitor.id,
        interval_minutes = ?monitor.interval_minutes,
        "monitor created"
    );

    Ok((StatusCode::CREATED, Json(MonitorView::new(monitor, now))))
}

pub async fn get_monitor(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MonitorView>, ApiError> {
    let now = state.clock.now();
    state.pauses.sweep_expired_pauses(now).await?;

    let monitor = state
        .store
        .get_monitor(id)
        .await?
        .ok_or_else(ApiError::monitor_not_found)?;
    Ok(Json(MonitorView::new(monitor, now)))
}

pub async fn update_monitor(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<MonitorView>, ApiError> {
    let req: UpdateMonitorRequest = validation::required_json_body(&body)?;

    let patch = MonitorPatch {
        name: req.name.as_deref().map(validation::name).transpose()?,
        schedule: req.schedule.as_deref().map(validation::schedule).transpose()?,
        grace_minutes: req.grace_minutes.map(validation::grace_minutes).transpose()?,
    };

    let found = if patch.is_empty() {
        state.store.get_monitor(id).await?
    } else {
        state.store.update_monitor(id, patch).await?
    };
    let monitor = found.ok_or_else(ApiError::monitor_not_found)?;

    Ok(Json(MonitorView::new(monitor, state.clock.now())))
}

pub async fn delete_monitor(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_monitor(id).await? {
        tracing::info!(monitor_id = %id, "monitor deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::monitor_not_found())
    }
}

pub async fn get_timeline(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let now = state.clock.now();
    state.pauses.sweep_expired_pauses(now).await?;

    match build_timeline(state.store.as_ref(), id, now, state.timeline_limit).await? {
        Some(tl) => Ok((StatusCode::OK, Json(tl)).into_response()),
        None => Err(ApiError::monitor_not_found()),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
