//! Health check endpoint.
//!
//! Always answers 200: a failing queue check is reported in the body
//! (`amqp_status = "DOWN"` plus `text_error`), not through the status code.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use relay_common::types::{AppStatus, QueueStatus};

use crate::state::AppState;

const APP_STATUS_UP: &str = "UP";
const DB_STATUS_NOT_IN_USE: &str = "NOT_IN_USE";

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<AppStatus> {
    let (amqp_status, text_error) = match state.probe.is_queue_ok().await {
        Ok(status) => (status, None),
        Err(e) => {
            tracing::error!(error = %e, "AMQP check failed");
            (QueueStatus::Down, Some(e.to_string()))
        }
    };

    Json(AppStatus {
        status: APP_STATUS_UP.to_string(),
        db_status: DB_STATUS_NOT_IN_USE.to_string(),
        amqp_status,
        text_error,
    })
}
