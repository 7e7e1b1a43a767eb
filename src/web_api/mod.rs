//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP API routes
//! - Request validation
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let inference_ok = state.inference.health_check().await.unwrap_or(false);

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        inference_connected: inference_ok,
    };

    Json(response)
}

/// System status endpoint
pub async fn system_status(State(_state): State<AppState>) -> impl IntoResponse {
    use sysinfo::System;

    let mut sys = System::new_all();
    sys.refresh_all();

    let cpu_percent = {
        let cpus = sys.cpus();
        if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        }
    };
    let memory_percent = if sys.total_memory() > 0 {
        (sys.used_memory() as f32 / sys.total_memory() as f32) * 100.0
    } else {
        0.0
    };

    Json(json!({
        "service": "sentinel-server",
        "version": env!("CARGO_PKG_VERSION"),
        "cpu_percent": cpu_percent,
        "memory_percent": memory_percent,
    }))
}
