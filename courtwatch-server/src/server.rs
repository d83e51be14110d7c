//! Axum server setup and router configuration.

use crate::roles::Role;
use crate::state::AppState;
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use courtwatch_core::processors::HealthReport;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    role: Role,
    report: Option<HealthReport>,
}

/// Latest health report. Always 200 while the process is up.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.borrow().clone();
    let status = match &report {
        None => "starting",
        Some(report) if report.healthy() => "healthy",
        Some(_) => "degraded",
    };
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        role: state.role,
        report,
    })
}

/// Ready check response.
#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
}

/// 200 once the last health check reached both the broker and the store.
async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state
        .health
        .borrow()
        .as_ref()
        .is_some_and(HealthReport::healthy);
    if ready {
        (StatusCode::OK, Json(ReadyResponse { status: "ready" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not ready",
            }),
        )
    }
}

/// Run the server until the shutdown flag is raised.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Response;
    use time::OffsetDateTime;

    fn report(broker_ok: bool) -> HealthReport {
        HealthReport {
            checked_at: OffsetDateTime::UNIX_EPOCH,
            broker_ok,
            store_ok: true,
            queues: Vec::new(),
            subscribers: Some(1),
            errors: Vec::new(),
        }
    }

    async fn ready_status(report: Option<HealthReport>) -> StatusCode {
        let (_tx, rx) = watch::channel(report);
        let response: Response = ready_check(State(AppState::new(rx, Role::All)))
            .await
            .into_response();
        response.status()
    }

    #[tokio::test]
    async fn test_ready_follows_last_report() {
        assert_eq!(ready_status(None).await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ready_status(Some(report(false))).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ready_status(Some(report(true))).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_is_always_ok() {
        let (_tx, rx) = watch::channel(Some(report(false)));
        let response = health_check(State(AppState::new(rx, Role::Coordinator)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
