//! Health-Check-Endpunkt fuer Parley
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Anzahl Online-Benutzer

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::RelayMetrics;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Verbindungslimit erreicht, neue Clients werden abgewiesen
    Degraded,
    /// Listener noch nicht gebunden oder bereits im Shutdown
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub online_users: i64,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    bereit: Arc<AtomicBool>,
    max_verbindungen: usize,
    metriken: RelayMetrics,
}

impl HealthState {
    pub fn neu(metriken: RelayMetrics, max_verbindungen: usize) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            bereit: Arc::new(AtomicBool::new(false)),
            max_verbindungen,
            metriken,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn bereit_setzen(&self, bereit: bool) {
        self.bereit.store(bereit, Ordering::Relaxed);
    }

    /// Ermittelt den aktuellen Status
    pub fn status(&self) -> HealthStatus {
        if !self.bereit.load(Ordering::Relaxed) {
            HealthStatus::Unhealthy
        } else if self.metriken.connections.get() >= self.max_verbindungen as i64 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn antwort(&self) -> HealthResponse {
        HealthResponse {
            status: self.status(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            online_users: self.metriken.online_users.get(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Relay-Status zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.antwort();

    let http_status = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK, // 200 auch bei degraded (Probe soll nicht failen)
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(max: usize) -> HealthState {
        HealthState::neu(RelayMetrics::neu().unwrap(), max)
    }

    #[test]
    fn nicht_bereit_ist_unhealthy() {
        let state = test_state(10);
        assert_eq!(state.status(), HealthStatus::Unhealthy);
        state.bereit_setzen(true);
        assert_eq!(state.status(), HealthStatus::Healthy);
    }

    #[test]
    fn volles_limit_ist_degraded() {
        let state = test_state(2);
        state.bereit_setzen(true);
        state.metriken.connections.set(2);
        assert_eq!(state.status(), HealthStatus::Degraded);
    }

    #[test]
    fn antwort_enthaelt_online_benutzer() {
        let state = test_state(10);
        state.metriken.online_users.set(7);
        let antwort = state.antwort();
        assert_eq!(antwort.online_users, 7);
        assert!(antwort.uptime_seconds < 5);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            online_users: 2,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_seconds\":3600"));
        assert!(json.contains("\"online_users\":2"));
    }

    #[tokio::test]
    async fn endpunkt_liefert_503_vor_start() {
        let state = test_state(10);
        let app = health_router(state.clone());

        let antwort = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.bereit_setzen(true);
        let antwort = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);
    }
}
