//! # parley-observability
//!
//! Observability-Crate fuer Parley:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, RelayMetrics};

use axum::Router;

/// Router mit `/metrics` und `/health`
///
/// Wird vom Server mit der WebSocket-Route auf demselben Listener gemerged.
pub fn observability_router(metriken: RelayMetrics, health: HealthState) -> Router {
    Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(health))
}
