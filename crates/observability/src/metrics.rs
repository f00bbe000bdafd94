//! Prometheus-kompatible Metriken fuer Parley
//!
//! Registrierte Metriken:
//! - `parley_connections` – Gauge: Offene Transport-Verbindungen
//! - `parley_online_users` – Gauge: Registrierte Benutzer
//! - `parley_call_records` – Gauge: Verbindungen mit laufendem Anruf (ein Record pro Seite)
//! - `parley_pending_calls` – Gauge: Offene Einladungen ohne Antwort
//! - `parley_events_total` – Counter: Eingehende Events (event)
//! - `parley_undeliverable_total` – Counter: Events mit unbekanntem Ziel (event)

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Relay-Metriken
///
/// Jede Instanz hat ihre eigene Registry, damit Tests sich nicht
/// gegenseitig beeinflussen. Clone teilt die Zaehler.
#[derive(Clone)]
pub struct RelayMetrics {
    pub registry: Arc<Registry>,

    pub connections: IntGauge,
    pub online_users: IntGauge,
    pub call_records: IntGauge,
    pub pending_calls: IntGauge,
    pub events_total: IntCounterVec,
    pub undeliverable_total: IntCounterVec,
}

impl RelayMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connections = IntGauge::with_opts(Opts::new(
            "parley_connections",
            "Anzahl offener Transport-Verbindungen",
        ))?;
        registry.register(Box::new(connections.clone()))?;

        let online_users = IntGauge::with_opts(Opts::new(
            "parley_online_users",
            "Anzahl registrierter Benutzer",
        ))?;
        registry.register(Box::new(online_users.clone()))?;

        let call_records = IntGauge::with_opts(Opts::new(
            "parley_call_records",
            "Anzahl Verbindungen mit laufendem Anruf",
        ))?;
        registry.register(Box::new(call_records.clone()))?;

        let pending_calls = IntGauge::with_opts(Opts::new(
            "parley_pending_calls",
            "Anzahl offener Einladungen ohne Antwort",
        ))?;
        registry.register(Box::new(pending_calls.clone()))?;

        let events_total = IntCounterVec::new(
            Opts::new("parley_events_total", "Gesamtanzahl eingehender Events"),
            &["event"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let undeliverable_total = IntCounterVec::new(
            Opts::new(
                "parley_undeliverable_total",
                "Events deren Ziel nicht registriert war",
            ),
            &["event"],
        )?;
        registry.register(Box::new(undeliverable_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connections,
            online_users,
            call_records,
            pending_calls,
            events_total,
            undeliverable_total,
        })
    }

    /// Zaehlt ein eingehendes Event
    pub fn event_gezaehlt(&self, event: &str) {
        self.events_total.with_label_values(&[event]).inc();
    }

    /// Zaehlt ein Event, dessen Ziel nicht aufgeloest werden konnte
    pub fn unzustellbar(&self, event: &str) {
        self.undeliverable_total.with_label_values(&[event]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RelayMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
