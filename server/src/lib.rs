//! parley-server – Bibliotheks-Root
//!
//! Verdrahtet Signaling, Transporte und Observability zu einem laufenden
//! Relay und stellt den Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use axum::Router;
use config::ServerConfig;
use parley_observability::{observability_router, HealthState, RelayMetrics};
use parley_signaling::{ws_router, MessageDispatcher, SignalingServer, SignalingState};
use std::net::SocketAddr;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

/// HTTP-Router: `/ws`, `/metrics` und `/health` auf einem Listener
///
/// Browser-Clients werden von einer anderen Origin ausgeliefert, daher
/// ist CORS offen.
pub fn http_router(
    dispatcher: MessageDispatcher,
    metriken: RelayMetrics,
    health: HealthState,
    shutdown_rx: watch::Receiver<bool>,
) -> Router {
    Router::new()
        .merge(ws_router(dispatcher, shutdown_rx))
        .merge(observability_router(metriken, health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Listener und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und Relay-Zustand anlegen
    /// 2. TCP-Listener starten (falls aktiviert)
    /// 3. HTTP-Listener starten (WebSocket, Metriken, Health)
    /// 4. Auf Ctrl-C warten, dann alle Verbindungen geordnet schliessen
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            http = %self.config.http_bind_adresse(),
            tcp = %self.config.tcp_bind_adresse(),
            tcp_aktiviert = self.config.netzwerk.tcp_aktiviert,
            "Server startet"
        );

        let metriken = RelayMetrics::neu().context("Metriken konnten nicht registriert werden")?;
        let state = SignalingState::neu(self.config.signaling_config(), metriken.clone());
        let dispatcher = MessageDispatcher::neu(state);
        let health = HealthState::neu(metriken.clone(), self.config.server.max_verbindungen);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // TCP-Transport
        let tcp_task = if self.config.netzwerk.tcp_aktiviert {
            let addr: SocketAddr = self
                .config
                .tcp_bind_adresse()
                .parse()
                .context("Ungueltige TCP-Bind-Adresse")?;
            let server = SignalingServer::binden(dispatcher.clone(), addr)
                .await
                .with_context(|| format!("TCP-Listener auf {addr} konnte nicht gebunden werden"))?;
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = server.starten(rx).await {
                    tracing::error!(fehler = %e, "TCP Signaling-Server beendet mit Fehler");
                }
            }))
        } else {
            None
        };

        // HTTP-Listener
        let http_addr: SocketAddr = self
            .config
            .http_bind_adresse()
            .parse()
            .context("Ungueltige HTTP-Bind-Adresse")?;
        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .with_context(|| format!("HTTP-Listener auf {http_addr} konnte nicht gebunden werden"))?;
        let app = http_router(dispatcher, metriken, health.clone(), shutdown_rx.clone());

        let mut http_shutdown = shutdown_rx.clone();
        let http_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.wait_for(|stop| *stop).await;
                })
                .await
        });

        health.bereit_setzen(true);
        tracing::info!(adresse = %http_addr, "Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        health.bereit_setzen(false);
        let _ = shutdown_tx.send(true);

        http_task
            .await
            .context("HTTP-Task abgebrochen")?
            .context("HTTP-Server beendet mit Fehler")?;
        if let Some(task) = tcp_task {
            task.await.context("TCP-Task abgebrochen")?;
        }

        tracing::info!("Server gestoppt");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use parley_signaling::SignalingConfig;
    use tower::ServiceExt;

    fn test_router(max_verbindungen: usize) -> (Router, HealthState, MessageDispatcher) {
        let metriken = RelayMetrics::neu().unwrap();
        let config = SignalingConfig {
            max_verbindungen,
            ..SignalingConfig::default()
        };
        let dispatcher = MessageDispatcher::neu(SignalingState::neu(config, metriken.clone()));
        let health = HealthState::neu(metriken.clone(), max_verbindungen);
        let (_tx, rx) = watch::channel(false);
        let app = http_router(dispatcher.clone(), metriken, health.clone(), rx);
        (app, health, dispatcher)
    }

    #[tokio::test]
    async fn health_und_metrics_erreichbar() {
        let (app, health, _dispatcher) = test_router(10);
        health.bereit_setzen(true);

        let antwort = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);

        let antwort = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn volles_limit_lehnt_websocket_ab() {
        let (app, _health, dispatcher) = test_router(1);
        let _verbindung = dispatcher.verbinden().unwrap();

        let anfrage = Request::get("/ws")
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap();
        let antwort = app.oneshot(anfrage).await.unwrap();
        assert_eq!(antwort.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
