//! WebSocket-Transport – `GET /ws` auf dem HTTP-Listener
//!
//! Ein Text-Frame enthaelt genau ein Event-Envelope. Binaer-Frames werden
//! ignoriert. Der Server sendet alle `keepalive_sek` einen Ping und trennt
//! Verbindungen, die `verbindungs_timeout_sek` lang keinen Frame (auch
//! keinen Pong) geliefert haben.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::dispatcher::MessageDispatcher;

#[derive(Clone)]
struct WsState {
    dispatcher: MessageDispatcher,
    shutdown_rx: watch::Receiver<bool>,
}

/// Axum-Router fuer den `/ws`-Endpunkt
pub fn ws_router(dispatcher: MessageDispatcher, shutdown_rx: watch::Receiver<bool>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(WsState {
        dispatcher,
        shutdown_rx,
    })
}

/// `GET /ws` – 503 wenn das Verbindungslimit erreicht ist, sonst Upgrade
///
/// Das Limit wird vor dem Upgrade-Handshake geprueft, deshalb ist der
/// Extractor optional.
async fn ws_handler(State(state): State<WsState>, ws: Option<WebSocketUpgrade>) -> Response {
    if !state.dispatcher.hat_kapazitaet() {
        tracing::warn!("Server voll, WebSocket-Upgrade abgelehnt");
        return (StatusCode::SERVICE_UNAVAILABLE, "Server voll").into_response();
    }
    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "WebSocket-Upgrade erwartet").into_response();
    };

    let max_groesse = state.dispatcher.state().config.max_frame_groesse;
    ws.max_message_size(max_groesse)
        .on_upgrade(move |socket| websocket_verarbeiten(socket, state.dispatcher, state.shutdown_rx))
}

async fn websocket_verarbeiten(
    socket: WebSocket,
    dispatcher: MessageDispatcher,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let config = dispatcher.state().config.clone();
    let timeout_dauer = Duration::from_secs(config.verbindungs_timeout_sek);

    let (handle, mut ausgehend_rx) = match dispatcher.verbinden() {
        Ok(verbindung) => verbindung,
        Err(e) => {
            tracing::warn!("WebSocket-Verbindung abgelehnt: {e}");
            return;
        }
    };
    tracing::info!(connection = %handle, "Neue WebSocket-Verbindung");

    let (mut sender, mut receiver) = socket.split();

    let keepalive = Duration::from_secs(config.keepalive_sek.max(1));
    let mut ping_intervall = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
    ping_intervall.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut letzter_empfang = Instant::now();

    loop {
        tokio::select! {
            nachricht = receiver.next() => {
                match nachricht {
                    Some(Ok(Message::Text(text))) => {
                        letzter_empfang = Instant::now();
                        dispatcher.rohdaten_verarbeiten(handle, text.as_bytes());
                    }
                    Some(Ok(Message::Binary(_))) => {
                        letzter_empfang = Instant::now();
                        tracing::debug!(connection = %handle, "Binaer-Frame ignoriert");
                    }
                    // Pings beantwortet axum selbst
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        letzter_empfang = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(connection = %handle, "WebSocket vom Client geschlossen");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(connection = %handle, fehler = %e, "WebSocket-Lesefehler");
                        break;
                    }
                }
            }

            ausgehend = ausgehend_rx.recv() => {
                let Some(event) = ausgehend else { break };
                match event.to_json() {
                    Ok(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(connection = %handle, event = event.name(), "Serialisierung fehlgeschlagen: {e}");
                    }
                }
            }

            _ = ping_intervall.tick() => {
                if letzter_empfang.elapsed() > timeout_dauer {
                    tracing::warn!(connection = %handle, "Verbindungs-Timeout");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!(connection = %handle, "Shutdown-Signal, WebSocket wird geschlossen");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    dispatcher.trennen(handle);
    tracing::info!(connection = %handle, "WebSocket-Task beendet");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::{SignalingConfig, SignalingState};
    use axum::body::Body;
    use axum::http::Request;
    use parley_observability::RelayMetrics;
    use tower::ServiceExt;

    fn router(max_verbindungen: usize) -> (Router, MessageDispatcher) {
        let config = SignalingConfig {
            max_verbindungen,
            ..SignalingConfig::default()
        };
        let dispatcher =
            MessageDispatcher::neu(SignalingState::neu(config, RelayMetrics::neu().unwrap()));
        let (_tx, rx) = watch::channel(false);
        (ws_router(dispatcher.clone(), rx), dispatcher)
    }

    #[tokio::test]
    async fn ohne_upgrade_header_426() {
        let (app, _) = router(10);
        let antwort = app
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::UPGRADE_REQUIRED);
    }

    #[tokio::test]
    async fn volles_limit_503() {
        let (app, dispatcher) = router(1);
        let _verbindung = dispatcher.verbinden().unwrap();

        let antwort = app
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
