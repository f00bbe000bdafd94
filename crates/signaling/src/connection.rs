//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung laeuft in einem eigenen tokio-Task. Eingehende
//! Frames gehen an den `MessageDispatcher`, ausgehende Events kommen aus
//! der Send-Queue des Broadcasters.
//!
//! ## Lebenszyklus
//! ```text
//! Accept -> verbinden() -> Frames lesen/schreiben -> trennen()
//! ```
//!
//! ## Timeout
//! Kommt innerhalb von `verbindungs_timeout_sek` kein Frame, wird die
//! Verbindung getrennt. Das Envelope-Format kennt kein Ping-Event; Clients
//! ohne eigenen Verkehr muessen sich daher ueber den WebSocket-Transport
//! verbinden.

use futures_util::{SinkExt, StreamExt};
use parley_protocol::wire::FrameCodec;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::dispatcher::MessageDispatcher;

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    dispatcher: MessageDispatcher,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    pub fn neu(dispatcher: MessageDispatcher, peer_addr: SocketAddr) -> Self {
        Self {
            dispatcher,
            peer_addr,
        }
    }

    /// Startet die Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, ein Frame-Fehler auftritt, der Timeout
    /// greift oder ein Shutdown-Signal eingeht. Danach wird genau einmal
    /// `trennen()` aufgerufen.
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let config = self.dispatcher.state().config.clone();
        let timeout_dauer = Duration::from_secs(config.verbindungs_timeout_sek);

        let (handle, mut ausgehend_rx) = match self.dispatcher.verbinden() {
            Ok(verbindung) => verbindung,
            Err(e) => {
                tracing::warn!(peer = %peer_addr, "Verbindung abgelehnt: {e}");
                return;
            }
        };

        tracing::info!(peer = %peer_addr, connection = %handle, "Neue TCP-Verbindung");

        let mut framed = Framed::new(stream, FrameCodec::with_max_size(config.max_frame_groesse));
        let mut frist = Instant::now() + timeout_dauer;

        loop {
            tokio::select! {
                // Eingehender Frame vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(payload)) => {
                            frist = Instant::now() + timeout_dauer;
                            self.dispatcher.rohdaten_verarbeiten(handle, &payload);
                        }
                        Some(Err(e)) => {
                            tracing::warn!(connection = %handle, fehler = %e, "Frame-Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(connection = %handle, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehendes Event aus dem Broadcaster
                ausgehend = ausgehend_rx.recv() => {
                    match ausgehend {
                        Some(event) => {
                            if let Err(e) = framed.send(event).await {
                                tracing::warn!(connection = %handle, fehler = %e, "Senden fehlgeschlagen");
                                break;
                            }
                        }
                        None => break,
                    }
                }

                _ = tokio::time::sleep_until(frist) => {
                    tracing::warn!(connection = %handle, "Verbindungs-Timeout");
                    break;
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(connection = %handle, "Shutdown-Signal, Verbindung wird getrennt");
                        break;
                    }
                }
            }
        }

        self.dispatcher.trennen(handle);
        tracing::info!(peer = %peer_addr, connection = %handle, "Verbindungs-Task beendet");
    }
}
