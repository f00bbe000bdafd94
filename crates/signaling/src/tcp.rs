//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` startet fuer jede eingehende Verbindung einen
//! eigenen tokio-Task mit einer `ClientConnection`. Der Relay-Zustand ist
//! `Send + Sync`, die Tasks laufen daher auf dem normalen Multi-Thread-
//! Executor.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::dispatcher::MessageDispatcher;
use crate::error::SignalingResult;

/// TCP-Signaling-Server
pub struct SignalingServer {
    dispatcher: MessageDispatcher,
    listener: TcpListener,
}

impl SignalingServer {
    /// Bindet den TCP-Socket
    ///
    /// Port 0 waehlt einen freien Port; siehe `lokale_addr()`.
    pub async fn binden(dispatcher: MessageDispatcher, bind_addr: SocketAddr) -> SignalingResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            dispatcher,
            listener,
        })
    }

    /// Tatsaechlich gebundene Adresse
    pub fn lokale_addr(&self) -> SignalingResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> SignalingResult<()> {
        tracing::info!(adresse = %self.lokale_addr()?, "TCP Signaling-Server gestartet");

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            if !self.dispatcher.hat_kapazitaet() {
                                tracing::warn!(peer = %peer_addr, "Server voll, Verbindung abgelehnt");
                                drop(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            let verbindung = ClientConnection::neu(self.dispatcher.clone(), peer_addr);
                            let shutdown_rx_clone = shutdown_rx.clone();
                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("TCP Signaling-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Signaling-Server gestoppt");
        Ok(())
    }
}
