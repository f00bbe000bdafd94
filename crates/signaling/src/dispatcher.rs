//! Message-Dispatcher – Routet eingehende Events an die richtigen Handler
//!
//! Der Dispatcher ist die einzige Stelle, die den Relay-Zustand veraendert.
//! Ablauf pro Event:
//! 1. Relay-Lock nehmen, Handler ausfuehren, Zustellungen berechnen
//! 2. Lock freigeben
//! 3. Zustellungen ueber den `EventBroadcaster` einreihen
//!
//! Jede Verbindung ruft den Dispatcher sequentiell auf, dadurch bleibt die
//! Reihenfolge der Events pro Verbindung erhalten.

use parley_core::ConnectionId;
use parley_protocol::{InboundEvent, OutboundEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::call_state::CallPhase;
use crate::error::SignalingResult;
use crate::handlers::{call_handler, presence_handler, signal_handler};
use crate::router::Zustellung;
use crate::server_state::SignalingState;

/// Lebenszyklus einer Verbindung aus Sicht des Relays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleZustand {
    /// Transport offen, noch keine Identity
    Verbunden,
    /// Identity registriert, kein Anruf
    Registriert,
    /// Einladung gesendet, wartet auf Antwort
    Klingelt,
    /// Anruf angenommen
    ImAnruf,
    /// Transport geschlossen
    Getrennt,
}

/// Zentraler Message-Dispatcher
///
/// Clone teilt den Zustand; jede Verbindung haelt ihre eigene Kopie.
#[derive(Clone)]
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    /// Neue Transport-Verbindung: Handle vergeben und Send-Queue anlegen
    pub fn verbinden(&self) -> SignalingResult<(ConnectionId, mpsc::Receiver<OutboundEvent>)> {
        let handle = ConnectionId::new();
        let rx = self.state.broadcaster.verbindung_registrieren(handle)?;
        self.state.metriken.connections.inc();
        tracing::debug!(connection = %handle, "Verbindung geoeffnet");
        Ok((handle, rx))
    }

    /// Ist noch Platz fuer eine weitere Verbindung?
    pub fn hat_kapazitaet(&self) -> bool {
        self.state.broadcaster.hat_kapazitaet()
    }

    /// Parst ein rohes Event und verarbeitet es
    ///
    /// Ungueltiges JSON, unbekannte Events und fehlende Felder werden
    /// geloggt und verworfen; die Verbindung bleibt offen.
    pub fn rohdaten_verarbeiten(&self, handle: ConnectionId, bytes: &[u8]) -> usize {
        match parsen(bytes) {
            Ok(event) => self.dispatch(handle, event),
            Err(e) => {
                self.state.metriken.event_gezaehlt("invalid");
                tracing::warn!(connection = %handle, "Ungueltiges Event verworfen: {e}");
                0
            }
        }
    }

    /// Verarbeitet ein Event und reiht die Zustellungen ein
    ///
    /// Gibt die Anzahl eingereihter Events zurueck.
    pub fn dispatch(&self, handle: ConnectionId, event: InboundEvent) -> usize {
        let zustellungen = self.verarbeiten(handle, event);
        self.ausliefern(zustellungen)
    }

    /// Verarbeitet ein Event unter dem Relay-Lock, ohne zu senden
    pub fn verarbeiten(&self, handle: ConnectionId, event: InboundEvent) -> Vec<Zustellung> {
        let name = event.name();
        self.state.metriken.event_gezaehlt(name);
        tracing::trace!(connection = %handle, event = name, "Event empfangen");

        let metriken = &self.state.metriken;
        self.state.mit_zustand(|zustand| match event {
            InboundEvent::RegisterUser(req) => {
                presence_handler::handle_register_user(req, handle, zustand)
            }
            InboundEvent::RequestCall(req) => {
                call_handler::handle_request_call(req, handle, zustand, metriken)
            }
            InboundEvent::CallResponse(req) => {
                call_handler::handle_call_response(req, handle, zustand, metriken)
            }
            InboundEvent::CallEnded(req) => {
                call_handler::handle_call_ended(req, handle, zustand, metriken)
            }
            InboundEvent::ToggleMedia(req) => {
                call_handler::handle_toggle_media(req, handle, zustand, metriken)
            }
            InboundEvent::Signal(req) => {
                signal_handler::handle_signal(req, handle, zustand, metriken)
            }
        })
    }

    /// Verbindung geschlossen: Send-Queue entfernen, Zustand aufraeumen
    ///
    /// Mehrfache Aufrufe fuer dasselbe Handle sind wirkungslos.
    pub fn trennen(&self, handle: ConnectionId) {
        let vorher = self.verbindungszustand(handle);
        if !self.state.broadcaster.verbindung_entfernen(handle) {
            return;
        }
        self.state.metriken.connections.dec();

        let zustellungen = self
            .state
            .mit_zustand(|zustand| presence_handler::handle_disconnect(handle, zustand));
        self.ausliefern(zustellungen);
        tracing::debug!(connection = %handle, zustand = ?vorher, "Verbindung geschlossen");
    }

    /// Aktueller Lebenszyklus-Zustand einer Verbindung
    pub fn verbindungszustand(&self, handle: ConnectionId) -> HandleZustand {
        if !self.state.broadcaster.ist_verbunden(handle) {
            return HandleZustand::Getrennt;
        }
        self.state.mit_zustand(|zustand| {
            if zustand.registry.identitaet_von(handle).is_none() {
                return HandleZustand::Verbunden;
            }
            match zustand.anrufe.phase_von(handle) {
                Some(CallPhase::Aktiv) => HandleZustand::ImAnruf,
                Some(CallPhase::Klingelt) => HandleZustand::Klingelt,
                None => HandleZustand::Registriert,
            }
        })
    }

    fn ausliefern(&self, zustellungen: Vec<Zustellung>) -> usize {
        zustellungen
            .into_iter()
            .map(|zustellung| self.state.broadcaster.zustellen(zustellung))
            .sum()
    }
}

fn parsen(bytes: &[u8]) -> SignalingResult<InboundEvent> {
    Ok(InboundEvent::from_slice(bytes)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::SignalingConfig;
    use parley_core::Identity;
    use parley_observability::RelayMetrics;
    use parley_protocol::events::{RegisterUser, RequestCall};

    fn dispatcher() -> MessageDispatcher {
        let state = SignalingState::neu(SignalingConfig::default(), RelayMetrics::neu().unwrap());
        MessageDispatcher::neu(state)
    }

    fn register(name: &str) -> InboundEvent {
        InboundEvent::RegisterUser(RegisterUser {
            username: Identity::new(name),
        })
    }

    #[tokio::test]
    async fn ungueltige_rohdaten_werden_verworfen() {
        let d = dispatcher();
        let (handle, mut rx) = d.verbinden().unwrap();

        assert_eq!(d.rohdaten_verarbeiten(handle, b"{kaputt"), 0);
        assert_eq!(
            d.rohdaten_verarbeiten(handle, br#"{"event":"dance","data":{}}"#),
            0
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(d.verbindungszustand(handle), HandleZustand::Verbunden);
    }

    #[tokio::test]
    async fn registrieren_ueber_rohdaten() {
        let d = dispatcher();
        let (handle, mut rx) = d.verbinden().unwrap();

        d.rohdaten_verarbeiten(handle, br#"{"event":"register_user","data":{"username":"alice"}}"#);
        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundEvent::OnlineUsers { users: vec![] }
        );
        assert_eq!(d.verbindungszustand(handle), HandleZustand::Registriert);
        assert_eq!(d.state().metriken.online_users.get(), 1);
    }

    #[tokio::test]
    async fn lebenszyklus_bis_trennen() {
        let d = dispatcher();
        let (alice, _rx_a) = d.verbinden().unwrap();
        let (bob, mut rx_b) = d.verbinden().unwrap();

        d.dispatch(alice, register("alice"));
        d.dispatch(bob, register("bob"));
        d.dispatch(
            alice,
            InboundEvent::RequestCall(RequestCall {
                caller: Identity::new("alice"),
                callee: Identity::new("bob"),
                art: parley_core::MediaKind::Video,
            }),
        );
        assert_eq!(d.verbindungszustand(alice), HandleZustand::Klingelt);

        d.trennen(alice);
        assert_eq!(d.verbindungszustand(alice), HandleZustand::Getrennt);

        // bob: online_users, incoming_call, user_disconnected
        let mut letzte = None;
        while let Ok(event) = rx_b.try_recv() {
            letzte = Some(event);
        }
        assert_eq!(
            letzte,
            Some(OutboundEvent::UserDisconnected {
                username: Identity::new("alice")
            })
        );
        assert!(d.state().mit_zustand(|z| z.ist_konsistent()));
    }

    #[tokio::test]
    async fn trennen_ist_idempotent() {
        let d = dispatcher();
        let (alice, _rx_a) = d.verbinden().unwrap();
        let (bob, mut rx_b) = d.verbinden().unwrap();
        d.dispatch(alice, register("alice"));
        d.dispatch(bob, register("bob"));
        while rx_b.try_recv().is_ok() {}

        d.trennen(alice);
        d.trennen(alice);

        assert!(rx_b.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err(), "Nur ein user_disconnected erwartet");
        assert_eq!(d.state().metriken.connections.get(), 1);
    }
}
