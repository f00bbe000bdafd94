//! Event-Broadcaster – Send-Queues aller offenen Verbindungen
//!
//! Jede Transport-Verbindung (TCP oder WebSocket) registriert beim Accept
//! eine begrenzte Queue. Der Broadcaster reiht Events nur ein und blockiert
//! nie; geschrieben wird vom Task der jeweiligen Verbindung.
//!
//! ## Ziele
//! - An eine Verbindung: `an_verbindung_senden`
//! - An alle ausser einer: `an_alle_ausser_senden`

use dashmap::DashMap;
use parley_core::ConnectionId;
use parley_protocol::OutboundEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{SignalingError, SignalingResult};
use crate::router::{Ziel, Zustellung};

// ---------------------------------------------------------------------------
// VerbindungsSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer offenen Verbindung
#[derive(Clone, Debug)]
pub struct VerbindungsSender {
    pub handle: ConnectionId,
    pub tx: mpsc::Sender<OutboundEvent>,
}

impl VerbindungsSender {
    /// Reiht ein Event nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, event: OutboundEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    connection = %self.handle,
                    event = event.name(),
                    "Send-Queue voll, Event verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection = %self.handle, "Send-Queue geschlossen (Verbindung getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle offenen Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    verbindungen: DashMap<ConnectionId, VerbindungsSender>,
    queue_groesse: usize,
    max_verbindungen: usize,
}

impl EventBroadcaster {
    pub fn neu(queue_groesse: usize, max_verbindungen: usize) -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                verbindungen: DashMap::new(),
                queue_groesse: queue_groesse.max(1),
                max_verbindungen,
            }),
        }
    }

    /// Registriert eine neue Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// `ServerVoll` wenn das Verbindungslimit erreicht ist. Die Pruefung ist
    /// nicht atomar mit dem Einfuegen; bei gleichzeitigen Accepts kann das
    /// Limit kurzzeitig um wenige Verbindungen ueberschritten werden.
    pub fn verbindung_registrieren(
        &self,
        handle: ConnectionId,
    ) -> SignalingResult<mpsc::Receiver<OutboundEvent>> {
        if !self.hat_kapazitaet() {
            return Err(SignalingError::ServerVoll);
        }
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
        self.inner
            .verbindungen
            .insert(handle, VerbindungsSender { handle, tx });
        tracing::debug!(connection = %handle, "Verbindung im Broadcaster registriert");
        Ok(rx)
    }

    /// Entfernt eine Verbindung; die Empfangs-Queue wird danach geschlossen
    pub fn verbindung_entfernen(&self, handle: ConnectionId) -> bool {
        let entfernt = self.inner.verbindungen.remove(&handle).is_some();
        if entfernt {
            tracing::debug!(connection = %handle, "Verbindung aus Broadcaster entfernt");
        }
        entfernt
    }

    /// Fuehrt eine berechnete Zustellung aus
    ///
    /// Gibt die Anzahl eingereihter Events zurueck.
    pub fn zustellen(&self, zustellung: Zustellung) -> usize {
        match zustellung.ziel {
            Ziel::Verbindung(handle) => {
                usize::from(self.an_verbindung_senden(handle, zustellung.event))
            }
            Ziel::AlleAusser(handle) => self.an_alle_ausser_senden(handle, zustellung.event),
        }
    }

    /// Sendet ein Event an eine einzelne Verbindung
    pub fn an_verbindung_senden(&self, handle: ConnectionId, event: OutboundEvent) -> bool {
        match self.inner.verbindungen.get(&handle) {
            Some(sender) => sender.senden(event),
            None => {
                tracing::debug!(connection = %handle, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Sendet ein Event an alle offenen Verbindungen ausser einer
    pub fn an_alle_ausser_senden(&self, ausgeschlossen: ConnectionId, event: OutboundEvent) -> usize {
        let mut gesendet = 0;
        self.inner.verbindungen.iter().for_each(|entry| {
            if *entry.key() == ausgeschlossen {
                return;
            }
            if entry.value().senden(event.clone()) {
                gesendet += 1;
            }
        });
        gesendet
    }

    pub fn ist_verbunden(&self, handle: ConnectionId) -> bool {
        self.inner.verbindungen.contains_key(&handle)
    }

    /// Ist noch Platz fuer eine weitere Verbindung?
    pub fn hat_kapazitaet(&self) -> bool {
        self.inner.verbindungen.len() < self.inner.max_verbindungen
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Identity;

    fn test_event(name: &str) -> OutboundEvent {
        OutboundEvent::UserConnected {
            username: Identity::new(name),
        }
    }

    #[tokio::test]
    async fn verbindung_registrieren_und_senden() {
        let broadcaster = EventBroadcaster::neu(8, 10);
        let handle = ConnectionId::new();

        let mut rx = broadcaster.verbindung_registrieren(handle).unwrap();
        assert!(broadcaster.ist_verbunden(handle));
        assert!(broadcaster.an_verbindung_senden(handle, test_event("alice")));

        let empfangen = rx.try_recv().expect("Event muss vorhanden sein");
        assert_eq!(empfangen, test_event("alice"));
    }

    #[tokio::test]
    async fn an_alle_ausser_senden() {
        let broadcaster = EventBroadcaster::neu(8, 10);
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let c = ConnectionId::new();

        let mut rx_a = broadcaster.verbindung_registrieren(a).unwrap();
        let mut rx_b = broadcaster.verbindung_registrieren(b).unwrap();
        let mut rx_c = broadcaster.verbindung_registrieren(c).unwrap();

        let gesendet = broadcaster.zustellen(Zustellung::an_alle_ausser(a, test_event("alice")));
        assert_eq!(gesendet, 2);
        assert!(rx_a.try_recv().is_err(), "Ausloeser darf nichts empfangen");
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
    }

    #[tokio::test]
    async fn volle_queue_verwirft_event() {
        let broadcaster = EventBroadcaster::neu(1, 10);
        let handle = ConnectionId::new();
        let mut rx = broadcaster.verbindung_registrieren(handle).unwrap();

        assert!(broadcaster.an_verbindung_senden(handle, test_event("a")));
        assert!(!broadcaster.an_verbindung_senden(handle, test_event("b")));

        assert_eq!(rx.try_recv().unwrap(), test_event("a"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn limit_erreicht() {
        let broadcaster = EventBroadcaster::neu(8, 1);
        let _rx = broadcaster.verbindung_registrieren(ConnectionId::new()).unwrap();

        assert!(!broadcaster.hat_kapazitaet());
        assert!(matches!(
            broadcaster.verbindung_registrieren(ConnectionId::new()),
            Err(SignalingError::ServerVoll)
        ));
    }

    #[tokio::test]
    async fn entfernen_schliesst_queue() {
        let broadcaster = EventBroadcaster::neu(8, 10);
        let handle = ConnectionId::new();
        let mut rx = broadcaster.verbindung_registrieren(handle).unwrap();

        assert!(broadcaster.verbindung_entfernen(handle));
        assert!(!broadcaster.verbindung_entfernen(handle));
        assert!(!broadcaster.an_verbindung_senden(handle, test_event("a")));
        assert!(rx.recv().await.is_none());
        assert!(!broadcaster.ist_verbunden(handle));
    }
}
