//! Gemeinsamer Relay-Zustand fuer den Signaling-Service
//!
//! Registry und Anruf-Tabelle liegen zusammen hinter einem einzigen Lock.
//! Jedes Event wird vollstaendig unter diesem Lock verarbeitet; die
//! resultierenden Zustellungen werden erst nach dem Freigeben eingereiht.

use parking_lot::Mutex;
use parley_core::ConnectionId;
use parley_observability::RelayMetrics;
use parley_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::Arc;

use crate::broadcast::EventBroadcaster;
use crate::call_state::{CallRecord, CallTable};
use crate::registry::Registry;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen (TCP und WebSocket zusammen)
    pub max_verbindungen: usize,
    /// Ping-Intervall fuer WebSocket-Verbindungen in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Maximale Groesse eines eingehenden Events in Bytes
    pub max_frame_groesse: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_verbindungen: 1024,
            keepalive_sek: 25,
            verbindungs_timeout_sek: 60,
            send_queue_groesse: 64,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Veraenderlicher Relay-Zustand, nur unter Lock erreichbar
#[derive(Debug, Default)]
pub struct RelayZustand {
    pub registry: Registry,
    pub anrufe: CallTable,
}

impl RelayZustand {
    /// Beendet den Anruf von `handle` fuer beide Seiten
    ///
    /// Muss vor dem Abmelden von `handle` laufen, weil der Record der
    /// Gegenseite ueber die Identity von `handle` gefunden wird. Gibt den
    /// eigenen Record zurueck.
    pub fn anruf_beenden(&mut self, handle: ConnectionId) -> Option<CallRecord> {
        let record = self.anrufe.end(handle)?;
        if let (Some(eigene), Ok(gegenseite)) = (
            self.registry.identitaet_von(handle),
            self.registry.resolve(record.peer.as_str()),
        ) {
            if self.anrufe.end_falls_peer(gegenseite, eigene).is_some() {
                tracing::debug!(
                    connection = %handle,
                    peer = %record.peer,
                    "Record der Gegenseite entfernt"
                );
            }
        }
        Some(record)
    }

    /// Jeder Call-Record und jede Einladung gehoert zu einem registrierten
    /// Handle, und die Registry ist in sich konsistent
    pub fn ist_konsistent(&self) -> bool {
        self.registry.ist_konsistent()
            && self
                .anrufe
                .handles()
                .all(|handle| self.registry.identitaet_von(handle).is_some())
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    pub config: Arc<SignalingConfig>,
    zustand: Mutex<RelayZustand>,
    /// Send-Queues aller offenen Verbindungen
    pub broadcaster: EventBroadcaster,
    pub metriken: RelayMetrics,
}

impl SignalingState {
    pub fn neu(config: SignalingConfig, metriken: RelayMetrics) -> Arc<Self> {
        let broadcaster =
            EventBroadcaster::neu(config.send_queue_groesse, config.max_verbindungen);
        Arc::new(Self {
            config: Arc::new(config),
            zustand: Mutex::new(RelayZustand::default()),
            broadcaster,
            metriken,
        })
    }

    /// Fuehrt `f` unter dem Relay-Lock aus
    ///
    /// Danach werden die Gauges aus dem neuen Zustand aktualisiert. `f` darf
    /// weder blockieren noch senden.
    pub fn mit_zustand<R>(&self, f: impl FnOnce(&mut RelayZustand) -> R) -> R {
        let mut zustand = self.zustand.lock();
        let ergebnis = f(&mut zustand);
        debug_assert!(zustand.ist_konsistent(), "Relay-Zustand inkonsistent");
        self.metriken
            .online_users
            .set(zustand.registry.anzahl() as i64);
        self.metriken
            .call_records
            .set(zustand.anrufe.anzahl_records() as i64);
        self.metriken
            .pending_calls
            .set(zustand.anrufe.anzahl_einladungen() as i64);
        ergebnis
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
