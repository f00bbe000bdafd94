//! Anruf-Tabelle – Wer spricht gerade mit wem?
//!
//! Zwei Arten von Eintraegen, beide nach Verbindungs-Handle indiziert:
//! - `CallRecord`: entsteht fuer beide Seiten beim Annehmen eines Anrufs
//! - `Einladung`: Klingel-Markierung des Anrufers bis zur Antwort
//!
//! `end` entfernt nur den Record eines Handles. Den Record der Gegenseite
//! raeumt `end_falls_peer` ab, aber nur wenn er noch auf die beendende
//! Identity zeigt.

use chrono::{DateTime, Utc};
use parley_core::{ConnectionId, Identity, MediaKind};
use std::collections::HashMap;

use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// Eintraege
// ---------------------------------------------------------------------------

/// Laufendes Gespraech aus Sicht einer Seite
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Identity der Gegenseite
    pub peer: Identity,
    pub angenommen_um: DateTime<Utc>,
}

impl CallRecord {
    /// Gespraechsdauer bis jetzt
    pub fn dauer(&self) -> chrono::Duration {
        Utc::now() - self.angenommen_um
    }
}

/// Offene Einladung eines Anrufers
#[derive(Debug, Clone, PartialEq)]
pub struct Einladung {
    pub callee: Identity,
    pub art: MediaKind,
    pub seit: DateTime<Utc>,
}

/// Phase eines Handles in der Anruf-Tabelle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Einladung gesendet, noch keine Antwort
    Klingelt,
    /// Anruf angenommen
    Aktiv,
}

// ---------------------------------------------------------------------------
// CallTable
// ---------------------------------------------------------------------------

/// Tabelle aller laufenden Anrufe und offenen Einladungen
///
/// Wie die Registry nicht thread-safe; beide teilen sich einen Lock.
#[derive(Debug, Default)]
pub struct CallTable {
    anrufe: HashMap<ConnectionId, CallRecord>,
    einladungen: HashMap<ConnectionId, Einladung>,
}

impl CallTable {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Markiert `caller` als klingelnd
    ///
    /// Eine neue Einladung ersetzt eine noch offene.
    pub fn klingeln(&mut self, caller: ConnectionId, callee: Identity, art: MediaKind) {
        self.einladungen.insert(
            caller,
            Einladung {
                callee,
                art,
                seit: Utc::now(),
            },
        );
    }

    /// Entfernt die Klingel-Markierung eines Anrufers
    pub fn einladung_beenden(&mut self, caller: ConnectionId) -> Option<Einladung> {
        self.einladungen.remove(&caller)
    }

    /// Legt die beiden Records eines angenommenen Anrufs an
    ///
    /// Schlaegt fehl wenn beide Seiten dasselbe Handle sind oder eine Seite
    /// bereits in einem Gespraech ist. Die Tabelle bleibt dann unveraendert.
    pub fn accept(
        &mut self,
        caller: ConnectionId,
        callee: ConnectionId,
        caller_identity: Identity,
        callee_identity: Identity,
    ) -> SignalingResult<()> {
        if caller == callee {
            return Err(SignalingError::uebergang(format!(
                "{caller_identity} kann sich nicht selbst anrufen"
            )));
        }
        if self.anrufe.contains_key(&caller) {
            return Err(SignalingError::uebergang(format!(
                "{caller_identity} ist bereits im Gespraech"
            )));
        }
        if self.anrufe.contains_key(&callee) {
            return Err(SignalingError::uebergang(format!(
                "{callee_identity} ist bereits im Gespraech"
            )));
        }

        let jetzt = Utc::now();
        self.einladungen.remove(&caller);
        self.einladungen.remove(&callee);
        self.anrufe.insert(
            caller,
            CallRecord {
                peer: callee_identity,
                angenommen_um: jetzt,
            },
        );
        self.anrufe.insert(
            callee,
            CallRecord {
                peer: caller_identity,
                angenommen_um: jetzt,
            },
        );
        Ok(())
    }

    /// Entfernt Record und Einladung eines Handles
    ///
    /// Idempotent. Gibt den entfernten Record zurueck, falls einer bestand.
    pub fn end(&mut self, handle: ConnectionId) -> Option<CallRecord> {
        self.einladungen.remove(&handle);
        self.anrufe.remove(&handle)
    }

    /// Entfernt den Record von `handle`, falls dessen Gegenseite `peer` ist
    ///
    /// Ein Record, der inzwischen auf jemand anderen zeigt, bleibt stehen.
    pub fn end_falls_peer(&mut self, handle: ConnectionId, peer: &Identity) -> Option<CallRecord> {
        if self.anrufe.get(&handle)?.peer != *peer {
            return None;
        }
        self.anrufe.remove(&handle)
    }

    /// Gespraechspartner eines Handles
    pub fn peer_of(&self, handle: ConnectionId) -> Option<&Identity> {
        self.anrufe.get(&handle).map(|record| &record.peer)
    }

    pub fn record(&self, handle: ConnectionId) -> Option<&CallRecord> {
        self.anrufe.get(&handle)
    }

    /// Ein laufender Anruf hat Vorrang vor einer offenen Einladung
    pub fn phase_von(&self, handle: ConnectionId) -> Option<CallPhase> {
        if self.anrufe.contains_key(&handle) {
            Some(CallPhase::Aktiv)
        } else if self.einladungen.contains_key(&handle) {
            Some(CallPhase::Klingelt)
        } else {
            None
        }
    }

    /// Anzahl der Handles mit Call-Record
    pub fn anzahl_records(&self) -> usize {
        self.anrufe.len()
    }

    pub fn anzahl_einladungen(&self) -> usize {
        self.einladungen.len()
    }

    /// Alle Handles mit Call-Record oder Einladung
    pub fn handles(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.anrufe.keys().chain(self.einladungen.keys()).copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
