//! Registry – Bidirektionale Zuordnung Identity <-> Verbindungs-Handle
//!
//! Wer ist online und unter welcher Verbindung erreichbar? Die Registry
//! haelt beide Richtungen konsistent: jede Identity zeigt auf genau ein
//! Handle, jedes Handle traegt hoechstens eine Identity.
//!
//! Die Online-Liste ist ein `BTreeSet`, damit `online_users` immer in
//! derselben (sortierten) Reihenfolge ausgeliefert wird.

use parley_core::{ConnectionId, Identity};
use std::collections::{BTreeSet, HashMap};

use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// Registrierung
// ---------------------------------------------------------------------------

/// Ergebnis einer Registrierung
///
/// Beschreibt, welche Bindungen durch die neue Registrierung aufgeloest
/// wurden. Die Handler leiten daraus Aufraeumarbeiten und Events ab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registrierung {
    /// Handle, das die Identity bisher trug (nur wenn es ein anderes war)
    pub verdraengt: Option<ConnectionId>,
    /// Identity, die das Handle vor dieser Registrierung trug
    /// (nur wenn es eine andere war)
    pub vorherige: Option<Identity>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Zuordnung registrierter Identitaeten zu Verbindungen
///
/// Nicht thread-safe. Der Aufrufer (`SignalingState`) schuetzt die Registry
/// zusammen mit der Anruf-Tabelle hinter einem gemeinsamen Lock.
#[derive(Debug, Default)]
pub struct Registry {
    /// Identity -> Handle
    handles: HashMap<Identity, ConnectionId>,
    /// Handle -> Identity (Rueckwaertsindex fuer Disconnect)
    identitaeten: HashMap<ConnectionId, Identity>,
    /// Sortierte Online-Liste
    online: BTreeSet<Identity>,
}

impl Registry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Bindet `identity` an `handle`
    ///
    /// Eine bestehende Bindung der Identity an ein anderes Handle wird
    /// ueberschrieben. Trug das Handle vorher eine andere Identity, wird
    /// diese freigegeben.
    pub fn register(&mut self, identity: Identity, handle: ConnectionId) -> Registrierung {
        let umbenannt = self
            .identitaeten
            .get(&handle)
            .is_some_and(|alt| *alt != identity);
        let vorherige = if umbenannt {
            self.unregister(handle)
        } else {
            None
        };

        let verdraengt = self
            .handles
            .insert(identity.clone(), handle)
            .filter(|alt| *alt != handle);
        if let Some(alt) = verdraengt {
            self.identitaeten.remove(&alt);
        }

        self.identitaeten.insert(handle, identity.clone());
        self.online.insert(identity);

        Registrierung {
            verdraengt,
            vorherige,
        }
    }

    /// Loest die Bindung eines Handles auf
    ///
    /// Gibt die freigegebene Identity zurueck, `None` wenn das Handle nie
    /// registriert war.
    pub fn unregister(&mut self, handle: ConnectionId) -> Option<Identity> {
        let identity = self.identitaeten.remove(&handle)?;
        self.handles.remove(identity.as_str());
        self.online.remove(identity.as_str());
        Some(identity)
    }

    /// Ermittelt das aktuelle Handle einer Identity
    pub fn resolve(&self, identity: &str) -> SignalingResult<ConnectionId> {
        self.handles
            .get(identity)
            .copied()
            .ok_or_else(|| SignalingError::UnbekannterEmpfaenger(Identity::new(identity)))
    }

    /// Identity, unter der ein Handle registriert ist
    pub fn identitaet_von(&self, handle: ConnectionId) -> Option<&Identity> {
        self.identitaeten.get(&handle)
    }

    /// Sortierte Online-Liste ohne die angegebene Identity
    pub fn online_ausser(&self, identity: &str) -> Vec<Identity> {
        self.online
            .iter()
            .filter(|id| id.as_str() != identity)
            .cloned()
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.online.len()
    }

    /// Prueft, dass Vorwaerts-, Rueckwaertsindex und Online-Liste
    /// uebereinstimmen
    pub fn ist_konsistent(&self) -> bool {
        self.handles.len() == self.identitaeten.len()
            && self.handles.len() == self.online.len()
            && self.handles.iter().all(|(identity, handle)| {
                self.identitaeten.get(handle) == Some(identity) && self.online.contains(identity)
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
