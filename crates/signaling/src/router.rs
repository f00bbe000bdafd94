//! Event-Router – Bestimmt, wer ein ausgehendes Event erhaelt
//!
//! Reine Funktionen ohne eigenen Zustand. Die Handler berechnen unter dem
//! Lock eine Liste von `Zustellung`en; gesendet wird erst danach ueber den
//! `EventBroadcaster`.

use parley_core::{ConnectionId, Identity};
use parley_protocol::OutboundEvent;

use crate::error::SignalingResult;
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// Zustellung
// ---------------------------------------------------------------------------

/// Empfaenger einer Zustellung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ziel {
    /// Genau eine Verbindung
    Verbindung(ConnectionId),
    /// Alle offenen Verbindungen ausser einer
    AlleAusser(ConnectionId),
}

/// Ein ausgehendes Event mit seinem Empfaenger
#[derive(Debug, Clone, PartialEq)]
pub struct Zustellung {
    pub ziel: Ziel,
    pub event: OutboundEvent,
}

impl Zustellung {
    pub fn an(handle: ConnectionId, event: OutboundEvent) -> Self {
        Self {
            ziel: Ziel::Verbindung(handle),
            event,
        }
    }

    pub fn an_alle_ausser(handle: ConnectionId, event: OutboundEvent) -> Self {
        Self {
            ziel: Ziel::AlleAusser(handle),
            event,
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Leitet ein Event an die aktuelle Verbindung einer Identity weiter
///
/// `Err(UnbekannterEmpfaenger)` wenn die Identity nicht registriert ist.
/// Ob daraus ein `call_error` wird, entscheidet der Handler.
pub fn weiterleiten(
    registry: &Registry,
    ziel: &Identity,
    event: OutboundEvent,
) -> SignalingResult<Zustellung> {
    let handle = registry.resolve(ziel.as_str())?;
    Ok(Zustellung::an(handle, event))
}

/// `call_error` an den Absender, weil `ziel` nicht erreichbar ist
pub fn nicht_erreichbar(absender: ConnectionId, ziel: &Identity) -> Zustellung {
    Zustellung::an(absender, OutboundEvent::nicht_erreichbar(ziel))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
