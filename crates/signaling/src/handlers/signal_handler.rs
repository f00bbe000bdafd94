//! Signal-Handler – Weiterleitung der WebRTC-Aushandlung
//!
//! SDP-Angebote, Antworten und ICE-Kandidaten werden nicht interpretiert.
//! Der Relay setzt nur `from` und reicht `signal` unveraendert durch.

use parley_core::ConnectionId;
use parley_observability::RelayMetrics;
use parley_protocol::events::SignalRequest;
use parley_protocol::OutboundEvent;

use crate::router::{self, Zustellung};
use crate::server_state::RelayZustand;

/// Verarbeitet `signal`
///
/// Ein unbekanntes Ziel wird still verworfen (nur gezaehlt).
pub fn handle_signal(
    req: SignalRequest,
    handle: ConnectionId,
    zustand: &RelayZustand,
    metriken: &RelayMetrics,
) -> Vec<Zustellung> {
    let SignalRequest { from, to, signal } = req;
    let event = OutboundEvent::Signal {
        from: from.clone(),
        signal,
    };

    match router::weiterleiten(&zustand.registry, &to, event) {
        Ok(zustellung) => {
            tracing::trace!(connection = %handle, username = %from, peer = %to, "Signal weitergeleitet");
            vec![zustellung]
        }
        Err(_) => {
            metriken.unzustellbar("signal");
            tracing::debug!(connection = %handle, username = %from, peer = %to, "Signal-Ziel unbekannt, verworfen");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Identity;
    use serde_json::json;

    #[test]
    fn nutzdaten_bleiben_unveraendert() {
        let mut zustand = RelayZustand::default();
        let metriken = RelayMetrics::neu().unwrap();
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        zustand.registry.register(Identity::new("alice"), alice);
        zustand.registry.register(Identity::new("bob"), bob);

        let nutzdaten = json!({"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 0.0.0.0"});
        let z = handle_signal(
            SignalRequest {
                from: Identity::new("alice"),
                to: Identity::new("bob"),
                signal: nutzdaten.clone(),
            },
            alice,
            &zustand,
            &metriken,
        );

        assert_eq!(
            z,
            vec![Zustellung::an(
                bob,
                OutboundEvent::Signal {
                    from: Identity::new("alice"),
                    signal: nutzdaten
                }
            )]
        );
    }

    #[test]
    fn unbekanntes_ziel_wird_gezaehlt() {
        let zustand = RelayZustand::default();
        let metriken = RelayMetrics::neu().unwrap();

        let z = handle_signal(
            SignalRequest {
                from: Identity::new("alice"),
                to: Identity::new("bob"),
                signal: json!({"candidate": "x"}),
            },
            ConnectionId::new(),
            &zustand,
            &metriken,
        );
        assert!(z.is_empty());
        assert_eq!(
            metriken
                .undeliverable_total
                .with_label_values(&["signal"])
                .get(),
            1
        );
    }
}
