//! Call-Handler – Einladung, Antwort, Beenden, Medien-Umschaltung
//!
//! Die Identitaeten in den Nutzdaten werden unveraendert uebernommen; der
//! Relay prueft nicht, ob `caller` oder `user` zur sendenden Verbindung
//! gehoert. Nur `request_call` und `call_response` melden einen
//! unbekannten Empfaenger per `call_error` zurueck, alle anderen Events
//! werden in diesem Fall still verworfen.

use parley_core::ConnectionId;
use parley_observability::RelayMetrics;
use parley_protocol::events::{CallEnded, CallResponse, RequestCall, ToggleMedia};
use parley_protocol::OutboundEvent;

use crate::error::SignalingError;
use crate::router::{self, Zustellung};
use crate::server_state::RelayZustand;

/// Verarbeitet `request_call`
///
/// Bei erreichbarem Angerufenen: `incoming_call` an ihn und
/// Klingel-Markierung fuer den Anrufer. Sonst `call_error` zurueck.
pub fn handle_request_call(
    req: RequestCall,
    handle: ConnectionId,
    zustand: &mut RelayZustand,
    metriken: &RelayMetrics,
) -> Vec<Zustellung> {
    let event = OutboundEvent::IncomingCall {
        caller: req.caller.clone(),
        art: req.art,
    };

    match router::weiterleiten(&zustand.registry, &req.callee, event) {
        Ok(zustellung) => {
            if zustand.registry.identitaet_von(handle).is_some() {
                zustand.anrufe.klingeln(handle, req.callee.clone(), req.art);
            }
            tracing::info!(
                connection = %handle,
                username = %req.caller,
                peer = %req.callee,
                art = %req.art,
                "Anruf angefragt"
            );
            vec![zustellung]
        }
        Err(_) => {
            metriken.unzustellbar("request_call");
            tracing::info!(
                connection = %handle,
                username = %req.caller,
                peer = %req.callee,
                "Angerufener nicht erreichbar"
            );
            vec![router::nicht_erreichbar(handle, &req.callee)]
        }
    }
}

/// Verarbeitet `call_response`
///
/// Ablehnung: `call_rejected` an den Anrufer. Annahme: beide Call-Records
/// anlegen und `call_accepted` an den Anrufer. Ist eine Annahme nicht
/// zulaessig (Selbstanruf, Seite bereits im Gespraech, Antwortender nicht
/// registriert), wird nichts gesendet.
pub fn handle_call_response(
    req: CallResponse,
    handle: ConnectionId,
    zustand: &mut RelayZustand,
    metriken: &RelayMetrics,
) -> Vec<Zustellung> {
    let caller_handle = match zustand.registry.resolve(req.caller.as_str()) {
        Ok(h) => h,
        Err(_) => {
            metriken.unzustellbar("call_response");
            tracing::info!(
                connection = %handle,
                username = %req.responder,
                peer = %req.caller,
                "Anrufer nicht mehr erreichbar"
            );
            return vec![router::nicht_erreichbar(handle, &req.caller)];
        }
    };

    zustand.anrufe.einladung_beenden(caller_handle);

    if !req.accepted {
        tracing::info!(
            connection = %handle,
            username = %req.responder,
            peer = %req.caller,
            "Anruf abgelehnt"
        );
        return vec![Zustellung::an(
            caller_handle,
            OutboundEvent::CallRejected {
                responder: req.responder,
            },
        )];
    }

    let ergebnis = match zustand.registry.identitaet_von(handle).cloned() {
        Some(responder_identity) => zustand.anrufe.accept(
            caller_handle,
            handle,
            req.caller.clone(),
            responder_identity,
        ),
        None => Err(SignalingError::uebergang(
            "Antwortende Verbindung ist nicht registriert",
        )),
    };

    match ergebnis {
        Ok(()) => {
            tracing::info!(
                connection = %handle,
                username = %req.responder,
                peer = %req.caller,
                "Anruf angenommen"
            );
            vec![Zustellung::an(
                caller_handle,
                OutboundEvent::CallAccepted {
                    responder: req.responder,
                },
            )]
        }
        Err(e) => {
            tracing::warn!(
                connection = %handle,
                username = %req.responder,
                peer = %req.caller,
                "Annahme verworfen: {e}"
            );
            Vec::new()
        }
    }
}

/// Verarbeitet `call_ended`
///
/// Entfernt die Records beider Seiten. `peer_ended_call` geht nur raus,
/// wenn wirklich ein Anruf bestand und `peer` erreichbar ist.
pub fn handle_call_ended(
    req: CallEnded,
    handle: ConnectionId,
    zustand: &mut RelayZustand,
    metriken: &RelayMetrics,
) -> Vec<Zustellung> {
    let Some(record) = zustand.anruf_beenden(handle) else {
        tracing::debug!(connection = %handle, username = %req.user, "call_ended ohne laufenden Anruf");
        return Vec::new();
    };

    tracing::info!(
        connection = %handle,
        username = %req.user,
        peer = %req.peer,
        dauer_sek = record.dauer().num_seconds(),
        "Anruf beendet"
    );
    if record.peer != req.peer {
        tracing::debug!(
            connection = %handle,
            peer = %req.peer,
            gespraechspartner = %record.peer,
            "call_ended nennt anderen Peer als den Gespraechspartner"
        );
    }

    let event = OutboundEvent::PeerEndedCall { peer: req.user };
    match router::weiterleiten(&zustand.registry, &req.peer, event) {
        Ok(zustellung) => vec![zustellung],
        Err(_) => {
            metriken.unzustellbar("call_ended");
            Vec::new()
        }
    }
}

/// Verarbeitet `toggle_media`
///
/// Reines Weiterleiten an `peer`; der Anrufzustand bleibt unveraendert.
pub fn handle_toggle_media(
    req: ToggleMedia,
    handle: ConnectionId,
    zustand: &mut RelayZustand,
    metriken: &RelayMetrics,
) -> Vec<Zustellung> {
    if zustand.anrufe.peer_of(handle) != Some(&req.peer) {
        tracing::debug!(
            connection = %handle,
            peer = %req.peer,
            "toggle_media an Verbindung ausserhalb eines Gespraechs"
        );
    }

    let event = OutboundEvent::PeerToggledMedia {
        peer: req.user,
        art: req.art,
        enabled: req.enabled,
    };
    match router::weiterleiten(&zustand.registry, &req.peer, event) {
        Ok(zustellung) => vec![zustellung],
        Err(_) => {
            metriken.unzustellbar("toggle_media");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
