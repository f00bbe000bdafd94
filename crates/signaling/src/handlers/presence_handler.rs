//! Presence-Handler – Registrierung und Verbindungsabbau
//!
//! `register_user` bindet eine Identity an die Verbindung, liefert dem
//! neuen Client die Online-Liste und kuendigt ihn allen anderen an.
//! Beim Trennen wird die Bindung aufgeloest und `user_disconnected`
//! an alle verbleibenden Verbindungen verteilt.

use parley_core::ConnectionId;
use parley_protocol::events::RegisterUser;
use parley_protocol::OutboundEvent;

use crate::router::Zustellung;
use crate::server_state::RelayZustand;

/// Verarbeitet `register_user`
///
/// Reihenfolge der Zustellungen: zuerst `user_disconnected` fuer eine
/// abgeloeste alte Identity, dann `online_users` an den Absender, dann
/// `user_connected` an alle anderen.
pub fn handle_register_user(
    req: RegisterUser,
    handle: ConnectionId,
    zustand: &mut RelayZustand,
) -> Vec<Zustellung> {
    if req.username.ist_leer() {
        tracing::warn!(connection = %handle, "register_user mit leerem Namen ignoriert");
        return Vec::new();
    }

    let username = req.username;

    // Anrufe enden, solange die alte Zuordnung noch aufloesbar ist
    if zustand
        .registry
        .identitaet_von(handle)
        .is_some_and(|alt| *alt != username)
    {
        zustand.anruf_beenden(handle);
    }
    if let Ok(bisher) = zustand.registry.resolve(username.as_str()) {
        if bisher != handle {
            zustand.anruf_beenden(bisher);
        }
    }

    let registrierung = zustand.registry.register(username.clone(), handle);
    let mut zustellungen = Vec::with_capacity(3);

    if let Some(vorherige) = registrierung.vorherige {
        tracing::info!(
            connection = %handle,
            username = %username,
            vorherige = %vorherige,
            "Verbindung hat sich umbenannt"
        );
        zustellungen.push(Zustellung::an_alle_ausser(
            handle,
            OutboundEvent::UserDisconnected {
                username: vorherige,
            },
        ));
    }

    if let Some(verdraengt) = registrierung.verdraengt {
        tracing::warn!(
            connection = %handle,
            verdraengt = %verdraengt,
            username = %username,
            "Identity war bereits registriert, alte Verbindung verdraengt"
        );
    }

    tracing::info!(connection = %handle, username = %username, "Benutzer registriert");

    zustellungen.push(Zustellung::an(
        handle,
        OutboundEvent::OnlineUsers {
            users: zustand.registry.online_ausser(username.as_str()),
        },
    ));
    zustellungen.push(Zustellung::an_alle_ausser(
        handle,
        OutboundEvent::UserConnected { username },
    ));
    zustellungen
}

/// Raeumt eine getrennte Verbindung ab
///
/// Ein laufender Anruf endet fuer beide Seiten. War die Verbindung nie
/// registriert, wird nichts gesendet.
pub fn handle_disconnect(handle: ConnectionId, zustand: &mut RelayZustand) -> Vec<Zustellung> {
    if let Some(record) = zustand.anruf_beenden(handle) {
        tracing::debug!(
            connection = %handle,
            peer = %record.peer,
            dauer_sek = record.dauer().num_seconds(),
            "Anruf durch Verbindungsabbau beendet"
        );
    }

    match zustand.registry.unregister(handle) {
        Some(username) => {
            tracing::info!(connection = %handle, username = %username, "Benutzer getrennt");
            vec![Zustellung::an_alle_ausser(
                handle,
                OutboundEvent::UserDisconnected { username },
            )]
        }
        None => {
            tracing::debug!(connection = %handle, "Unbekannte Verbindung getrennt");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Ziel;
    use parley_core::{Identity, MediaKind};

    fn registrieren(zustand: &mut RelayZustand, name: &str, handle: ConnectionId) -> Vec<Zustellung> {
        handle_register_user(
            RegisterUser {
                username: Identity::new(name),
            },
            handle,
            zustand,
        )
    }

    #[test]
    fn erste_registrierung_bekommt_leere_liste() {
        let mut zustand = RelayZustand::default();
        let a = ConnectionId::new();

        let zustellungen = registrieren(&mut zustand, "alice", a);
        assert_eq!(
            zustellungen,
            vec![
                Zustellung::an(a, OutboundEvent::OnlineUsers { users: vec![] }),
                Zustellung::an_alle_ausser(
                    a,
                    OutboundEvent::UserConnected {
                        username: Identity::new("alice")
                    }
                ),
            ]
        );
    }

    #[test]
    fn online_liste_ohne_eigenen_namen() {
        let mut zustand = RelayZustand::default();
        registrieren(&mut zustand, "bob", ConnectionId::new());
        registrieren(&mut zustand, "alice", ConnectionId::new());

        let c = ConnectionId::new();
        let zustellungen = registrieren(&mut zustand, "carol", c);
        assert_eq!(
            zustellungen[0].event,
            OutboundEvent::OnlineUsers {
                users: vec![Identity::new("alice"), Identity::new("bob")]
            }
        );
    }

    #[test]
    fn leerer_name_wird_ignoriert() {
        let mut zustand = RelayZustand::default();
        assert!(registrieren(&mut zustand, "", ConnectionId::new()).is_empty());
        assert_eq!(zustand.registry.anzahl(), 0);
    }

    #[test]
    fn umbenennen_meldet_alte_identity_ab() {
        let mut zustand = RelayZustand::default();
        let a = ConnectionId::new();
        registrieren(&mut zustand, "alice", a);

        let zustellungen = registrieren(&mut zustand, "alicia", a);
        assert_eq!(
            zustellungen[0],
            Zustellung::an_alle_ausser(
                a,
                OutboundEvent::UserDisconnected {
                    username: Identity::new("alice")
                }
            )
        );
        assert!(zustand.registry.resolve("alice").is_err());
        assert!(zustand.ist_konsistent());
    }

    #[test]
    fn umbenennen_beendet_anruf_beider_seiten() {
        let mut zustand = RelayZustand::default();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registrieren(&mut zustand, "alice", a);
        registrieren(&mut zustand, "bob", b);
        zustand
            .anrufe
            .accept(a, b, Identity::new("alice"), Identity::new("bob"))
            .unwrap();

        registrieren(&mut zustand, "alicia", a);
        assert!(zustand.anrufe.phase_von(a).is_none());
        assert!(zustand.anrufe.phase_von(b).is_none());
    }

    #[test]
    fn verdraengte_verbindung_verliert_anrufzustand() {
        let mut zustand = RelayZustand::default();
        let alt = ConnectionId::new();
        let neu = ConnectionId::new();
        registrieren(&mut zustand, "alice", alt);
        zustand
            .anrufe
            .klingeln(alt, Identity::new("bob"), MediaKind::Video);

        let zustellungen = registrieren(&mut zustand, "alice", neu);
        // Kein user_disconnected fuer die verdraengte Verbindung
        assert!(zustellungen
            .iter()
            .all(|z| !matches!(z.event, OutboundEvent::UserDisconnected { .. })));
        assert!(zustand.anrufe.phase_von(alt).is_none());
        assert!(zustand.ist_konsistent());
    }

    #[test]
    fn verdraengte_verbindung_gibt_gegenseite_frei() {
        let mut zustand = RelayZustand::default();
        let alt = ConnectionId::new();
        let bob = ConnectionId::new();
        registrieren(&mut zustand, "alice", alt);
        registrieren(&mut zustand, "bob", bob);
        zustand
            .anrufe
            .accept(alt, bob, Identity::new("alice"), Identity::new("bob"))
            .unwrap();

        registrieren(&mut zustand, "alice", ConnectionId::new());
        assert!(zustand.anrufe.peer_of(bob).is_none());
        assert_eq!(zustand.anrufe.anzahl_records(), 0);
    }

    #[test]
    fn trennen_registrierter_verbindung() {
        let mut zustand = RelayZustand::default();
        let a = ConnectionId::new();
        registrieren(&mut zustand, "alice", a);

        let zustellungen = handle_disconnect(a, &mut zustand);
        assert_eq!(zustellungen.len(), 1);
        assert_eq!(zustellungen[0].ziel, Ziel::AlleAusser(a));
        assert_eq!(
            zustellungen[0].event,
            OutboundEvent::UserDisconnected {
                username: Identity::new("alice")
            }
        );
        assert_eq!(zustand.registry.anzahl(), 0);
    }

    #[test]
    fn trennen_im_anruf_gibt_gegenseite_frei() {
        let mut zustand = RelayZustand::default();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registrieren(&mut zustand, "alice", a);
        registrieren(&mut zustand, "bob", b);
        zustand
            .anrufe
            .accept(a, b, Identity::new("alice"), Identity::new("bob"))
            .unwrap();

        handle_disconnect(a, &mut zustand);
        assert!(zustand.anrufe.peer_of(b).is_none());
        assert_eq!(zustand.anrufe.anzahl_records(), 0);
        assert!(zustand.ist_konsistent());
    }

    #[test]
    fn trennen_unbekannter_verbindung_ist_still() {
        let mut zustand = RelayZustand::default();
        assert!(handle_disconnect(ConnectionId::new(), &mut zustand).is_empty());
    }
}
