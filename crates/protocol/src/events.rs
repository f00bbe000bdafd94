//! Signaling-Events
//!
//! Alle Events, die zwischen Client und Relay fliessen. Auf jedem
//! Transport ist ein Event genau ein JSON-Objekt der Form
//!
//! ```text
//! {"event": "<name>", "data": { ... }}
//! ```
//!
//! ## Design
//! - Adjacently tagged Enums (`event` + `data`) fuer typsichere Nachrichten
//! - Nutzdaten von `signal` sind opak und werden unveraendert weitergereicht
//! - Unbekannte Events oder fehlende Pflichtfelder sind Deserialisierungsfehler;
//!   der Aufrufer verwirft nur dieses eine Event

use parley_core::{Identity, MediaKind};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Eingehende Nutzdaten (Client -> Relay)
// ---------------------------------------------------------------------------

/// Benutzer unter einem Namen anmelden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub username: Identity,
}

/// Anruf-Einladung an einen anderen Benutzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCall {
    pub caller: Identity,
    pub callee: Identity,
    /// Fehlt das Feld, wird ein Videoanruf angenommen
    #[serde(rename = "type", default)]
    pub art: MediaKind,
}

/// Antwort des Angerufenen auf eine Einladung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    pub caller: Identity,
    pub responder: Identity,
    pub accepted: bool,
}

/// Beendet den laufenden Anruf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnded {
    pub user: Identity,
    pub peer: Identity,
}

/// Mikrofon oder Kamera wurde an- oder abgeschaltet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleMedia {
    pub user: Identity,
    pub peer: Identity,
    #[serde(rename = "type")]
    pub art: MediaKind,
    pub enabled: bool,
}

/// Verbindungsaushandlung (SDP, ICE-Kandidaten), opak fuer den Relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRequest {
    pub from: Identity,
    pub to: Identity,
    #[serde(default)]
    pub signal: serde_json::Value,
}

// ---------------------------------------------------------------------------
// InboundEvent
// ---------------------------------------------------------------------------

/// Alle Events, die ein Client senden darf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    RegisterUser(RegisterUser),
    RequestCall(RequestCall),
    CallResponse(CallResponse),
    CallEnded(CallEnded),
    ToggleMedia(ToggleMedia),
    Signal(SignalRequest),
}

impl InboundEvent {
    /// Deserialisiert ein Event aus rohen JSON-Bytes
    pub fn from_slice(bytes: &[u8]) -> parley_core::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Event-Name wie auf dem Draht
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterUser(_) => "register_user",
            Self::RequestCall(_) => "request_call",
            Self::CallResponse(_) => "call_response",
            Self::CallEnded(_) => "call_ended",
            Self::ToggleMedia(_) => "toggle_media",
            Self::Signal(_) => "signal",
        }
    }
}

// ---------------------------------------------------------------------------
// OutboundEvent
// ---------------------------------------------------------------------------

/// Alle Events, die der Relay an Clients sendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Vollstaendige Online-Liste, nur an den neu registrierten Client
    OnlineUsers { users: Vec<Identity> },
    UserConnected { username: Identity },
    UserDisconnected { username: Identity },
    IncomingCall {
        caller: Identity,
        #[serde(rename = "type")]
        art: MediaKind,
    },
    CallAccepted { responder: Identity },
    CallRejected { responder: Identity },
    CallError { message: String },
    PeerEndedCall { peer: Identity },
    PeerToggledMedia {
        peer: Identity,
        #[serde(rename = "type")]
        art: MediaKind,
        enabled: bool,
    },
    Signal {
        from: Identity,
        signal: serde_json::Value,
    },
}

impl OutboundEvent {
    /// Fehler-Antwort fuer einen nicht erreichbaren Benutzer
    pub fn nicht_erreichbar(ziel: &Identity) -> Self {
        Self::CallError {
            message: format!("User {ziel} is not available"),
        }
    }

    /// Serialisiert das Event als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Event-Name wie auf dem Draht
    pub fn name(&self) -> &'static str {
        match self {
            Self::OnlineUsers { .. } => "online_users",
            Self::UserConnected { .. } => "user_connected",
            Self::UserDisconnected { .. } => "user_disconnected",
            Self::IncomingCall { .. } => "incoming_call",
            Self::CallAccepted { .. } => "call_accepted",
            Self::CallRejected { .. } => "call_rejected",
            Self::CallError { .. } => "call_error",
            Self::PeerEndedCall { .. } => "peer_ended_call",
            Self::PeerToggledMedia { .. } => "peer_toggled_media",
            Self::Signal { .. } => "signal",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
