//! Gemeinsame Identifikationstypen fuer Parley
//!
//! `ConnectionId` adressiert eine einzelne Transport-Verbindung, `Identity`
//! ist der vom Client gewaehlte Benutzername. Beide verwenden das
//! Newtype-Pattern, damit Handle und Name nicht verwechselt werden koennen.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use uuid::Uuid;

/// Handle einer lebenden Transport-Verbindung
///
/// Wird beim Accept vergeben und nie wiederverwendet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Vom Client gewaehlter Benutzername
///
/// Eindeutig unter allen aktuell registrierten Benutzern, sonst ohne
/// weitere Bedeutung. `Borrow<str>` erlaubt Lookups direkt mit `&str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Erstellt eine Identity aus einem Namen
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leere Namen sind nicht registrierbar
    pub fn ist_leer(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Medienart eines Anrufs bzw. eines Media-Toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert!(id.to_string().starts_with("conn:"));
    }

    #[test]
    fn identity_lookup_per_str() {
        let mut map = HashMap::new();
        map.insert(Identity::new("alice"), 1);
        assert_eq!(map.get("alice"), Some(&1));
        assert_eq!(map.get("bob"), None);
    }

    #[test]
    fn identity_serialisiert_als_string() {
        let json = serde_json::to_string(&Identity::new("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }

    #[test]
    fn media_kind_kleingeschrieben() {
        assert_eq!(serde_json::to_string(&MediaKind::Audio).unwrap(), "\"audio\"");
        let kind: MediaKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(kind, MediaKind::Video);
        assert_eq!(MediaKind::default(), MediaKind::Video);
    }
}
