//! Fehlertypen fuer Parley
//!
//! Zentraler Fehler-Enum fuer alles, was nicht spezifisch zum Signaling
//! gehoert. Untermodule konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Parley
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Crate-uebergreifende Fehler
#[derive(Debug, Error)]
pub enum ParleyError {
    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Frame zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    FrameZuGross { groesse: usize, maximum: usize },

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Verbindung ---
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl ParleyError {
    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(e: serde_json::Error) -> Self {
        Self::UngueltigeNachricht(e.to_string())
    }
}
