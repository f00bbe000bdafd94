//! Fehlertypen fuer den Signaling-Service
//!
//! Keiner dieser Fehler erreicht den Client direkt. Der einzige sichtbare
//! Fehler ist das `call_error`-Event, das der Call-Handler selbst baut.

use parley_core::{Identity, ParleyError};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Protokollfehler (Frame, JSON)
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ParleyError),

    /// Ziel-Identity ist nicht registriert
    #[error("Unbekannter Empfaenger: {0}")]
    UnbekannterEmpfaenger(Identity),

    /// Anruf-Uebergang nicht erlaubt (z.B. Handle ist bereits im Gespraech)
    #[error("Ungueltiger Anruf-Uebergang: {0}")]
    UngueltigerUebergang(String),

    /// Verbindungslimit erreicht
    #[error("Server ist voll")]
    ServerVoll,
}

impl SignalingError {
    /// Erstellt einen Uebergangsfehler
    pub fn uebergang(msg: impl Into<String>) -> Self {
        Self::UngueltigerUebergang(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
