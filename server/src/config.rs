//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use parley_core::ParleyError;
use parley_observability::logging::{log_format_gueltig, log_level_gueltig};
use parley_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Signaling-Einstellungen (Timeouts, Queues, Frame-Groesse)
    pub signaling: SignalingEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
    /// Maximale gleichzeitige Verbindungen ueber alle Transporte
    pub max_verbindungen: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Parley Relay".into(),
            max_verbindungen: 1024,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer beide Listener
    pub bind_adresse: String,
    /// Port fuer HTTP (WebSocket `/ws`, `/metrics`, `/health`)
    pub http_port: u16,
    /// Port fuer den rohen TCP-Transport
    pub tcp_port: u16,
    /// Startet den TCP-Listener
    pub tcp_aktiviert: bool,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8000,
            tcp_port: 8001,
            tcp_aktiviert: true,
        }
    }
}

/// Signaling-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Ping-Intervall fuer WebSocket-Verbindungen
    pub keepalive_sek: u64,
    /// Inaktive Verbindungen werden nach dieser Zeit getrennt
    pub verbindungs_timeout_sek: u64,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Maximale Groesse eines eingehenden Events in Bytes
    pub max_frame_groesse: usize,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        let standard = SignalingConfig::default();
        Self {
            keepalive_sek: standard.keepalive_sek,
            verbindungs_timeout_sek: standard.verbindungs_timeout_sek,
            send_queue_groesse: standard.send_queue_groesse,
            max_frame_groesse: standard.max_frame_groesse,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter-Direktive
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
            // Die Warnung loggt der Aufrufer, Logging ist hier noch nicht initialisiert
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> parley_core::Result<()> {
        if self.server.max_verbindungen == 0 {
            return Err(ParleyError::konfiguration(
                "server.max_verbindungen muss groesser als 0 sein",
            ));
        }
        if self.signaling.send_queue_groesse == 0 {
            return Err(ParleyError::konfiguration(
                "signaling.send_queue_groesse muss groesser als 0 sein",
            ));
        }
        if self.signaling.keepalive_sek == 0 {
            return Err(ParleyError::konfiguration(
                "signaling.keepalive_sek muss groesser als 0 sein",
            ));
        }
        if self.signaling.verbindungs_timeout_sek <= self.signaling.keepalive_sek {
            return Err(ParleyError::konfiguration(
                "signaling.verbindungs_timeout_sek muss groesser als keepalive_sek sein",
            ));
        }
        if self.signaling.max_frame_groesse < 256 {
            return Err(ParleyError::konfiguration(
                "signaling.max_frame_groesse muss mindestens 256 Bytes sein",
            ));
        }
        if self.netzwerk.tcp_aktiviert && self.netzwerk.tcp_port == self.netzwerk.http_port {
            return Err(ParleyError::konfiguration(
                "netzwerk.tcp_port und netzwerk.http_port muessen verschieden sein",
            ));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(ParleyError::konfiguration(format!(
                "Unbekanntes Log-Format '{}' (erlaubt: text, json)",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Einfaches Log-Level statt Filter-Direktive?
    pub fn einfaches_log_level(&self) -> bool {
        log_level_gueltig(&self.logging.level)
    }

    /// Konfiguration fuer den Signaling-Crate
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_verbindungen: self.server.max_verbindungen,
            keepalive_sek: self.signaling.keepalive_sek,
            verbindungs_timeout_sek: self.signaling.verbindungs_timeout_sek,
            send_queue_groesse: self.signaling.send_queue_groesse,
            max_frame_groesse: self.signaling.max_frame_groesse,
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer HTTP zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert!(cfg.pruefen().is_ok());
        assert_eq!(cfg.netzwerk.http_port, 8000);
        assert_eq!(cfg.netzwerk.tcp_port, 8001);
        assert_eq!(cfg.signaling.keepalive_sek, 25);
        assert_eq!(cfg.signaling.verbindungs_timeout_sek, 60);
        assert_eq!(cfg.signaling.send_queue_groesse, 64);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.einfaches_log_level());
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:8000");
        assert_eq!(cfg.tcp_bind_adresse(), "0.0.0.0:8001");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Relay"
            max_verbindungen = 100

            [netzwerk]
            http_port = 9000

            [signaling]
            keepalive_sek = 10
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Relay");
        assert_eq!(cfg.server.max_verbindungen, 100);
        assert_eq!(cfg.netzwerk.http_port, 9000);
        assert_eq!(cfg.signaling.keepalive_sek, 10);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.tcp_port, 8001);
        assert_eq!(cfg.signaling.verbindungs_timeout_sek, 60);
        assert!(cfg.pruefen().is_ok());
    }

    #[test]
    fn signaling_config_uebernimmt_werte() {
        let mut cfg = ServerConfig::default();
        cfg.server.max_verbindungen = 7;
        cfg.signaling.max_frame_groesse = 4096;

        let signaling = cfg.signaling_config();
        assert_eq!(signaling.max_verbindungen, 7);
        assert_eq!(signaling.max_frame_groesse, 4096);
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.server.max_verbindungen = 0;
        assert!(matches!(cfg.pruefen(), Err(ParleyError::Konfiguration(_))));

        let mut cfg = ServerConfig::default();
        cfg.signaling.verbindungs_timeout_sek = cfg.signaling.keepalive_sek;
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.netzwerk.tcp_port = cfg.netzwerk.http_port;
        assert!(cfg.pruefen().is_err());
        cfg.netzwerk.tcp_aktiviert = false;
        assert!(cfg.pruefen().is_ok());

        let mut cfg = ServerConfig::default();
        cfg.logging.format = "xml".into();
        assert!(cfg.pruefen().is_err());
    }

    #[test]
    fn filter_direktive_ist_kein_einfaches_level() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "parley_signaling=trace,info".into();
        assert!(!cfg.einfaches_log_level());
        assert!(cfg.pruefen().is_ok());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/parley.toml").unwrap();
        assert_eq!(cfg.netzwerk.http_port, 8000);
    }
}
