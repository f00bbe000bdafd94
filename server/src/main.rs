//! Parley Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Relay.

use anyhow::Result;
use parley_observability::logging_initialisieren;
use parley_server::{config::ServerConfig, Server};

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
const CONFIG_ENV: &str = "PARLEY_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ServerConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    if !std::path::Path::new(&config_pfad).exists() {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        log_filter = %config.logging.level,
        filter_direktive = !config.einfaches_log_level(),
        "Parley Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
