//! Handler fuer alle Signaling-Events
//!
//! Jeder Handler arbeitet auf dem bereits gesperrten `RelayZustand` und
//! gibt die resultierenden Zustellungen zurueck. Gesendet wird erst vom
//! Dispatcher, nachdem der Lock freigegeben wurde.

pub mod call_handler;
pub mod presence_handler;
pub mod signal_handler;
