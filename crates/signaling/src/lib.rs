//! parley-signaling – Relay fuer WebRTC-Anrufsignalisierung
//!
//! Dieser Crate verbindet Clients ueber ihren Benutzernamen und leitet
//! Anruf-Einladungen, Antworten, Medien-Umschaltungen und die opake
//! WebRTC-Aushandlung zwischen ihnen weiter. Medien fliessen nie ueber
//! den Relay.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)      WebSocket (/ws, axum)
//!     |                                   |
//!     v                                   v
//! ClientConnection                    websocket_verarbeiten
//!     |  (pro Verbindung ein Task)        |
//!     +----------------+------------------+
//!                      v
//!              MessageDispatcher
//!                      |  Relay-Lock: Registry + CallTable
//!                      +-- PresenceHandler (register_user, Disconnect)
//!                      +-- CallHandler     (request_call, call_response,
//!                      |                    call_ended, toggle_media)
//!                      +-- SignalHandler   (signal)
//!                      v
//!              Vec<Zustellung>  (Router)
//!                      v
//!              EventBroadcaster (Send-Queue pro Verbindung)
//! ```

pub mod broadcast;
pub mod call_state;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod server_state;
pub mod tcp;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use call_state::{CallPhase, CallRecord, CallTable};
pub use connection::ClientConnection;
pub use dispatcher::{HandleZustand, MessageDispatcher};
pub use error::{SignalingError, SignalingResult};
pub use registry::Registry;
pub use router::{Ziel, Zustellung};
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
pub use ws::ws_router;
