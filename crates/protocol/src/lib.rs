//! parley-protocol – Event-Schema und Wire-Format
//!
//! Dieses Crate definiert alle Events, die zwischen Client und Relay
//! ausgetauscht werden, sowie das Frame-Format fuer rohe TCP-Verbindungen.

pub mod events;
pub mod wire;

pub use events::{InboundEvent, OutboundEvent};
pub use wire::FrameCodec;
