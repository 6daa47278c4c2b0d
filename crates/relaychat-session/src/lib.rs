//! # relaychat-session
//!
//! A client-side connection session to a relay server over WebSocket.
//!
//! A [`ConnectionSession`] connects to `<base>/<channel>`, delivers every
//! inbound text frame to a [`SessionObserver`] while the caller sends
//! concurrently, and ends with a bounded close handshake. Each session
//! reports exactly one terminal notification.
//!
//! ```text
//! Idle ──start──▶ Connecting ──ok──▶ Open ──close──▶ Closing ──▶ Closed
//!                      │               │
//!                      └──── error ────┴──────────────────────▶ Failed
//! ```

#![deny(unsafe_code)]

mod config;
mod driver;
mod endpoint;
pub mod frame;
mod observer;
mod session;
mod state;

pub use config::SessionConfig;
pub use endpoint::endpoint_address;
pub use observer::{EventQueue, EventReceiver, SessionEvent, SessionObserver, event_queue};
pub use session::ConnectionSession;
