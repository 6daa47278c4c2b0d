//! # relaychat-core
//!
//! Shared vocabulary for the relaychat client crates:
//!
//! - **Channel IDs**: [`ChannelId`], a validated, non-empty identifier that
//!   scopes a connection to one conversation on the relay
//! - **Session state**: [`SessionState`] and [`DisconnectReason`]
//! - **Errors**: [`SessionError`], the taxonomy every session operation reports
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::{Result, SessionError};
pub use types::{ChannelId, DisconnectReason, SessionState};
