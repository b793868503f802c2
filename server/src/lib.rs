//! MCP session server and HTTP shell for Periscope.
//!
//! # Architecture
//!
//! ```text
//! POST /mcp ──> SessionHandle ──> SessionServer task ──> tools ──> query engine
//!                                      │
//!                host change notices ──┘ (store updates)
//! ```
//!
//! One tokio task ([`SessionServer`]) exclusively owns the diagnostics store.
//! The HTTP layer never touches diagnostics directly - it forwards each
//! inbound JSON-RPC message through a [`SessionHandle`] and frames the reply
//! as a server-sent event. Store mutation (host change notices, full
//! snapshots on channel establishment) and query execution are therefore
//! serialized on a single logical thread, so a query always observes a
//! fully-applied prior mutation.

pub mod config;

mod http;
mod protocol;
mod session;
mod tools;

pub use config::{ConfigError, PeriscopeConfig};
pub use http::router;
pub use session::{ChannelGuard, SERVER_NAME, ServerInfo, SessionHandle, SessionServer};
