//! Diagnostics aggregation for Periscope.
//!
//! Three pieces, leaf-first: the host adapter boundary ([`host`]) which
//! normalizes raw editor diagnostics, the in-memory [`store`] kept current
//! from host change notifications, and the pure [`query`] functions that the
//! session server exposes as tools.

pub mod host;
pub mod query;
pub mod snapshot;
pub mod store;

pub use host::{
    DiagnosticsChanged, DiagnosticsHost, HostError, InMemoryHost, RawCode, RawDiagnostic,
};
pub use snapshot::SnapshotFileHost;
pub use store::{DiagnosticsStore, StoreSnapshot};
