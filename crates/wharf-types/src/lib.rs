//! Types shared between the host controller and its observers.
//!
//! Everything here is plain data: lifecycle states and events emitted on the
//! observer channel, plus the read-only status snapshot describing the
//! connectors and contexts of a running host. The types serialise with
//! `serde` so the binary can persist snapshots and external tooling can read
//! them back.

mod lifecycle;
mod status;

pub use lifecycle::{LifecycleEvent, LifecycleState};
pub use status::{ConnectorInfo, ConnectorMode, ContextInfo, ContextState, Scheme, StatusSnapshot};
