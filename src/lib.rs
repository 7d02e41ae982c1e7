//! Offline-first synchronization and caching engine for the Vuno farming
//! assistant.
//!
//! Connectivity in the field is intermittent at best, so every outbound
//! operation goes through a strategy dispatcher: reads resolve cache-first
//! or network-first by class and fall back to bundled local data, writes
//! made while offline land in a durable queue and are replayed in order,
//! exactly once and idempotency-token protected, when the network returns.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod net;
pub mod queue;
pub mod store;
pub mod sync;

pub use config::Config;
pub use connectivity::ConnectivityState;
pub use dispatch::{Provenance, ReadOutcome, ReadRequest, WriteOutcome, WriteRequest};
pub use engine::OfflineEngine;
pub use error::{EngineError, Result};
pub use fallback::ResourceKind;
