//! Durable cache of prior successful responses.
//!
//! Key-addressed by request fingerprint, partitioned into static and
//! API-read classes, tagged with the active build generation so a new
//! build never serves assets cached by an old one.

mod fingerprint;
mod store;

pub use fingerprint::RequestFingerprint;
pub use store::{CacheEntry, DurableCache, ResourceClass};
