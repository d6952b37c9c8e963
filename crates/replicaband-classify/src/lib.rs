//! replicaband-classify — notification payloads to scaling events.
//!
//! Converts an opaque notification delivery into a `ScalingEvent`.
//! Classification reads only structured JSON fields: an explicit
//! `primary_id` and a `direction` of `"scale_up"` or `"scale_down"`.
//! Free-text matching is deliberately absent — a log line that happens
//! to contain "scale up" must never trigger a mutation. Anything that
//! cannot be classified structurally becomes `Unknown` (a no-op) or
//! `Unrelated` (ignored without error).

pub mod classifier;

pub use classifier::{Classification, RawDelivery, classify};
