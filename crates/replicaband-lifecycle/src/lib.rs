//! replicaband-lifecycle — the control-plane client seam.
//!
//! The controller never owns replica state; it reads and mutates it
//! through the `LifecycleClient` trait. This crate provides:
//!
//! - **`client`** — the trait (describe / create_replica / delete_replica)
//!   and the `ControlPlaneError` taxonomy.
//! - **`retry`** — bounded retries with jittered exponential backoff and
//!   a per-call timeout around any client operation.
//! - **`http`** — the JSON-over-HTTP client used against a real control
//!   plane.
//! - **`memory`** — an in-memory control plane with failure injection
//!   for tests.

pub mod client;
pub mod http;
pub mod memory;
pub mod retry;

pub use client::{
    ControlPlaneError, ControlPlaneResult, CreateReplicaRequest, LifecycleClient, LifecycleFuture,
};
pub use http::HttpLifecycleClient;
pub use memory::InMemoryControlPlane;
pub use retry::{RetryPolicy, with_retries};
