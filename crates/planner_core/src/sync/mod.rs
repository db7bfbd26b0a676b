//! Local-first synchronization engine.
//!
//! # Responsibility
//! - Reconcile the on-device cache with the remote authoritative store.
//! - Keep a consistent `PlannerState` available regardless of network state.
//!
//! # Invariants
//! - Field names are translated only at the gateway boundary.
//! - Nothing in this module is fatal to a session; failures surface as
//!   reports and a sync status.

pub mod budget_normalizer;
pub mod gateway;
pub mod key_casing;
pub mod loader;
pub mod orchestrator;
pub mod push;
pub mod rest_gateway;
pub mod session;
pub mod tracker;
pub mod worker;
