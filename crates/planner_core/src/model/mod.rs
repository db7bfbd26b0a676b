//! Planner domain model.
//!
//! # Responsibility
//! - Define the `PlannerState` aggregate consumed by presentation code.
//! - Catalog the eleven synchronized collections and their remote shape.
//!
//! # Invariants
//! - Record payloads are opaque to core; only `id` is ever read.
//! - Every record id is unique within its collection.

pub mod budget;
pub mod collection;
pub mod state;
