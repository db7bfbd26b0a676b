//! Flutter-facing bindings for the planner sync core.

pub mod api;
