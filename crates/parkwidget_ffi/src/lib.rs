//! Flutter-facing bindings for the parking widget core.

pub mod api;
