//! Domain model for the parking note.
//!
//! # Responsibility
//! - Define the single persisted `Note` record read by every surface.
//! - Define the editor-side `ParkingLocation` composition of note text.
//!
//! # Invariants
//! - There is at most one `Note`; it carries no identity or history.

pub mod location;
pub mod note;
