//! Repository layer for the parking note.
//!
//! # Responsibility
//! - Define the use-case oriented note persistence contract.
//! - Isolate store selection and fallback details from services and renderers.
//!
//! # Invariants
//! - Read paths absorb store failures; write paths surface them.

pub mod note_repo;
