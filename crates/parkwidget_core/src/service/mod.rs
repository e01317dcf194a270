//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository writes and refresh notification into editor
//!   use-cases.
//! - Keep UI/FFI layers decoupled from storage and refresh details.

pub mod note_service;
