//! Refresh fan-out: one repository read pushed to every surface.
//!
//! # Responsibility
//! - Run render passes (`RefreshCoordinator`).
//! - Serialize refresh triggers through one request channel and worker.
//!
//! # Invariants
//! - A pass performs exactly one repository read.
//! - Passes never interleave; each one renders a single Note snapshot.

use crate::render::render_set::RenderReport;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod coordinator;
mod worker;

pub use coordinator::RefreshCoordinator;
pub use worker::{spawn_refresh_worker, RefreshHandle, RefreshRequest, RefreshWorker};

/// Why a refresh pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Periodic,
    Midnight,
    NoteSaved,
    NoteDeleted,
    Manual,
    ColdStart,
}

impl RefreshReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::Midnight => "midnight",
            Self::NoteSaved => "note_saved",
            Self::NoteDeleted => "note_deleted",
            Self::Manual => "manual",
            Self::ColdStart => "cold_start",
        }
    }
}

#[derive(Debug)]
pub enum RefreshError {
    /// Refresh worker has stopped and no longer accepts requests.
    WorkerStopped,
    /// Worker dropped the reply before finishing the pass.
    ReplyDropped,
    /// Worker thread could not be started.
    Spawn(std::io::Error),
}

impl Display for RefreshError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkerStopped => write!(f, "refresh worker has stopped"),
            Self::ReplyDropped => write!(f, "refresh worker dropped the reply"),
            Self::Spawn(err) => write!(f, "failed to start refresh worker: {err}"),
        }
    }
}

impl Error for RefreshError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

/// Entry point for anything that needs widgets refreshed.
pub trait RefreshNotifier: Send + Sync {
    /// Queues a refresh without waiting for it (timer callbacks).
    fn request_refresh(&self, reason: RefreshReason);

    /// Runs a refresh and returns once every surface has been rendered
    /// (editor writes).
    fn refresh_blocking(&self, reason: RefreshReason) -> Result<RenderReport, RefreshError>;
}
