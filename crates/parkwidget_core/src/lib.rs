//! Core logic for the parking-location widget.
//! This crate owns persistence, refresh scheduling and widget rendering.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod refresh;
pub mod render;
pub mod repo;
pub mod runtime;
pub mod schedule;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, WidgetConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::location::{FloorSide, LocationValidationError, ParkingLocation};
pub use model::note::Note;
pub use refresh::{RefreshCoordinator, RefreshError, RefreshHandle, RefreshReason};
pub use render::render_set::{RenderReport, SurfaceStatus, WidgetRenderSet};
pub use render::surface::{
    EditorMode, InstanceId, RenderError, RenderTarget, SurfaceVariant, TapIntent, TimeLine,
    WidgetView,
};
pub use repo::note_repo::{NoteRepository, NoteSource, RepoError, StoreNoteRepository};
pub use runtime::{RuntimeError, WidgetRuntime};
pub use schedule::{AlarmFacility, RefreshScheduler, ScheduleHandle, TimerKind};
pub use service::note_service::{NoteService, NoteServiceError, WriteOutcome};
pub use store::{KeyValueStore, StoreError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
