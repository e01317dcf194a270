//! FFI use-case API for the mobile host.
//!
//! # Responsibility
//! - Expose the editor, widget host and alarm bridge entry points to Dart
//!   via FRB.
//! - Own the process-wide widget runtime for the host's data directory.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Failures are reported in response envelopes or as non-empty strings;
//!   an empty string means success.
//! - Renders and alarm requests are queued here until the host drains them.

use log::{error, info};
use parkwidget_core::render::relative_time::relative_time_label_for;
use parkwidget_core::schedule::{AlarmRequest, FireOutcome, QueuedAlarmFacility};
use parkwidget_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Clock, EditorMode, FloorSide, InstanceId, NoteServiceError, ParkingLocation, RefreshReason,
    RenderError, RenderReport, RenderTarget, SurfaceVariant, SystemClock, TapIntent, TimeLine,
    TimerKind, WidgetConfig, WidgetRuntime, WidgetView, WriteOutcome,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static RUNTIME: Mutex<Option<HostRuntime>> = Mutex::new(None);

struct HostRuntime {
    runtime: WidgetRuntime,
    target: Arc<HostRenderTarget>,
    alarms: Arc<QueuedAlarmFacility>,
}

/// Render target that records placed instances and queues views for the
/// host to draw.
#[derive(Default)]
struct HostRenderTarget {
    instances: Mutex<HashMap<SurfaceVariant, Vec<InstanceId>>>,
    pending: Mutex<BTreeMap<(SurfaceVariant, InstanceId), WidgetView>>,
}

impl HostRenderTarget {
    fn set_instances(&self, variant: SurfaceVariant, ids: Vec<InstanceId>) {
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        // Views queued for removed instances would never be drawn.
        pending.retain(|(queued_variant, id), _| *queued_variant != variant || ids.contains(id));
        instances.insert(variant, ids);
    }

    fn take(&self) -> Vec<RenderedWidget> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
            .into_iter()
            .map(|((variant, instance_id), view)| to_rendered_widget(variant, instance_id, view))
            .collect()
    }
}

impl RenderTarget for HostRenderTarget {
    fn active_instances(&self, variant: SurfaceVariant) -> Result<Vec<InstanceId>, RenderError> {
        let instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(instances.get(&variant).cloned().unwrap_or_default())
    }

    fn push(
        &self,
        variant: SurfaceVariant,
        instance: InstanceId,
        view: &WidgetView,
    ) -> Result<(), RenderError> {
        // Newer views replace undrained older ones for the same instance.
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((variant, instance), view.clone());
        Ok(())
    }
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    if log_dir.trim().is_empty() {
        return "log_dir cannot be empty".to_string();
    }
    match init_logging_inner(level.as_str(), Path::new(log_dir.trim())) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Current note as shown to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationReadResponse {
    /// Whether a runtime was available to answer.
    pub ok: bool,
    /// Saved note text; `None` when nothing is saved.
    pub text: Option<String>,
    pub saved_at_ms: Option<i64>,
    /// Relative save-time label as the widgets show it.
    pub relative_time: Option<String>,
    /// Parsed editor fields; `None` for free-form text.
    pub underground: Option<bool>,
    pub floor: Option<u32>,
    pub area: Option<String>,
    /// `primary|fallback|unavailable`.
    pub source: String,
    pub message: String,
}

impl LocationReadResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: None,
            saved_at_ms: None,
            relative_time: None,
            underground: None,
            floor: None,
            area: None,
            source: "unavailable".to_string(),
            message: message.into(),
        }
    }
}

/// Result envelope for write and refresh commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationActionResponse {
    pub ok: bool,
    /// Widget instances updated before the call returned.
    pub rendered: u32,
    pub message: String,
}

impl LocationActionResponse {
    fn success(message: impl Into<String>, report: Option<&RenderReport>) -> Self {
        Self {
            ok: true,
            rendered: report
                .map(|report| u32::try_from(report.rendered_instances()).unwrap_or(u32::MAX))
                .unwrap_or(0),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            rendered: 0,
            message: message.into(),
        }
    }
}

/// One view the host must draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedWidget {
    /// `wide|medium|square`.
    pub variant: String,
    pub instance_id: i32,
    pub display_text: String,
    /// `None` when the time line is hidden.
    pub time_line: Option<String>,
    /// `create|edit`: how the editor opens on tap.
    pub editor_mode: String,
}

/// One alarm-manager operation the host must apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmCommand {
    /// `schedule|cancel`.
    pub action: String,
    /// `periodic|midnight`; also the stable registration identity.
    pub kind: String,
    pub generation: Option<u64>,
    pub trigger_at_ms: Option<i64>,
    /// Exact, wake-capable delivery required.
    pub exact: bool,
}

/// Result of reporting an alarm fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmFireResponse {
    /// `false` for stale or unknown fires.
    pub accepted: bool,
    pub next_trigger_at_ms: Option<i64>,
    pub message: String,
}

/// Starts the widget runtime for `data_dir` and arms both timers.
///
/// # FFI contract
/// - Sync call; opens stores and spawns the refresh worker.
/// - Idempotent for the same `data_dir`; a different directory is rejected.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_runtime_start(data_dir: String) -> String {
    let trimmed = data_dir.trim();
    if trimmed.is_empty() {
        return "data_dir cannot be empty".to_string();
    }
    let data_dir = PathBuf::from(trimmed);

    let mut slot = lock_runtime();
    if let Some(active) = slot.as_ref() {
        if active.runtime.data_dir() == data_dir.as_path() {
            return String::new();
        }
        return format!(
            "widget runtime already running at `{}`",
            active.runtime.data_dir().display()
        );
    }

    let config = match WidgetConfig::load_from_dir(&data_dir) {
        Ok(config) => config,
        Err(err) => return format!("widget_runtime_start failed: {err}"),
    };
    let target = Arc::new(HostRenderTarget::default());
    let alarms = Arc::new(QueuedAlarmFacility::new());
    match WidgetRuntime::start(
        &data_dir,
        &config,
        target.clone(),
        alarms.clone(),
        Arc::new(SystemClock),
    ) {
        Ok(runtime) => {
            *slot = Some(HostRuntime {
                runtime,
                target,
                alarms,
            });
            String::new()
        }
        Err(err) => {
            error!(
                "event=runtime_start module=ffi status=error error={}",
                err
            );
            format!("widget_runtime_start failed: {err}")
        }
    }
}

/// Stops the runtime: disarms timers and stops the refresh worker.
///
/// # FFI contract
/// - Returns empty string; stopping a stopped runtime is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_runtime_stop() -> String {
    let stopped = lock_runtime().take();
    if let Some(host) = stopped {
        host.runtime.shutdown();
        info!("event=runtime_stop module=ffi status=ok");
    }
    String::new()
}

/// Replaces the placed instance ids of one size variant.
///
/// # FFI contract
/// - `variant`: `wide|medium|square`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_set_instances(variant: String, instance_ids: Vec<i32>) -> String {
    let Some(variant) = SurfaceVariant::parse(&variant) else {
        return format!("unknown widget variant `{variant}`");
    };
    with_runtime(|host| {
        host.target.set_instances(variant, instance_ids);
    })
    .err()
    .unwrap_or_default()
}

/// Reads the current note for the editor.
///
/// # FFI contract
/// - Never fails on store errors; the note degrades to fallback or empty.
#[flutter_rust_bridge::frb(sync)]
pub fn location_read() -> LocationReadResponse {
    let read = match with_runtime(|host| host.runtime.repo().read_with_source()) {
        Ok(read) => read,
        Err(message) => return LocationReadResponse::failure(message),
    };

    let location = read.note.display_text().and_then(ParkingLocation::parse);
    let relative_time = read
        .note
        .display_text()
        .and(read.note.saved_at)
        .map(|saved_at| relative_time_label_for(&SystemClock, saved_at, SystemClock.now_ms()));
    let message = if read.note.is_empty() {
        "No location saved."
    } else {
        "Location loaded."
    };

    LocationReadResponse {
        ok: true,
        text: read.note.display_text().map(str::to_string),
        saved_at_ms: read.note.saved_at,
        relative_time,
        underground: location
            .as_ref()
            .map(|location| location.side == FloorSide::Underground),
        floor: location.as_ref().map(|location| u32::from(location.floor)),
        area: location.and_then(|location| location.area),
        source: read.source.as_str().to_string(),
        message: message.to_string(),
    }
}

/// Validates and saves a location, then refreshes every widget.
///
/// # FFI contract
/// - Returns after the widgets have been re-rendered.
/// - Validation and store failures are reported with `ok=false`.
#[flutter_rust_bridge::frb(sync)]
pub fn location_save(underground: bool, floor: u32, area: String) -> LocationActionResponse {
    let side = if underground {
        FloorSide::Underground
    } else {
        FloorSide::AboveGround
    };
    let location = match ParkingLocation::new(side, floor, area) {
        Ok(location) => location,
        Err(err) => return LocationActionResponse::failure(format!("invalid location: {err}")),
    };
    write_response(
        "location_save",
        "Location saved.",
        with_runtime(|host| {
            host.runtime
                .service()
                .save_location(&location, SystemClock.now_ms())
        }),
    )
}

/// Deletes the saved location, then refreshes every widget.
#[flutter_rust_bridge::frb(sync)]
pub fn location_delete() -> LocationActionResponse {
    write_response(
        "location_delete",
        "Location deleted.",
        with_runtime(|host| host.runtime.service().delete_note()),
    )
}

/// Runs a manual refresh pass and waits for it.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_refresh() -> LocationActionResponse {
    let result = with_runtime(|host| {
        host.runtime
            .refresh_handle()
            .trigger_now(RefreshReason::Manual)
    });
    match result {
        Ok(Ok(report)) => LocationActionResponse::success("Widgets refreshed.", Some(&report)),
        Ok(Err(err)) => LocationActionResponse::failure(format!("widget_refresh failed: {err}")),
        Err(message) => LocationActionResponse::failure(message),
    }
}

/// Drains views rendered since the last call, ordered by variant and id.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_take_renders() -> Vec<RenderedWidget> {
    with_runtime(|host| host.target.take()).unwrap_or_default()
}

/// Drains alarm-manager operations queued since the last call, oldest first.
#[flutter_rust_bridge::frb(sync)]
pub fn alarm_take_requests() -> Vec<AlarmCommand> {
    with_runtime(|host| {
        host.alarms
            .take_requests()
            .into_iter()
            .map(to_alarm_command)
            .collect()
    })
    .unwrap_or_default()
}

/// Reports an alarm delivered by the platform.
///
/// # FFI contract
/// - `kind`: `periodic|midnight`; `generation` as received from
///   [`alarm_take_requests`].
/// - Stale fires are acknowledged with `accepted=false` and no refresh.
#[flutter_rust_bridge::frb(sync)]
pub fn alarm_fired(kind: String, generation: u64) -> AlarmFireResponse {
    let Some(kind) = TimerKind::parse(&kind) else {
        return AlarmFireResponse {
            accepted: false,
            next_trigger_at_ms: None,
            message: format!("unknown alarm kind `{kind}`"),
        };
    };

    let result = with_runtime(|host| {
        let scheduler = host.runtime.scheduler();
        let armed = scheduler.current(kind);
        match armed.filter(|handle| handle.generation == generation) {
            Some(handle) => scheduler.handle_fire(&handle),
            None => FireOutcome::Stale,
        }
    });

    match result {
        Ok(FireOutcome::Refreshed { next }) => AlarmFireResponse {
            accepted: true,
            next_trigger_at_ms: next.map(|handle| handle.trigger_at_ms),
            message: match next {
                Some(_) => "Refresh requested.".to_string(),
                None => "Refresh requested; re-arm failed.".to_string(),
            },
        },
        Ok(FireOutcome::Stale) => AlarmFireResponse {
            accepted: false,
            next_trigger_at_ms: None,
            message: "Stale alarm ignored.".to_string(),
        },
        Err(message) => AlarmFireResponse {
            accepted: false,
            next_trigger_at_ms: None,
            message,
        },
    }
}

fn lock_runtime() -> MutexGuard<'static, Option<HostRuntime>> {
    RUNTIME.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_runtime<T>(f: impl FnOnce(&HostRuntime) -> T) -> Result<T, String> {
    let slot = lock_runtime();
    match slot.as_ref() {
        Some(host) => Ok(f(host)),
        None => Err("widget runtime is not started".to_string()),
    }
}

fn write_response(
    op: &'static str,
    success_message: &'static str,
    result: Result<Result<WriteOutcome, NoteServiceError>, String>,
) -> LocationActionResponse {
    match result {
        Ok(Ok(outcome)) => LocationActionResponse::success(success_message, outcome.render.as_ref()),
        Ok(Err(err)) => LocationActionResponse::failure(format!("{op} failed: {err}")),
        Err(message) => LocationActionResponse::failure(message),
    }
}

fn to_rendered_widget(
    variant: SurfaceVariant,
    instance_id: InstanceId,
    view: WidgetView,
) -> RenderedWidget {
    let TapIntent::OpenEditor(mode) = view.tap_intent;
    RenderedWidget {
        variant: variant.as_str().to_string(),
        instance_id,
        display_text: view.display_text,
        time_line: match view.time_line {
            TimeLine::Hidden => None,
            TimeLine::Text(text) => Some(text),
        },
        editor_mode: match mode {
            EditorMode::Create => "create",
            EditorMode::Edit => "edit",
        }
        .to_string(),
    }
}

fn to_alarm_command(request: AlarmRequest) -> AlarmCommand {
    match request {
        AlarmRequest::Schedule(handle) => AlarmCommand {
            action: "schedule".to_string(),
            kind: handle.kind.as_str().to_string(),
            generation: Some(handle.generation),
            trigger_at_ms: Some(handle.trigger_at_ms),
            exact: !handle.recurring,
        },
        AlarmRequest::Cancel(kind) => AlarmCommand {
            action: "cancel".to_string(),
            kind: kind.as_str().to_string(),
            generation: None,
            trigger_at_ms: None,
            exact: false,
        },
    }
}
