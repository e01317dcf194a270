use super::{RefreshError, RefreshNotifier, RefreshReason};
use crate::clock::Clock;
use crate::render::render_set::{RenderReport, WidgetRenderSet};
use crate::repo::note_repo::NoteRepository;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Performs render passes over the shared repository.
pub struct RefreshCoordinator {
    repo: Arc<dyn NoteRepository>,
    widgets: WidgetRenderSet,
    clock: Arc<dyn Clock>,
    pass_lock: Mutex<()>,
    passes: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        repo: Arc<dyn NoteRepository>,
        widgets: WidgetRenderSet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            widgets,
            clock,
            pass_lock: Mutex::new(()),
            passes: AtomicU64::new(0),
        }
    }

    /// Reads the note once and renders it on every surface.
    ///
    /// Safe to call from any thread; concurrent calls run one after another.
    pub fn trigger_now(&self, reason: RefreshReason) -> RenderReport {
        let _pass = self.pass_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started_at = Instant::now();

        let read = self.repo.read_with_source();
        let report = self.widgets.render_all(&read.note, self.clock.now_ms());
        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;

        info!(
            "event=refresh_pass module=refresh status=ok pass={} reason={} source={} has_note={} rendered={} failed_variants={} duration_ms={}",
            pass,
            reason.as_str(),
            read.source.as_str(),
            !read.note.is_empty(),
            report.rendered_instances(),
            report.failed_variants().len(),
            started_at.elapsed().as_millis()
        );
        report
    }

    /// Number of passes completed since construction.
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }
}

/// Direct, in-thread notification; used where no worker is running.
impl RefreshNotifier for RefreshCoordinator {
    fn request_refresh(&self, reason: RefreshReason) {
        self.trigger_now(reason);
    }

    fn refresh_blocking(&self, reason: RefreshReason) -> Result<RenderReport, RefreshError> {
        Ok(self.trigger_now(reason))
    }
}
