//! Widget runtime composition root.
//!
//! # Responsibility
//! - Wire stores, repository, render set, refresh worker and scheduler for
//!   one data directory.
//! - Perform the cold start: arm both timers and render once.
//!
//! # Invariants
//! - Every component shares the same repository and clock.
//! - After `shutdown` no timer is armed and the worker has exited.

use crate::clock::Clock;
use crate::config::{ConfigError, WidgetConfig};
use crate::refresh::{
    spawn_refresh_worker, RefreshCoordinator, RefreshError, RefreshHandle, RefreshReason,
    RefreshWorker,
};
use crate::render::render_set::WidgetRenderSet;
use crate::render::surface::RenderTarget;
use crate::repo::note_repo::{NoteRepository, StoreNoteRepository};
use crate::schedule::{AlarmFacility, RefreshScheduler, ScheduleError};
use crate::service::note_service::NoteService;
use crate::store::{JsonFileKvStore, SqliteKvStore};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub enum RuntimeError {
    Config(ConfigError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Schedule(ScheduleError),
    Refresh(RefreshError),
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Io { path, source } => {
                write!(f, "cannot prepare data dir `{}`: {source}", path.display())
            }
            Self::Schedule(err) => write!(f, "failed to arm timers: {err}"),
            Self::Refresh(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Schedule(err) => Some(err),
            Self::Refresh(err) => Some(err),
        }
    }
}

impl From<ConfigError> for RuntimeError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ScheduleError> for RuntimeError {
    fn from(value: ScheduleError) -> Self {
        Self::Schedule(value)
    }
}

impl From<RefreshError> for RuntimeError {
    fn from(value: RefreshError) -> Self {
        Self::Refresh(value)
    }
}

/// A running widget subsystem for one data directory.
pub struct WidgetRuntime {
    data_dir: PathBuf,
    repo: Arc<dyn NoteRepository>,
    coordinator: Arc<RefreshCoordinator>,
    worker: RefreshWorker,
    scheduler: Arc<RefreshScheduler>,
    service: NoteService,
}

impl WidgetRuntime {
    /// Builds every component and performs the cold start.
    ///
    /// # Errors
    /// - `config` is invalid, or `data_dir` cannot be created.
    /// - The refresh worker cannot be spawned.
    /// - The alarm facility rejects the initial registrations.
    pub fn start(
        data_dir: impl AsRef<Path>,
        config: &WidgetConfig,
        target: Arc<dyn RenderTarget>,
        alarms: Arc<dyn AlarmFacility>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).map_err(|source| RuntimeError::Io {
            path: data_dir.clone(),
            source,
        })?;

        let repo: Arc<dyn NoteRepository> = Arc::new(StoreNoteRepository::new(
            SqliteKvStore::new(config.primary_db_path(&data_dir), config.busy_timeout()),
            JsonFileKvStore::new(config.fallback_path(&data_dir)),
        ));
        let widgets = WidgetRenderSet::standard(target, Arc::clone(&clock));
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&repo),
            widgets,
            Arc::clone(&clock),
        ));
        let worker = spawn_refresh_worker(Arc::clone(&coordinator))?;
        let notifier = Arc::new(worker.handle());

        let scheduler = Arc::new(RefreshScheduler::new(
            alarms,
            clock,
            notifier.clone(),
            config.periodic_interval(),
        ));
        scheduler.start()?;
        worker.handle().request(RefreshReason::ColdStart)?;

        info!(
            "event=runtime_start module=runtime status=ok data_dir={} interval_min={}",
            data_dir.display(),
            config.periodic_interval_minutes
        );

        Ok(Self {
            data_dir,
            service: NoteService::new(Arc::clone(&repo), notifier),
            repo,
            coordinator,
            worker,
            scheduler,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Editor-facing note operations.
    pub fn service(&self) -> &NoteService {
        &self.service
    }

    pub fn scheduler(&self) -> Arc<RefreshScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        self.worker.handle()
    }

    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn repo(&self) -> Arc<dyn NoteRepository> {
        Arc::clone(&self.repo)
    }

    /// Disarms both timers, drains queued refreshes and stops the worker.
    pub fn shutdown(self) {
        self.scheduler.stop();
        self.worker.shutdown();
        info!(
            "event=runtime_stop module=runtime status=ok passes={}",
            self.coordinator.pass_count()
        );
    }
}
