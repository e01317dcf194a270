//! Editor-facing note use-cases.
//!
//! # Responsibility
//! - Provide save/delete/read APIs for the editor surface.
//! - Refresh every widget synchronously after each successful write, so
//!   control never returns to the editor while a widget still shows the
//!   previous note.
//!
//! # Invariants
//! - Write failures are returned to the caller, never swallowed.
//! - A failed write does not trigger a refresh.

use crate::model::location::{LocationValidationError, ParkingLocation};
use crate::model::note::Note;
use crate::refresh::{RefreshNotifier, RefreshReason};
use crate::render::render_set::RenderReport;
use crate::repo::note_repo::{NoteRepository, RepoError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Editor input failed validation.
    InvalidLocation(LocationValidationError),
    /// Note text is blank.
    EmptyText,
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLocation(err) => write!(f, "invalid location: {err}"),
            Self::EmptyText => write!(f, "note text cannot be empty"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLocation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::EmptyText => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<LocationValidationError> for NoteServiceError {
    fn from(value: LocationValidationError) -> Self {
        Self::InvalidLocation(value)
    }
}

/// Result of a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Note as committed to the primary store.
    pub note: Note,
    /// Render pass run before returning; `None` if the refresh worker was
    /// unavailable (the write itself still succeeded).
    pub render: Option<RenderReport>,
}

/// Note service facade over a repository and a refresh notifier.
pub struct NoteService {
    repo: Arc<dyn NoteRepository>,
    refresh: Arc<dyn RefreshNotifier>,
}

impl NoteService {
    pub fn new(repo: Arc<dyn NoteRepository>, refresh: Arc<dyn RefreshNotifier>) -> Self {
        Self { repo, refresh }
    }

    /// Current note, degraded to fallback/empty when the store is down.
    pub fn current_note(&self) -> Note {
        self.repo.read()
    }

    /// Current note parsed into editor fields, for prefilling an edit.
    pub fn current_location(&self) -> Option<ParkingLocation> {
        self.current_note()
            .display_text()
            .and_then(ParkingLocation::parse)
    }

    /// Saves free-form note text.
    pub fn save_text(
        &self,
        text: impl AsRef<str>,
        saved_at: i64,
    ) -> Result<WriteOutcome, NoteServiceError> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(NoteServiceError::EmptyText);
        }
        self.repo.write(text, saved_at)?;
        info!(
            "event=note_save module=service status=ok text_len={}",
            text.chars().count()
        );
        Ok(WriteOutcome {
            note: Note::saved(text, saved_at),
            render: self.refresh_after_write(RefreshReason::NoteSaved),
        })
    }

    /// Validates and saves a structured location.
    pub fn save_location(
        &self,
        location: &ParkingLocation,
        saved_at: i64,
    ) -> Result<WriteOutcome, NoteServiceError> {
        location.validate()?;
        self.save_text(location.compose(), saved_at)
    }

    /// Deletes the note.
    pub fn delete_note(&self) -> Result<WriteOutcome, NoteServiceError> {
        self.repo.delete()?;
        info!("event=note_delete module=service status=ok");
        Ok(WriteOutcome {
            note: Note::empty(),
            render: self.refresh_after_write(RefreshReason::NoteDeleted),
        })
    }

    fn refresh_after_write(&self, reason: RefreshReason) -> Option<RenderReport> {
        match self.refresh.refresh_blocking(reason) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(
                    "event=refresh_after_write module=service status=error reason={} error={}",
                    reason.as_str(),
                    err
                );
                None
            }
        }
    }
}
