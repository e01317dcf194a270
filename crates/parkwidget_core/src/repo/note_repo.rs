//! Note repository contract and store-backed implementation.
//!
//! # Responsibility
//! - Be the only gateway between callers and the key/value stores.
//! - Own the persisted layout (`location`, `locationTimestamp`) and its
//!   serialization.
//! - Apply the fallback policy: reads degrade, writes fail loudly.
//!
//! # Invariants
//! - `read` never fails; absence or unavailability yields an empty Note.
//! - `write` sets text and timestamp in one atomic store call; `delete`
//!   clears both in one atomic store call.
//! - Writes are never redirected to the fallback store. The fallback only
//!   receives a mirror of state the primary store already committed.
//! - Primary commit and fallback mirror run under one writer lock, so the
//!   fallback always ends on the same value as the primary.

use crate::model::note::Note;
use crate::store::{KeyValueStore, StoreError};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const LOCATION_KEY: &str = "location";
pub const LOCATION_TIMESTAMP_KEY: &str = "locationTimestamp";

const NOTE_KEYS: [&str; 2] = [LOCATION_KEY, LOCATION_TIMESTAMP_KEY];

pub type RepoResult<T> = Result<T, RepoError>;

/// Write-path persistence failure surfaced to editor callers.
#[derive(Debug)]
pub enum RepoError {
    /// Primary store could not be opened or updated.
    StoreUnavailable(StoreError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreUnavailable(err) => write!(f, "primary store unavailable: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) => Some(err),
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::StoreUnavailable(value)
    }
}

/// Which store served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSource {
    Primary,
    Fallback,
    /// Both stores failed (or no fallback is configured); note is empty.
    Unavailable,
}

impl NoteSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Unavailable => "unavailable",
        }
    }
}

/// A Note together with the store that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRead {
    pub note: Note,
    pub source: NoteSource,
}

/// Repository interface for the single parking note.
pub trait NoteRepository: Send + Sync {
    /// Reads the note, reporting which store answered.
    fn read_with_source(&self) -> NoteRead;
    /// Upserts text and save time as one unit.
    fn write(&self, text: &str, saved_at: i64) -> RepoResult<()>;
    /// Removes text and save time as one unit.
    fn delete(&self) -> RepoResult<()>;

    /// Reads the note. Never fails.
    fn read(&self) -> Note {
        self.read_with_source().note
    }
}

/// Repository over a primary store plus an optional read-only fallback.
pub struct StoreNoteRepository {
    primary: Box<dyn KeyValueStore>,
    fallback: Option<Box<dyn KeyValueStore>>,
    writer: Mutex<()>,
}

impl StoreNoteRepository {
    pub fn new(
        primary: impl KeyValueStore + 'static,
        fallback: impl KeyValueStore + 'static,
    ) -> Self {
        Self {
            primary: Box::new(primary),
            fallback: Some(Box::new(fallback)),
            writer: Mutex::new(()),
        }
    }

    pub fn without_fallback(primary: impl KeyValueStore + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            fallback: None,
            writer: Mutex::new(()),
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mirror_to_fallback(
        &self,
        op: &'static str,
        apply: impl FnOnce(&dyn KeyValueStore) -> Result<(), StoreError>,
    ) {
        let Some(fallback) = self.fallback.as_deref() else {
            return;
        };
        if let Err(err) = apply(fallback) {
            warn!(
                "event=note_mirror module=repo status=error op={} store={} error={}",
                op,
                fallback.label(),
                err
            );
        }
    }
}

impl NoteRepository for StoreNoteRepository {
    fn read_with_source(&self) -> NoteRead {
        let primary_error = match self.primary.get_many(&NOTE_KEYS) {
            Ok(values) => {
                return NoteRead {
                    note: decode_note(values, self.primary.label()),
                    source: NoteSource::Primary,
                };
            }
            Err(err) => err,
        };

        warn!(
            "event=note_read module=repo status=error store={} error_code={} error={}",
            self.primary.label(),
            primary_error.error_code(),
            primary_error
        );

        let Some(fallback) = self.fallback.as_deref() else {
            return NoteRead {
                note: Note::empty(),
                source: NoteSource::Unavailable,
            };
        };

        match fallback.get_many(&NOTE_KEYS) {
            Ok(values) => {
                debug!(
                    "event=note_read module=repo status=ok store={} fallback=true",
                    fallback.label()
                );
                NoteRead {
                    note: decode_note(values, fallback.label()),
                    source: NoteSource::Fallback,
                }
            }
            Err(err) => {
                warn!(
                    "event=note_read module=repo status=error store={} fallback=true error={}",
                    fallback.label(),
                    err
                );
                NoteRead {
                    note: Note::empty(),
                    source: NoteSource::Unavailable,
                }
            }
        }
    }

    fn write(&self, text: &str, saved_at: i64) -> RepoResult<()> {
        let saved_at_text = saved_at.to_string();
        let entries = [
            (LOCATION_KEY, text),
            (LOCATION_TIMESTAMP_KEY, saved_at_text.as_str()),
        ];

        let _writer = self.lock_writer();
        if let Err(err) = self.primary.put_many(&entries) {
            warn!(
                "event=note_write module=repo status=error store={} error_code={} error={}",
                self.primary.label(),
                err.error_code(),
                err
            );
            return Err(err.into());
        }
        debug!(
            "event=note_write module=repo status=ok store={} text_len={} saved_at={}",
            self.primary.label(),
            text.chars().count(),
            saved_at
        );

        self.mirror_to_fallback("write", |store| store.put_many(&entries));
        Ok(())
    }

    fn delete(&self) -> RepoResult<()> {
        let _writer = self.lock_writer();
        if let Err(err) = self.primary.remove_many(&NOTE_KEYS) {
            warn!(
                "event=note_delete module=repo status=error store={} error_code={} error={}",
                self.primary.label(),
                err.error_code(),
                err
            );
            return Err(err.into());
        }
        debug!(
            "event=note_delete module=repo status=ok store={}",
            self.primary.label()
        );

        self.mirror_to_fallback("delete", |store| store.remove_many(&NOTE_KEYS));
        Ok(())
    }
}

/// Decodes the `[location, locationTimestamp]` pair into a Note.
///
/// A timestamp without text is dropped; text with an unparseable or
/// non-positive timestamp keeps the text and drops the timestamp.
fn decode_note(values: Vec<Option<String>>, store: &str) -> Note {
    let mut values = values.into_iter();
    let text = values
        .next()
        .flatten()
        .filter(|value| !value.trim().is_empty());
    let raw_timestamp = values.next().flatten();

    let Some(text) = text else {
        return Note::empty();
    };

    let saved_at = raw_timestamp.and_then(|raw| match parse_timestamp(&raw) {
        Some(value) => Some(value),
        None => {
            warn!(
                "event=note_read module=repo status=degraded store={} error_code=malformed_timestamp raw_len={}",
                store,
                raw.len()
            );
            None
        }
    });

    Note {
        text: Some(text),
        saved_at,
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|value| *value > 0)
}
