//! Parking note record.

/// The current parking note.
///
/// `text == None` means nothing is saved. `saved_at` is epoch milliseconds
/// of the last successful write; it can be `None` alongside `Some(text)` only
/// when the stored timestamp could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Note {
    pub text: Option<String>,
    pub saved_at: Option<i64>,
}

impl Note {
    /// Note with both fields present.
    pub fn saved(text: impl Into<String>, saved_at: i64) -> Self {
        Self {
            text: Some(text.into()),
            saved_at: Some(saved_at),
        }
    }

    /// Note representing "nothing saved".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the note text when it holds anything besides whitespace.
    pub fn display_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.display_text().is_none()
    }
}
