/// Stable identity of a timer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Short-period freshness timer.
    Periodic,
    /// One-shot timer for the next local midnight.
    Midnight,
}

impl TimerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::Midnight => "midnight",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "periodic" => Some(Self::Periodic),
            "midnight" => Some(Self::Midnight),
            _ => None,
        }
    }
}

/// One outstanding timer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleHandle {
    pub kind: TimerKind,
    /// Increases on every arm of `kind`; stale fires carry an old value.
    pub generation: u64,
    /// Epoch milliseconds.
    pub trigger_at_ms: i64,
    pub recurring: bool,
}
