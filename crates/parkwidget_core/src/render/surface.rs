//! Surface contract and size-variant implementations.

use crate::model::note::Note;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Shown instead of the note text when nothing is saved.
pub const PLACEHOLDER_TEXT: &str = "위치정보 없음";
/// Shown on the time line of larger variants when nothing is saved.
pub const TAP_TO_ADD_HINT: &str = "터치하여 위치 입력";

/// Host-assigned id of one placed widget instance.
pub type InstanceId = i32;

/// Widget size variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceVariant {
    Wide,
    Medium,
    Square,
}

impl SurfaceVariant {
    pub const ALL: [SurfaceVariant; 3] = [Self::Wide, Self::Medium, Self::Square];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wide => "wide",
            Self::Medium => "medium",
            Self::Square => "square",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wide" => Some(Self::Wide),
            "medium" => Some(Self::Medium),
            "square" => Some(Self::Square),
            _ => None,
        }
    }
}

/// Secondary line under the note text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeLine {
    Hidden,
    Text(String),
}

/// How the editor opens when a widget is tapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit,
}

/// Tap binding attached to every rendered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapIntent {
    OpenEditor(EditorMode),
}

/// Everything the host needs to draw one widget instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub display_text: String,
    pub time_line: TimeLine,
    pub tap_intent: TapIntent,
}

/// Failure reported by the host render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Host could not enumerate or reach its widget manager.
    TargetUnavailable(String),
    /// Instance was removed between enumeration and push.
    InstanceGone(InstanceId),
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetUnavailable(details) => write!(f, "render target unavailable: {details}"),
            Self::InstanceGone(id) => write!(f, "widget instance {id} no longer exists"),
        }
    }
}

impl Error for RenderError {}

/// Host side of rendering: enumerates placed instances and draws views.
pub trait RenderTarget: Send + Sync {
    fn active_instances(&self, variant: SurfaceVariant) -> Result<Vec<InstanceId>, RenderError>;
    fn push(
        &self,
        variant: SurfaceVariant,
        instance: InstanceId,
        view: &WidgetView,
    ) -> Result<(), RenderError>;
}

/// One renderable size variant.
pub trait WidgetSurface: Send + Sync {
    fn variant(&self) -> SurfaceVariant;

    /// Time line used when there is no save time to show.
    fn empty_time_line(&self) -> TimeLine;

    /// Builds the view for `note`. `relative_time` is the pass-wide label,
    /// `None` when the note has no usable save time.
    fn present(&self, note: &Note, relative_time: Option<&str>) -> WidgetView {
        match note.display_text() {
            None => WidgetView {
                display_text: PLACEHOLDER_TEXT.to_string(),
                time_line: self.empty_time_line(),
                tap_intent: TapIntent::OpenEditor(EditorMode::Create),
            },
            Some(text) => WidgetView {
                display_text: text.to_string(),
                time_line: relative_time
                    .map(|label| TimeLine::Text(label.to_string()))
                    .unwrap_or_else(|| self.empty_time_line()),
                tap_intent: TapIntent::OpenEditor(EditorMode::Edit),
            },
        }
    }
}

/// 4x1 widget.
#[derive(Debug, Clone, Copy, Default)]
pub struct WideSurface;

impl WidgetSurface for WideSurface {
    fn variant(&self) -> SurfaceVariant {
        SurfaceVariant::Wide
    }

    fn empty_time_line(&self) -> TimeLine {
        TimeLine::Text(TAP_TO_ADD_HINT.to_string())
    }
}

/// 2x2 widget.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediumSurface;

impl WidgetSurface for MediumSurface {
    fn variant(&self) -> SurfaceVariant {
        SurfaceVariant::Medium
    }

    fn empty_time_line(&self) -> TimeLine {
        TimeLine::Text(TAP_TO_ADD_HINT.to_string())
    }
}

/// 1x1 widget; too small for the hint, so the line is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareSurface;

impl WidgetSurface for SquareSurface {
    fn variant(&self) -> SurfaceVariant {
        SurfaceVariant::Square
    }

    fn empty_time_line(&self) -> TimeLine {
        TimeLine::Hidden
    }
}
