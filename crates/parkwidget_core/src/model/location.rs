//! Editor-side composition of parking note text.
//!
//! # Responsibility
//! - Compose `"<side> <floor>층[ <area>]"` note text from editor fields.
//! - Parse saved text back into fields so an edit can be prefilled.
//! - Enforce editor input rules before anything reaches the repository.
//!
//! # Invariants
//! - `floor` is within `0..=99`.
//! - `area` is trimmed, non-empty when present, and at most 30 characters.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MAX_FLOOR: u8 = 99;
pub const MAX_AREA_CHARS: usize = 30;

static LOCATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(지하|지상)\s+(\d{1,2})층(?:\s+(.+))?$").expect("valid location regex")
});

/// Which side of ground level the car is parked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorSide {
    Underground,
    AboveGround,
}

impl FloorSide {
    pub fn label(self) -> &'static str {
        match self {
            Self::Underground => "지하",
            Self::AboveGround => "지상",
        }
    }

    fn from_label(value: &str) -> Option<Self> {
        match value {
            "지하" => Some(Self::Underground),
            "지상" => Some(Self::AboveGround),
            _ => None,
        }
    }
}

/// Validation failure for editor input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationValidationError {
    FloorOutOfRange(u32),
    AreaTooLong { chars: usize },
}

impl Display for LocationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FloorOutOfRange(floor) => {
                write!(f, "floor {floor} is outside 0..={MAX_FLOOR}")
            }
            Self::AreaTooLong { chars } => {
                write!(f, "area has {chars} characters, limit is {MAX_AREA_CHARS}")
            }
        }
    }
}

impl Error for LocationValidationError {}

/// Structured parking location as entered in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkingLocation {
    pub side: FloorSide,
    pub floor: u8,
    pub area: Option<String>,
}

impl ParkingLocation {
    /// Builds and validates a location from raw editor fields.
    pub fn new(
        side: FloorSide,
        floor: u32,
        area: impl AsRef<str>,
    ) -> Result<Self, LocationValidationError> {
        let floor = u8::try_from(floor)
            .ok()
            .filter(|value| *value <= MAX_FLOOR)
            .ok_or(LocationValidationError::FloorOutOfRange(floor))?;
        let trimmed = area.as_ref().trim();
        let location = Self {
            side,
            floor,
            area: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        };
        location.validate()?;
        Ok(location)
    }

    pub fn validate(&self) -> Result<(), LocationValidationError> {
        if self.floor > MAX_FLOOR {
            return Err(LocationValidationError::FloorOutOfRange(u32::from(
                self.floor,
            )));
        }
        if let Some(area) = self.area.as_deref() {
            let chars = area.chars().count();
            if chars > MAX_AREA_CHARS {
                return Err(LocationValidationError::AreaTooLong { chars });
            }
        }
        Ok(())
    }

    /// Note text stored for this location.
    pub fn compose(&self) -> String {
        let mut text = format!("{} {}층", self.side.label(), self.floor);
        if let Some(area) = self.area.as_deref() {
            text.push(' ');
            text.push_str(area);
        }
        text
    }

    /// Parses note text produced by [`ParkingLocation::compose`].
    ///
    /// Returns `None` for free-form text that does not follow the pattern.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = LOCATION_RE.captures(text.trim())?;
        let side = FloorSide::from_label(caps.get(1)?.as_str())?;
        let floor = caps.get(2)?.as_str().parse::<u8>().ok()?;
        let area = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .filter(|value| !value.is_empty());
        Some(Self { side, floor, area })
    }
}

#[cfg(test)]
mod tests {
    use super::{FloorSide, LocationValidationError, ParkingLocation};

    #[test]
    fn compose_includes_area_only_when_present() {
        let with_area = ParkingLocation::new(FloorSide::Underground, 2, " A구역 ").unwrap();
        assert_eq!(with_area.compose(), "지하 2층 A구역");

        let without_area = ParkingLocation::new(FloorSide::AboveGround, 0, "  ").unwrap();
        assert_eq!(without_area.compose(), "지상 0층");
    }

    #[test]
    fn parse_recovers_fields_including_multi_word_area() {
        let parsed = ParkingLocation::parse("지하 12층 B 구역 기둥 3").unwrap();
        assert_eq!(parsed.side, FloorSide::Underground);
        assert_eq!(parsed.floor, 12);
        assert_eq!(parsed.area.as_deref(), Some("B 구역 기둥 3"));

        assert!(ParkingLocation::parse("B2 2D").is_none());
    }

    #[test]
    fn new_rejects_out_of_range_floor_and_long_area() {
        assert_eq!(
            ParkingLocation::new(FloorSide::Underground, 100, "").unwrap_err(),
            LocationValidationError::FloorOutOfRange(100)
        );
        let long_area = "가".repeat(31);
        assert_eq!(
            ParkingLocation::new(FloorSide::Underground, 1, long_area).unwrap_err(),
            LocationValidationError::AreaTooLong { chars: 31 }
        );
        assert!(ParkingLocation::new(FloorSide::Underground, 1, "가".repeat(30)).is_ok());
    }
}
