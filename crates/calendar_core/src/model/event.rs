//! Calendar event domain model.
//!
//! # Responsibility
//! - Define the canonical event record and its identifier value type.
//! - Own the overlap rule shared by storage and conflict detection.
//!
//! # Invariants
//! - `EventId` is a non-nil UUID and never changes after creation.
//! - A stored event always satisfies `start < end`.
//! - Title length is 3..=50 characters (Unicode scalar values).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Minimum title length in characters.
pub const TITLE_MIN_CHARS: usize = 3;
/// Maximum title length in characters.
pub const TITLE_MAX_CHARS: usize = 50;

/// Stable identifier of one calendar event.
///
/// Serialized as the canonical hyphenated lowercase UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier from its string form.
    ///
    /// The input is taken as-is; surrounding whitespace makes it invalid.
    ///
    /// # Errors
    /// - Returns `EventIdParseError` when `value` is not a UUID or is nil.
    pub fn parse(value: &str) -> Result<Self, EventIdParseError> {
        match Uuid::parse_str(value) {
            Ok(uuid) if !uuid.is_nil() => Ok(Self(uuid)),
            _ => Err(EventIdParseError {
                input: value.to_string(),
            }),
        }
    }

    /// Returns the wrapped UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EventId {
    type Err = EventIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EventId {
    type Error = EventIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EventId> for String {
    fn from(value: EventId) -> Self {
        value.to_string()
    }
}

/// Error returned when a string is not a valid event identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIdParseError {
    /// Raw input that failed to parse.
    pub input: String,
}

impl Display for EventIdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid event identifier `{}`", self.input)
    }
}

impl Error for EventIdParseError {}

/// Pair of instants describing an occupied or queried interval.
///
/// Two spans overlap iff `a.start < b.end && a.end > b.start`, so spans that
/// only share a boundary instant do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    /// Builds a span, rejecting `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, EventValidationError> {
        validate_span(start, end)?;
        Ok(Self { start, end })
    }

    /// Returns whether the two spans share any instant beyond a boundary.
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Validation failures for event fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    /// Identifier is the nil UUID.
    NilId,
    /// Title length is outside `TITLE_MIN_CHARS..=TITLE_MAX_CHARS`.
    TitleLength { len: usize },
    /// End instant is not strictly after start.
    InvalidSpan {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "event id must not be nil"),
            Self::TitleLength { len } => write!(
                f,
                "title must be {TITLE_MIN_CHARS}..={TITLE_MAX_CHARS} characters, got {len}"
            ),
            Self::InvalidSpan { start, end } => write!(
                f,
                "end ({}) must be after start ({})",
                end.to_rfc3339(),
                start.to_rfc3339()
            ),
        }
    }
}

impl Error for EventValidationError {}

/// Canonical calendar event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventWire")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Free text, empty when not provided.
    pub description: String,
}

impl Event {
    /// Creates a validated event with a freshly generated id.
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Result<Self, EventValidationError> {
        Self::with_id(EventId::new(), title, start, end, description)
    }

    /// Creates a validated event with a caller-provided id.
    ///
    /// Used by update paths where identity already exists.
    pub fn with_id(
        id: EventId,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Result<Self, EventValidationError> {
        let event = Self {
            id,
            title: title.into(),
            start,
            end,
            description: description.into(),
        };
        event.validate()?;
        Ok(event)
    }

    /// Checks every field invariant.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.id.as_uuid().is_nil() {
            return Err(EventValidationError::NilId);
        }
        validate_title(&self.title)?;
        validate_span(self.start, self.end)
    }

    /// Returns the occupied interval of this event.
    pub fn span(&self) -> TimeSpan {
        TimeSpan {
            start: self.start,
            end: self.end,
        }
    }
}

/// Checks the title length rule.
pub fn validate_title(title: &str) -> Result<(), EventValidationError> {
    let len = title.chars().count();
    if (TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len) {
        Ok(())
    } else {
        Err(EventValidationError::TitleLength { len })
    }
}

/// Checks `start < end`.
pub fn validate_span(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), EventValidationError> {
    if end > start {
        Ok(())
    } else {
        Err(EventValidationError::InvalidSpan { start, end })
    }
}

#[derive(Deserialize)]
struct EventWire {
    id: EventId,
    title: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    description: String,
}

impl TryFrom<EventWire> for Event {
    type Error = EventValidationError;

    fn try_from(value: EventWire) -> Result<Self, Self::Error> {
        Self::with_id(
            value.id,
            value.title,
            value.start,
            value.end,
            value.description,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{EventId, TimeSpan};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn display_roundtrips_through_parse() {
        let id = EventId::new();
        let parsed = EventId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_nil_uuid() {
        assert!(EventId::parse("00000000-0000-0000-0000-000000000000").is_err());
    }

    #[test]
    fn touching_spans_do_not_overlap() {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 10, 0, 0).unwrap();
        let first = TimeSpan::new(t0, t0 + Duration::hours(1)).unwrap();
        let second = TimeSpan::new(t0 + Duration::hours(1), t0 + Duration::hours(2)).unwrap();
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }
}
