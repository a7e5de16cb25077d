//! Primitive validated types shared by the node schemas.
//!
//! These are value objects: construction checks the invariant once, so
//! any instance a consumer holds is known to be well-formed. Fields are
//! private for the types that carry an invariant; the unconstrained
//! pairs ([`Coordinate`], [`Offset`]) stay plain structs.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Unit for a [`Duration`] value. Wire strings: `ms`, `s`, `m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
}

impl TimeUnit {
    /// Multiplier to normalize a value in this unit to milliseconds.
    pub fn millis_multiplier(self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1.0,
            TimeUnit::Seconds => 1_000.0,
            TimeUnit::Minutes => 60_000.0,
        }
    }
}

/// A validated (magnitude, unit) pair of elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Duration {
    value: f64,
    unit: TimeUnit,
}

impl Duration {
    pub fn new(value: f64, unit: TimeUnit) -> Result<Self, ValidationError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::message(format!(
                "duration value must be a non-negative, finite number (got {value})"
            )));
        }
        Ok(Self { value, unit })
    }

    /// Infallible constructor for millisecond durations, used for the
    /// schema defaults (`clickDelay`, `typingSpeed`, ...).
    pub fn millis(value: u32) -> Self {
        Self {
            value: f64::from(value),
            unit: TimeUnit::Milliseconds,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Normalize to milliseconds (ms×1, s×1000, m×60000).
    pub fn to_milliseconds(&self) -> f64 {
        self.value * self.unit.millis_multiplier()
    }

    pub fn to_std(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.to_milliseconds() / 1_000.0)
    }
}

/// A min/max pair of durations; `min` never exceeds `max` once both are
/// normalized to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationRange {
    min: Duration,
    max: Duration,
}

impl DurationRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ValidationError> {
        if min.to_milliseconds() > max.to_milliseconds() {
            return Err(ValidationError::message(
                "minimum duration must be less than or equal to maximum duration",
            ));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

/// Direction of a scroll gesture. Wire strings are lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Scroll behavior attached to a mouse-click node: one or more
/// directions, each scrolled by `lines` (1–100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrollConfig {
    directions: Vec<ScrollDirection>,
    lines: u32,
}

impl ScrollConfig {
    pub fn new(directions: Vec<ScrollDirection>, lines: u32) -> Result<Self, ValidationError> {
        if directions.is_empty() {
            return Err(ValidationError::message(
                "scroll requires at least one direction",
            ));
        }
        if !(1..=100).contains(&lines) {
            return Err(ValidationError::message(format!(
                "scroll lines must be between 1 and 100 (got {lines})"
            )));
        }
        Ok(Self { directions, lines })
    }

    pub fn directions(&self) -> &[ScrollDirection] {
        &self.directions
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }
}

/// Modifier key held during a key press. Wire strings are lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyModifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

/// A key plus the modifiers held with it, and an optional hold duration.
///
/// Duplicate modifiers are tolerated (the set is order-insensitive), so
/// the list is kept as given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCombination {
    key: String,
    modifiers: Vec<KeyModifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<Duration>,
}

impl KeyCombination {
    pub fn new(key: impl Into<String>, modifiers: Vec<KeyModifier>) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::message("key must not be empty"));
        }
        Ok(Self {
            key,
            modifiers,
            duration: None,
        })
    }

    /// Attach a hold duration.
    pub fn held_for(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn modifiers(&self) -> &[KeyModifier] {
        &self.modifiers
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

/// Absolute screen position for a mouse move. No range constraint:
/// multi-monitor layouts make negative coordinates legitimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

/// Relative displacement for a mouse move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_rejects_negative_value() {
        assert!(Duration::new(-1.0, TimeUnit::Milliseconds).is_err());
    }

    #[test]
    fn duration_rejects_non_finite_value() {
        assert!(Duration::new(f64::NAN, TimeUnit::Seconds).is_err());
        assert!(Duration::new(f64::INFINITY, TimeUnit::Minutes).is_err());
    }

    #[test]
    fn to_milliseconds_applies_unit_multipliers() {
        let cases = [
            (Duration::new(250.0, TimeUnit::Milliseconds).unwrap(), 250.0),
            (Duration::new(2.0, TimeUnit::Seconds).unwrap(), 2_000.0),
            (Duration::new(1.5, TimeUnit::Minutes).unwrap(), 90_000.0),
        ];
        for (duration, expected) in cases {
            assert_eq!(duration.to_milliseconds(), expected);
        }
    }

    #[test]
    fn to_milliseconds_is_monotonic_in_value() {
        for unit in [TimeUnit::Milliseconds, TimeUnit::Seconds, TimeUnit::Minutes] {
            let mut previous = -1.0;
            for value in [0.0, 0.5, 1.0, 10.0, 5_000.0] {
                let ms = Duration::new(value, unit).unwrap().to_milliseconds();
                assert!(ms > previous);
                previous = ms;
            }
        }
    }

    #[test]
    fn range_rejects_min_greater_than_max() {
        // 2s > 1500ms once normalized.
        let min = Duration::new(2.0, TimeUnit::Seconds).unwrap();
        let max = Duration::new(1_500.0, TimeUnit::Milliseconds).unwrap();
        assert!(DurationRange::new(min, max).is_err());
    }

    #[test]
    fn range_accepts_equal_bounds_across_units() {
        let min = Duration::new(1.0, TimeUnit::Minutes).unwrap();
        let max = Duration::new(60.0, TimeUnit::Seconds).unwrap();
        assert!(DurationRange::new(min, max).is_ok());
    }

    #[test]
    fn scroll_config_bounds() {
        assert!(ScrollConfig::new(vec![], 10).is_err());
        assert!(ScrollConfig::new(vec![ScrollDirection::Down], 0).is_err());
        assert!(ScrollConfig::new(vec![ScrollDirection::Down], 101).is_err());
        assert!(ScrollConfig::new(vec![ScrollDirection::Down], 100).is_ok());
    }

    #[test]
    fn key_combination_rejects_empty_key() {
        assert!(KeyCombination::new("", vec![]).is_err());
    }

    #[test]
    fn key_combination_keeps_duplicate_modifiers() {
        let combo =
            KeyCombination::new("a", vec![KeyModifier::Ctrl, KeyModifier::Ctrl]).unwrap();
        assert_eq!(combo.modifiers().len(), 2);
    }
}
