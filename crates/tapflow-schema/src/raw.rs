//! Wire-format types for the flow transport JSON.
//!
//! These mirror the serialized shape, with every field optional and the
//! structural fields held as undecoded [`Value`]s, so that one
//! malformed or wrong-typed field does not abort ingestion of the whole
//! payload — flow validation reports every failure at once.
//! [`crate::flow::Flow::validate`] turns this layer into the typed
//! model; the typed model converts back via
//! [`crate::flow::Flow::to_raw`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::values::{
    Coordinate, Duration, DurationRange, KeyCombination, KeyModifier, Offset, ScrollConfig,
    ScrollDirection, TimeUnit,
};

/// Top-level transport shape: `{ nodes: [...], edges: [...], metadata: {...} }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFlow {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
    #[serde(default)]
    pub metadata: Value,
}

/// Every field stays undecoded: a string where a number belongs must
/// surface as that node's error, not kill the payload decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(rename = "type", default)]
    pub kind: Option<Value>,
    #[serde(default)]
    pub position: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Variant-specific payload, decoded once the discriminant is known.
    #[serde(default)]
    pub config: Option<Value>,
}

impl RawNode {
    /// The node id, when it is at least a string.
    pub fn id_str(&self) -> Option<&str> {
        self.id.as_ref().and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEdge {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub target: Option<Value>,
}

// ---------------------------------------------------------------------------
// Field extraction, with the field name as the error path
// ---------------------------------------------------------------------------

pub(crate) fn required_number(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<f64, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => {
            Err(ValidationError::new(field, format!("{field} is required")))
        }
        Some(v) => v.as_f64().ok_or_else(|| {
            ValidationError::new(field, format!("{field} must be a number (got {v})"))
        }),
    }
}

pub(crate) fn required_string(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<String, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => {
            Err(ValidationError::new(field, format!("{field} is required")))
        }
        Some(v) => v.as_str().map(str::to_string).ok_or_else(|| {
            ValidationError::new(field, format!("{field} must be a string (got {v})"))
        }),
    }
}

pub(crate) fn optional_string(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_str().map(|s| Some(s.to_string())).ok_or_else(|| {
            ValidationError::new(field, format!("{field} must be a string (got {v})"))
        }),
    }
}

pub(crate) fn optional_timestamp(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or_else(|| {
                ValidationError::new(
                    field,
                    format!("{field} must be an RFC 3339 timestamp (got {v})"),
                )
            })?;
            DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| {
                    ValidationError::new(
                        field,
                        format!("{field} must be an RFC 3339 timestamp (got {s:?})"),
                    )
                })
        }
    }
}

// ---------------------------------------------------------------------------
// Value-object wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawDuration {
    pub value: f64,
    pub unit: TimeUnit,
}

impl TryFrom<RawDuration> for Duration {
    type Error = ValidationError;

    fn try_from(raw: RawDuration) -> Result<Self, Self::Error> {
        Duration::new(raw.value, raw.unit)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawDurationRange {
    pub min: RawDuration,
    pub max: RawDuration,
}

impl TryFrom<RawDurationRange> for DurationRange {
    type Error = ValidationError;

    fn try_from(raw: RawDurationRange) -> Result<Self, Self::Error> {
        let min = Duration::try_from(raw.min).map_err(|e| e.at("min"))?;
        let max = Duration::try_from(raw.max).map_err(|e| e.at("max"))?;
        DurationRange::new(min, max)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScrollConfig {
    pub directions: Vec<ScrollDirection>,
    pub lines: f64,
}

impl TryFrom<RawScrollConfig> for ScrollConfig {
    type Error = ValidationError;

    fn try_from(raw: RawScrollConfig) -> Result<Self, Self::Error> {
        if raw.lines.fract() != 0.0 || !(1.0..=100.0).contains(&raw.lines) {
            return Err(ValidationError::message(format!(
                "scroll lines must be an integer between 1 and 100 (got {})",
                raw.lines
            ))
            .at("lines"));
        }
        ScrollConfig::new(raw.directions, raw.lines as u32)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawKeyCombination {
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<KeyModifier>,
    #[serde(default)]
    pub duration: Option<RawDuration>,
}

impl TryFrom<RawKeyCombination> for KeyCombination {
    type Error = ValidationError;

    fn try_from(raw: RawKeyCombination) -> Result<Self, Self::Error> {
        let combo =
            KeyCombination::new(raw.key, raw.modifiers).map_err(|e| e.at("key"))?;
        match raw.duration {
            Some(d) => {
                let held = Duration::try_from(d).map_err(|e| e.at("duration"))?;
                Ok(combo.held_for(held))
            }
            None => Ok(combo),
        }
    }
}

// ---------------------------------------------------------------------------
// Node config wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMouseClickConfig {
    pub button_type: crate::node::MouseButton,
    #[serde(default)]
    pub click_count: Option<f64>,
    #[serde(default)]
    pub click_delay: Option<RawDuration>,
    #[serde(default)]
    pub press_release_delay: Option<RawDuration>,
    #[serde(default)]
    pub release_after_press: Option<bool>,
    #[serde(default)]
    pub scroll_config: Option<RawScrollConfig>,
}

/// Positioning mode discriminant for mouse-move payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveType {
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMouseMoveConfig {
    pub move_type: MoveType,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    #[serde(default)]
    pub offset: Option<Offset>,
    #[serde(default)]
    pub duration: Option<RawDuration>,
    #[serde(default)]
    pub smooth: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawKeyPressConfig {
    #[serde(default)]
    pub keys: Option<Vec<RawKeyCombination>>,
    #[serde(default)]
    pub sequential: Option<bool>,
    #[serde(default)]
    pub interval: Option<RawDuration>,
}

/// Delay mode discriminant. Wire strings are capitalized (`Fixed`, `Random`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayType {
    Fixed,
    Random,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDelayConfig {
    pub delay_type: DelayType,
    #[serde(default)]
    pub duration: Option<RawDuration>,
    #[serde(default)]
    pub range: Option<RawDurationRange>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTypeStringConfig {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub typing_speed: Option<RawDuration>,
    #[serde(default)]
    pub clear_before: Option<bool>,
    #[serde(default)]
    pub press_enter: Option<bool>,
}
