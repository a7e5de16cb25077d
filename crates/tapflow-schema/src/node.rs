//! Typed node model: one automation step with its validated
//! configuration.
//!
//! The six node variants form a closed sum type keyed by the wire
//! `type` discriminant, so every dispatch site gets exhaustiveness
//! checking — adding a seventh variant breaks each unmatched `match`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::flow::SCHEMA_VERSION;
use crate::raw::{
    self, DelayType, MoveType, RawDelayConfig, RawDuration, RawKeyPressConfig,
    RawMouseClickConfig, RawMouseMoveConfig, RawNode, RawTypeStringConfig,
};
use crate::values::{
    Coordinate, Duration, DurationRange, KeyCombination, Offset, ScrollConfig,
};

/// Closed enumeration of node types. Wire strings match the editor's
/// schema (`StartNode`, `MouseClickNode`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "StartNode")]
    Start,
    #[serde(rename = "MouseClickNode")]
    MouseClick,
    #[serde(rename = "MouseMoveNode")]
    MouseMove,
    #[serde(rename = "KeyPressNode")]
    KeyPress,
    #[serde(rename = "DelayNode")]
    Delay,
    #[serde(rename = "TypeStringNode")]
    TypeString,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Start,
        NodeKind::MouseClick,
        NodeKind::MouseMove,
        NodeKind::KeyPress,
        NodeKind::Delay,
        NodeKind::TypeString,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            NodeKind::Start => "StartNode",
            NodeKind::MouseClick => "MouseClickNode",
            NodeKind::MouseMove => "MouseMoveNode",
            NodeKind::KeyPress => "KeyPressNode",
            NodeKind::Delay => "DelayNode",
            NodeKind::TypeString => "TypeStringNode",
        }
    }

    pub fn from_wire(s: &str) -> Option<NodeKind> {
        Self::ALL.iter().copied().find(|k| k.as_wire() == s)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::MouseClick => "Mouse Click",
            NodeKind::MouseMove => "Mouse Move",
            NodeKind::KeyPress => "Key Press",
            NodeKind::Delay => "Delay",
            NodeKind::TypeString => "Type String",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Human-facing node metadata plus the schema version tag carried for
/// forward migration of persisted flows.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetadata {
    pub label: String,
    pub description: Option<String>,
    pub version: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl NodeMetadata {
    pub fn new(label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            label: label.into(),
            description: None,
            version: SCHEMA_VERSION.to_string(),
            created: now,
            modified: now,
        }
    }

    /// Paths are prefixed with `metadata` so they read as
    /// `metadata.label`, `metadata.created`, ... at the node level.
    fn from_raw(value: Option<&Value>) -> Result<Self, ValidationError> {
        let value =
            value.ok_or_else(|| ValidationError::new("metadata", "metadata is required"))?;
        let obj = value.as_object().ok_or_else(|| {
            ValidationError::new("metadata", format!("metadata must be an object (got {value})"))
        })?;
        let now = Utc::now();
        Ok(Self {
            label: raw::required_string(obj, "label").map_err(|e| e.at("metadata"))?,
            description: raw::optional_string(obj, "description").map_err(|e| e.at("metadata"))?,
            version: raw::optional_string(obj, "version")
                .map_err(|e| e.at("metadata"))?
                .unwrap_or_else(|| SCHEMA_VERSION.to_string()),
            created: raw::optional_timestamp(obj, "created")
                .map_err(|e| e.at("metadata"))?
                .unwrap_or(now),
            modified: raw::optional_timestamp(obj, "modified")
                .map_err(|e| e.at("metadata"))?
                .unwrap_or(now),
        })
    }

    fn to_raw(&self) -> Value {
        let mut value = json!({
            "label": self.label,
            "version": self.version,
            "created": self.created,
            "modified": self.modified,
        });
        if let Some(description) = &self.description {
            value["description"] = json!(description);
        }
        value
    }
}

/// One automation step in a flow.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: Uuid,
    pub position: Position,
    pub metadata: NodeMetadata,
    pub config: NodeConfig,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    /// Validate one raw node. Fails fast with the first violated
    /// constraint; paths are relative to the node object.
    pub fn from_raw(raw: &RawNode) -> Result<Node, ValidationError> {
        let id = match &raw.id {
            None => return Err(ValidationError::new("id", "id is required")),
            Some(v) => {
                let s = v.as_str().ok_or_else(|| {
                    ValidationError::new("id", format!("id must be a string (got {v})"))
                })?;
                Uuid::parse_str(s).map_err(|_| {
                    ValidationError::new("id", format!("id must be a valid UUID (got {s:?})"))
                })?
            }
        };

        let position = position_from_raw(raw.position.as_ref())?;
        let metadata = NodeMetadata::from_raw(raw.metadata.as_ref())?;

        let kind = match &raw.kind {
            None => return Err(ValidationError::new("type", "node type is missing")),
            Some(v) => v.as_str().ok_or_else(|| {
                ValidationError::new("type", format!("node type must be a string (got {v})"))
            })?,
        };
        let config = NodeConfig::validate(kind, raw.config.as_ref())?;

        Ok(Node {
            id,
            position,
            metadata,
            config,
        })
    }

    pub fn to_raw(&self) -> RawNode {
        RawNode {
            id: Some(json!(self.id.to_string())),
            kind: Some(json!(self.kind().as_wire())),
            position: Some(json!({"x": self.position.x, "y": self.position.y})),
            metadata: Some(self.metadata.to_raw()),
            config: Some(self.config.to_value()),
        }
    }
}

/// Mouse button for click nodes. Wire strings are lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Tagged union over the six node variants, discriminant = wire `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Start,
    MouseClick(MouseClickConfig),
    MouseMove(MouseMoveConfig),
    KeyPress(KeyPressConfig),
    Delay(DelayConfig),
    TypeString(TypeStringConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseClickConfig {
    pub button: MouseButton,
    /// Bounded to 1..=1000; defaults to 1.
    pub click_count: u32,
    pub click_delay: Duration,
    pub press_release_delay: Duration,
    pub release_after_press: bool,
    pub scroll: Option<ScrollConfig>,
}

/// Where a mouse move goes. The two variants are deliberately
/// non-overlapping: an absolute move cannot carry an offset and a
/// relative one cannot carry a coordinate, so the "both present" and
/// "both absent" states are unrepresentable once validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveTarget {
    Absolute(Coordinate),
    Relative(Offset),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseMoveConfig {
    pub target: MoveTarget,
    pub duration: Duration,
    pub smooth: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyPressConfig {
    /// Never empty after validation.
    pub keys: Vec<KeyCombination>,
    pub sequential: bool,
    pub interval: Duration,
}

/// Fixed vs. random wait, with the payload the mode requires and
/// nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayConfig {
    Fixed(Duration),
    Random(DurationRange),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeStringConfig {
    /// Never empty after validation.
    pub text: String,
    pub typing_speed: Duration,
    pub clear_before: bool,
    pub press_enter: bool,
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Start => NodeKind::Start,
            NodeConfig::MouseClick(_) => NodeKind::MouseClick,
            NodeConfig::MouseMove(_) => NodeKind::MouseMove,
            NodeConfig::KeyPress(_) => NodeKind::KeyPress,
            NodeConfig::Delay(_) => NodeKind::Delay,
            NodeConfig::TypeString(_) => NodeKind::TypeString,
        }
    }

    /// Discriminated dispatch: pick the variant from the `type` string
    /// and validate the raw payload against it, applying the schema
    /// defaults for absent fields.
    pub fn validate(kind: &str, config: Option<&Value>) -> Result<NodeConfig, ValidationError> {
        let Some(kind) = NodeKind::from_wire(kind) else {
            return Err(ValidationError::new(
                "type",
                format!("unknown node type: {kind}"),
            ));
        };
        match kind {
            NodeKind::Start => Ok(NodeConfig::Start),
            NodeKind::MouseClick => validate_mouse_click(config).map(NodeConfig::MouseClick),
            NodeKind::MouseMove => validate_mouse_move(config).map(NodeConfig::MouseMove),
            NodeKind::KeyPress => validate_key_press(config).map(NodeConfig::KeyPress),
            NodeKind::Delay => validate_delay(config).map(NodeConfig::Delay),
            NodeKind::TypeString => validate_type_string(config).map(NodeConfig::TypeString),
        }
    }

    /// Serialize back to the variant-specific wire payload.
    pub fn to_value(&self) -> Value {
        match self {
            NodeConfig::Start => json!({}),
            NodeConfig::MouseClick(c) => {
                let mut value = json!({
                    "buttonType": c.button,
                    "clickCount": c.click_count,
                    "clickDelay": c.click_delay,
                    "pressReleaseDelay": c.press_release_delay,
                    "releaseAfterPress": c.release_after_press,
                });
                if let Some(scroll) = &c.scroll {
                    value["scrollConfig"] = json!(scroll);
                }
                value
            }
            NodeConfig::MouseMove(c) => {
                let mut value = match c.target {
                    MoveTarget::Absolute(coordinate) => json!({
                        "moveType": "absolute",
                        "coordinate": coordinate,
                    }),
                    MoveTarget::Relative(offset) => json!({
                        "moveType": "relative",
                        "offset": offset,
                    }),
                };
                value["duration"] = json!(c.duration);
                value["smooth"] = json!(c.smooth);
                value
            }
            NodeConfig::KeyPress(c) => json!({
                "keys": c.keys,
                "sequential": c.sequential,
                "interval": c.interval,
            }),
            NodeConfig::Delay(c) => match c {
                DelayConfig::Fixed(duration) => json!({
                    "delayType": "Fixed",
                    "duration": duration,
                }),
                DelayConfig::Random(range) => json!({
                    "delayType": "Random",
                    "range": range,
                }),
            },
            NodeConfig::TypeString(c) => json!({
                "text": c.text,
                "typingSpeed": c.typing_speed,
                "clearBefore": c.clear_before,
                "pressEnter": c.press_enter,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-variant validators
// ---------------------------------------------------------------------------

fn position_from_raw(value: Option<&Value>) -> Result<Position, ValidationError> {
    let value = value.ok_or_else(|| ValidationError::new("position", "position is required"))?;
    let obj = value.as_object().ok_or_else(|| {
        ValidationError::new("position", format!("position must be an object (got {value})"))
    })?;
    Ok(Position {
        x: raw::required_number(obj, "x").map_err(|e| e.at("position"))?,
        y: raw::required_number(obj, "y").map_err(|e| e.at("position"))?,
    })
}

fn parse_config<T: serde::de::DeserializeOwned>(
    config: Option<&Value>,
) -> Result<T, ValidationError> {
    let value = config.cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| ValidationError::new("config", e.to_string()))
}

fn duration_or(
    raw: Option<RawDuration>,
    default: Duration,
    path: &str,
) -> Result<Duration, ValidationError> {
    match raw {
        Some(raw) => Duration::try_from(raw).map_err(|e| e.at(path)),
        None => Ok(default),
    }
}

fn validate_mouse_click(config: Option<&Value>) -> Result<MouseClickConfig, ValidationError> {
    let raw: RawMouseClickConfig = parse_config(config)?;

    let click_count = match raw.click_count {
        None => 1,
        Some(v) if v.fract() == 0.0 && (1.0..=1000.0).contains(&v) => v as u32,
        Some(v) => {
            return Err(ValidationError::new(
                "config.clickCount",
                format!("clickCount must be an integer between 1 and 1000 (got {v})"),
            ));
        }
    };

    let scroll = raw
        .scroll_config
        .map(ScrollConfig::try_from)
        .transpose()
        .map_err(|e| e.at("config.scrollConfig"))?;

    Ok(MouseClickConfig {
        button: raw.button_type,
        click_count,
        click_delay: duration_or(raw.click_delay, Duration::millis(100), "config.clickDelay")?,
        press_release_delay: duration_or(
            raw.press_release_delay,
            Duration::millis(50),
            "config.pressReleaseDelay",
        )?,
        release_after_press: raw.release_after_press.unwrap_or(true),
        scroll,
    })
}

fn validate_mouse_move(config: Option<&Value>) -> Result<MouseMoveConfig, ValidationError> {
    let raw: RawMouseMoveConfig = parse_config(config)?;

    let target = match raw.move_type {
        MoveType::Absolute => {
            if raw.offset.is_some() {
                return Err(ValidationError::new(
                    "config.offset",
                    "mode/payload mismatch: offset is not allowed for an absolute move",
                ));
            }
            let coordinate = raw.coordinate.ok_or_else(|| {
                ValidationError::new(
                    "config.coordinate",
                    "mode/payload mismatch: absolute move requires a coordinate",
                )
            })?;
            MoveTarget::Absolute(coordinate)
        }
        MoveType::Relative => {
            if raw.coordinate.is_some() {
                return Err(ValidationError::new(
                    "config.coordinate",
                    "mode/payload mismatch: coordinate is not allowed for a relative move",
                ));
            }
            let offset = raw.offset.ok_or_else(|| {
                ValidationError::new(
                    "config.offset",
                    "mode/payload mismatch: relative move requires an offset",
                )
            })?;
            MoveTarget::Relative(offset)
        }
    };

    Ok(MouseMoveConfig {
        target,
        duration: duration_or(raw.duration, Duration::millis(500), "config.duration")?,
        smooth: raw.smooth.unwrap_or(true),
    })
}

fn validate_key_press(config: Option<&Value>) -> Result<KeyPressConfig, ValidationError> {
    let raw: RawKeyPressConfig = parse_config(config)?;

    let raw_keys = raw.keys.unwrap_or_default();
    if raw_keys.is_empty() {
        return Err(ValidationError::new(
            "config.keys",
            "at least one key combination is required",
        ));
    }
    let mut keys = Vec::with_capacity(raw_keys.len());
    for (i, raw_key) in raw_keys.into_iter().enumerate() {
        let combo = KeyCombination::try_from(raw_key)
            .map_err(|e| e.at(&format!("[{i}]")).at("config.keys"))?;
        keys.push(combo);
    }

    Ok(KeyPressConfig {
        keys,
        sequential: raw.sequential.unwrap_or(true),
        interval: duration_or(raw.interval, Duration::millis(100), "config.interval")?,
    })
}

fn validate_delay(config: Option<&Value>) -> Result<DelayConfig, ValidationError> {
    let raw: RawDelayConfig = parse_config(config)?;

    match raw.delay_type {
        DelayType::Fixed => {
            if raw.range.is_some() {
                return Err(ValidationError::new(
                    "config.range",
                    "mode/payload mismatch: range is not allowed for a Fixed delay",
                ));
            }
            let duration = raw.duration.ok_or_else(|| {
                ValidationError::new(
                    "config.duration",
                    "mode/payload mismatch: Fixed delay requires a duration",
                )
            })?;
            Ok(DelayConfig::Fixed(
                Duration::try_from(duration).map_err(|e| e.at("config.duration"))?,
            ))
        }
        DelayType::Random => {
            if raw.duration.is_some() {
                return Err(ValidationError::new(
                    "config.duration",
                    "mode/payload mismatch: duration is not allowed for a Random delay",
                ));
            }
            let range = raw.range.ok_or_else(|| {
                ValidationError::new(
                    "config.range",
                    "mode/payload mismatch: Random delay requires a range",
                )
            })?;
            Ok(DelayConfig::Random(
                DurationRange::try_from(range).map_err(|e| e.at("config.range"))?,
            ))
        }
    }
}

fn validate_type_string(config: Option<&Value>) -> Result<TypeStringConfig, ValidationError> {
    let raw: RawTypeStringConfig = parse_config(config)?;

    let text = raw
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ValidationError::new("config.text", "text must not be empty"))?;

    Ok(TypeStringConfig {
        text,
        typing_speed: duration_or(raw.typing_speed, Duration::millis(50), "config.typingSpeed")?,
        clear_before: raw.clear_before.unwrap_or(false),
        press_enter: raw.press_enter.unwrap_or(false),
    })
}
