//! The flow graph container: nodes, edges, and flow-level metadata.
//!
//! Validation here fails soft: every node-level and edge-level failure
//! is collected into one [`ValidationErrors`] report so a caller can
//! surface all problems at once instead of fix-and-resubmit cycles.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{ParseError, ValidationError, ValidationErrors};
use crate::node::{Node, NodeConfig, NodeKind, NodeMetadata, Position};
use crate::raw::{self, RawEdge, RawFlow, RawNode};

/// Version tag carried in node and flow metadata for forward migration
/// of persisted flows. No migration logic lives here — only the tag.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// A directed reference between two node ids within the same flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: String,
    pub source: Uuid,
    pub target: Uuid,
}

impl Edge {
    /// Paths are relative to the edge object; `known_ids` is the set of
    /// node ids present in the same payload.
    fn from_raw(raw: &RawEdge, known_ids: &HashSet<Uuid>) -> Result<Edge, ValidationError> {
        let id = match &raw.id {
            None => return Err(ValidationError::new("id", "edge id is required")),
            Some(v) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| {
                    ValidationError::new("id", format!("edge id must be a string (got {v})"))
                })?,
        };
        let source = parse_endpoint(raw.source.as_ref(), "source", known_ids)?;
        let target = parse_endpoint(raw.target.as_ref(), "target", known_ids)?;
        Ok(Edge { id, source, target })
    }

    fn to_raw(&self) -> RawEdge {
        RawEdge {
            id: Some(json!(self.id)),
            source: Some(json!(self.source.to_string())),
            target: Some(json!(self.target.to_string())),
        }
    }
}

fn parse_endpoint(
    value: Option<&Value>,
    field: &str,
    known_ids: &HashSet<Uuid>,
) -> Result<Uuid, ValidationError> {
    let value =
        value.ok_or_else(|| ValidationError::new(field, format!("edge {field} is required")))?;
    let s = value.as_str().ok_or_else(|| {
        ValidationError::new(field, format!("edge {field} must be a string (got {value})"))
    })?;
    let id = Uuid::parse_str(s).map_err(|_| {
        ValidationError::new(field, format!("edge {field} must be a valid UUID (got {s:?})"))
    })?;
    if !known_ids.contains(&id) {
        return Err(ValidationError::new(
            field,
            format!("dangling edge reference: {id}"),
        ));
    }
    Ok(id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowMetadata {
    pub version: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl FlowMetadata {
    /// Defaults are applied for absent fields; wrong-typed fields fail
    /// with a `metadata.<field>` path.
    fn from_raw(value: &Value) -> Result<Self, ValidationError> {
        let obj = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(obj) => obj,
            other => {
                return Err(ValidationError::message(format!(
                    "metadata must be an object (got {other})"
                )));
            }
        };
        let now = Utc::now();
        Ok(Self {
            version: raw::optional_string(obj, "version")?
                .unwrap_or_else(|| SCHEMA_VERSION.to_string()),
            created: raw::optional_timestamp(obj, "created")?.unwrap_or(now),
            modified: raw::optional_timestamp(obj, "modified")?.unwrap_or(now),
            name: raw::optional_string(obj, "name")?,
            description: raw::optional_string(obj, "description")?,
        })
    }

    fn to_raw(&self) -> Value {
        let mut value = json!({
            "version": self.version,
            "created": self.created,
            "modified": self.modified,
        });
        if let Some(name) = &self.name {
            value["name"] = json!(name);
        }
        if let Some(description) = &self.description {
            value["description"] = json!(description);
        }
        value
    }
}

impl Default for FlowMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: SCHEMA_VERSION.to_string(),
            created: now,
            modified: now,
            name: None,
            description: None,
        }
    }
}

/// A validated flow: a graph of automation nodes and edges. Pure data —
/// executing it is the engine's job, persisting it is the caller's.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Flow {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: FlowMetadata,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: FlowMetadata {
                name: Some(name.into()),
                ..FlowMetadata::default()
            },
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, config: NodeConfig, position: Position) -> Uuid {
        let id = Uuid::new_v4();
        let label = config.kind().display_name();
        self.nodes.push(Node {
            id,
            position,
            metadata: NodeMetadata::new(label),
            config,
        });
        id
    }

    pub fn add_edge(&mut self, source: Uuid, target: Uuid) {
        self.edges.push(Edge {
            id: Uuid::new_v4().to_string(),
            source,
            target,
        });
    }

    pub fn node(&self, id: Uuid) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind() == NodeKind::Start)
    }

    /// Validate a whole raw payload. All-or-nothing: either every node
    /// and edge validates and a fully typed flow is returned, or the
    /// complete list of failures is.
    pub fn validate(raw: RawFlow) -> Result<Flow, ValidationErrors> {
        let mut errors = Vec::new();

        let metadata = match FlowMetadata::from_raw(&raw.metadata) {
            Ok(metadata) => metadata,
            Err(e) => {
                errors.push(e.at("metadata"));
                FlowMetadata::default()
            }
        };

        // Referential integrity for edges is checked against every id
        // that parses, not only the nodes that fully validate —
        // otherwise one bad config would cascade into spurious
        // dangling-edge errors.
        let known_ids: HashSet<Uuid> = raw
            .nodes
            .iter()
            .filter_map(RawNode::id_str)
            .filter_map(|s| Uuid::parse_str(s).ok())
            .collect();

        let mut nodes = Vec::with_capacity(raw.nodes.len());
        let mut seen = HashSet::new();
        for (i, raw_node) in raw.nodes.iter().enumerate() {
            match Node::from_raw(raw_node) {
                Ok(node) if !seen.insert(node.id) => {
                    errors.push(ValidationError::new(
                        format!("nodes[{i}].id"),
                        format!("duplicate node id: {}", node.id),
                    ));
                }
                Ok(node) => nodes.push(node),
                Err(e) => errors.push(e.at(&format!("nodes[{i}]"))),
            }
        }

        let mut edges = Vec::with_capacity(raw.edges.len());
        for (j, raw_edge) in raw.edges.iter().enumerate() {
            match Edge::from_raw(raw_edge, &known_ids) {
                Ok(edge) => edges.push(edge),
                Err(e) => errors.push(e.at(&format!("edges[{j}]"))),
            }
        }

        if errors.is_empty() {
            Ok(Flow {
                nodes,
                edges,
                metadata,
            })
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Lossless conversion back to the wire shape.
    pub fn to_raw(&self) -> RawFlow {
        RawFlow {
            nodes: self.nodes.iter().map(Node::to_raw).collect(),
            edges: self.edges.iter().map(Edge::to_raw).collect(),
            metadata: self.metadata.to_raw(),
        }
    }

    pub fn from_json(json: &str) -> Result<Flow, ParseError> {
        let raw: RawFlow = serde_json::from_str(json)?;
        Ok(Flow::validate(raw)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_raw())
    }
}
