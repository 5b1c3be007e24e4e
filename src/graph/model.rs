use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// Basic type aliases for clarity
pub type NodeId = String;
pub type EdgeId = String;

// Id prefixes; the numeric suffix comes from IdGenerator.
pub const NODE_PREFIX: &str = "node";
pub const EDGE_PREFIX: &str = "edge";
pub const EDGE_LABEL_PREFIX: &str = "edgeLabel";

/// Fallback box for standard nodes that carry no explicit size.
pub const DEFAULT_NODE_SIZE: Size = Size { width: 200.0, height: 80.0 };
/// Assumed box for edge-label pills; the renderer auto-sizes the real thing.
pub const LABEL_SIZE: Size = Size { width: 60.0, height: 24.0 };

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Position { x, y }
    }

    pub fn midpoint(a: Position, b: Position) -> Position {
        Position { x: (a.x + b.x) * 0.5, y: (a.y + b.y) * 0.5 }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f32,
    pub dy: f32,
}

/// Pan/zoom transform of the canvas, persisted alongside the graph.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
    #[serde(flatten)]
    pub payload: NodePayload,
}

/// Per-kind node payload. The wire tag matches the rendering library's
/// registered node types: "custom" for lineage entities, "edgeLabel" for
/// the derived caption nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NodePayload {
    #[serde(rename = "custom")]
    Standard(StandardPayload),
    #[serde(rename = "edgeLabel")]
    EdgeLabel(EdgeLabelPayload),
}

/// Payload of a lineage entity node. The entity/type/subType vocabulary is
/// owned by the external configuration table; the core stores whatever the
/// creation form produced and does not validate it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardPayload {
    pub label: String,
    #[serde(default)]
    pub entity: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette: Option<String>,
}

impl StandardPayload {
    pub fn new(label: impl Into<String>, entity: impl Into<String>, type_name: impl Into<String>) -> Self {
        StandardPayload {
            label: label.into(),
            entity: entity.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }
}

/// Payload of a derived edge-caption node. `offset` is the only persisted
/// degree of freedom relative to the owning edge's midpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLabelPayload {
    #[serde(default)]
    pub text: String,
    pub edge_id: EdgeId,
    #[serde(default)]
    pub offset: Offset,
    // Transient UI flag: tells the renderer to open the label in edit mode
    // once, right after creation. Consumed via GraphController::take_start_editing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_editing: Option<bool>,
}

impl Node {
    pub fn standard(id: NodeId, position: Position, payload: StandardPayload) -> Self {
        Node { id, position, size: None, selected: false, payload: NodePayload::Standard(payload) }
    }

    pub fn is_label(&self) -> bool {
        matches!(self.payload, NodePayload::EdgeLabel(_))
    }

    pub fn as_label(&self) -> Option<&EdgeLabelPayload> {
        match &self.payload {
            NodePayload::EdgeLabel(p) => Some(p),
            NodePayload::Standard(_) => None,
        }
    }

    pub fn as_label_mut(&mut self) -> Option<&mut EdgeLabelPayload> {
        match &mut self.payload {
            NodePayload::EdgeLabel(p) => Some(p),
            NodePayload::Standard(_) => None,
        }
    }

    pub fn as_standard(&self) -> Option<&StandardPayload> {
        match &self.payload {
            NodePayload::Standard(p) => Some(p),
            NodePayload::EdgeLabel(_) => None,
        }
    }

    /// Effective box, falling back to the per-kind default when unsized.
    pub fn size_or_default(&self) -> Size {
        self.size.unwrap_or(match self.payload {
            NodePayload::Standard(_) => DEFAULT_NODE_SIZE,
            NodePayload::EdgeLabel(_) => LABEL_SIZE,
        })
    }

    /// Center of the node box; stored positions are top-left.
    pub fn center(&self) -> Position {
        let s = self.size_or_default();
        Position { x: self.position.x + s.width * 0.5, y: self.position.y + s.height * 0.5 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
    #[serde(default)]
    pub data: EdgeData,
}

/// Per-prefix monotonic id source. Owned by the controller rather than
/// living in a process-wide counter, so tests and reloads stay deterministic.
#[derive(Clone, Debug, Default)]
pub struct IdGenerator {
    next: HashMap<String, u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator::default()
    }

    /// Continue from `max numeric suffix + 1` of the given ids, so ids issued
    /// after loading a saved document never collide with persisted ones.
    pub fn seeded_from<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut ids_out = IdGenerator::new();
        for id in ids {
            if let Some((prefix, suffix)) = id.rsplit_once('_')
                && let Ok(n) = suffix.parse::<u64>()
            {
                let entry = ids_out.next.entry(prefix.to_string()).or_insert(1);
                *entry = (*entry).max(n + 1);
            }
        }
        ids_out
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        let n = self.next.entry(prefix.to_string()).or_insert(1);
        let id = format!("{}_{}", prefix, n);
        *n += 1;
        id
    }
}
