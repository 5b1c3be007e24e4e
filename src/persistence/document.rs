//! The persisted graph document: the JSON shape shared by the durable
//! autosave, the downloadable export, and the loader.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::model::{Edge, Node, Position, StandardPayload, Viewport};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid document: {0}")]
    Shape(&'static str),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub viewport: Viewport,
}

impl GraphDocument {
    /// Decode a document, rejecting anything without the expected top-level
    /// shape. A rejected document leaves whatever graph is currently loaded
    /// untouched; the error message is meant for the user-facing notice.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let Some(obj) = value.as_object() else {
            return Err(DocumentError::Shape("top level must be an object"));
        };
        if !obj.get("nodes").is_some_and(|v| v.is_array()) {
            return Err(DocumentError::Shape("missing `nodes` array"));
        }
        if !obj.get("edges").is_some_and(|v| v.is_array()) {
            return Err(DocumentError::Shape("missing `edges` array"));
        }
        if !obj.get("viewport").is_some_and(|v| v.is_object()) {
            return Err(DocumentError::Shape("missing `viewport` object"));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// First-run seed: a small demonstration graph instead of an empty
    /// canvas. A UX default, nothing downstream depends on it.
    pub fn demo() -> Self {
        let node = |id: &str, label: &str, entity: &str, ty: &str, sub: Option<&str>, x: f32, y: f32| {
            let mut payload = StandardPayload::new(label, entity, ty);
            payload.sub_type = sub.map(str::to_owned);
            Node::standard(id.to_string(), Position::new(x, y), payload)
        };
        GraphDocument {
            nodes: vec![
                node("node_1", "Orders Table", "Database", "Redshift", Some("Table"), 100.0, 100.0),
                node("node_2", "Orders ETL", "Pipeline", "Airflow", None, 400.0, 100.0),
                node("node_3", "User Data Topic", "Stream", "Kafka", Some("Topic"), 100.0, 300.0),
                node("node_4", "Reporting API", "API", "Generic API", None, 400.0, 300.0),
            ],
            edges: Vec::new(),
            viewport: Viewport::default(),
        }
    }
}
