//! Layered auto-layout for the lineage graph.
//!
//! Pure over its inputs: the caller (the controller) writes the returned
//! positions back into the node collection. Edge-label nodes are never laid
//! out here; the synchronizer re-anchors them afterwards.

mod layered;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::model::{Edge, Node, NodeId, Position};

/// Flow direction of the layered layout.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    LR,
    RL,
    TB,
    BT,
}

impl Direction {
    /// True when ranks advance along the x axis.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LR | Direction::RL)
    }

    /// True when ranks advance against the axis (right-to-left, bottom-to-top).
    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::RL | Direction::BT)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    pub direction: Direction,
    /// Gap between consecutive ranks along the flow axis.
    pub rank_spacing: f32,
    /// Gap between neighbors within one rank.
    pub node_spacing: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions { direction: Direction::LR, rank_spacing: 100.0, node_spacing: 70.0 }
    }
}

#[derive(Debug, Error)]
pub(crate) enum LayoutError {
    #[error("node {0} has a non-finite size or position")]
    BadGeometry(NodeId),
    #[error("ranking did not settle after {0} steps")]
    Unsettled(usize),
}

/// Compute new top-left positions for every standard node.
///
/// Total from the caller's perspective: any internal failure is logged and
/// answered with the current positions unchanged, so a corrupt or partial
/// graph can never take the editor down.
pub fn layout(nodes: &[Node], edges: &[Edge], direction: Direction) -> HashMap<NodeId, Position> {
    layout_with(nodes, edges, &LayoutOptions { direction, ..Default::default() })
}

pub fn layout_with(
    nodes: &[Node],
    edges: &[Edge],
    opts: &LayoutOptions,
) -> HashMap<NodeId, Position> {
    match layered::solve(nodes, edges, opts) {
        Ok(positions) => positions,
        Err(err) => {
            log::warn!("auto-layout failed ({err}); keeping current positions");
            nodes
                .iter()
                .filter(|n| !n.is_label())
                .map(|n| (n.id.clone(), n.position))
                .collect()
        }
    }
}
