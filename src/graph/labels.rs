//! Edge-label synchronizer: keeps each `edgeLabel` node anchored to the
//! midpoint of the edge it annotates, plus a user-adjustable offset.

use super::model::{
    Edge, EdgeLabelPayload, IdGenerator, Node, NodePayload, Offset, Position, EDGE_LABEL_PREFIX,
    LABEL_SIZE,
};

/// Positions closer than this (per axis) are left untouched by reconcile.
pub const POSITION_TOLERANCE: f32 = 0.1;

fn find_node<'a>(nodes: &'a [Node], id: &str) -> Option<&'a Node> {
    nodes.iter().find(|n| n.id == id)
}

/// The label node attached to `edge_id`, if one exists.
pub fn find_label<'a>(nodes: &'a [Node], edge_id: &str) -> Option<&'a Node> {
    nodes
        .iter()
        .find(|n| n.as_label().is_some_and(|p| p.edge_id == edge_id))
}

// Midpoint of the edge's endpoint centers. None when an endpoint is gone;
// cascade delete handles that case, reconcile just leaves the label alone.
fn edge_midpoint(nodes: &[Node], edge: &Edge) -> Option<Position> {
    let source = find_node(nodes, &edge.source)?;
    let target = find_node(nodes, &edge.target)?;
    Some(Position::midpoint(source.center(), target.center()))
}

fn anchored_position(midpoint: Position, offset: Offset) -> Position {
    Position {
        x: midpoint.x + offset.dx - LABEL_SIZE.width * 0.5,
        y: midpoint.y + offset.dy - LABEL_SIZE.height * 0.5,
    }
}

/// Build a new label node for `edge`, opened in edit mode. Returns `None`
/// when the edge already carries a label (at most one per edge).
pub fn create_label(nodes: &[Node], edge: &Edge, ids: &mut IdGenerator) -> Option<Node> {
    if find_label(nodes, &edge.id).is_some() {
        return None;
    }
    let midpoint = edge_midpoint(nodes, edge)?;
    Some(Node {
        id: ids.next_id(EDGE_LABEL_PREFIX),
        position: anchored_position(midpoint, Offset::default()),
        size: None,
        selected: false,
        payload: NodePayload::EdgeLabel(EdgeLabelPayload {
            text: String::new(),
            edge_id: edge.id.clone(),
            offset: Offset::default(),
            start_editing: Some(true),
        }),
    })
}

/// Re-derive every label position from its edge's current midpoint. Runs
/// after each committed change to positions or the edge set; `skip` names
/// the node currently mid-drag, which must not be snapped back. Returns
/// whether any label moved.
pub fn reconcile(nodes: &mut [Node], edges: &[Edge], skip: Option<&str>) -> bool {
    // Fast path: most graphs carry no labels at all.
    if !nodes.iter().any(Node::is_label) {
        return false;
    }

    // Compute targets against a settled snapshot, then write back, so a
    // label never reads a half-updated endpoint.
    let mut targets: Vec<(usize, Position)> = Vec::new();
    for (idx, node) in nodes.iter().enumerate() {
        let Some(payload) = node.as_label() else { continue };
        if skip == Some(node.id.as_str()) {
            continue;
        }
        let Some(edge) = edges.iter().find(|e| e.id == payload.edge_id) else {
            continue;
        };
        let Some(midpoint) = edge_midpoint(nodes, edge) else {
            continue;
        };
        let want = anchored_position(midpoint, payload.offset);
        if (want.x - node.position.x).abs() > POSITION_TOLERANCE
            || (want.y - node.position.y).abs() > POSITION_TOLERANCE
        {
            targets.push((idx, want));
        }
    }

    let moved = !targets.is_empty();
    for (idx, position) in targets {
        nodes[idx].position = position;
    }
    moved
}

/// Offset to persist after the user finished dragging `label`, so future
/// reconciles keep the chosen placement relative to the edge midpoint.
pub fn offset_after_drag(label: &Node, nodes: &[Node], edges: &[Edge]) -> Option<Offset> {
    let payload = label.as_label()?;
    let edge = edges.iter().find(|e| e.id == payload.edge_id)?;
    let midpoint = edge_midpoint(nodes, edge)?;
    Some(Offset {
        dx: label.position.x + LABEL_SIZE.width * 0.5 - midpoint.x,
        dy: label.position.y + LABEL_SIZE.height * 0.5 - midpoint.y,
    })
}
