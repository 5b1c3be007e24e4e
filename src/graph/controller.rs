//! Selection & interaction controller: single owner of the canonical
//! node/edge arrays. Canvas callbacks are funneled in as [`GraphChange`]
//! batches so none of the rendering library's shapes leak into the core.

use std::collections::HashSet;

use crate::graph::labels;
use crate::graph::model::{
    Edge, EdgeData, EdgeId, IdGenerator, Node, NodeId, Position, StandardPayload, Viewport,
    EDGE_PREFIX, NODE_PREFIX,
};
use crate::layout::{self, Direction, LayoutOptions};
use crate::persistence::document::GraphDocument;

/// Pasted nodes land this far from the copied originals on both axes.
pub const PASTE_OFFSET: f32 = 20.0;

/// One delta from the interactive canvas. Batches of these arrive at
/// [`GraphController::apply_changes`].
#[derive(Clone, Debug, PartialEq)]
pub enum GraphChange {
    AddNode(Node),
    MoveNode { id: NodeId, position: Position },
    RemoveNode { id: NodeId },
    RemoveEdge { id: EdgeId },
    SelectNodes { ids: Vec<NodeId> },
    /// The canvas may report several edges; only the first existing one
    /// becomes the active selection.
    SelectEdges { ids: Vec<EdgeId> },
    ClearSelection,
    Connect { source: NodeId, target: NodeId },
}

#[derive(Clone, Debug)]
struct DragState {
    id: NodeId,
    origin: Position,
}

pub struct GraphController {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    viewport: Viewport,
    ids: IdGenerator,
    clipboard: Vec<Node>,
    drag: Option<DragState>,
    dirty: bool,
}

impl Default for GraphController {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphController {
    pub fn new() -> Self {
        GraphController {
            nodes: Vec::new(),
            edges: Vec::new(),
            viewport: Viewport::default(),
            ids: IdGenerator::new(),
            clipboard: Vec::new(),
            drag: None,
            dirty: false,
        }
    }

    /// Adopt a loaded document wholesale. The id generator continues from the
    /// highest persisted suffix so fresh ids never collide with loaded ones.
    pub fn from_document(doc: GraphDocument) -> Self {
        let ids = IdGenerator::seeded_from(
            doc.nodes
                .iter()
                .map(|n| n.id.as_str())
                .chain(doc.edges.iter().map(|e| e.id.as_str())),
        );
        GraphController {
            nodes: doc.nodes,
            edges: doc.edges,
            viewport: doc.viewport,
            ids,
            clipboard: Vec::new(),
            drag: None,
            dirty: false,
        }
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            viewport: self.viewport,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.mark_dirty();
    }

    pub fn selected_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.selected).collect()
    }

    /// The active selected edge, if any (at most one at a time).
    pub fn selected_edge(&self) -> Option<&Edge> {
        self.edges.iter().find(|e| e.selected)
    }

    /// Whether anything changed since the last `take_dirty`; the embedding
    /// shell drives the debounced autosave off this.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn drag_skip(&self) -> Option<&str> {
        self.drag.as_ref().map(|d| d.id.as_str())
    }

    /// Apply a batch of canvas deltas. The batch is staged on copies and
    /// swapped in at the end, so no reader ever sees it half-applied.
    /// Items referencing unknown ids are dropped individually; stale
    /// callbacks from the canvas must never abort the rest of a batch.
    pub fn apply_changes(&mut self, changes: Vec<GraphChange>) {
        if changes.is_empty() {
            return;
        }
        let mut nodes = self.nodes.clone();
        let mut edges = self.edges.clone();
        let mut ids = self.ids.clone();
        let mut changed = false;

        for change in changes {
            match change {
                GraphChange::AddNode(node) => {
                    if nodes.iter().any(|n| n.id == node.id) {
                        log::debug!("dropping add for duplicate node id {}", node.id);
                    } else {
                        nodes.push(node);
                        changed = true;
                    }
                }
                GraphChange::MoveNode { id, position } => {
                    if let Some(node) = nodes.iter_mut().find(|n| n.id == id) {
                        node.position = position;
                        changed = true;
                    } else {
                        log::debug!("dropping move for unknown node {id}");
                    }
                }
                GraphChange::RemoveNode { id } => {
                    if nodes.iter().any(|n| n.id == id) {
                        remove_nodes_cascade(&mut nodes, &mut edges, &HashSet::from([id]));
                        changed = true;
                    } else {
                        log::debug!("dropping remove for unknown node {id}");
                    }
                }
                GraphChange::RemoveEdge { id } => {
                    if edges.iter().any(|e| e.id == id) {
                        remove_edges_cascade(&mut nodes, &mut edges, &HashSet::from([id]));
                        changed = true;
                    } else {
                        log::debug!("dropping remove for unknown edge {id}");
                    }
                }
                GraphChange::SelectNodes { ids: wanted } => {
                    changed |= select_nodes_in(&mut nodes, &mut edges, &wanted);
                }
                GraphChange::SelectEdges { ids: wanted } => {
                    changed |= select_edge_in(&mut nodes, &mut edges, &wanted);
                }
                GraphChange::ClearSelection => {
                    for n in &mut nodes {
                        n.selected = false;
                    }
                    for e in &mut edges {
                        e.selected = false;
                    }
                    changed = true;
                }
                GraphChange::Connect { source, target } => {
                    changed |= connect_in(&mut nodes, &mut edges, &mut ids, source, target).is_some();
                }
            }
        }

        self.nodes = nodes;
        self.edges = edges;
        self.ids = ids;
        // Reconcile only after the batch is committed; a label must never
        // read a half-updated endpoint.
        let skip = self.drag_skip().map(str::to_owned);
        labels::reconcile(&mut self.nodes, &self.edges, skip.as_deref());
        if changed {
            self.mark_dirty();
        }
    }

    /// Create a node from the creation form's payload.
    pub fn add_node(&mut self, payload: StandardPayload, position: Position) -> NodeId {
        let id = self.ids.next_id(NODE_PREFIX);
        self.nodes.push(Node::standard(id.clone(), position, payload));
        self.mark_dirty();
        id
    }

    /// Connect two existing, distinct nodes. Parallel duplicates between the
    /// same ordered pair are allowed on purpose: one pair of entities can
    /// carry several distinct relationships.
    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Option<EdgeId> {
        let id = connect_in(
            &mut self.nodes,
            &mut self.edges,
            &mut self.ids,
            source.into(),
            target.into(),
        )?;
        self.mark_dirty();
        Some(id)
    }

    /// Remove every selected node and edge, cascading so no edge references
    /// a removed node and no label references a removed edge. Selection is
    /// cleared afterwards.
    pub fn delete_selected(&mut self) {
        let doomed_nodes: HashSet<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.selected)
            .map(|n| n.id.clone())
            .collect();
        let doomed_edges: HashSet<EdgeId> = self
            .edges
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.id.clone())
            .collect();
        if doomed_nodes.is_empty() && doomed_edges.is_empty() {
            return;
        }
        remove_nodes_cascade(&mut self.nodes, &mut self.edges, &doomed_nodes);
        remove_edges_cascade(&mut self.nodes, &mut self.edges, &doomed_edges);
        self.clear_selection();
        let skip = self.drag_skip().map(str::to_owned);
        labels::reconcile(&mut self.nodes, &self.edges, skip.as_deref());
        self.mark_dirty();
    }

    pub fn clear_selection(&mut self) {
        for n in &mut self.nodes {
            n.selected = false;
        }
        for e in &mut self.edges {
            e.selected = false;
        }
    }

    /// Snapshot the selected standard nodes. Edge-label nodes are never
    /// copied; they only exist attached to an edge.
    pub fn copy_selected(&mut self) {
        self.clipboard = self
            .nodes
            .iter()
            .filter(|n| n.selected && !n.is_label())
            .cloned()
            .collect();
    }

    /// Paste the clipboard with fresh ids, offset so pasted nodes never sit
    /// exactly on the originals; the clipboard advances after each paste so
    /// repeated pastes cascade. Pasted nodes come in unselected. Returns the
    /// inserted ids; empty clipboard is a no-op.
    pub fn paste(&mut self) -> Vec<NodeId> {
        if self.clipboard.is_empty() {
            return Vec::new();
        }
        let mut inserted = Vec::with_capacity(self.clipboard.len());
        for snapshot in &mut self.clipboard {
            snapshot.position.x += PASTE_OFFSET;
            snapshot.position.y += PASTE_OFFSET;
            let mut node = snapshot.clone();
            node.id = self.ids.next_id(NODE_PREFIX);
            node.selected = false;
            inserted.push(node.id.clone());
            self.nodes.push(node);
        }
        self.mark_dirty();
        inserted
    }

    /// Attach a caption node to an edge (double-click on the edge). No-op if
    /// the edge is unknown or already labeled.
    pub fn add_edge_label(&mut self, edge_id: &str) -> Option<NodeId> {
        let edge = self.edges.iter().find(|e| e.id == edge_id)?.clone();
        let label = labels::create_label(&self.nodes, &edge, &mut self.ids)?;
        let id = label.id.clone();
        self.nodes.push(label);
        self.mark_dirty();
        Some(id)
    }

    /// Consume the one-shot "open in edit mode" flag of a freshly created
    /// label. True exactly once per creation.
    pub fn take_start_editing(&mut self, label_id: &str) -> bool {
        if let Some(payload) = self
            .nodes
            .iter_mut()
            .find(|n| n.id == label_id)
            .and_then(Node::as_label_mut)
            && payload.start_editing.take() == Some(true)
        {
            self.mark_dirty();
            return true;
        }
        false
    }

    pub fn set_label_text(&mut self, label_id: &str, text: impl Into<String>) -> bool {
        if let Some(payload) = self
            .nodes
            .iter_mut()
            .find(|n| n.id == label_id)
            .and_then(Node::as_label_mut)
        {
            payload.text = text.into();
            self.mark_dirty();
            true
        } else {
            false
        }
    }

    /// Replace a standard node's payload (detail-panel form submit).
    pub fn update_node_payload(&mut self, id: &str, payload: StandardPayload) -> bool {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id && !n.is_label()) {
            node.payload = crate::graph::model::NodePayload::Standard(payload);
            self.mark_dirty();
            true
        } else {
            false
        }
    }

    pub fn set_edge_details(&mut self, edge_id: &str, details: impl Into<String>) -> bool {
        if let Some(edge) = self.edges.iter_mut().find(|e| e.id == edge_id) {
            edge.data.details = Some(details.into());
            self.mark_dirty();
            true
        } else {
            false
        }
    }

    /// Start a drag gesture, snapshotting the origin so an aborted gesture
    /// can be rolled back without committing anything.
    pub fn begin_drag(&mut self, id: &str) -> bool {
        match self.nodes.iter().find(|n| n.id == id) {
            Some(node) => {
                self.drag = Some(DragState { id: node.id.clone(), origin: node.position });
                true
            }
            None => false,
        }
    }

    /// Abort the active drag: the dragged node snaps back to its origin and
    /// the canonical arrays end up as if the gesture never happened.
    pub fn cancel_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            if let Some(node) = self.nodes.iter_mut().find(|n| n.id == drag.id) {
                node.position = drag.origin;
            }
            labels::reconcile(&mut self.nodes, &self.edges, None);
        }
    }

    /// Commit the active drag. Dropping an edge label persists its offset
    /// from the edge midpoint, so reconcile keeps the chosen placement as
    /// the endpoints keep moving.
    pub fn end_drag(&mut self) {
        let Some(drag) = self.drag.take() else { return };
        if let Some(idx) = self.nodes.iter().position(|n| n.id == drag.id)
            && self.nodes[idx].is_label()
        {
            let offset = labels::offset_after_drag(&self.nodes[idx], &self.nodes, &self.edges);
            if let Some(offset) = offset
                && let Some(payload) = self.nodes[idx].as_label_mut()
            {
                payload.offset = offset;
            }
        }
        labels::reconcile(&mut self.nodes, &self.edges, None);
        self.mark_dirty();
    }

    /// Bulk-reposition all standard nodes with the layered layout, then
    /// re-anchor the labels. Edges and node content are untouched.
    pub fn auto_layout(&mut self, direction: Direction) {
        self.auto_layout_with(&LayoutOptions { direction, ..Default::default() });
    }

    pub fn auto_layout_with(&mut self, opts: &LayoutOptions) {
        let positions = layout::layout_with(&self.nodes, &self.edges, opts);
        for node in &mut self.nodes {
            if let Some(position) = positions.get(&node.id) {
                node.position = *position;
            }
        }
        labels::reconcile(&mut self.nodes, &self.edges, None);
        self.mark_dirty();
    }
}

fn remove_nodes_cascade(nodes: &mut Vec<Node>, edges: &mut Vec<Edge>, doomed: &HashSet<NodeId>) {
    if doomed.is_empty() {
        return;
    }
    nodes.retain(|n| !doomed.contains(&n.id));
    let dangling: HashSet<EdgeId> = edges
        .iter()
        .filter(|e| doomed.contains(&e.source) || doomed.contains(&e.target))
        .map(|e| e.id.clone())
        .collect();
    remove_edges_cascade(nodes, edges, &dangling);
}

fn remove_edges_cascade(nodes: &mut Vec<Node>, edges: &mut Vec<Edge>, doomed: &HashSet<EdgeId>) {
    if doomed.is_empty() {
        return;
    }
    edges.retain(|e| !doomed.contains(&e.id));
    // Labels of removed edges go with them.
    nodes.retain(|n| n.as_label().is_none_or(|p| !doomed.contains(&p.edge_id)));
}

// Mark the requested (known) nodes selected, everything else deselected.
// Node selection and edge selection are mutually exclusive.
fn select_nodes_in(nodes: &mut [Node], edges: &mut [Edge], wanted: &[NodeId]) -> bool {
    let known: HashSet<&str> = wanted
        .iter()
        .map(String::as_str)
        .filter(|id| nodes.iter().any(|n| n.id == *id))
        .collect();
    if known.is_empty() {
        log::debug!("dropping node selection with no known ids");
        return false;
    }
    for n in nodes.iter_mut() {
        n.selected = known.contains(n.id.as_str());
    }
    for e in edges.iter_mut() {
        e.selected = false;
    }
    true
}

fn select_edge_in(nodes: &mut [Node], edges: &mut [Edge], wanted: &[EdgeId]) -> bool {
    let Some(active) = wanted
        .iter()
        .find(|id| edges.iter().any(|e| e.id == **id))
        .cloned()
    else {
        log::debug!("dropping edge selection with no known ids");
        return false;
    };
    for e in edges.iter_mut() {
        e.selected = e.id == active;
    }
    for n in nodes.iter_mut() {
        n.selected = false;
    }
    true
}

fn connect_in(
    nodes: &mut [Node],
    edges: &mut Vec<Edge>,
    ids: &mut IdGenerator,
    source: NodeId,
    target: NodeId,
) -> Option<EdgeId> {
    if source == target {
        return None;
    }
    let both_exist = nodes.iter().any(|n| n.id == source) && nodes.iter().any(|n| n.id == target);
    if !both_exist {
        log::debug!("dropping connect {source} -> {target}: missing endpoint");
        return None;
    }
    let id = ids.next_id(EDGE_PREFIX);
    edges.push(Edge {
        id: id.clone(),
        source,
        target,
        selected: false,
        data: EdgeData { details: Some(String::new()) },
    });
    Some(id)
}
