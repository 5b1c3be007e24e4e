//! Graph-state, layout, and persistence core for an interactive data-lineage
//! diagram editor.
//!
//! The embedding shell (canvas, side panel, forms, exporters) feeds user
//! gestures into [`graph::controller::GraphController`] as
//! [`graph::controller::GraphChange`] batches and reads the canonical
//! node/edge arrays back for rendering. Everything visual is the shell's
//! problem; this crate owns the invariants: unique ids, no dangling edges,
//! one label per edge, node/edge selection exclusivity, and labels anchored
//! to their edge midpoints.

pub mod graph;
pub mod layout;
pub mod persistence;
