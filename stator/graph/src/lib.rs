//! Typed design graph for the stator analyzer.
//!
//! The graph is produced by lowering an elaborated SystemVerilog AST and is
//! the substrate every later analysis runs on: nodes are signals, constants,
//! operators, control points, assignments, and module instances; edges carry
//! the assignment/control relationship between them.
mod graph;
mod node;
mod query;

pub use graph::Graph;
pub use node::{
    EdgeIx, EdgeKind, EventEdge, ModuleDef, NetOp, Node, NodeIx, NodeKind,
    PortDir,
};
