//! Register identification and constant-driver analysis.
use ahash::AHashSet;
use std::collections::VecDeque;

use stator_graph::{EdgeIx, EdgeKind, Graph, NetOp, NodeIx, NodeKind};

/// Promote every named storage signal to `REGISTER`. A signal qualifies iff
/// it is a declared net or variable, something drives it, and no driver is a
/// blocking assignment (combinational nets are written with blocking
/// assigns).
pub fn identify_registers(g: &mut Graph) {
    let nodes: Vec<NodeIx> = g.nodes().collect();
    for n in nodes {
        let node = g.node(n);
        if !node.is_named() {
            continue;
        }
        let base = node.kind & !NodeKind::REGISTER;
        if base != NodeKind::NET && base != NodeKind::VARIABLE {
            continue;
        }
        let mut has_fan_in = false;
        let mut has_blocking = false;
        for (_, src, kind) in g.edges_in(n) {
            has_fan_in = true;
            if kind == EdgeKind::Blocking && g.node(src).is_assign() {
                has_blocking = true;
                break;
            }
        }
        if has_fan_in && !has_blocking {
            g.node_mut(n).kind |= NodeKind::REGISTER;
        }
    }
}

/// All registers, in arena order.
pub fn registers(g: &Graph) -> Vec<NodeIx> {
    g.nodes().filter(|&n| g.node(n).is_register()).collect()
}

/// Whether every data source transitively driving `n` is an integer
/// constant.
pub fn constant_driver(g: &Graph, n: NodeIx) -> bool {
    constant_source(g, n).is_some()
}

/// The set of constant sources reaching `n`, as the edges from each constant
/// into its immediate consumer, or `None` when a non-constant source exists.
///
/// The walk follows fan-in through assignments and named signals, skipping
/// slice edges and permitting (without recursing into) control gating. A
/// self-loop on `n` is fine: a register's next-state expression usually
/// reads the register itself.
pub fn constant_source(g: &Graph, n: NodeIx) -> Option<Vec<EdgeIx>> {
    // pure gating without any data source is not a constant driver
    let mut has_data_source = false;
    for (_, src, _) in g.edges_in(n) {
        if !g.node(src).is_control() {
            has_data_source = true;
        }
    }
    if !has_data_source {
        return None;
    }

    let mut result = vec![];
    let mut visited = AHashSet::new();
    visited.insert(n);
    let mut queue: VecDeque<NodeIx> = VecDeque::new();
    queue.push_back(n);

    while let Some(cur) = queue.pop_front() {
        if cur != n && g.fan_in_count(cur) == 0 {
            // an undriven signal on the path is a free input
            return None;
        }
        for (edge, src, kind) in g.edges_in(cur) {
            if kind == EdgeKind::Slice {
                continue;
            }
            if src == n {
                continue;
            }
            let source = g.node(src);
            if source.is_const() {
                result.push(edge);
                continue;
            }
            if source.is_assign() {
                // includes the ternary's control-assign node
                if visited.insert(src) {
                    queue.push_back(src);
                }
                continue;
            }
            if source.is_control() {
                // control edges into assigns gate the value but don't
                // contribute data
                continue;
            }
            if source.kind.contains(NodeKind::VARIABLE) {
                if visited.insert(src) {
                    queue.push_back(src);
                }
                continue;
            }
            if source.kind.contains(NodeKind::NET) {
                // a bare expression net is only followed when it is a simple
                // arithmetic shape (`+ 1` style) or a declared wire
                let simple = source.op != NetOp::Ignore
                    && g.fan_in_count(src) <= 2;
                if simple || source.is_named() {
                    if visited.insert(src) {
                        queue.push_back(src);
                    }
                    continue;
                }
                return None;
            }
            // modules and anything else end the analysis
            return None;
        }
    }
    Some(result)
}
