//! Relationships between detected FSMs: pipeline merging and coupled
//! grouping.
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::fsm::FsmResult;
use crate::identify::with_worker_pool;
use stator_graph::{EdgeKind, Graph, NodeIx};

/// Whether `b` is a re-timed copy of `a`: a non-control chain from `a` that
/// ends with a non-blocking edge directly into `b`, with nothing but
/// single-driver assignments and named signals in between.
fn is_pipelined(g: &Graph, a: NodeIx, b: NodeIx) -> bool {
    if a == b {
        return false;
    }
    for (_, src, kind) in g.edges_in(b) {
        if kind != EdgeKind::NonBlocking {
            continue;
        }
        let source = g.node(src);
        if !source.is_assign() || source.is_control() {
            continue;
        }
        let direct = g
            .edges_in(src)
            .filter(|(_, _, k)| k.is_assign())
            .count();
        if direct != 1 {
            continue;
        }
        if g.in_direct_assign_chain(a, src) {
            return true;
        }
    }
    false
}

/// Collapse pipelined FSM groups onto their head. The head (the register no
/// other group member re-times into) absorbs every child's transition arcs;
/// the children disappear from the FSM list.
pub fn merge_pipelined_fsms(
    g: &Graph,
    fsms: Vec<FsmResult>,
) -> Vec<FsmResult> {
    let n = fsms.len();
    if n < 2 {
        return fsms;
    }
    let mut union: UnionFind<usize> = UnionFind::new(n);
    let mut feeds: Vec<(usize, usize)> = vec![];
    for i in 0..n {
        for j in 0..n {
            if i != j && is_pipelined(g, fsms[i].node(), fsms[j].node()) {
                feeds.push((i, j));
                union.union(i, j);
            }
        }
    }
    if feeds.is_empty() {
        return fsms;
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        groups.entry(union.find(i)).or_default().push(i);
    }

    let mut result = vec![];
    for members in groups.values() {
        if members.len() == 1 {
            result.push(fsms[members[0]].clone());
            continue;
        }
        let head = members
            .iter()
            .copied()
            .find(|&i| !feeds.iter().any(|&(_, to)| to == i))
            .unwrap_or(members[0]);
        let mut survivor = fsms[head].clone();
        for &m in members {
            if m != head {
                survivor.absorb_arcs(g, fsms[m].syntax_arc());
            }
        }
        result.push(survivor);
    }
    result.sort_by_key(|f| g.handle_name(f.node()));
    result
}

/// Group mutually related FSMs: `(A, B)` are coupled when `B`'s state
/// register is reachable from `A`'s. Fast mode uses plain reachability;
/// slow mode (`-c`) demands a control node on the path, which prunes
/// couplings that are mere data plumbing. Every pair is tested on the
/// worker pool.
pub fn group_fsms(
    g: &Graph,
    fsms: &[FsmResult],
    slow: bool,
) -> Vec<(NodeIx, Vec<NodeIx>)> {
    let mut pairs = vec![];
    for i in 0..fsms.len() {
        for j in 0..fsms.len() {
            if i != j {
                pairs.push((i, j));
            }
        }
    }
    let coupled: Vec<bool> = with_worker_pool(|| {
        pairs
            .par_iter()
            .map(|&(i, j)| {
                let a = fsms[i].node();
                let b = fsms[j].node();
                if slow {
                    g.reachable_control_loop(a, b)
                } else {
                    g.reachable(a, b)
                }
            })
            .collect()
    });

    let mut result = vec![];
    for i in 0..fsms.len() {
        let mut linked: Vec<NodeIx> = pairs
            .iter()
            .zip(&coupled)
            .filter(|(&(from, _), &c)| c && from == i)
            .map(|(&(_, to), _)| fsms[to].node())
            .collect();
        linked.sort_by_key(|&n| g.handle_name(n));
        if !linked.is_empty() {
            result.push((fsms[i].node(), linked));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::constant_source;
    use stator_graph::{EdgeKind, Graph, NodeIx, NodeKind};

    // state with two constant drivers plus a re-timed copy `shadow <= state`
    fn pipelined_pair() -> (Graph, NodeIx, NodeIx) {
        let mut g = Graph::new();
        let m = g.add_node(1, "mod", NodeKind::MODULE, None);
        let state = g.add_node(2, "state", NodeKind::VARIABLE, Some(m));
        let shadow = g.add_node(3, "shadow", NodeKind::VARIABLE, Some(m));
        let c0 = g.add_node(4, "", NodeKind::CONSTANT, None);
        let c1 = g.add_node(5, "", NodeKind::CONSTANT, None);
        g.node_mut(c1).value = 1;
        let ctrl = g.add_node(6, "", NodeKind::CONTROL, Some(m));

        let a0 = g.add_node(10, "", NodeKind::ASSIGN, None);
        g.node_mut(a0).parent = Some(ctrl);
        g.add_edge(c0, a0, EdgeKind::Blocking);
        g.add_edge(ctrl, a0, EdgeKind::Control);
        g.add_edge(a0, state, EdgeKind::NonBlocking);
        let a1 = g.add_node(11, "", NodeKind::ASSIGN, None);
        g.node_mut(a1).parent = Some(ctrl);
        g.add_edge(c1, a1, EdgeKind::Blocking);
        g.add_edge(ctrl, a1, EdgeKind::Control);
        g.add_edge(a1, state, EdgeKind::NonBlocking);

        let retime = g.add_node(12, "", NodeKind::ASSIGN, None);
        g.add_edge(state, retime, EdgeKind::Blocking);
        g.add_edge(retime, shadow, EdgeKind::NonBlocking);

        (g, state, shadow)
    }

    #[test]
    fn pipelined_fsms_collapse_onto_the_head() {
        let (g, state, shadow) = pipelined_pair();
        let head =
            FsmResult::new(&g, state, constant_source(&g, state).unwrap());
        let child =
            FsmResult::new(&g, shadow, constant_source(&g, shadow).unwrap());
        assert!(is_pipelined(&g, state, shadow));
        assert!(!is_pipelined(&g, shadow, state));

        let merged = merge_pipelined_fsms(&g, vec![head, child]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].node(), state);
    }

    #[test]
    fn merged_head_absorbs_child_arcs() {
        let (g, state, shadow) = pipelined_pair();
        let mut head =
            FsmResult::new(&g, state, constant_source(&g, state).unwrap());
        let mut child =
            FsmResult::new(&g, shadow, constant_source(&g, shadow).unwrap());
        head.compute_arcs(&g);
        child.compute_arcs(&g);
        let child_arc_count = child.syntax_arc().len();
        let merged = merge_pipelined_fsms(&g, vec![head, child]);
        assert!(merged[0].syntax_arc().len() >= child_arc_count);
    }

    #[test]
    fn grouping_reports_directed_couplings_once() {
        let (g, state, shadow) = pipelined_pair();
        let a = FsmResult::new(&g, state, constant_source(&g, state).unwrap());
        let b =
            FsmResult::new(&g, shadow, constant_source(&g, shadow).unwrap());
        let groups = group_fsms(&g, &[a, b], false);
        // state reaches shadow, shadow never reaches back
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, state);
        assert_eq!(groups[0].1, vec![shadow]);

        // the re-timing chain has no control node on it
        let (g, state, shadow) = pipelined_pair();
        let a = FsmResult::new(&g, state, constant_source(&g, state).unwrap());
        let b =
            FsmResult::new(&g, shadow, constant_source(&g, shadow).unwrap());
        let groups = group_fsms(&g, &[a, b], true);
        assert!(groups.is_empty());
    }
}
