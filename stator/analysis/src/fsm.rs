//! A detected FSM and the syntactic reasoning layered on top of it.
use ahash::AHashSet;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use stator_graph::{EdgeIx, EdgeKind, Graph, NetOp, NodeIx, NodeKind};

/// One detected state register: the node, the constant sources driving it,
/// and the counter/explicit classification. Transition arcs are filled in by
/// the extraction phase ([`crate::extract_arcs`]).
#[derive(Debug, Clone)]
pub struct FsmResult {
    node: NodeIx,
    const_src: Vec<EdgeIx>,
    is_counter: bool,
    arcs: Vec<(NodeIx, NodeIx)>,
}

impl FsmResult {
    pub fn new(g: &Graph, node: NodeIx, const_src: Vec<EdgeIx>) -> Self {
        let is_counter = classify_counter(g, node, &const_src);
        FsmResult {
            node,
            const_src,
            is_counter,
            arcs: vec![],
        }
    }

    pub fn node(&self) -> NodeIx {
        self.node
    }

    pub fn const_src(&self) -> &[EdgeIx] {
        &self.const_src
    }

    pub fn is_counter(&self) -> bool {
        self.is_counter
    }

    /// The transition arcs found by [`FsmResult::compute_arcs`], as
    /// `(from_state, to_state)` constant-node pairs.
    pub fn syntax_arc(&self) -> &[(NodeIx, NodeIx)] {
        &self.arcs
    }

    /// The unique states of this FSM: constant sources deduplicated by
    /// value (named enumerators win over bare literals), ordered by value.
    pub fn unique_states(&self, g: &Graph) -> Vec<NodeIx> {
        let mut by_value: BTreeMap<i64, NodeIx> = BTreeMap::new();
        for &edge in &self.const_src {
            let (c, _) = g.endpoints(edge);
            by_value
                .entry(g.node(c).value)
                .and_modify(|existing| {
                    if !g.node(*existing).is_named() && g.node(c).is_named()
                    {
                        *existing = c;
                    }
                })
                .or_insert(c);
        }
        by_value.into_values().collect()
    }

    /// Constants the design compares the state register against, ordered by
    /// value. For counters these are the only values worth covering.
    pub fn comp_const(&self, g: &Graph) -> Vec<NodeIx> {
        let mut by_value: BTreeMap<i64, NodeIx> = BTreeMap::new();
        for edge in self.find_comparisons(g) {
            let (_, eq) = g.endpoints(edge);
            if let Some(c) = const_from_comp(g, eq) {
                by_value.entry(g.node(c).value).or_insert(c);
            }
        }
        by_value.into_values().collect()
    }

    /// Extract the syntactically provable `(from, to)` transitions: for
    /// every comparison of the register against a constant, the constants
    /// assigned to the register inside the scope that comparison gates.
    /// Counters never get arcs.
    pub fn compute_arcs(&mut self, g: &Graph) {
        self.arcs.clear();
        if self.is_counter {
            return;
        }
        let mut seen: BTreeSet<(i64, i64)> = BTreeSet::new();
        let mut arcs = vec![];

        for comp_edge in self.find_comparisons(g) {
            let (_, eq) = g.endpoints(comp_edge);
            let Some(from_const) = const_from_comp(g, eq) else {
                continue;
            };
            for gate in gates_of(g, eq) {
                let false_succ = g
                    .edges_out(gate)
                    .find(|(_, _, k)| *k == EdgeKind::False)
                    .map(|(_, t, _)| t);
                for &src_edge in &self.const_src {
                    let (to_const, consumer) = g.endpoints(src_edge);
                    // arcs only come from plain guarded assignments; a
                    // constant feeding an expression first is abandoned
                    if !g.node(consumer).is_assign() {
                        continue;
                    }
                    if !g.child_of(consumer, gate) {
                        continue;
                    }
                    if let Some(f) = false_succ {
                        if g.child_of(consumer, f) {
                            continue;
                        }
                    }
                    let key =
                        (g.node(from_const).value, g.node(to_const).value);
                    if seen.insert(key) {
                        arcs.push((from_const, to_const));
                    }
                }
            }
        }

        arcs.sort_by_key(|&(f, t)| (g.node(f).value, g.node(t).value));
        self.arcs = arcs;
    }

    /// Fold another FSM's arcs into this one (pipeline merging).
    pub(crate) fn absorb_arcs(
        &mut self,
        g: &Graph,
        other: &[(NodeIx, NodeIx)],
    ) {
        let mut seen: BTreeSet<(i64, i64)> = self
            .arcs
            .iter()
            .map(|&(f, t)| (g.node(f).value, g.node(t).value))
            .collect();
        for &(f, t) in other {
            if seen.insert((g.node(f).value, g.node(t).value)) {
                self.arcs.push((f, t));
            }
        }
        self.arcs
            .sort_by_key(|&(f, t)| (g.node(f).value, g.node(t).value));
    }

    /// Arc candidates from plain reachability: a transition `(from, to)` is
    /// plausible when the scope consuming `from` can reach the scope
    /// consuming `to`. Cheap and useful for diagnostics, but unlike
    /// [`FsmResult::syntax_arc`] it overapproximates; nothing downstream
    /// treats these as proven.
    pub fn reachable_arc(&self, g: &Graph) -> Vec<(NodeIx, NodeIx)> {
        // the same constant value can be assigned in several scopes, so
        // keep (constant, consumer) pairs rather than constants alone
        let mut edge_states: BTreeSet<(NodeIx, NodeIx)> = BTreeSet::new();
        for &edge in &self.const_src {
            let (from, to) = g.endpoints(edge);
            edge_states.insert((from, to));
        }

        let mut visited: BTreeSet<(NodeIx, NodeIx)> = BTreeSet::new();
        let mut seen_values: BTreeSet<(i64, i64)> = BTreeSet::new();
        let mut result = vec![];
        for &(from_node, from_next) in &edge_states {
            for &(to_node, to_next) in &edge_states {
                if from_node == to_node {
                    continue;
                }
                if !visited.insert((from_next, to_next)) {
                    continue;
                }
                if g.reachable(from_next, to_next)
                    && seen_values.insert((
                        g.node(from_node).value,
                        g.node(to_node).value,
                    ))
                {
                    result.push((from_node, to_node));
                }
            }
        }
        result
            .sort_by_key(|&(f, t)| (g.node(f).value, g.node(t).value));
        result
    }

    /// Every comparison-against-constant rooted at the state register: an
    /// assign edge into an `Equal` node fed by a constant. The search stops
    /// at multi-input operator nodes so it does not wander into unrelated
    /// expressions.
    fn find_comparisons(&self, g: &Graph) -> Vec<EdgeIx> {
        g.find_connection_cond(
            self.node,
            |e| {
                let (_, dst) = g.endpoints(e);
                g.edge(e).is_assign()
                    && g.node(dst).op == NetOp::Equal
                    && const_from_comp(g, dst).is_some()
            },
            |e| {
                let (_, dst) = g.endpoints(e);
                g.edge(e).is_assign()
                    && g.node(dst).op != NetOp::Ignore
                    && g.fan_in_count(dst) > 1
            },
        )
    }
}

/// Counter diagnosis: some constant source feeds forward, through
/// non-control edges, into an add/subtract (or an anonymous multi-input
/// reshaping net) that the register itself reaches. Increments in the
/// self-loop are what make `q <= q + 1` a counter and not a two-state FSM.
fn classify_counter(g: &Graph, n: NodeIx, const_src: &[EdgeIx]) -> bool {
    for &edge in const_src {
        let (_, consumer) = g.endpoints(edge);
        let mut visited = AHashSet::new();
        visited.insert(consumer);
        let mut queue: VecDeque<NodeIx> = VecDeque::new();
        queue.push_back(consumer);
        while let Some(cur) = queue.pop_front() {
            if cur != n {
                let node = g.node(cur);
                let arithmetic =
                    matches!(node.op, NetOp::Add | NetOp::Subtract);
                // an anonymous multi-input pass-through net (concatenation
                // reshaping the next state) classifies the same way
                let reshaping = node.kind == NodeKind::NET
                    && !node.is_named()
                    && node.op == NetOp::Ignore
                    && g.fan_in_count(cur) > 1;
                if (arithmetic || reshaping) && g.reachable(n, cur) {
                    return true;
                }
            }
            for (_, target, kind) in g.edges_out(cur) {
                if kind.is_control() {
                    continue;
                }
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }
    }
    false
}

/// The constant feeding a comparison node, possibly through a short
/// expression chain (case items join their expressions into one node).
fn const_from_comp(g: &Graph, comp: NodeIx) -> Option<NodeIx> {
    for (_, src, kind) in g.edges_in(comp) {
        if kind == EdgeKind::Slice {
            continue;
        }
        if g.node(src).is_const() {
            return Some(src);
        }
    }
    for (_, src, kind) in g.edges_in(comp) {
        if kind == EdgeKind::Slice {
            continue;
        }
        let node = g.node(src);
        if node.kind == NodeKind::NET && !node.is_named() {
            for (_, inner, inner_kind) in g.edges_in(src) {
                if inner_kind == EdgeKind::Slice {
                    continue;
                }
                if g.node(inner).is_const() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

/// The control nodes gated by a comparison.
///
/// Case statements put the comparison on the control node itself. An `if`
/// feeds the comparison net straight into its control node. Front ends that
/// materialize the comparison into a named boolean wire need an outward
/// search that rides through and/or logic; negations and concat/slice
/// shapes abandon the derivation (no arc, by design).
fn gates_of(g: &Graph, eq: NodeIx) -> Vec<NodeIx> {
    if g.node(eq).is_control() {
        return vec![eq];
    }
    let Some((_, target, _)) =
        g.edges_out(eq).find(|(_, _, k)| k.is_assign())
    else {
        return vec![];
    };
    let node = g.node(target);
    if node.is_control() {
        return vec![target];
    }
    if !node.is_named() {
        return vec![];
    }

    // materialized boolean wire: ride through and/or combinational logic
    let mut gates = vec![];
    let mut visited = AHashSet::new();
    visited.insert(target);
    let mut queue: VecDeque<NodeIx> = VecDeque::new();
    queue.push_back(target);
    while let Some(cur) = queue.pop_front() {
        for (_, next, kind) in g.edges_out(cur) {
            if kind == EdgeKind::Slice || !visited.insert(next) {
                continue;
            }
            let n = g.node(next);
            if n.is_control() {
                if n.parent.is_some() {
                    gates.push(next);
                }
                continue;
            }
            let rides = n.is_assign()
                || n.kind.contains(NodeKind::VARIABLE)
                || matches!(n.op, NetOp::BinaryAnd | NetOp::BinaryOr);
            if rides {
                queue.push_back(next);
            }
        }
    }
    gates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::constant_source;
    use stator_graph::{EdgeKind, Graph, NodeKind};

    // Build the graph of a two-state FSM:
    //   case (state)
    //     A: if (in) state <= B; else state <= A;
    //     B: state <= A;
    //   endcase
    fn two_state_fsm() -> (Graph, NodeIx) {
        let mut g = Graph::new();
        let m = g.add_node(1, "mod", NodeKind::MODULE, None);
        let state = g.add_node(2, "state", NodeKind::VARIABLE, Some(m));
        let input = g.add_node(3, "in", NodeKind::VARIABLE, Some(m));
        let a = g.add_node(4, "A", NodeKind::CONSTANT, None);
        g.node_mut(a).value = 0;
        let b = g.add_node(5, "B", NodeKind::CONSTANT, None);
        g.node_mut(b).value = 1;

        // case item A
        let expr_a = g.add_node(10, "", NodeKind::NET, Some(m));
        g.add_edge(a, expr_a, EdgeKind::Blocking);
        let ctrl_a = g.add_node(11, "", NodeKind::CONTROL, Some(m));
        g.node_mut(ctrl_a).op = NetOp::Equal;
        g.add_edge(expr_a, ctrl_a, EdgeKind::Blocking);
        g.add_edge(state, ctrl_a, EdgeKind::Blocking);

        // if (in) under case item A
        let cond = g.add_node(12, "", NodeKind::CONTROL, Some(ctrl_a));
        g.add_edge(input, cond, EdgeKind::Blocking);
        g.add_edge(ctrl_a, cond, EdgeKind::Control);
        let negate = g.add_node(13, "", NodeKind::CONTROL, Some(cond));
        g.node_mut(negate).op = NetOp::LogicalNot;
        g.add_edge(cond, negate, EdgeKind::False);

        // state <= B inside if-true
        let asg1 = g.add_node(14, "", NodeKind::ASSIGN, None);
        g.node_mut(asg1).parent = Some(cond);
        g.add_edge(b, asg1, EdgeKind::Blocking);
        g.add_edge(cond, asg1, EdgeKind::Control);
        g.add_edge(asg1, state, EdgeKind::NonBlocking);

        // state <= A inside if-false
        let asg2 = g.add_node(15, "", NodeKind::ASSIGN, None);
        g.node_mut(asg2).parent = Some(negate);
        g.add_edge(a, asg2, EdgeKind::Blocking);
        g.add_edge(negate, asg2, EdgeKind::Control);
        g.add_edge(asg2, state, EdgeKind::NonBlocking);

        // case item B: state <= A
        let expr_b = g.add_node(16, "", NodeKind::NET, Some(m));
        g.add_edge(b, expr_b, EdgeKind::Blocking);
        let ctrl_b = g.add_node(17, "", NodeKind::CONTROL, Some(m));
        g.node_mut(ctrl_b).op = NetOp::Equal;
        g.add_edge(expr_b, ctrl_b, EdgeKind::Blocking);
        g.add_edge(state, ctrl_b, EdgeKind::Blocking);
        let asg3 = g.add_node(18, "", NodeKind::ASSIGN, None);
        g.node_mut(asg3).parent = Some(ctrl_b);
        g.add_edge(a, asg3, EdgeKind::Blocking);
        g.add_edge(ctrl_b, asg3, EdgeKind::Control);
        g.add_edge(asg3, state, EdgeKind::NonBlocking);

        (g, state)
    }

    #[test]
    fn explicit_fsm_classification() {
        let (g, state) = two_state_fsm();
        let const_src = constant_source(&g, state).unwrap();
        assert_eq!(const_src.len(), 3);
        let fsm = FsmResult::new(&g, state, const_src);
        assert!(!fsm.is_counter());
        let states = fsm.unique_states(&g);
        assert_eq!(states.len(), 2);
        assert_eq!(g.node(states[0]).name, "A");
        assert_eq!(g.node(states[1]).name, "B");
    }

    #[test]
    fn arcs_respect_gates_and_false_branches() {
        let (g, state) = two_state_fsm();
        let const_src = constant_source(&g, state).unwrap();
        let mut fsm = FsmResult::new(&g, state, const_src);
        fsm.compute_arcs(&g);
        let arcs: Vec<(i64, i64)> = fsm
            .syntax_arc()
            .iter()
            .map(|&(f, t)| (g.node(f).value, g.node(t).value))
            .collect();
        // A -> A (else branch), A -> B (if branch), B -> A (case item B)
        assert_eq!(arcs, vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn every_arc_stays_within_the_state_set() {
        let (g, state) = two_state_fsm();
        let const_src = constant_source(&g, state).unwrap();
        let mut fsm = FsmResult::new(&g, state, const_src);
        fsm.compute_arcs(&g);
        let values: BTreeSet<i64> = fsm
            .unique_states(&g)
            .iter()
            .map(|&s| g.node(s).value)
            .collect();
        for &(f, t) in fsm.syntax_arc() {
            assert!(values.contains(&g.node(f).value));
            assert!(values.contains(&g.node(t).value));
        }
    }

    #[test]
    fn reachable_arcs_overapproximate_syntax_arcs() {
        let (g, state) = two_state_fsm();
        let const_src = constant_source(&g, state).unwrap();
        let mut fsm = FsmResult::new(&g, state, const_src);
        fsm.compute_arcs(&g);
        let reachable: BTreeSet<(i64, i64)> = fsm
            .reachable_arc(&g)
            .iter()
            .map(|&(f, t)| (g.node(f).value, g.node(t).value))
            .collect();
        for &(f, t) in fsm.syntax_arc() {
            let key = (g.node(f).value, g.node(t).value);
            // self arcs pair a constant with itself and are filtered out
            if key.0 != key.1 {
                assert!(reachable.contains(&key));
            }
        }
    }

    #[test]
    fn comparison_constants() {
        let (g, state) = two_state_fsm();
        let const_src = constant_source(&g, state).unwrap();
        let fsm = FsmResult::new(&g, state, const_src);
        let comps = fsm.comp_const(&g);
        assert_eq!(comps.len(), 2);
    }

    #[test]
    fn counter_classification() {
        // q <= q + 1, compared against MAX
        let mut g = Graph::new();
        let q = g.add_node(1, "q", NodeKind::VARIABLE, None);
        let one = g.add_node(2, "", NodeKind::CONSTANT, None);
        g.node_mut(one).value = 1;
        let zero = g.add_node(3, "", NodeKind::CONSTANT, None);
        let max = g.add_node(4, "MAX", NodeKind::CONSTANT, None);
        g.node_mut(max).value = 15;

        let add = g.add_node(10, "", NodeKind::NET, None);
        g.node_mut(add).op = NetOp::Add;
        g.add_edge(q, add, EdgeKind::Blocking);
        g.add_edge(one, add, EdgeKind::Blocking);
        let asg = g.add_node(11, "", NodeKind::ASSIGN, None);
        g.add_edge(add, asg, EdgeKind::Blocking);
        g.add_edge(asg, q, EdgeKind::NonBlocking);

        // reset leg: q <= 0
        let asg0 = g.add_node(12, "", NodeKind::ASSIGN, None);
        g.add_edge(zero, asg0, EdgeKind::Blocking);
        g.add_edge(asg0, q, EdgeKind::NonBlocking);

        // q == MAX comparison
        let eq = g.add_node(13, "", NodeKind::NET, None);
        g.node_mut(eq).op = NetOp::Equal;
        g.add_edge(q, eq, EdgeKind::Blocking);
        g.add_edge(max, eq, EdgeKind::Blocking);

        let const_src = constant_source(&g, q).unwrap();
        let mut fsm = FsmResult::new(&g, q, const_src);
        assert!(fsm.is_counter());
        // counters get reachability targets from comparisons, no arcs
        let comps = fsm.comp_const(&g);
        assert_eq!(comps.len(), 1);
        assert_eq!(g.node(comps[0]).value, 15);
        fsm.compute_arcs(&g);
        assert!(fsm.syntax_arc().is_empty());
    }

    #[test]
    fn two_constants_without_comparisons_yield_no_arcs() {
        let mut g = Graph::new();
        let r = g.add_node(1, "r", NodeKind::VARIABLE, None);
        let c0 = g.add_node(2, "", NodeKind::CONSTANT, None);
        let c1 = g.add_node(3, "", NodeKind::CONSTANT, None);
        g.node_mut(c1).value = 1;
        let ctrl = g.add_node(4, "", NodeKind::CONTROL, None);
        let a0 = g.add_node(10, "", NodeKind::ASSIGN, None);
        g.add_edge(c0, a0, EdgeKind::Blocking);
        g.add_edge(ctrl, a0, EdgeKind::Control);
        g.add_edge(a0, r, EdgeKind::NonBlocking);
        let a1 = g.add_node(11, "", NodeKind::ASSIGN, None);
        g.add_edge(c1, a1, EdgeKind::Blocking);
        g.add_edge(ctrl, a1, EdgeKind::Control);
        g.add_edge(a1, r, EdgeKind::NonBlocking);

        let const_src = constant_source(&g, r).unwrap();
        let mut fsm = FsmResult::new(&g, r, const_src);
        assert!(!fsm.is_counter());
        assert_eq!(fsm.unique_states(&g).len(), 2);
        fsm.compute_arcs(&g);
        assert!(fsm.syntax_arc().is_empty());
    }
}
