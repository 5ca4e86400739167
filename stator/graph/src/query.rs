//! Traversal primitives over the design graph.
//!
//! Everything here is read-only and predicate-driven; the analyses layer
//! their FSM-specific reasoning on these.
use crate::node::{EdgeIx, EdgeKind, NodeIx, NodeKind};
use crate::Graph;
use ahash::AHashSet;
use std::collections::VecDeque;

/// DFS searches give up beyond this depth; real designs never get close.
const MAX_DEPTH: u64 = 1 << 20;

impl Graph {
    /// Whether a directed path `from -> to` exists. `from == to` trivially
    /// holds.
    pub fn has_path(&self, from: NodeIx, to: NodeIx) -> bool {
        self.has_path_where(from, to, |_| true)
    }

    /// Like [`Graph::has_path`], but an edge is traversed only if `pred`
    /// accepts its kind.
    pub fn has_path_where<F>(&self, from: NodeIx, to: NodeIx, pred: F) -> bool
    where
        F: Fn(EdgeKind) -> bool,
    {
        if from == to {
            return true;
        }
        let mut visited = AHashSet::new();
        let mut stack = vec![(from, 0u64)];
        visited.insert(from);
        while let Some((n, depth)) = stack.pop() {
            if depth >= MAX_DEPTH {
                continue;
            }
            for (_, target, kind) in self.edges_out(n) {
                if !pred(kind) {
                    continue;
                }
                if target == to {
                    return true;
                }
                if visited.insert(target) {
                    stack.push((target, depth + 1));
                }
            }
        }
        false
    }

    /// BFS reachability. Unlike [`Graph::has_path`], `reachable(n, n)` holds
    /// only when `n` sits on a real cycle.
    pub fn reachable(&self, from: NodeIx, to: NodeIx) -> bool {
        if self.fan_out_count(from) == 0 {
            return false;
        }
        let mut visited = AHashSet::new();
        let mut queue: VecDeque<NodeIx> = VecDeque::new();
        queue.push_back(from);
        while let Some(n) = queue.pop_front() {
            for (_, target, _) in self.edges_out(n) {
                if target == to {
                    return true;
                }
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        false
    }

    pub fn has_loop(&self, n: NodeIx) -> bool {
        self.reachable(n, n)
    }

    /// Whether a path `from -> to` exists that passes through at least one
    /// control node. The search state carries a "seen control" bit, so a
    /// node may be visited twice: once on a plain path and once on a gated
    /// one.
    pub fn reachable_control_loop(&self, from: NodeIx, to: NodeIx) -> bool {
        let mut visited: AHashSet<(NodeIx, bool)> = AHashSet::new();
        let mut queue: VecDeque<(NodeIx, bool)> = VecDeque::new();
        queue.push_back((from, false));
        visited.insert((from, false));
        while let Some((n, seen_control)) = queue.pop_front() {
            let mark = seen_control || self.node(n).is_control();
            for (_, target, _) in self.edges_out(n) {
                if target == to && mark {
                    return true;
                }
                if visited.insert((target, mark)) {
                    queue.push_back((target, mark));
                }
            }
        }
        false
    }

    /// Whether `n` sits on a cycle that includes a control node. State
    /// registers of real FSMs do; shift registers and plain feedback nets
    /// don't.
    pub fn has_control_loop(&self, n: NodeIx) -> bool {
        self.reachable_control_loop(n, n)
    }

    /// Every node reachable from `n` without traversing control edges, in
    /// BFS order (including `n`). `depth == 0` means unbounded.
    pub fn find_sinks(&self, n: NodeIx, depth: u32) -> Vec<NodeIx> {
        let mut result = vec![n];
        let mut visited = AHashSet::new();
        visited.insert(n);
        let mut queue: VecDeque<(NodeIx, u32)> = VecDeque::new();
        queue.push_back((n, 0));
        while let Some((cur, level)) = queue.pop_front() {
            if depth != 0 && level >= depth {
                continue;
            }
            for (_, target, kind) in self.edges_out(cur) {
                if kind.is_control() {
                    continue;
                }
                if visited.insert(target) {
                    result.push(target);
                    queue.push_back((target, level + 1));
                }
            }
        }
        result
    }

    /// BFS outward from `n`, recording every edge `matches` accepts and
    /// never descending through an edge `terminate` accepts.
    pub fn find_connection_cond<M, T>(
        &self,
        n: NodeIx,
        matches: M,
        terminate: T,
    ) -> Vec<EdgeIx>
    where
        M: Fn(EdgeIx) -> bool,
        T: Fn(EdgeIx) -> bool,
    {
        let mut result = vec![];
        let mut visited = AHashSet::new();
        visited.insert(n);
        let mut queue: VecDeque<NodeIx> = VecDeque::new();
        queue.push_back(n);
        while let Some(cur) = queue.pop_front() {
            for (edge, target, _) in self.edges_out(cur) {
                if matches(edge) {
                    result.push(edge);
                }
                if terminate(edge) {
                    continue;
                }
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        result
    }

    /// Shortest path `from -> to` honoring `pred`, as an explicit node
    /// sequence. `max_depth == 0` means unbounded.
    pub fn route<F>(
        &self,
        from: NodeIx,
        to: NodeIx,
        pred: F,
        max_depth: u64,
    ) -> Option<Vec<NodeIx>>
    where
        F: Fn(EdgeKind) -> bool,
    {
        if from == to {
            return Some(vec![from]);
        }
        let mut came_from: ahash::AHashMap<NodeIx, NodeIx> =
            ahash::AHashMap::new();
        let mut queue: VecDeque<(NodeIx, u64)> = VecDeque::new();
        queue.push_back((from, 0));
        'search: while let Some((n, depth)) = queue.pop_front() {
            if max_depth != 0 && depth >= max_depth {
                continue;
            }
            for (_, target, kind) in self.edges_out(n) {
                if !pred(kind) || came_from.contains_key(&target) {
                    continue;
                }
                came_from.insert(target, n);
                if target == to {
                    break 'search;
                }
                queue.push_back((target, depth + 1));
            }
        }
        came_from.get(&to)?;
        let mut path = vec![to];
        let mut cur = to;
        while cur != from {
            cur = came_from[&cur];
            path.push(cur);
        }
        path.reverse();
        Some(path)
    }

    /// Whether `from` reaches `to` through non-control, non-slice edges
    /// whose intermediate nodes are assignments with exactly one
    /// direct-assign fan-in, or named signals. This is the shape of a
    /// register being re-timed down a pipeline with no branching in between.
    pub fn in_direct_assign_chain(&self, from: NodeIx, to: NodeIx) -> bool {
        if from == to {
            return true;
        }
        let mut visited = AHashSet::new();
        visited.insert(from);
        let mut stack = vec![from];
        while let Some(n) = stack.pop() {
            for (_, target, kind) in self.edges_out(n) {
                if kind.is_control() || kind == EdgeKind::Slice {
                    continue;
                }
                if target == to {
                    return true;
                }
                let node = self.node(target);
                if node.is_control() {
                    continue;
                }
                if node.is_assign() {
                    let direct = self
                        .edges_in(target)
                        .filter(|(_, _, k)| k.is_assign())
                        .count();
                    if direct != 1 {
                        continue;
                    }
                } else if node.kind.contains(NodeKind::NET) && !node.is_named()
                {
                    // anonymous expression net: the chain is no longer a
                    // plain re-timing
                    continue;
                }
                if visited.insert(target) {
                    stack.push(target);
                }
            }
        }
        false
    }
}
