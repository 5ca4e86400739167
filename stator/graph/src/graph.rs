use crate::node::{EdgeIx, EdgeKind, Node, NodeIx};
use ahash::AHashMap;
use once_cell::sync::OnceCell;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction::{Incoming, Outgoing};

/// The design graph: an arena of [`Node`]s connected by typed edges, plus a
/// map from AST symbol addresses to arena indices. AST addresses come from
/// the elaborator's symbol table (memory addresses, well below the top of
/// the 64-bit space), so synthetic ids are allocated downward from
/// `u64::MAX` and the two ranges never collide.
///
/// The graph is append-only: lowering creates nodes and edges, analyses only
/// flip node `kind`/`op` bits. Nothing is ever removed.
#[derive(Debug)]
pub struct Graph {
    graph: DiGraph<Node, EdgeKind>,
    key_map: AHashMap<u64, NodeIx>,
    free_id: u64,
    // name -> nodes with that name, built on the first `select` call
    name_cache: OnceCell<AHashMap<String, Vec<NodeIx>>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            graph: DiGraph::new(),
            key_map: AHashMap::new(),
            free_id: u64::MAX,
            name_cache: OnceCell::new(),
        }
    }

    /// Allocate a synthetic id for a node that has no AST address.
    pub fn get_free_id(&mut self) -> u64 {
        let id = self.free_id;
        self.free_id -= 1;
        id
    }

    #[inline]
    pub fn has_node(&self, key: u64) -> bool {
        self.key_map.contains_key(&key)
    }

    #[inline]
    pub fn find_node(&self, key: u64) -> Option<NodeIx> {
        self.key_map.get(&key).copied()
    }

    /// Look a node up by key, creating an empty placeholder when the key is
    /// unknown. The placeholder picks up its name/kind/parent when the
    /// declaration is eventually dispatched.
    pub fn get_node(&mut self, key: u64) -> NodeIx {
        if let Some(&ix) = self.key_map.get(&key) {
            return ix;
        }
        let ix = self.graph.add_node(Node::new(key, ""));
        self.key_map.insert(key, ix);
        ix
    }

    /// Add a node under `key`, or update the existing node's name, kind and
    /// parent in place when the key is already bound. A node is appended to
    /// its parent's child list exactly once.
    pub fn add_node(
        &mut self,
        key: u64,
        name: &str,
        kind: crate::NodeKind,
        parent: Option<NodeIx>,
    ) -> NodeIx {
        let ix = match self.key_map.get(&key) {
            Some(&ix) => {
                let node = &mut self.graph[ix];
                if !name.is_empty() {
                    node.name = name.to_string();
                }
                node.kind = kind;
                ix
            }
            None => {
                let mut node = Node::new(key, name);
                node.kind = kind;
                let ix = self.graph.add_node(node);
                self.key_map.insert(key, ix);
                ix
            }
        };
        if let Some(p) = parent {
            self.set_parent(ix, p);
        }
        ix
    }

    /// Re-parent `child` under `parent`, registering it in the parent's
    /// child list when it was not enrolled there before.
    pub fn set_parent(&mut self, child: NodeIx, parent: NodeIx) {
        let prev = self.graph[child].parent;
        if prev == Some(parent) {
            return;
        }
        self.graph[child].parent = Some(parent);
        self.graph[parent].children.push(child);
    }

    /// Install an additional lookup key for an existing node. The AST refers
    /// to the same signal both by symbol address and by declaration address.
    pub fn alias_node(&mut self, key: u64, node: NodeIx) {
        self.key_map.entry(key).or_insert(node);
    }

    pub fn add_edge(
        &mut self,
        from: NodeIx,
        to: NodeIx,
        kind: EdgeKind,
    ) -> EdgeIx {
        self.graph.add_edge(from, to, kind)
    }

    #[inline]
    pub fn node(&self, ix: NodeIx) -> &Node {
        &self.graph[ix]
    }

    #[inline]
    pub fn node_mut(&mut self, ix: NodeIx) -> &mut Node {
        &mut self.graph[ix]
    }

    #[inline]
    pub fn edge(&self, ix: EdgeIx) -> EdgeKind {
        self.graph[ix]
    }

    /// Source and sink of an edge. Panics when the edge is not in this
    /// graph; edges never dangle by construction.
    pub fn endpoints(&self, ix: EdgeIx) -> (NodeIx, NodeIx) {
        let Some(pair) = self.graph.edge_endpoints(ix) else {
            unreachable!("edge does not belong to this graph")
        };
        pair
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIx> {
        self.graph.node_indices()
    }

    /// Fan-in of `n` as `(edge, source, kind)` triples.
    pub fn edges_in(
        &self,
        n: NodeIx,
    ) -> impl Iterator<Item = (EdgeIx, NodeIx, EdgeKind)> + '_ {
        self.graph
            .edges_directed(n, Incoming)
            .map(|e| (e.id(), e.source(), *e.weight()))
    }

    /// Fan-out of `n` as `(edge, target, kind)` triples.
    pub fn edges_out(
        &self,
        n: NodeIx,
    ) -> impl Iterator<Item = (EdgeIx, NodeIx, EdgeKind)> + '_ {
        self.graph
            .edges_directed(n, Outgoing)
            .map(|e| (e.id(), e.target(), *e.weight()))
    }

    pub fn fan_in_count(&self, n: NodeIx) -> usize {
        self.graph.edges_directed(n, Incoming).count()
    }

    pub fn fan_out_count(&self, n: NodeIx) -> usize {
        self.graph.edges_directed(n, Outgoing).count()
    }

    /// Whether `b` occurs on `a`'s parent chain. Containment is decided
    /// through `parent` pointers only, never by re-scanning child lists.
    pub fn child_of(&self, a: NodeIx, b: NodeIx) -> bool {
        let mut cur = self.graph[a].parent;
        while let Some(p) = cur {
            if p == b {
                return true;
            }
            cur = self.graph[p].parent;
        }
        false
    }

    /// The dotted hierarchical path of `n`: every named ancestor from the
    /// top module down to (and including) `n` itself.
    pub fn handle_name(&self, n: NodeIx) -> String {
        let mut segments = vec![];
        let mut cur = Some(n);
        while let Some(ix) = cur {
            let node = &self.graph[ix];
            if node.is_named() {
                segments.push(node.name.as_str());
            }
            cur = node.parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Walk the hierarchy by `.`-separated segments: the first segment is
    /// matched against every named node, subsequent segments narrow into the
    /// matched node's children.
    pub fn select(&self, dotted: &str) -> Option<NodeIx> {
        let cache = self.name_cache.get_or_init(|| {
            let mut map: AHashMap<String, Vec<NodeIx>> = AHashMap::new();
            for ix in self.graph.node_indices() {
                let node = &self.graph[ix];
                if node.is_named() {
                    map.entry(node.name.clone()).or_default().push(ix);
                }
            }
            map
        });
        let mut segments = dotted.split('.');
        let first = segments.next()?;
        let rest: Vec<&str> = segments.collect();
        for &root in cache.get(first)? {
            if let Some(found) = self.select_from(root, &rest) {
                return Some(found);
            }
        }
        None
    }

    fn select_from(&self, mut cur: NodeIx, segments: &[&str]) -> Option<NodeIx> {
        for segment in segments {
            cur = self.graph[cur]
                .children
                .iter()
                .copied()
                .find(|&c| self.graph[c].name == *segment)?;
        }
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use crate::{EdgeKind, Graph, NodeKind};

    #[test]
    fn add_node_updates_in_place() {
        let mut g = Graph::new();
        let ph = g.get_node(42);
        assert_eq!(g.node(ph).name, "");
        let n = g.add_node(42, "sig", NodeKind::VARIABLE, None);
        assert_eq!(ph, n);
        assert_eq!(g.node(n).name, "sig");
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn alias_points_at_same_node() {
        let mut g = Graph::new();
        let n = g.add_node(1, "a", NodeKind::VARIABLE, None);
        g.alias_node(100, n);
        assert_eq!(g.find_node(100), Some(n));
        assert_eq!(g.find_node(1), Some(n));
    }

    #[test]
    fn free_ids_descend_from_the_top() {
        let mut g = Graph::new();
        assert_eq!(g.get_free_id(), u64::MAX);
        assert_eq!(g.get_free_id(), u64::MAX - 1);
    }

    #[test]
    fn children_registered_once() {
        let mut g = Graph::new();
        let m = g.add_node(1, "mod", NodeKind::MODULE, None);
        let a = g.add_node(2, "a", NodeKind::VARIABLE, Some(m));
        // re-adding the same node must not duplicate the child entry
        g.add_node(2, "a", NodeKind::VARIABLE, Some(m));
        assert_eq!(g.node(m).children.as_slice(), &[a]);
    }

    #[test]
    fn edge_bookkeeping() {
        let mut g = Graph::new();
        let a = g.add_node(1, "a", NodeKind::VARIABLE, None);
        let b = g.add_node(2, "b", NodeKind::VARIABLE, None);
        let e = g.add_edge(a, b, EdgeKind::NonBlocking);
        assert_eq!(g.endpoints(e), (a, b));
        assert_eq!(g.edges_out(a).count(), 1);
        assert_eq!(g.edges_in(b).count(), 1);
        assert_eq!(g.edges_in(a).count(), 0);
        let (_, src, kind) = g.edges_in(b).next().unwrap();
        assert_eq!(src, a);
        assert_eq!(kind, EdgeKind::NonBlocking);
    }

    #[test]
    fn select_and_handle_name_roundtrip() {
        let mut g = Graph::new();
        let top = g.add_node(1, "top", NodeKind::MODULE, None);
        let inner = g.add_node(2, "child", NodeKind::MODULE, Some(top));
        let sig = g.add_node(3, "out", NodeKind::VARIABLE, Some(inner));
        assert_eq!(g.handle_name(sig), "top.child.out");
        assert_eq!(g.select("top.child.out"), Some(sig));
        // selection without the top prefix also resolves
        assert_eq!(g.select("child.out"), Some(sig));
        assert_eq!(g.select("out"), Some(sig));
        assert_eq!(g.select("top.child"), Some(inner));
        assert_eq!(g.select("top.missing"), None);
    }
}
