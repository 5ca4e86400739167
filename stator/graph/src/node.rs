use bitflags::bitflags;
use linked_hash_map::LinkedHashMap;
use smallvec::SmallVec;

/// Index of a node in the design graph arena.
pub type NodeIx = petgraph::graph::NodeIndex;
/// Index of an edge in the design graph arena.
pub type EdgeIx = petgraph::graph::EdgeIndex;

bitflags! {
    /// What a node is. Kinds compose: a signal is `VARIABLE | REGISTER` once
    /// register detection has run, and the ternary operator lowers to a
    /// single `CONTROL | ASSIGN` node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeKind: u8 {
        const CONSTANT = 1 << 0;
        const REGISTER = 1 << 1;
        const NET      = 1 << 2;
        const VARIABLE = 1 << 3;
        const CONTROL  = 1 << 4;
        const MODULE   = 1 << 5;
        const ASSIGN   = 1 << 6;
    }
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::NET
    }
}

/// Operator carried by expression nodes. `Ignore` is every operator the
/// analyses never need to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetOp {
    #[default]
    Ignore,
    Add,
    Subtract,
    Ternary,
    Equal,
    LogicalNot,
    BinaryAnd,
    BinaryOr,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortDir {
    #[default]
    None,
    Input,
    Output,
}

/// Edge sensitivity recorded on signals referenced in event lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventEdge {
    #[default]
    None,
    Posedge,
    Negedge,
}

/// Module definition info: the definition (not instance) name and the
/// elaborated values of the module's port parameters, used to re-instantiate
/// the top module from the property wrapper.
#[derive(Debug, Clone, Default)]
pub struct ModuleDef {
    pub name: String,
    pub params: LinkedHashMap<String, NodeIx>,
}

/// A vertex in the design graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable identity: the AST symbol address, or a synthetic id allocated
    /// downward from `u64::MAX`.
    pub id: u64,
    /// Declared name; empty for anonymous expression nodes.
    pub name: String,
    pub kind: NodeKind,
    pub op: NetOp,
    /// Only meaningful when `kind` contains `CONSTANT`.
    pub value: i64,
    /// Free-form declared type string, kept verbatim for port emission.
    pub wire_type: String,
    pub port: PortDir,
    pub event: EventEdge,
    pub parent: Option<NodeIx>,
    /// Enclosed nodes in insertion order, for deterministic traversal.
    pub children: SmallVec<[NodeIx; 4]>,
    /// Packed-struct members and generate-loop genvars, by name.
    pub members: LinkedHashMap<String, NodeIx>,
    /// Only present on `MODULE` nodes.
    pub module_def: Option<ModuleDef>,
}

impl Node {
    pub fn new(id: u64, name: &str) -> Self {
        Node {
            id,
            name: name.to_string(),
            kind: NodeKind::default(),
            op: NetOp::default(),
            value: 0,
            wire_type: String::new(),
            port: PortDir::default(),
            event: EventEdge::default(),
            parent: None,
            children: SmallVec::new(),
            members: LinkedHashMap::new(),
            module_def: None,
        }
    }

    #[inline]
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.kind.contains(NodeKind::CONSTANT)
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        self.kind.contains(NodeKind::CONTROL)
    }

    #[inline]
    pub fn is_assign(&self) -> bool {
        self.kind.contains(NodeKind::ASSIGN)
    }

    #[inline]
    pub fn is_module(&self) -> bool {
        self.kind.contains(NodeKind::MODULE)
    }

    #[inline]
    pub fn is_register(&self) -> bool {
        self.kind.contains(NodeKind::REGISTER)
    }
}

/// Edge types. `True` and `False` are refinements of `Control`: an edge
/// "matches" control when it is any of the three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Blocking,
    NonBlocking,
    Slice,
    Control,
    True,
    False,
}

impl EdgeKind {
    /// Whether this edge carries an assignment (blocking or non-blocking).
    #[inline]
    pub fn is_assign(self) -> bool {
        matches!(self, EdgeKind::Blocking | EdgeKind::NonBlocking)
    }

    /// Whether this edge carries control flow rather than data.
    #[inline]
    pub fn is_control(self) -> bool {
        matches!(self, EdgeKind::Control | EdgeKind::True | EdgeKind::False)
    }
}
