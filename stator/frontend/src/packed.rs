//! Packed-struct type strings.
//!
//! The elaborator prints struct types as a flat string, e.g.
//! `struct packed{logic a;logic [3:0] b;}pkg::pair_t`, nesting braces for
//! structs inside structs. Each leaf member becomes a child node of the
//! signal so member accesses and struct-to-struct assignment can resolve.
use std::collections::VecDeque;

use stator_graph::{Graph, NodeIx, NodeKind};
use stator_utils::{Error, StatorResult};

const PACKED_STRUCT: &str = "struct packed";

#[derive(Default)]
struct ParseNode {
    parent: Option<usize>,
    children: Vec<usize>,
    name: String,
}

/// Whether a declared type string needs member expansion.
pub(crate) fn is_packed_struct(type_str: &str) -> bool {
    type_str.contains(PACKED_STRUCT)
}

/// Scan the type string and install one member node per leaf under `root`.
pub(crate) fn parse_struct_str(
    g: &mut Graph,
    root: NodeIx,
    type_str: &str,
) -> StatorResult<()> {
    let mut arena: Vec<ParseNode> = vec![];
    let mut parent: Option<usize> = None;
    let mut outermost: Option<usize> = None;
    let mut name = String::new();

    for c in type_str.chars() {
        match c {
            '{' => {
                name.clear();
                let id = arena.len();
                arena.push(ParseNode::default());
                if let Some(p) = parent {
                    arena[p].children.push(id);
                    arena[id].parent = Some(p);
                } else {
                    outermost = Some(id);
                }
                parent = Some(id);
            }
            ' ' => name.clear(),
            ';' => {
                // end of a member declaration: the trailing token is the
                // member name. A just-closed nested struct is still
                // nameless and claims it; otherwise it names a fresh leaf.
                let p = parent.ok_or_else(|| {
                    Error::misc(format!(
                        "malformed packed struct type: {}",
                        type_str
                    ))
                })?;
                match arena[p].children.last().copied() {
                    Some(last) if arena[last].name.is_empty() => {
                        arena[last].name = name.clone();
                    }
                    _ => {
                        let id = arena.len();
                        arena.push(ParseNode {
                            parent: Some(p),
                            children: vec![],
                            name: name.clone(),
                        });
                        arena[p].children.push(id);
                    }
                }
                name.clear();
            }
            '}' => {
                if let Some(p) = parent {
                    if arena[p].parent.is_some() {
                        parent = arena[p].parent;
                    }
                }
            }
            _ => name.push(c),
        }
    }

    let Some(top) = outermost else {
        return Ok(());
    };

    // breadth-first: materialize each parse node as a graph member
    let mut queue: VecDeque<(usize, NodeIx)> = VecDeque::new();
    queue.push_back((top, root));
    while let Some((pn, gn)) = queue.pop_front() {
        for &child in &arena[pn].children.clone() {
            let member_name = arena[child].name.clone();
            if member_name.is_empty() {
                return Err(Error::misc(format!(
                    "member name empty in packed struct type: {}",
                    type_str
                )));
            }
            if g.node(gn).members.contains_key(&member_name) {
                continue;
            }
            let id = g.get_free_id();
            let new_node = g.add_node(id, &member_name, NodeKind::NET, None);
            g.set_parent(new_node, gn);
            g.node_mut(gn).members.insert(member_name, new_node);
            queue.push_back((child, new_node));
        }
    }
    Ok(())
}
