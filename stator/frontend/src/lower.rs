//! Lowering of the elaborated AST (JSON) into the design graph.
//!
//! The AST is a tree of kind-tagged records; `dispatch` recognizes the kind
//! string and produces nodes and edges, threading the enclosing module or
//! control scope through the `parent` argument. Connectivity is all we
//! track: widths, slices, and loop bounds are deliberately approximated
//! (a part-select uses the whole signal), which keeps the graph small and
//! the later analyses sound for what they claim.
use std::path::Path;

use serde_json::Value;

use crate::{literal, packed, slang, SourceManager};
use stator_graph::{
    EdgeKind, EventEdge, Graph, ModuleDef, NetOp, NodeIx, NodeKind, PortDir,
};
use stator_utils::{warn_once, Error, StatorResult};

// AST kinds that carry nothing the graph needs.
const IGNORED_KINDS: [&str; 10] = [
    "CompilationUnit",
    "TransparentMember",
    "TypeAlias",
    "StatementBlock",
    "Subroutine",
    "EmptyArgument",
    "Empty",
    "VariableDeclaration",
    "ImplicitEvent",
    "Delay",
];

/// Drives the lowering of one elaborated design into a [`Graph`].
pub struct Parser<'g> {
    graph: &'g mut Graph,
    result: SourceManager,
}

impl<'g> Parser<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Parser {
            graph,
            result: SourceManager::default(),
        }
    }

    /// Parse a single input: a `.json` AST directly, or sources which are
    /// run through the elaborator first.
    pub fn parse_file<P: AsRef<Path>>(
        &mut self,
        filename: P,
    ) -> StatorResult<()> {
        let filename = filename.as_ref();
        let source = if slang::is_json(filename) {
            let mut s = SourceManager::default();
            s.set_json_filename(filename);
            s
        } else {
            let mut s = SourceManager::new(&[filename])?;
            slang::elaborate(&mut s)?;
            s
        };
        self.parse_sources(source)
    }

    /// Parse the JSON AST recorded in `source`.
    pub fn parse_sources(
        &mut self,
        source: SourceManager,
    ) -> StatorResult<()> {
        let json_path = source.json_filename().ok_or_else(|| {
            Error::invalid_file("no elaborated AST to parse")
        })?;
        let text = std::fs::read_to_string(json_path).map_err(|e| {
            Error::invalid_file(format!("{}: {}", json_path.display(), e))
        })?;
        let doc: Value = serde_json::from_str(&text)?;
        self.parse_value(&doc)?;
        self.result = source;
        Ok(())
    }

    /// Parse an already-loaded AST document.
    pub fn parse_value(&mut self, doc: &Value) -> StatorResult<()> {
        if doc.get("name").and_then(Value::as_str) != Some("$root") {
            return Err(Error::invalid_file("invalid slang output"));
        }
        for member in array_field(doc, "$root", "members")? {
            self.dispatch(member, None)?;
        }
        Ok(())
    }

    pub fn source(&self) -> &SourceManager {
        &self.result
    }

    fn dispatch(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        let kind = str_field(v, "node", "kind")?;
        match kind {
            k if IGNORED_KINDS.contains(&k) => Ok(None),
            "ModuleInstance" => self.parse_module(v, parent),
            "Port" | "Net" | "Variable" => self.parse_net(v, kind, parent),
            "NamedValue" => self.parse_named_value(v),
            "Assignment" => self.parse_assignment(v, parent),
            "ContinuousAssign" => {
                let assignment =
                    field(v, "ContinuousAssign", "assignment")?;
                self.parse_assignment(assignment, parent)
            }
            "Parameter" => self.parse_param(v, parent).map(Some),
            "BinaryOp" => self.parse_binary_op(v).map(Some),
            "Conversion" => {
                let operand = field(v, "Conversion", "operand")?;
                self.dispatch(operand, None)
            }
            "ProceduralBlock" | "Block" => self.parse_block(v, kind, parent),
            "Timed" => self.parse_timed(v, parent),
            "ExpressionStatement" => {
                let expr = field(v, "ExpressionStatement", "expr")?;
                self.dispatch(expr, parent)
            }
            "List" => self.parse_list(v, parent),
            "Conditional" => self.parse_conditional(v, parent).map(Some),
            "IntegerLiteral" | "StringLiteral"
            | "UnbasedUnsizedIntegerLiteral" => {
                self.parse_num_literal(v).map(Some)
            }
            "RealLiteral" => self.parse_real_literal(v).map(Some),
            "Case" => self.parse_case(v, parent).map(Some),
            "RangeSelect" => self.parse_range_select(v).map(Some),
            "Concatenation" => self.parse_concat(v).map(Some),
            "ElementSelect" => self.parse_element_select(v).map(Some),
            "ConditionalOp" => self.parse_ternary(v).map(Some),
            "UnaryOp" => self.parse_unary(v).map(Some),
            "Replication" => self.parse_replication(v).map(Some),
            "ForLoop" | "ForeverLoop" => {
                let body = field(v, kind, "body")?;
                self.dispatch(body, parent)
            }
            "Call" => self.parse_call(v, parent).map(Some),
            "GenerateBlock" => self.parse_generate_block(v, parent),
            "GenerateBlockArray" => {
                self.parse_generate_block_array(v, parent)
            }
            "Genvar" => self.parse_genvar(v, parent).map(Some),
            "EventList" => self.parse_event_list(v, parent),
            "SignalEvent" => self.parse_signal_event(v, parent),
            "MemberAccess" => self.parse_member_access(v).map(Some),
            // slang does not give gates usable connectivity
            "Gate" => Ok(None),
            _ => {
                warn_once(&format!(
                    "Unable to parse AST node kind {}",
                    kind
                ));
                Ok(None)
            }
        }
    }

    fn parse_module(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        let name = str_field(v, "ModuleInstance", "name")?;
        let addr = address(v, "ModuleInstance")?;
        let n = self.graph.add_node(addr, name, NodeKind::MODULE, parent);

        let definition = str_field(v, "ModuleInstance", "definition")?;
        let def_name = symbol_name(definition)?;
        self.graph.node_mut(n).module_def = Some(ModuleDef {
            name: def_name.to_string(),
            ..ModuleDef::default()
        });

        for member in array_field(v, "ModuleInstance", "members")? {
            self.dispatch(member, Some(n))?;
        }
        Ok(Some(n))
    }

    fn parse_net(
        &mut self,
        v: &Value,
        kind: &str,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        let name = str_field(v, kind, "name")?;
        let type_v = field(v, kind, "type")?;
        let addr = address(v, kind)?;

        let n = self.graph.add_node(addr, name, NodeKind::VARIABLE, parent);

        match type_v {
            Value::Object(_) => {
                // a typedef'd struct shows up as a TypeAlias object whose
                // target carries the flattened struct string
                if type_v.get("kind").and_then(Value::as_str)
                    == Some("TypeAlias")
                {
                    let target = type_v
                        .get("target")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    if packed::is_packed_struct(target) {
                        packed::parse_struct_str(self.graph, n, target)?;
                    }
                }
            }
            Value::String(s) => {
                self.graph.node_mut(n).wire_type = s.clone();
                if s.contains('$') && packed::is_packed_struct(s) {
                    packed::parse_struct_str(self.graph, n, s)?;
                }
            }
            _ => {}
        }

        if let Some(sym) = v.get("internalSymbol").and_then(Value::as_str) {
            let alias = symbol_addr(sym)?;
            self.graph.alias_node(alias, n);
        }

        if let Some(connection) = v.get("externalConnection") {
            // if the external connection is not an assignment it returns a
            // value node; wire it to the port through a synthetic assign
            if let Some(src) = self.dispatch(connection, Some(n))? {
                let id = self.graph.get_free_id();
                let assign =
                    self.graph.add_node(id, "", NodeKind::ASSIGN, None);
                self.graph.add_edge(src, assign, EdgeKind::Blocking);
                self.graph.add_edge(assign, n, EdgeKind::Blocking);
            }
        }

        if kind == "Port" {
            let direction = str_field(v, "Port", "direction")?;
            self.graph.node_mut(n).port = if direction == "Out" {
                PortDir::Output
            } else {
                PortDir::Input
            };
        }

        Ok(Some(n))
    }

    fn parse_named_value(&mut self, v: &Value) -> StatorResult<Option<NodeIx>> {
        let symbol = str_field(v, "NamedValue", "symbol")?;
        let addr = symbol_addr(symbol)?;
        let constant = v.get("constant").and_then(Value::as_str);

        if !self.graph.has_node(addr) {
            if let Some(c) = constant {
                // a named constant: keep the symbol name so enumerators
                // survive as first-class states
                let value = literal::parse_num_literal(c);
                let name = symbol_name(symbol)?;
                let node =
                    self.graph.add_node(addr, name, NodeKind::CONSTANT, None);
                self.graph.node_mut(node).value = value;
                return Ok(Some(node));
            }
        }
        // if the symbol doesn't exist yet, the graph creates a placeholder
        Ok(Some(self.graph.get_node(addr)))
    }

    fn parse_assignment(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        let left_v = field(v, "Assignment", "left")?;
        let right_v = field(v, "Assignment", "right")?;
        // synthetic key: the symbol table never reaches this part of the id
        // space, and member-wise struct assignment reuses the same node
        let addr = self.graph.get_free_id();
        let left = self.dispatch(left_v, parent)?.ok_or_else(|| {
            Error::misc("left hand side of assignment cannot be lowered")
        })?;
        let right = match self.dispatch(right_v, parent)? {
            Some(n) => n,
            // right already lowered into the parent scope
            None => parent.ok_or_else(|| {
                Error::misc(
                    "right hand side of assignment cannot be lowered",
                )
            })?,
        };

        if self.graph.node(right).members.is_empty() {
            self.add_assignment_node(v, parent, addr, left, right)?;
        } else {
            let left_members = self.graph.node(left).members.clone();
            let right_members = self.graph.node(right).members.clone();
            if left_members.len() != right_members.len() {
                return Err(Error::misc(
                    "only packed struct to packed struct allowed",
                ));
            }
            for (member_name, l) in left_members.iter() {
                let r = right_members.get(member_name).ok_or_else(|| {
                    Error::misc(format!(
                        "unable to find {} from {}",
                        member_name,
                        self.graph.node(right).name
                    ))
                })?;
                self.add_assignment_node(v, parent, addr, *l, *r)?;
            }
        }
        Ok(None)
    }

    fn add_assignment_node(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
        addr: u64,
        left: NodeIx,
        right: NodeIx,
    ) -> StatorResult<()> {
        let n = self.graph.add_node(addr, "", NodeKind::ASSIGN, None);
        self.graph.add_edge(right, n, EdgeKind::Blocking);
        if Some(right) != parent {
            if let Some(p) = parent {
                if self.graph.node(p).is_control() {
                    self.graph.add_edge(p, n, EdgeKind::Control);
                }
            }
        }
        let non_blocking = bool_field(v, "Assignment", "isNonBlocking")?;
        let edge_kind = if non_blocking {
            EdgeKind::NonBlocking
        } else {
            EdgeKind::Blocking
        };
        self.graph.add_edge(n, left, edge_kind);
        self.graph.node_mut(n).parent = parent;
        Ok(())
    }

    fn parse_param(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<NodeIx> {
        let addr = address(v, "Parameter")?;
        let name = str_field(v, "Parameter", "name")?;
        let value_str = str_field(v, "Parameter", "value")?;
        let value = literal::parse_num_literal(value_str);

        let n = self.graph.add_node(addr, name, NodeKind::CONSTANT, parent);
        self.graph.node_mut(n).value = value;

        // module port parameters go into the definition so the wrapper can
        // re-instantiate the top with the same elaboration
        if bool_field(v, "Parameter", "isPort")? {
            if let Some(p) = parent {
                if self.graph.node(p).is_module() {
                    if let Some(def) =
                        self.graph.node_mut(p).module_def.as_mut()
                    {
                        def.params.insert(name.to_string(), n);
                    }
                }
            }
        }
        Ok(n)
    }

    fn parse_binary_op(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let left_v = field(v, "BinaryOp", "left")?;
        let right_v = field(v, "BinaryOp", "right")?;
        let left = self.dispatch(left_v, None)?.ok_or_else(|| {
            Error::misc("left operand of binary op cannot be lowered")
        })?;
        let right = self.dispatch(right_v, None)?.ok_or_else(|| {
            Error::misc("right operand of binary op cannot be lowered")
        })?;

        let id = self.graph.get_free_id();
        let node = self.graph.add_node(id, "", NodeKind::NET, None);
        self.graph.add_edge(left, node, EdgeKind::Blocking);
        self.graph.add_edge(right, node, EdgeKind::Blocking);

        if let Some(op) = v.get("op").and_then(Value::as_str) {
            self.graph.node_mut(node).op = match op {
                "Add" => NetOp::Add,
                "Subtract" => NetOp::Subtract,
                "Equality" => NetOp::Equal,
                _ => NetOp::Ignore,
            };
        }
        Ok(node)
    }

    fn parse_block(
        &mut self,
        v: &Value,
        kind: &str,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        let addr = match v.get("addr") {
            Some(_) => address(v, kind)?,
            None => self.graph.get_free_id(),
        };
        let node = self.graph.add_node(addr, "", NodeKind::NET, parent);
        let body = field(v, kind, "body")?;
        // the body stays under the current scope, not the wrapper node
        self.dispatch(body, parent)?;
        Ok(Some(node))
    }

    fn parse_list(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        for stmt in array_field(v, "List", "list")? {
            self.dispatch(stmt, parent)?;
        }
        Ok(None)
    }

    fn parse_timed(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        let stmt = field(v, "Timed", "stmt")?;
        if let Some(timing) = v.get("timing") {
            if timing.is_object() {
                self.dispatch(timing, parent)?;
            }
        }
        self.dispatch(stmt, parent)
    }

    fn parse_conditional(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<NodeIx> {
        let cond_v = field(v, "Conditional", "cond")?;
        let cond_parent = self.dispatch(cond_v, parent)?.ok_or_else(|| {
            Error::misc("cond is null for conditional statement")
        })?;
        let id = self.graph.get_free_id();
        let cond_node = self.graph.add_node(id, "", NodeKind::CONTROL, parent);
        self.graph.add_edge(cond_parent, cond_node, EdgeKind::Blocking);

        let if_true = field(v, "Conditional", "ifTrue")?;
        self.dispatch(if_true, Some(cond_node))?;

        if let Some(if_false) = v.get("ifFalse") {
            // the false branch hangs off a negation of the condition
            let id = self.graph.get_free_id();
            let negate =
                self.graph
                    .add_node(id, "", NodeKind::CONTROL, Some(cond_node));
            self.graph.node_mut(negate).op = NetOp::LogicalNot;
            self.graph.add_edge(cond_node, negate, EdgeKind::False);
            self.dispatch(if_false, Some(negate))?;
        }

        if let Some(p) = parent {
            if self.graph.node(p).is_control() {
                self.graph.add_edge(p, cond_node, EdgeKind::Control);
                self.graph.node_mut(cond_node).parent = Some(p);
            }
        }
        Ok(cond_node)
    }

    fn parse_case(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<NodeIx> {
        let items = array_field(v, "Case", "items")?;
        let expr_v = field(v, "Case", "expr")?;
        let cond = self.dispatch(expr_v, parent)?.ok_or_else(|| {
            Error::misc("cannot parse expr in case statement")
        })?;

        for item in items {
            let exprs = array_field(item, "CaseItem", "expressions")?;
            let mut nodes = vec![];
            for expr in exprs {
                let node = self.dispatch(expr, parent)?.ok_or_else(|| {
                    Error::misc("cannot parse expr in case item")
                })?;
                nodes.push(node);
            }
            if nodes.is_empty() {
                return Err(Error::misc("expressions empty in case item"));
            }

            // link all the item expressions into one node, then gate the
            // statement on (expressions == cond)
            let id = self.graph.get_free_id();
            let expr_node = self.graph.add_node(id, "", NodeKind::NET, parent);
            for node in nodes {
                self.graph.add_edge(node, expr_node, EdgeKind::Blocking);
            }

            let id = self.graph.get_free_id();
            let control_node =
                self.graph.add_node(id, "", NodeKind::CONTROL, parent);
            self.graph.node_mut(control_node).op = NetOp::Equal;
            self.graph.add_edge(expr_node, control_node, EdgeKind::Blocking);
            self.graph.add_edge(cond, control_node, EdgeKind::Blocking);

            let stmt = field(item, "CaseItem", "stmt")?;
            self.dispatch(stmt, Some(control_node))?;
        }

        if let Some(default_case) = v.get("defaultCase") {
            let id = self.graph.get_free_id();
            let control_node =
                self.graph.add_node(id, "", NodeKind::CONTROL, parent);
            self.graph.add_edge(cond, control_node, EdgeKind::Blocking);
            self.dispatch(default_case, Some(control_node))?;
        }

        if let Some(p) = parent {
            if self.graph.node(p).is_control() {
                self.graph.add_edge(p, cond, EdgeKind::Control);
            }
        }
        Ok(cond)
    }

    fn parse_range_select(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let value_v = field(v, "RangeSelect", "value")?;
        let left_v = field(v, "RangeSelect", "left")?;
        let right_v = field(v, "RangeSelect", "right")?;
        let value = self.dispatch(value_v, None)?.ok_or_else(|| {
            Error::misc("cannot parse value for range select")
        })?;
        let left = self.dispatch(left_v, None)?.ok_or_else(|| {
            Error::misc("cannot parse left for range select")
        })?;
        let right = self.dispatch(right_v, None)?.ok_or_else(|| {
            Error::misc("cannot parse right for range select")
        })?;

        self.graph.add_edge(left, value, EdgeKind::Slice);
        self.graph.add_edge(right, value, EdgeKind::Slice);
        Ok(value)
    }

    fn parse_element_select(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let value_v = field(v, "ElementSelect", "value")?;
        let selector_v = field(v, "ElementSelect", "selector")?;
        let value = self.dispatch(value_v, None)?.ok_or_else(|| {
            Error::misc("cannot parse value for element select")
        })?;
        let selector = self.dispatch(selector_v, None)?.ok_or_else(|| {
            Error::misc("cannot parse selector for element select")
        })?;
        // the selected value flows through whole; the selector only slices
        self.graph.add_edge(selector, value, EdgeKind::Slice);
        Ok(value)
    }

    fn parse_concat(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let operands = array_field(v, "Concatenation", "operands")?;
        let id = self.graph.get_free_id();
        let node = self.graph.add_node(id, "", NodeKind::NET, None);
        for operand in operands {
            let n = self.dispatch(operand, None)?.ok_or_else(|| {
                Error::misc("item is null for concatenation")
            })?;
            self.graph.add_edge(n, node, EdgeKind::Blocking);
        }
        Ok(node)
    }

    fn parse_ternary(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let pred_v = field(v, "ConditionalOp", "pred")?;
        let left_v = field(v, "ConditionalOp", "left")?;
        let right_v = field(v, "ConditionalOp", "right")?;

        let pred = self.dispatch(pred_v, None)?.ok_or_else(|| {
            Error::misc("pred is null for ternary operator")
        })?;
        let left = self.dispatch(left_v, None)?.ok_or_else(|| {
            Error::misc("left is null for ternary operator")
        })?;
        let right = self.dispatch(right_v, None)?.ok_or_else(|| {
            Error::misc("right is null for ternary operator")
        })?;

        let id = self.graph.get_free_id();
        let control = self.graph.add_node(id, "", NodeKind::CONTROL, None);
        self.graph.add_edge(pred, control, EdgeKind::Blocking);

        let id = self.graph.get_free_id();
        let control_assign = self.graph.add_node(
            id,
            "",
            NodeKind::CONTROL | NodeKind::ASSIGN,
            None,
        );
        self.graph.node_mut(control_assign).op = NetOp::Ternary;
        self.graph.add_edge(control, control_assign, EdgeKind::Blocking);
        self.graph.add_edge(left, control_assign, EdgeKind::Blocking);
        self.graph.add_edge(right, control_assign, EdgeKind::Blocking);
        Ok(control_assign)
    }

    fn parse_unary(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let operand_v = field(v, "UnaryOp", "operand")?;
        let operand = self.dispatch(operand_v, None)?.ok_or_else(|| {
            Error::misc("operand is null for unary")
        })?;
        let id = self.graph.get_free_id();
        let node = self.graph.add_node(id, "", NodeKind::NET, None);
        let op = str_field(v, "UnaryOp", "op")?;
        self.graph.node_mut(node).op = match op {
            "LogicalNot" => NetOp::LogicalNot,
            "BinaryOr" => NetOp::BinaryOr,
            "BinaryAnd" => NetOp::BinaryAnd,
            "BitwiseNot" => NetOp::BitwiseNot,
            _ => NetOp::Ignore,
        };
        self.graph.add_edge(operand, node, EdgeKind::Blocking);
        Ok(node)
    }

    fn parse_replication(&mut self, v: &Value) -> StatorResult<NodeIx> {
        field(v, "Replication", "count")?;
        let concat_v = field(v, "Replication", "concat")?;
        let var = self.dispatch(concat_v, None)?.ok_or_else(|| {
            Error::misc("cannot parse concat for replication")
        })?;
        if self.graph.node(var).is_const() {
            // TODO: get the width from the design and do proper calculation
            warn_once("constant replication not supported");
        }
        Ok(var)
    }

    fn parse_call(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<NodeIx> {
        let subroutine = str_field(v, "Call", "subroutine")?;
        if !is_system_task(subroutine) {
            // custom tasks/functions are not inlined, just wired together
            let name =
                subroutine.split_whitespace().last().unwrap_or(subroutine);
            warn_once(&format!(
                "Custom task/function {} not supported",
                name
            ));
        }

        let id = self.graph.get_free_id();
        let call_node = self.graph.get_node(id);
        self.graph.node_mut(call_node).parent = parent;

        if let Some(args) = v.get("arguments").and_then(Value::as_array) {
            for arg in args {
                if let Some(arg_node) = self.dispatch(arg, Some(call_node))? {
                    self.graph.add_edge(
                        arg_node,
                        call_node,
                        EdgeKind::Blocking,
                    );
                }
            }
        }
        Ok(call_node)
    }

    fn parse_generate_block(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        if !bool_field(v, "GenerateBlock", "isInstantiated")? {
            return Ok(None);
        }
        for member in array_field(v, "GenerateBlock", "members")? {
            self.dispatch(member, parent)?;
        }
        Ok(None)
    }

    fn parse_generate_block_array(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        let name = str_field(v, "GenerateBlockArray", "name")?;
        let members = array_field(v, "GenerateBlockArray", "members")?;
        let p = parent.ok_or_else(|| {
            Error::misc("generate block array outside of module scope")
        })?;
        if name.is_empty() {
            // cannot access the genvar block, disable the parsing
            log::warn!(
                "Unable to find label name for generated block array from {}",
                self.graph.handle_name(p)
            );
            return Ok(None);
        }

        for member in members {
            let kind = str_field(member, "GenerateBlockArray", "kind")?;
            if kind != "GenerateBlock" {
                return Err(Error::misc(
                    "none generate block found in block array",
                ));
            }
            let sub_members =
                array_field(member, "GenerateBlock", "members")?;
            // each sub-block carries its loop index as a local parameter
            // named after the genvar registered in the module's members
            let mut index = None;
            for sub in sub_members {
                if sub.get("kind").and_then(Value::as_str)
                    == Some("Parameter")
                {
                    let param_name = str_field(sub, "Parameter", "name")?;
                    if self.graph.node(p).members.contains_key(param_name) {
                        let param = self.parse_param(sub, None)?;
                        index = Some(self.graph.node(param).value);
                        break;
                    }
                }
            }
            match index {
                None => log::warn!(
                    "Unable to parse blocks from {}.{}",
                    self.graph.handle_name(p),
                    name
                ),
                Some(i) => {
                    // instantiate a "fake" module per block so selection
                    // sees label[i] scopes
                    let module_name = format!("{}[{}]", name, i);
                    let id = self.graph.get_free_id();
                    let module = self.graph.add_node(
                        id,
                        &module_name,
                        NodeKind::MODULE,
                        None,
                    );
                    self.graph.set_parent(module, p);
                    self.parse_generate_block(member, Some(module))?;
                }
            }
        }
        Ok(None)
    }

    fn parse_genvar(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<NodeIx> {
        let name = str_field(v, "Genvar", "name")?;
        let p = parent.ok_or_else(|| {
            Error::misc("genvar outside of module scope")
        })?;
        let id = self.graph.get_free_id();
        let node = self.graph.add_node(id, name, NodeKind::NET, None);
        self.graph
            .node_mut(p)
            .members
            .insert(name.to_string(), node);
        Ok(node)
    }

    fn parse_num_literal(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let mut string_literal = false;
        let value_v = v
            .get("constant")
            .or_else(|| v.get("value"))
            .or_else(|| {
                string_literal = true;
                v.get("literal")
            })
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::schema("number literal", "constant")
            })?;
        let value = if string_literal {
            literal::parse_string_literal(value_v)
        } else {
            literal::parse_num_literal(value_v)
        };
        let id = self.graph.get_free_id();
        let node = self.graph.add_node(id, "", NodeKind::CONSTANT, None);
        self.graph.node_mut(node).value = value;
        Ok(node)
    }

    fn parse_real_literal(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let type_str = str_field(v, "RealLiteral", "type")?;
        if type_str != "real" {
            return Err(Error::misc("only real can be parsed"));
        }
        let real_str = str_field(v, "RealLiteral", "constant")?;
        let real: f64 = real_str.parse().unwrap_or_else(|_| {
            log::warn!("Unable to parse {}", real_str);
            0.0
        });
        let id = self.graph.get_free_id();
        let node = self.graph.add_node(id, "", NodeKind::CONSTANT, None);
        self.graph.node_mut(node).value = real as i64;
        Ok(node)
    }

    fn parse_event_list(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        for event in array_field(v, "EventList", "events")? {
            self.dispatch(event, parent)?;
        }
        Ok(None)
    }

    fn parse_signal_event(
        &mut self,
        v: &Value,
        parent: Option<NodeIx>,
    ) -> StatorResult<Option<NodeIx>> {
        let expr = field(v, "SignalEvent", "expr")?;
        let node = self.dispatch(expr, parent)?.ok_or_else(|| {
            Error::misc("cannot find expr from signal event")
        })?;
        let edge = str_field(v, "SignalEvent", "edge")?;
        self.graph.node_mut(node).event = match edge {
            "PosEdge" => EventEdge::Posedge,
            "NegEdge" => EventEdge::Negedge,
            "None" => EventEdge::None,
            other => {
                return Err(Error::misc(format!(
                    "Unknown edge type {}",
                    other
                )))
            }
        };
        Ok(None)
    }

    fn parse_member_access(&mut self, v: &Value) -> StatorResult<NodeIx> {
        let field_sym = str_field(v, "MemberAccess", "field")?;
        let field_name = symbol_name(field_sym)?;
        let value_v = field(v, "MemberAccess", "value")?;
        let n = self.dispatch(value_v, None)?.ok_or_else(|| {
            Error::misc("unable to parse member access value")
        })?;
        self.graph
            .node(n)
            .members
            .get(field_name)
            .copied()
            .ok_or_else(|| {
                Error::misc(format!("unable to find {}", field_name))
            })
    }
}

fn is_system_task(subroutine: &str) -> bool {
    let tokens: Vec<&str> = subroutine.split_whitespace().collect();
    tokens.len() == 1 && tokens[0].starts_with('$')
}

fn field<'a>(
    v: &'a Value,
    ast_kind: &str,
    name: &str,
) -> StatorResult<&'a Value> {
    v.get(name).ok_or_else(|| Error::schema(ast_kind, name))
}

fn str_field<'a>(
    v: &'a Value,
    ast_kind: &str,
    name: &str,
) -> StatorResult<&'a str> {
    field(v, ast_kind, name)?
        .as_str()
        .ok_or_else(|| Error::schema(ast_kind, name))
}

fn bool_field(v: &Value, ast_kind: &str, name: &str) -> StatorResult<bool> {
    field(v, ast_kind, name)?
        .as_bool()
        .ok_or_else(|| Error::schema(ast_kind, name))
}

fn array_field<'a>(
    v: &'a Value,
    ast_kind: &str,
    name: &str,
) -> StatorResult<&'a Vec<Value>> {
    field(v, ast_kind, name)?
        .as_array()
        .ok_or_else(|| Error::schema(ast_kind, name))
}

fn address(v: &Value, ast_kind: &str) -> StatorResult<u64> {
    field(v, ast_kind, "addr")?
        .as_u64()
        .ok_or_else(|| Error::schema(ast_kind, "addr"))
}

// symbols are printed as "<address> <name>"
fn symbol_addr(symbol: &str) -> StatorResult<u64> {
    let tokens: Vec<&str> = symbol.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(Error::misc("internal symbol has to be two tokens"));
    }
    tokens[0]
        .parse()
        .map_err(|_| Error::misc("internal symbol has to be two tokens"))
}

fn symbol_name(symbol: &str) -> StatorResult<&str> {
    let tokens: Vec<&str> = symbol.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(Error::misc("internal symbol has to be two tokens"));
    }
    Ok(tokens[1])
}
