//! The detected design seen from the formal tool's side: the top module,
//! its ports, inferred clock/reset pins, and the generated property set.
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::str::FromStr;

use crate::property::{Property, TOP_NAME};
use stator_analysis::{with_worker_pool, FsmResult};
use stator_frontend::SourceManager;
use stator_graph::{Graph, NodeIx, PortDir};
use stator_utils::{Error, StatorResult};

const CLOCK_NAMES: [&str; 3] = ["clk", "clock", "clk_in"];
const RESET_NAMES: [&str; 5] = ["rst", "rst_n", "reset", "resetn", "reset_in"];

/// How the design's reset behaves, from the `-R` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetType {
    /// The design has no reset; the tool script declares none.
    None,
    /// Infer the polarity from pin names and event edges.
    #[default]
    Default,
    Posedge,
    Negedge,
}

impl FromStr for ResetType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ResetType::None),
            "default" => Ok(ResetType::Default),
            "posedge" => Ok(ResetType::Posedge),
            "negedge" => Ok(ResetType::Negedge),
            _ => Err(format!("unknown reset type: {}", s)),
        }
    }
}

/// The top module plus everything needed to wrap it for the formal tool.
#[derive(Debug)]
pub struct VerilogModule<'g> {
    g: &'g Graph,
    source: SourceManager,
    root_module: NodeIx,
    /// Instance name of the detected top; the wrapper instantiates it under
    /// the same name so hierarchical handles stay valid.
    pub name: String,
    /// Ports of the top module, by name.
    pub ports: BTreeMap<String, NodeIx>,
    fsm_results: Vec<FsmResult>,
    properties: BTreeMap<u32, Property>,
    clock_name: Option<String>,
    reset_name: Option<String>,
    reset_type: ResetType,
    posedge_reset: Option<bool>,
    param_overrides: BTreeMap<String, i64>,
    double_edge_clock: bool,
}

impl<'g> VerilogModule<'g> {
    /// Locate the top module and collect its port signature. With several
    /// top-level modules and no `--top`, the first by name is picked with a
    /// warning.
    pub fn new(
        g: &'g Graph,
        source: SourceManager,
        top_name: Option<&str>,
    ) -> StatorResult<Self> {
        let mut modules: BTreeMap<String, NodeIx> = BTreeMap::new();
        for n in g.nodes() {
            let node = g.node(n);
            if node.is_module()
                && (node.parent.is_none()
                    || Some(node.name.as_str()) == top_name)
            {
                modules.insert(node.name.clone(), n);
            }
        }

        let root_module = match top_name {
            Some(top) => *modules
                .get(top)
                .ok_or_else(|| Error::undefined(top, "top module"))?,
            None => {
                let Some((first_name, &first)) = modules.iter().next()
                else {
                    return Err(Error::undefined("top", "module"));
                };
                if modules.len() > 1 {
                    log::warn!(
                        "Multiple top modules ({}); picking `{}'",
                        modules.keys().join(", "),
                        first_name
                    );
                }
                first
            }
        };

        let mut ports = BTreeMap::new();
        for n in g.nodes() {
            let node = g.node(n);
            if node.parent == Some(root_module)
                && node.port != PortDir::None
            {
                ports.insert(node.name.clone(), n);
            }
        }

        Ok(VerilogModule {
            g,
            source,
            root_module,
            name: g.node(root_module).name.clone(),
            ports,
            fsm_results: vec![],
            properties: BTreeMap::new(),
            clock_name: None,
            reset_name: None,
            reset_type: ResetType::Default,
            posedge_reset: None,
            param_overrides: BTreeMap::new(),
            double_edge_clock: false,
        })
    }

    pub fn set_fsm_results(&mut self, fsms: Vec<FsmResult>) {
        self.fsm_results = fsms;
    }

    pub fn set_clock_name(&mut self, name: &str) {
        self.clock_name = Some(name.to_string());
    }

    pub fn set_reset_name(&mut self, name: &str) {
        self.reset_name = Some(name.to_string());
    }

    pub fn set_reset_type(&mut self, reset_type: ResetType) {
        self.reset_type = reset_type;
    }

    pub fn set_param_override(&mut self, name: &str, value: i64) {
        self.param_overrides.insert(name.to_string(), value);
    }

    pub fn set_double_edge_clock(&mut self, value: bool) {
        self.double_edge_clock = value;
    }

    pub fn clock_name(&self) -> Option<&str> {
        self.clock_name.as_deref()
    }

    pub fn reset_name(&self) -> Option<&str> {
        self.reset_name.as_deref()
    }

    pub fn reset_type(&self) -> ResetType {
        self.reset_type
    }

    pub fn posedge_reset(&self) -> bool {
        self.posedge_reset.unwrap_or(true)
    }

    pub fn double_edge_clock(&self) -> bool {
        self.double_edge_clock
    }

    pub fn source(&self) -> &SourceManager {
        &self.source
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn property_mut(&mut self, id: u32) -> Option<&mut Property> {
        self.properties.get_mut(&id)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Infer the clock and reset pins from the port names, unless the user
    /// forced them.
    pub fn analyze_pins(&mut self) {
        if self.clock_name.is_none() {
            self.clock_name = CLOCK_NAMES
                .iter()
                .find(|&&c| self.ports.contains_key(c))
                .map(|&c| c.to_string());
            if self.clock_name.is_none() {
                log::warn!("Unable to infer the clock pin");
            }
        }
        self.analyze_reset();
    }

    fn analyze_reset(&mut self) {
        if self.reset_type == ResetType::None {
            return;
        }
        if self.reset_name.is_none() {
            self.reset_name = RESET_NAMES
                .iter()
                .find(|&&r| self.ports.contains_key(r))
                .map(|&r| r.to_string());
        }
        self.posedge_reset = match self.reset_type {
            ResetType::Posedge => Some(true),
            ResetType::Negedge => Some(false),
            ResetType::Default => self.infer_reset_polarity(),
            ResetType::None => unreachable!(),
        };
    }

    fn infer_reset_polarity(&self) -> Option<bool> {
        let name = self.reset_name.as_deref()?;
        // rst_n / resetn are active-low by convention
        if name == "rst_n" || name == "resetn" {
            return Some(false);
        }
        let port = *self.ports.get(name)?;
        // the reset may be re-timed internally; the first sink that appears
        // in an event list tells us the polarity
        for sink in self.g.find_sinks(port, 0) {
            match self.g.node(sink).event {
                stator_graph::EventEdge::Posedge => return Some(true),
                stator_graph::EventEdge::Negedge => return Some(false),
                stator_graph::EventEdge::None => {}
            }
        }
        log::warn!(
            "Unable to infer the polarity of reset pin {}; assuming \
             active-high",
            name
        );
        Some(true)
    }

    /// Create the full property set: per-FSM reachability and transition
    /// covers, plus cross-properties between coupled FSMs. Per-FSM property
    /// lists are built on the worker pool; ids are assigned afterwards on
    /// this thread in canonical FSM order so the output is deterministic.
    pub fn create_properties(
        &mut self,
        groups: &[(NodeIx, Vec<NodeIx>)],
    ) -> StatorResult<()> {
        let clock = self
            .clock_name
            .clone()
            .ok_or_else(|| Error::misc("Design does not have a clock"))?;
        let g = self.g;
        let fsms = &self.fsm_results;

        let mut per_fsm: Vec<Vec<Property>> = with_worker_pool(|| {
            fsms.par_iter()
                .map(|fsm| build_fsm_properties(g, fsm, &clock))
                .collect()
        });

        // cross-properties between coupled FSMs, one direction per pair
        let index: HashMap<NodeIx, usize> = fsms
            .iter()
            .enumerate()
            .map(|(i, f)| (f.node(), i))
            .collect();
        let mut cross = vec![];
        let mut seen_pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (a_node, linked) in groups {
            let Some(&ai) = index.get(a_node) else { continue };
            for b_node in linked {
                let Some(&bi) = index.get(b_node) else { continue };
                let key = (ai.min(bi), ai.max(bi));
                if !seen_pairs.insert(key) {
                    continue;
                }
                let a = &fsms[ai];
                let b = &fsms[bi];
                if a.is_counter() || b.is_counter() {
                    continue;
                }
                for &sa in &a.unique_states(g) {
                    for &sb in &b.unique_states(g) {
                        cross.push(Property::transition(
                            0,
                            &clock,
                            a.node(),
                            sa,
                            b.node(),
                            sb,
                            0,
                        ));
                    }
                }
            }
        }
        per_fsm.push(cross);

        let mut id = 0u32;
        for mut property in per_fsm.into_iter().flatten() {
            property.id = id;
            self.properties.insert(id, property);
            id += 1;
        }
        Ok(())
    }

    /// The wrapper module: every top-level port re-exposed, the top
    /// instantiated with its elaborated parameters, and the property set
    /// concatenated at module scope.
    pub fn emit(&self) -> StatorResult<String> {
        let g = self.g;
        let mut out = String::new();

        out.push_str(&format!("module {}(\n", TOP_NAME));
        let last = self.ports.len().saturating_sub(1);
        for (i, (name, &port)) in self.ports.iter().enumerate() {
            let dir = match g.node(port).port {
                PortDir::Input => "input",
                PortDir::Output => "output",
                PortDir::None => unreachable!("non-port in port map"),
            };
            let wire_type = if g.node(port).wire_type.is_empty() {
                "logic"
            } else {
                g.node(port).wire_type.as_str()
            };
            let sep = if i == last { "" } else { "," };
            out.push_str(&format!(
                "  {} {} {}{}\n",
                dir, wire_type, name, sep
            ));
        }
        out.push_str(");\n\n");

        let def = g
            .node(self.root_module)
            .module_def
            .as_ref()
            .ok_or_else(|| {
                Error::misc("top module has no definition info")
            })?;

        let mut params: BTreeMap<&str, i64> = def
            .params
            .iter()
            .map(|(name, &node)| (name.as_str(), g.node(node).value))
            .collect();
        for (name, &value) in &self.param_overrides {
            params.insert(name.as_str(), value);
        }

        if params.is_empty() {
            out.push_str(&format!("{} {} (\n", def.name, self.name));
        } else {
            out.push_str(&format!("{} #(\n", def.name));
            let last = params.len() - 1;
            for (i, (name, value)) in params.iter().enumerate() {
                let sep = if i == last { "" } else { "," };
                out.push_str(&format!("  .{}({}){}\n", name, value, sep));
            }
            out.push_str(&format!(") {} (\n", self.name));
        }
        let last = self.ports.len().saturating_sub(1);
        for (i, name) in self.ports.keys().enumerate() {
            let sep = if i == last { "" } else { "," };
            out.push_str(&format!("  .{}({}){}\n", name, name, sep));
        }
        out.push_str(");\n\n");

        for property in self.properties.values() {
            out.push_str(&property.emit(g));
            out.push('\n');
        }

        out.push_str("endmodule\n");
        Ok(out)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> StatorResult<()> {
        let text = self.emit()?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}

fn build_fsm_properties(
    g: &Graph,
    fsm: &FsmResult,
    clock: &str,
) -> Vec<Property> {
    let mut props = vec![];
    if fsm.is_counter() {
        // counters only get reachability covers for the values the design
        // compares against
        for c in fsm.comp_const(g) {
            props.push(Property::new(0, clock, fsm.node(), c));
        }
        return props;
    }

    let states = fsm.unique_states(g);
    for &state in &states {
        props.push(Property::new(0, clock, fsm.node(), state));
    }
    let arcs: BTreeSet<(i64, i64)> = fsm
        .syntax_arc()
        .iter()
        .map(|&(f, t)| (g.node(f).value, g.node(t).value))
        .collect();
    for &from in &states {
        for &to in &states {
            if from == to {
                continue;
            }
            let mut p = Property::transition(
                0,
                clock,
                fsm.node(),
                from,
                fsm.node(),
                to,
                1,
            );
            p.should_be_valid =
                arcs.contains(&(g.node(from).value, g.node(to).value));
            props.push(p);
        }
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use stator_analysis::{extract_arcs, identify_fsms};
    use stator_graph::{EdgeKind, EventEdge, NodeKind};

    // one-module design: clk/rst/in ports, a two-constant state register
    fn design() -> (Graph, NodeIx) {
        let mut g = Graph::new();
        let m = g.add_node(1, "mod", NodeKind::MODULE, None);
        g.node_mut(m).module_def =
            Some(stator_graph::ModuleDef {
                name: "mod".to_string(),
                ..Default::default()
            });
        let clk = g.add_node(2, "clk", NodeKind::VARIABLE, Some(m));
        g.node_mut(clk).port = PortDir::Input;
        g.node_mut(clk).wire_type = "logic".to_string();
        g.node_mut(clk).event = EventEdge::Posedge;
        let rst = g.add_node(3, "rst", NodeKind::VARIABLE, Some(m));
        g.node_mut(rst).port = PortDir::Input;
        g.node_mut(rst).wire_type = "logic".to_string();
        g.node_mut(rst).event = EventEdge::Posedge;
        let out = g.add_node(4, "out", NodeKind::VARIABLE, Some(m));
        g.node_mut(out).port = PortDir::Output;
        g.node_mut(out).wire_type = "logic".to_string();

        let state = g.add_node(5, "state", NodeKind::VARIABLE, Some(m));
        let a = g.add_node(6, "A", NodeKind::CONSTANT, None);
        let b = g.add_node(7, "B", NodeKind::CONSTANT, None);
        g.node_mut(b).value = 1;

        let eq = g.add_node(10, "", NodeKind::NET, Some(m));
        g.node_mut(eq).op = stator_graph::NetOp::Equal;
        g.add_edge(state, eq, EdgeKind::Blocking);
        g.add_edge(a, eq, EdgeKind::Blocking);
        let cond = g.add_node(11, "", NodeKind::CONTROL, Some(m));
        g.add_edge(eq, cond, EdgeKind::Blocking);
        let negate = g.add_node(12, "", NodeKind::CONTROL, Some(cond));
        g.node_mut(negate).op = stator_graph::NetOp::LogicalNot;
        g.add_edge(cond, negate, EdgeKind::False);

        let asg1 = g.add_node(13, "", NodeKind::ASSIGN, None);
        g.node_mut(asg1).parent = Some(cond);
        g.add_edge(b, asg1, EdgeKind::Blocking);
        g.add_edge(cond, asg1, EdgeKind::Control);
        g.add_edge(asg1, state, EdgeKind::NonBlocking);
        let asg2 = g.add_node(14, "", NodeKind::ASSIGN, None);
        g.node_mut(asg2).parent = Some(negate);
        g.add_edge(a, asg2, EdgeKind::Blocking);
        g.add_edge(negate, asg2, EdgeKind::Control);
        g.add_edge(asg2, state, EdgeKind::NonBlocking);

        (g, state)
    }

    fn module_with_fsms(g: &mut Graph) -> VerilogModule<'_> {
        let mut fsms = identify_fsms(g);
        extract_arcs(g, &mut fsms);
        let mut module =
            VerilogModule::new(g, SourceManager::default(), None).unwrap();
        module.set_fsm_results(fsms);
        module
    }

    #[test]
    fn pin_inference() {
        let (mut g, _) = design();
        let mut module = module_with_fsms(&mut g);
        module.analyze_pins();
        assert_eq!(module.clock_name(), Some("clk"));
        assert_eq!(module.reset_name(), Some("rst"));
        assert!(module.posedge_reset());
    }

    #[test]
    fn active_low_reset_is_presumed_from_the_name() {
        let (mut g, _) = design();
        // rename the reset pin
        let rst = g.select("mod.rst").unwrap();
        g.node_mut(rst).name = "rst_n".to_string();
        let mut module = module_with_fsms(&mut g);
        module.analyze_pins();
        assert_eq!(module.reset_name(), Some("rst_n"));
        assert!(!module.posedge_reset());
    }

    #[test]
    fn two_states_make_two_reach_and_two_transition_covers() {
        let (mut g, state) = design();
        let mut module = module_with_fsms(&mut g);
        module.analyze_pins();
        module.create_properties(&[]).unwrap();
        assert_eq!(module.property_count(), 4);

        let transitions: Vec<&Property> = module
            .properties()
            .filter(|p| p.is_transition())
            .collect();
        assert_eq!(transitions.len(), 2);
        for t in &transitions {
            assert_eq!(t.delay, 1);
            assert_eq!(t.state_var1, state);
        }
        // only A -> B is syntactically provable
        let marked: Vec<_> = transitions
            .iter()
            .filter(|p| p.should_be_valid)
            .collect();
        assert_eq!(marked.len(), 1);
        let reach: Vec<&Property> = module
            .properties()
            .filter(|p| !p.is_transition())
            .collect();
        for r in reach {
            assert_eq!(r.delay, 0);
        }
    }

    #[test]
    fn wrapper_reexposes_ports_and_instantiates_the_top() {
        let (mut g, _) = design();
        let mut module = module_with_fsms(&mut g);
        module.analyze_pins();
        module.create_properties(&[]).unwrap();
        let text = module.emit().unwrap();
        assert!(text.starts_with("module TOP(\n"));
        assert!(text.contains("input logic clk"));
        assert!(text.contains("output logic out"));
        assert!(text.contains("mod mod (\n"));
        assert!(text.contains(".clk(clk)"));
        assert!(text.contains("cover property"));
        assert!(text.trim_end().ends_with("endmodule"));
    }

    #[test]
    fn param_overrides_flow_into_the_instantiation() {
        let (mut g, _) = design();
        let m = g.select("mod").unwrap();
        let p = g.add_node(20, "WIDTH", NodeKind::CONSTANT, Some(m));
        g.node_mut(p).value = 8;
        g.node_mut(m)
            .module_def
            .as_mut()
            .unwrap()
            .params
            .insert("WIDTH".to_string(), p);

        let mut module = module_with_fsms(&mut g);
        module.analyze_pins();
        module.set_param_override("WIDTH", 16);
        module.create_properties(&[]).unwrap();
        let text = module.emit().unwrap();
        assert!(text.contains("mod #(\n"));
        assert!(text.contains(".WIDTH(16)"));
    }

    #[test]
    fn missing_clock_is_an_error() {
        let (mut g, _) = design();
        let clk = g.select("mod.clk").unwrap();
        g.node_mut(clk).name = "tick".to_string();
        let mut fsms = identify_fsms(&mut g);
        extract_arcs(&g, &mut fsms);
        let mut module =
            VerilogModule::new(&g, SourceManager::default(), None).unwrap();
        module.set_fsm_results(fsms);
        module.analyze_pins();
        assert!(module.create_properties(&[]).is_err());
    }

    #[test]
    fn undefined_top_is_reported() {
        let (g, _) = design();
        let err =
            VerilogModule::new(&g, SourceManager::default(), Some("nope"))
                .unwrap_err();
        assert!(err.message().contains("nope"));
    }
}
