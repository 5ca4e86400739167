//! SVA cover properties over detected FSM states.
use stator_graph::{Graph, NodeIx};

/// Name of the generated wrapper module.
pub const TOP_NAME: &str = "TOP";
/// Label prefix shared between emission and prover-log parsing.
pub const PROPERTY_LABEL_PREFIX: &str = "FSM_STATE_";

const INDENTATION: &str = "  ";

/// One cover target. With only the first state set this covers
/// reachability of a value; with both it covers a `(from, to)` transition
/// `delay` cycles apart.
#[derive(Debug, Clone)]
pub struct Property {
    pub id: u32,
    pub clock_name: String,
    /// 0 means same-cycle implication (`|->`), 1 means next cycle (`|=>`),
    /// larger delays insert `##(delay-1)`.
    pub delay: u32,
    pub state_var1: NodeIx,
    pub state_value1: NodeIx,
    pub state_var2: Option<NodeIx>,
    pub state_value2: Option<NodeIx>,
    /// The arc was found syntactically, so the prover is expected to agree.
    pub should_be_valid: bool,
    /// Filled in from the prover log; `None` until a formal run happens.
    pub valid: Option<bool>,
}

impl Property {
    pub fn new(
        id: u32,
        clock_name: &str,
        state_var1: NodeIx,
        state_value1: NodeIx,
    ) -> Self {
        Property {
            id,
            clock_name: clock_name.to_string(),
            delay: 0,
            state_var1,
            state_value1,
            state_var2: None,
            state_value2: None,
            should_be_valid: false,
            valid: None,
        }
    }

    pub fn transition(
        id: u32,
        clock_name: &str,
        state_var1: NodeIx,
        state_value1: NodeIx,
        state_var2: NodeIx,
        state_value2: NodeIx,
        delay: u32,
    ) -> Self {
        Property {
            id,
            clock_name: clock_name.to_string(),
            delay,
            state_var1,
            state_value1,
            state_var2: Some(state_var2),
            state_value2: Some(state_value2),
            should_be_valid: false,
            valid: None,
        }
    }

    pub fn is_transition(&self) -> bool {
        self.state_var2.is_some()
    }

    pub fn property_name(&self) -> String {
        format!("fsm_state_{}", self.id)
    }

    pub fn property_label(&self) -> String {
        format!("{}{}", PROPERTY_LABEL_PREFIX, self.id)
    }

    /// Serialize to SVA: a named property plus its cover statement.
    pub fn emit(&self, g: &Graph) -> String {
        let mut result = String::new();
        result.push_str(&format!("property {};\n", self.property_name()));
        result.push_str(&format!(
            "{}@(posedge {}) {} == {}",
            INDENTATION,
            self.clock_name,
            handle(g, self.state_var1),
            g.node(self.state_value1).value
        ));
        if let (Some(var2), Some(value2)) =
            (self.state_var2, self.state_value2)
        {
            let op = match self.delay {
                0 => "|->".to_string(),
                1 => "|=>".to_string(),
                d => format!("|=> ##{}", d - 1),
            };
            result.push_str(&format!(
                " {} {} == {}",
                op,
                handle(g, var2),
                g.node(value2).value
            ));
        }
        result.push_str(";\n");
        result.push_str("endproperty\n");
        result.push_str(&format!(
            "{}: cover property ({});\n",
            self.property_label(),
            self.property_name()
        ));
        result
    }
}

/// The hierarchical handle the formal tool uses to address a signal from
/// the wrapper scope.
fn handle(g: &Graph, n: NodeIx) -> String {
    format!("{}.{}", TOP_NAME, g.handle_name(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stator_graph::{Graph, NodeKind};

    fn state_graph() -> (Graph, NodeIx, NodeIx, NodeIx) {
        let mut g = Graph::new();
        let m = g.add_node(1, "mod", NodeKind::MODULE, None);
        let state = g.add_node(2, "state", NodeKind::VARIABLE, Some(m));
        let red = g.add_node(3, "Red", NodeKind::CONSTANT, None);
        let blue = g.add_node(4, "Blue", NodeKind::CONSTANT, None);
        g.node_mut(blue).value = 1;
        (g, state, red, blue)
    }

    #[test]
    fn reachability_property_text() {
        let (g, state, red, _) = state_graph();
        let p = Property::new(3, "clk", state, red);
        let text = p.emit(&g);
        assert!(text.contains("property fsm_state_3;"));
        assert!(text.contains("@(posedge clk) TOP.mod.state == 0;"));
        assert!(text
            .contains("FSM_STATE_3: cover property (fsm_state_3);"));
        assert!(!p.is_transition());
    }

    #[test]
    fn transition_property_text() {
        let (g, state, red, blue) = state_graph();
        let p = Property::transition(7, "clk", state, red, state, blue, 1);
        let text = p.emit(&g);
        assert!(text.contains(
            "TOP.mod.state == 0 |=> TOP.mod.state == 1;"
        ));
    }

    #[test]
    fn delay_renders_the_operator() {
        let (g, state, red, blue) = state_graph();
        let same = Property::transition(0, "clk", state, red, state, blue, 0);
        assert!(same.emit(&g).contains("|->"));
        let far = Property::transition(1, "clk", state, red, state, blue, 3);
        assert!(far.emit(&g).contains("|=> ##2"));
    }
}
