//! End-to-end detection over elaborated AST fixtures, from JSON to
//! properties and the wrapper module.
use serde_json::{json, Value};
use std::io::Write;

use stator_analysis::{
    extract_arcs, group_fsms, identify_fsms, merge_pipelined_fsms,
};
use stator_backend::{json_report, VerilogModule};
use stator_frontend::{Parser, SourceManager};
use stator_graph::{EventEdge, Graph};

fn parse(doc: &Value) -> Graph {
    static FIXTURE: std::sync::atomic::AtomicUsize =
        std::sync::atomic::AtomicUsize::new(0);
    let dir = std::env::temp_dir();
    let path = dir.join(format!(
        "stator_fixture_{}_{}.json",
        std::process::id(),
        FIXTURE.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    ));
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{}", doc).unwrap();
    drop(f);

    let mut g = Graph::new();
    let mut p = Parser::new(&mut g);
    p.parse_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    g
}

fn named_value(symbol: &str) -> Value {
    json!({"kind": "NamedValue", "symbol": symbol})
}

fn enum_value(symbol: &str, constant: &str) -> Value {
    json!({"kind": "NamedValue", "symbol": symbol, "constant": constant})
}

fn assign(left: Value, right: Value) -> Value {
    json!({"kind": "ExpressionStatement", "expr": {
        "kind": "Assignment",
        "isNonBlocking": true,
        "left": left,
        "right": right
    }})
}

/// A two-state color FSM:
///
/// ```text
/// case (Color_current_state)
///   Red:  if (in) state <= Blue; else state <= Red;
///   Blue: if (in) state <= Red;  else state <= Blue;
/// endcase
/// assign out = Color_current_state == Red;
/// ```
fn color_fsm() -> Value {
    let state = || named_value("105 Color_current_state");
    let red = || enum_value("301 Red", "1'b0");
    let blue = || enum_value("302 Blue", "1'b1");
    json!({
        "name": "$root",
        "members": [{
            "kind": "ModuleInstance",
            "name": "mod",
            "addr": 100,
            "definition": "90 mod",
            "members": [
                {"kind": "Port", "name": "clk", "addr": 101,
                 "direction": "In", "type": "logic",
                 "internalSymbol": "201 clk"},
                {"kind": "Port", "name": "rst", "addr": 102,
                 "direction": "In", "type": "logic",
                 "internalSymbol": "202 rst"},
                {"kind": "Port", "name": "in", "addr": 103,
                 "direction": "In", "type": "logic",
                 "internalSymbol": "203 in"},
                {"kind": "Port", "name": "out", "addr": 104,
                 "direction": "Out", "type": "logic",
                 "internalSymbol": "204 out"},
                {"kind": "Variable", "name": "Color_current_state",
                 "addr": 105, "type": "logic"},
                {"kind": "ProceduralBlock", "addr": 110, "body": {
                    "kind": "Timed",
                    "timing": {"kind": "EventList", "events": [
                        {"kind": "SignalEvent", "edge": "PosEdge",
                         "expr": named_value("201 clk")}
                    ]},
                    "stmt": {"kind": "Block", "addr": 111, "body": {
                        "kind": "Case",
                        "expr": state(),
                        "items": [
                            {"expressions": [red()], "stmt": {
                                "kind": "Conditional",
                                "cond": named_value("203 in"),
                                "ifTrue": assign(state(), blue()),
                                "ifFalse": assign(state(), red())
                            }},
                            {"expressions": [blue()], "stmt": {
                                "kind": "Conditional",
                                "cond": named_value("203 in"),
                                "ifTrue": assign(state(), red()),
                                "ifFalse": assign(state(), blue())
                            }}
                        ]
                    }}
                }},
                {"kind": "ContinuousAssign", "assignment": {
                    "kind": "Assignment",
                    "isNonBlocking": false,
                    "left": named_value("204 out"),
                    "right": {"kind": "BinaryOp", "op": "Equality",
                              "left": state(), "right": red()}
                }}
            ]
        }]
    })
}

#[test]
fn color_fsm_detection() {
    let mut g = parse(&color_fsm());

    // hierarchy and aliases resolve
    let state = g.select("mod.Color_current_state").unwrap();
    assert_eq!(g.select("Color_current_state"), Some(state));
    let input = g.select("mod.in").unwrap();
    assert!(g.has_path(input, state));

    // trigger type
    let clk = g.select("mod.clk").unwrap();
    assert_eq!(g.node(clk).event, EventEdge::Posedge);

    let mut fsms = identify_fsms(&mut g);
    assert_eq!(fsms.len(), 1);
    let name = g.node(fsms[0].node()).name.clone();
    assert_eq!(name, "Color_current_state");
    assert!(!fsms[0].is_counter());

    let states = fsms[0].unique_states(&g);
    assert_eq!(states.len(), 2);
    assert_eq!(g.node(states[0]).name, "Red");
    assert_eq!(g.node(states[0]).value, 0);
    assert_eq!(g.node(states[1]).name, "Blue");
    assert_eq!(g.node(states[1]).value, 1);

    extract_arcs(&g, &mut fsms);
    let arcs: Vec<(i64, i64)> = fsms[0]
        .syntax_arc()
        .iter()
        .map(|&(f, t)| (g.node(f).value, g.node(t).value))
        .collect();
    assert_eq!(arcs, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
}

#[test]
fn color_fsm_properties_and_wrapper() {
    let mut g = parse(&color_fsm());
    let mut fsms = identify_fsms(&mut g);
    extract_arcs(&g, &mut fsms);
    let fsms = merge_pipelined_fsms(&g, fsms);
    let groups = group_fsms(&g, &fsms, false);

    let mut module =
        VerilogModule::new(&g, SourceManager::default(), None).unwrap();
    module.set_fsm_results(fsms.clone());
    module.analyze_pins();
    assert_eq!(module.clock_name(), Some("clk"));
    assert_eq!(module.reset_name(), Some("rst"));
    assert_eq!(module.ports.len(), 4);

    module.create_properties(&groups).unwrap();
    // 2 reachability + 2 ordered transitions
    assert_eq!(module.property_count(), 4);
    // every transition is backed by a syntactic arc here
    for p in module.properties().filter(|p| p.is_transition()) {
        assert!(p.should_be_valid);
        assert_eq!(p.delay, 1);
    }

    let wrapper = module.emit().unwrap();
    assert!(wrapper.starts_with("module TOP(\n"));
    assert!(wrapper.contains("input logic clk"));
    assert!(wrapper.contains("output logic out"));
    assert!(wrapper.contains("mod mod (\n"));
    assert!(wrapper.contains("@(posedge clk) TOP.mod.Color_current_state == 0;"));
    assert!(wrapper.contains(
        "TOP.mod.Color_current_state == 0 |=> \
         TOP.mod.Color_current_state == 1;"
    ));
    assert!(wrapper.trim_end().ends_with("endmodule"));

    let report = json_report(&g, &fsms, &groups);
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].name, "mod.Color_current_state");
    assert_eq!(report[0].states.len(), 2);
    assert_eq!(report[0].states[0].name, "Red");
    assert!(report[0].linked.is_empty());
}

/// A counter with an explicit terminal comparison:
///
/// ```text
/// if (q == MAX) q <= 0; else q <= q + 1;
/// ```
fn terminal_counter() -> Value {
    let q = || named_value("405 q");
    json!({
        "name": "$root",
        "members": [{
            "kind": "ModuleInstance",
            "name": "counter",
            "addr": 400,
            "definition": "390 counter",
            "members": [
                {"kind": "Port", "name": "clk", "addr": 401,
                 "direction": "In", "type": "logic",
                 "internalSymbol": "501 clk"},
                {"kind": "Variable", "name": "q", "addr": 405,
                 "type": "logic [3:0]"},
                {"kind": "ProceduralBlock", "addr": 410, "body": {
                    "kind": "Timed",
                    "timing": {"kind": "EventList", "events": [
                        {"kind": "SignalEvent", "edge": "PosEdge",
                         "expr": named_value("501 clk")}
                    ]},
                    "stmt": {"kind": "Conditional",
                        "cond": {"kind": "BinaryOp", "op": "Equality",
                                 "left": q(),
                                 "right": enum_value("601 MAX", "4'hf")},
                        "ifTrue": assign(
                            q(),
                            json!({"kind": "IntegerLiteral",
                                   "constant": "4'h0"})
                        ),
                        "ifFalse": assign(
                            q(),
                            json!({"kind": "BinaryOp", "op": "Add",
                                   "left": q(),
                                   "right": {"kind": "IntegerLiteral",
                                             "constant": "4'h1"}})
                        )
                    }
                }}
            ]
        }]
    })
}

#[test]
fn counters_cover_compared_values_only() {
    let mut g = parse(&terminal_counter());
    let mut fsms = identify_fsms(&mut g);
    assert_eq!(fsms.len(), 1);
    assert!(fsms[0].is_counter());

    let comps = fsms[0].comp_const(&g);
    assert_eq!(comps.len(), 1);
    assert_eq!(g.node(comps[0]).value, 15);
    assert_eq!(g.node(comps[0]).name, "MAX");

    extract_arcs(&g, &mut fsms);
    assert!(fsms[0].syntax_arc().is_empty());

    let mut module =
        VerilogModule::new(&g, SourceManager::default(), None).unwrap();
    module.set_fsm_results(fsms);
    module.analyze_pins();
    module.create_properties(&[]).unwrap();
    // a single reachability cover for MAX
    assert_eq!(module.property_count(), 1);
    let p = module.properties().next().unwrap();
    assert!(!p.is_transition());
    assert_eq!(g.node(p.state_value1).value, 15);
}
