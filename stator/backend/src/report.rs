//! Detection reports: human-readable text and machine-readable JSON.
use serde::Serialize;

use crate::module::VerilogModule;
use stator_analysis::FsmResult;
use stator_graph::{Graph, NodeIx};
use stator_utils::{OutputFile, StatorResult};

#[derive(Debug, Serialize)]
pub struct StateInfo {
    pub value: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct FsmInfo {
    pub name: String,
    pub states: Vec<StateInfo>,
    pub linked: Vec<String>,
}

/// The JSON report: one entry per FSM with its states and the handles of
/// coupled FSMs. Counters report the compared-against values.
pub fn json_report(
    g: &Graph,
    fsms: &[FsmResult],
    groups: &[(NodeIx, Vec<NodeIx>)],
) -> Vec<FsmInfo> {
    fsms.iter()
        .map(|fsm| {
            let states = if fsm.is_counter() {
                fsm.comp_const(g)
            } else {
                fsm.unique_states(g)
            };
            let linked = groups
                .iter()
                .find(|(node, _)| *node == fsm.node())
                .map(|(_, linked)| {
                    linked.iter().map(|&n| g.handle_name(n)).collect()
                })
                .unwrap_or_default();
            FsmInfo {
                name: g.handle_name(fsm.node()),
                states: states
                    .iter()
                    .map(|&s| StateInfo {
                        value: g.node(s).value,
                        name: g.node(s).name.clone(),
                    })
                    .collect(),
                linked,
            }
        })
        .collect()
}

pub fn write_json(
    out: &OutputFile,
    report: &[FsmInfo],
) -> StatorResult<()> {
    let mut writer = out.get_write()?;
    serde_json::to_writer_pretty(&mut writer, report)?;
    use std::io::Write;
    writeln!(writer)?;
    Ok(())
}

/// Print each FSM and the coupled groups the way a human wants to scan
/// them.
pub fn print_text(
    g: &Graph,
    fsms: &[FsmResult],
    groups: &[(NodeIx, Vec<NodeIx>)],
) {
    for (i, fsm) in fsms.iter().enumerate() {
        println!("State variable name: {}", g.handle_name(fsm.node()));
        if fsm.is_counter() {
            println!("  State: counter");
        } else {
            for state in fsm.unique_states(g) {
                let node = g.node(state);
                if node.is_named() {
                    println!("  State: {} ({})", node.name, node.value);
                } else {
                    println!("  State: {}", node.value);
                }
            }
        }
        if i != fsms.len() - 1 {
            println!();
        }
    }

    if groups.is_empty() {
        return;
    }
    println!();
    for (node, linked) in groups {
        println!("{}:", g.handle_name(*node));
        for l in linked {
            println!("  - {}", g.handle_name(*l));
        }
    }
}

/// Summarize the formal results after a prover run.
pub fn print_property_results(module: &VerilogModule) {
    let mut reachable = 0usize;
    let mut unreachable = 0usize;
    let mut unexpected = 0usize;
    for property in module.properties() {
        match property.valid {
            Some(true) => reachable += 1,
            Some(false) => {
                unreachable += 1;
                if property.should_be_valid {
                    // a syntactic arc the prover rejected means the guard
                    // is never satisfiable from reset
                    unexpected += 1;
                    log::warn!(
                        "Property {} was extracted syntactically but is \
                         unreachable",
                        property.property_label()
                    );
                }
            }
            None => {}
        }
    }
    println!(
        "Properties: {} reachable, {} unreachable",
        reachable, unreachable
    );
    if unexpected > 0 {
        println!(
            "  {} syntactic arc(s) reported unreachable",
            unexpected
        );
    }
}
