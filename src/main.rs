//! stator: FSM detection and formal property generation for SystemVerilog
//! designs.
mod cmdline;

use itertools::Itertools;

use cmdline::Opts;
use stator_analysis::{
    extract_arcs, group_fsms, identify_fsms, merge_pipelined_fsms,
};
use stator_backend::{
    json_report, print_property_results, print_text, write_json,
    JasperGoldGeneration, VerilogModule,
};
use stator_frontend::{elaborate, Parser, SourceManager};
use stator_graph::Graph;
use stator_utils::{set_worker_threads, Error, StatorResult};

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();
    let opts: Opts = argh::from_env();
    match run(opts) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(opts: Opts) -> StatorResult<i32> {
    if opts.input.is_empty() {
        return Err(Error::invalid_file("no input files (use -i)"));
    }
    if let Some(n) = opts.num_cpus {
        set_worker_threads(n);
    }

    let mut graph = Graph::new();
    let source = parse_design(&mut graph, &opts)?;

    log::info!("Detecting FSMs");
    let mut fsms = identify_fsms(&mut graph);
    if fsms.is_empty() {
        log::error!("No FSM detected");
        return Ok(1);
    }
    extract_arcs(&graph, &mut fsms);
    let fsms = merge_pipelined_fsms(&graph, fsms);
    let groups = group_fsms(&graph, &fsms, opts.coupled);

    print_text(&graph, &fsms, &groups);

    if opts.formal {
        let mut module =
            VerilogModule::new(&graph, source, opts.top.as_deref())?;
        module.set_fsm_results(fsms.clone());
        if let Some(clock) = &opts.clock {
            module.set_clock_name(clock);
        }
        if let Some(reset) = &opts.reset {
            module.set_reset_name(reset);
        }
        module.set_reset_type(opts.reset_type);
        module.set_double_edge_clock(opts.double_edge_clock);
        for (name, value) in cmdline::parse_params(&opts.param)? {
            module.set_param_override(&name, value);
        }
        module.analyze_pins();
        module.create_properties(&groups)?;

        if JasperGoldGeneration::has_tools() {
            let mut generation = JasperGoldGeneration::new(&mut module);
            if let Some(limit) = opts.timeout {
                generation.set_time_limit(limit);
            }
            generation.run()?;
            print_property_results(&module);
        } else {
            log::warn!("jg not found on PATH; skipping the formal pass");
        }
    }

    if let Some(out) = &opts.json {
        write_json(out, &json_report(&graph, &fsms, &groups))?;
    }
    Ok(0)
}

/// Elaborate (when needed) and lower the inputs into the design graph,
/// returning the source manager that the formal script re-uses.
fn parse_design(
    graph: &mut Graph,
    opts: &Opts,
) -> StatorResult<SourceManager> {
    log::info!(
        "Parsing {}",
        opts.input.iter().map(|p| p.display()).join(" ")
    );
    let single_json = opts.input.len() == 1
        && opts.input[0].extension().and_then(|e| e.to_str())
            == Some("json");

    let mut parser = Parser::new(graph);
    if single_json {
        let mut source = SourceManager::default();
        source.set_json_filename(&opts.input[0]);
        parser.parse_sources(source)?;
    } else {
        let mut source = SourceManager::new(&opts.input)?
            .with_include_dirs(&opts.include);
        for (name, value) in cmdline::parse_defines(&opts.define) {
            source.add_macro(&name, &value);
        }
        elaborate(&mut source)?;
        parser.parse_sources(source)?;
    }
    Ok(parser.source().clone())
}
