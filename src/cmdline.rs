use argh::FromArgs;
use std::path::PathBuf;

use stator_backend::ResetType;
use stator_utils::{Error, OutputFile, StatorResult};

#[derive(FromArgs)]
/// Detect finite-state machines in a SystemVerilog design and generate
/// formal cover properties for a model checker.
pub struct Opts {
    /// input design file, repeatable; a .list/.filelist/.txt file is read
    /// as a file list and a .json file as an elaborated AST
    #[argh(option, short = 'i', long = "input")]
    pub input: Vec<PathBuf>,

    /// include search directory, repeatable
    #[argh(option, short = 'I', long = "include")]
    pub include: Vec<PathBuf>,

    /// write the detection report as JSON to this file ("-" for stdout)
    #[argh(option, long = "json")]
    pub json: Option<OutputFile>,

    /// couple FSMs only when control flow sits on the path (slower)
    #[argh(switch, short = 'c')]
    pub coupled: bool,

    /// run the formal tool and annotate property reachability
    #[argh(switch, long = "formal")]
    pub formal: bool,

    /// top module name
    #[argh(option, long = "top")]
    pub top: Option<String>,

    /// clock port name
    #[argh(option, long = "clock")]
    pub clock: Option<String>,

    /// reset port name
    #[argh(option, long = "reset")]
    pub reset: Option<String>,

    /// parameter override as NAME=VALUE, repeatable
    #[argh(option, short = 'P', long = "param")]
    pub param: Vec<String>,

    /// macro define as NAME or NAME=VALUE, repeatable
    #[argh(option, short = 'D', long = "define")]
    pub define: Vec<String>,

    /// number of worker threads (defaults to half the hardware threads)
    #[argh(option, short = 'n', long = "num-cpus")]
    pub num_cpus: Option<usize>,

    /// reset type: none, default, posedge, or negedge
    #[argh(
        option,
        short = 'R',
        long = "reset-type",
        default = "ResetType::Default"
    )]
    pub reset_type: ResetType,

    /// treat the clock as sensitive on both edges
    #[argh(switch, long = "double-edge-clock")]
    pub double_edge_clock: bool,

    /// per-property prover time limit in seconds
    #[argh(option, short = 't', long = "timeout")]
    pub timeout: Option<u32>,
}

/// Split `-D NAME[=VALUE]` arguments; a bare name gets an empty value.
pub fn parse_defines(defines: &[String]) -> Vec<(String, String)> {
    defines
        .iter()
        .map(|d| match d.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (d.clone(), String::new()),
        })
        .collect()
}

/// Split `-P NAME=VALUE` arguments; the value must be an integer.
pub fn parse_params(params: &[String]) -> StatorResult<Vec<(String, i64)>> {
    params
        .iter()
        .map(|p| {
            let (name, value) = p.split_once('=').ok_or_else(|| {
                Error::misc(format!(
                    "parameter override must be NAME=VALUE: {}",
                    p
                ))
            })?;
            let value = value.parse().map_err(|_| {
                Error::misc(format!(
                    "parameter value must be an integer: {}",
                    p
                ))
            })?;
            Ok((name.to_string(), value))
        })
        .collect()
}
