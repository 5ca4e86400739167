//! JasperGold driver: script generation, subprocess invocation, and log
//! parsing.
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::module::VerilogModule;
use crate::property::PROPERTY_LABEL_PREFIX;
use stator_utils::{Error, StatorResult};

const JG_BINARY: &str = "jg";
const WRAPPER_FILENAME: &str = "fsm_wrapper.sv";
const COMMAND_FILENAME: &str = "fsm_jg.tcl";
const WORKING_DIR: &str = "stator_jg";
// relative to the working directory
const SESSION_LOG: &str = "sessionLogs/session_0/jg_session_0.log";

/// Drives one formal run over a [`VerilogModule`]'s property set and marks
/// each property reachable or unreachable from the session log.
pub struct JasperGoldGeneration<'m, 'g> {
    module: &'m mut VerilogModule<'g>,
    time_limit: Option<u32>,
}

impl<'m, 'g> JasperGoldGeneration<'m, 'g> {
    pub fn new(module: &'m mut VerilogModule<'g>) -> Self {
        JasperGoldGeneration {
            module,
            time_limit: None,
        }
    }

    /// Per-property prove time limit in seconds, honored through the
    /// script directive.
    pub fn set_time_limit(&mut self, seconds: u32) {
        self.time_limit = Some(seconds);
    }

    pub fn has_tools() -> bool {
        has_jaspergold()
    }

    /// Write the wrapper and the command file, run the prover, and parse
    /// the session log back into the property set.
    pub fn run(&mut self) -> StatorResult<()> {
        let wrapper_filename = std::env::temp_dir().join(WRAPPER_FILENAME);
        self.module.to_file(&wrapper_filename)?;

        // the prover leaves stale state behind; start from an empty dir
        let working_dir = std::env::temp_dir().join(WORKING_DIR);
        if working_dir.exists() {
            std::fs::remove_dir_all(&working_dir)?;
        }
        std::fs::create_dir_all(&working_dir)?;

        let cmd_filename = working_dir.join(COMMAND_FILENAME);
        self.create_command_file(&cmd_filename, &wrapper_filename)?;

        log::info!("Running {} in {}", JG_BINARY, working_dir.display());
        let status = Command::new(JG_BINARY)
            .arg("-batch")
            .arg(&cmd_filename)
            .current_dir(&working_dir)
            .status()
            .map_err(|e| {
                Error::prover(format!("unable to run {}: {}", JG_BINARY, e))
            })?;
        if !status.success() {
            return Err(Error::prover(format!(
                "{} exited with {}",
                JG_BINARY, status
            )));
        }

        let log_file = working_dir.join(SESSION_LOG);
        let text = std::fs::read_to_string(&log_file).map_err(|e| {
            Error::prover(format!(
                "unable to read {}: {}",
                log_file.display(),
                e
            ))
        })?;
        self.parse_result(&text);
        Ok(())
    }

    fn create_command_file(
        &self,
        cmd_filename: &Path,
        wrapper_filename: &Path,
    ) -> StatorResult<()> {
        let mut script = String::new();

        let source = self.module.source();
        let mut analyze = String::from("analyze -sv");
        for file in source.src_filenames() {
            analyze.push_str(&format!(" {}", file.display()));
        }
        analyze.push_str(&format!(" {}", wrapper_filename.display()));
        for dir in source.src_include_dirs() {
            analyze.push_str(&format!(" +incdir+{}", dir.display()));
        }
        script.push_str(&analyze);
        script.push('\n');

        script.push_str("elaborate -top TOP\n");

        let clock = self.module.clock_name().ok_or_else(|| {
            Error::misc("Design does not have a clock")
        })?;
        if self.module.double_edge_clock() {
            script.push_str(&format!("clock -both_edges {}\n", clock));
        } else {
            script.push_str(&format!("clock {}\n", clock));
        }

        if self.module.reset_type() != crate::module::ResetType::None {
            if let Some(reset) = self.module.reset_name() {
                let expr = if self.module.posedge_reset() {
                    reset.to_string()
                } else {
                    format!("~{}", reset)
                };
                script.push_str(&format!("reset -expression {}\n", expr));
            }
        }

        if let Some(limit) = self.time_limit {
            script.push_str(&format!(
                "set_prove_per_property_max_time_limit {}s\n",
                limit
            ));
        }

        script.push_str("prove -task {<embedded>}\n");
        script.push_str("exit -force\n");

        std::fs::write(cmd_filename, script)?;
        Ok(())
    }

    /// Parse the prover's session log. Lines look like
    /// `The cover property "TOP.FSM_STATE_12" is unreachable ...`; a
    /// mentioned property is reachable unless the line says otherwise.
    fn parse_result(&mut self, log_text: &str) {
        let needle = format!(
            "The cover property \"{}.{}",
            crate::property::TOP_NAME,
            PROPERTY_LABEL_PREFIX
        );
        for line in log_text.lines() {
            let Some(pos) = line.find(&needle) else { continue };
            let rest = &line[pos + needle.len()..];
            let digits: String =
                rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            let Ok(id) = digits.parse::<u32>() else { continue };
            if let Some(property) = self.module.property_mut(id) {
                property.valid = Some(!line.contains("unreachable"));
            }
        }
    }
}

pub(crate) fn has_jaspergold() -> bool {
    which(JG_BINARY).is_some()
}

fn which(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
