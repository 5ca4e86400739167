//! Locating and running the external elaborator.
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::SourceManager;
use stator_utils::{Error, StatorResult};

/// Locate the slang driver: the `SLANG` environment variable wins, then
/// `slang` and `slang-driver` on `PATH`.
pub fn find_slang() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SLANG") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    which("slang").or_else(|| which("slang-driver"))
}

pub fn has_slang() -> bool {
    find_slang().is_some()
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

/// Run the elaborator over the sources and record the produced JSON AST
/// path in the source manager.
pub fn elaborate(source: &mut SourceManager) -> StatorResult<()> {
    let slang = find_slang()
        .ok_or_else(|| Error::misc("Unable to find slang driver"))?;

    let json_path = std::env::temp_dir().join("stator_ast.json");
    let mut cmd = Command::new(&slang);
    cmd.args(source.src_filenames());
    if !source.src_include_dirs().is_empty() {
        cmd.arg("-I");
        cmd.args(source.src_include_dirs());
    }
    for (name, value) in source.macros() {
        cmd.arg("-D");
        if value.is_empty() {
            cmd.arg(name);
        } else {
            cmd.arg(format!("{}={}", name, value));
        }
    }
    cmd.arg("--ast-json").arg(&json_path);

    log::info!("Running elaborator: {:?}", cmd);
    let status = cmd.status().map_err(|e| {
        Error::misc(format!("Unable to run {}: {}", slang.display(), e))
    })?;
    if !status.success() {
        return Err(Error::invalid_file(format!(
            "Unable to parse {}",
            source
                .src_filenames()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        )));
    }
    source.set_json_filename(json_path);
    Ok(())
}

/// Whether a path should be elaborated first or read back directly as JSON.
pub(crate) fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}
