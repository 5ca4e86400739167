use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use stator_utils::StatorResult;

// file-list inputs are recognized by extension alone
const FILE_LIST_EXTENSIONS: [&str; 3] = ["list", "filelist", "txt"];

/// Everything the elaborator needs to see the design: source files, include
/// directories, and pre-defined macros. After elaboration the manager also
/// carries the path of the produced JSON AST; the same file set is written
/// verbatim into the formal-tool script.
#[derive(Debug, Clone, Default)]
pub struct SourceManager {
    src_filenames: Vec<PathBuf>,
    src_include_dirs: Vec<PathBuf>,
    macros: Vec<(String, String)>,
    json_filename: Option<PathBuf>,
}

impl SourceManager {
    /// Build from input filenames. A single input with a file-list extension
    /// (`.list`, `.filelist`, `.txt`) is read line by line, each entry
    /// resolved relative to the list file's directory.
    pub fn new<P: AsRef<Path>>(src_filenames: &[P]) -> StatorResult<Self> {
        let mut sm = SourceManager::default();
        if src_filenames.len() == 1 && is_file_list(src_filenames[0].as_ref())
        {
            sm.read_file_list(&abspath(src_filenames[0].as_ref()))?;
        } else {
            sm.src_filenames =
                src_filenames.iter().map(|p| abspath(p.as_ref())).collect();
        }
        Ok(sm)
    }

    pub fn with_include_dirs<P: AsRef<Path>>(
        mut self,
        dirs: &[P],
    ) -> Self {
        self.src_include_dirs =
            dirs.iter().map(|p| abspath(p.as_ref())).collect();
        self
    }

    pub fn add_macro(&mut self, name: &str, value: &str) {
        self.macros.push((name.to_string(), value.to_string()));
    }

    pub fn src_filenames(&self) -> &[PathBuf] {
        &self.src_filenames
    }

    pub fn src_include_dirs(&self) -> &[PathBuf] {
        &self.src_include_dirs
    }

    pub fn macros(&self) -> &[(String, String)] {
        &self.macros
    }

    pub fn set_json_filename<P: Into<PathBuf>>(&mut self, path: P) {
        self.json_filename = Some(path.into());
    }

    pub fn json_filename(&self) -> Option<&Path> {
        self.json_filename.as_deref()
    }

    fn read_file_list(&mut self, filename: &Path) -> StatorResult<()> {
        let dir = filename.parent().unwrap_or_else(|| Path::new("."));
        let file = std::fs::File::open(filename).map_err(|e| {
            stator_utils::Error::invalid_file(format!(
                "{}: {}",
                filename.display(),
                e
            ))
        })?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let entry = line.trim();
            if entry.is_empty() {
                continue;
            }
            self.src_filenames.push(resolve(Path::new(entry), dir));
        }
        Ok(())
    }
}

fn is_file_list(filename: &Path) -> bool {
    filename
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| FILE_LIST_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

fn abspath(p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(p))
            .unwrap_or_else(|_| p.to_path_buf())
    }
}

fn resolve(p: &Path, base: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}
