use lazy_static::lazy_static;
use std::collections::HashSet;
use std::sync::Mutex;

lazy_static! {
    static ref WARNED: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

/// Emit a warning exactly once per distinct message. Parse anomalies (long
/// string literals, unsupported custom tasks, unknown AST kinds) would
/// otherwise repeat for every occurrence in a large design.
pub fn warn_once(msg: &str) {
    let mut warned = WARNED.lock().unwrap();
    if warned.insert(msg.to_string()) {
        log::warn!("{}", msg);
    }
}
