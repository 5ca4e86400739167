//! Errors generated by the analyzer.

/// Convenience wrapper to represent success or a meaningful analyzer error.
pub type StatorResult<T> = std::result::Result<T, Error>;

/// Errors generated by the analyzer.
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error {
    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::InvalidFile(msg.to_string())),
        }
    }
    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::WriteError(msg.to_string())),
        }
    }
    /// A required field is absent from an AST node we dispatched on.
    pub fn schema<S: ToString, F: ToString>(ast_kind: S, field: F) -> Self {
        Self {
            kind: Box::new(ErrorKind::Schema(
                ast_kind.to_string(),
                field.to_string(),
            )),
        }
    }
    pub fn undefined<S: ToString, T: ToString>(name: S, typ: T) -> Self {
        Self {
            kind: Box::new(ErrorKind::Undefined(
                name.to_string(),
                typ.to_string(),
            )),
        }
    }
    pub fn prover<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::Prover(msg.to_string())),
        }
    }
    pub fn misc<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::Misc(msg.to_string())),
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Standard error type for stator errors.
#[derive(Clone)]
enum ErrorKind {
    /// The input file is invalid (does not exist, cannot be elaborated).
    InvalidFile(String),
    /// Failed to write the output.
    WriteError(String),
    /// The elaborated AST is missing a field we rely on.
    Schema(String, String),
    /// The name has not been bound.
    Undefined(String, String),
    /// The formal tool failed.
    Prover(String),
    /// Miscellaneous error message.
    Misc(String),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use ErrorKind::*;
        match self {
            Schema(kind, field) => {
                write!(f, "AST schema violation: `{field}' not found in {kind}")
            }
            Undefined(name, typ) => {
                write!(f, "Undefined {typ} name: {name}")
            }
            Prover(msg) => {
                write!(f, "Formal tool failure: {msg}")
            }
            InvalidFile(msg) | WriteError(msg) | Misc(msg) => {
                write!(f, "{msg}")
            }
        }
    }
}

// Conversions from other error types to our error type so that
// we can use `?` in all the places.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::invalid_file(format!("serde_json Error: {}", e))
    }
}
