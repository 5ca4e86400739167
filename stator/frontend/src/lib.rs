//! Frontend for the stator analyzer: source management, elaborator
//! invocation, and lowering of the elaborated AST (JSON) into the design
//! graph.
mod literal;
mod lower;
mod packed;
mod slang;
mod source;

pub use literal::{parse_num_literal, parse_string_literal};
pub use lower::Parser;
pub use slang::{elaborate, find_slang, has_slang};
pub use source::SourceManager;
