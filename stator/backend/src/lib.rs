//! Backends for the stator analyzer: SVA property generation, the wrapper
//! module, the JasperGold driver, and the report writers.
mod jasper;
mod module;
mod property;
mod report;

pub use jasper::JasperGoldGeneration;
pub use module::{ResetType, VerilogModule};
pub use property::{Property, PROPERTY_LABEL_PREFIX, TOP_NAME};
pub use report::{
    json_report, print_property_results, print_text, write_json, FsmInfo,
    StateInfo,
};
