//! FSM detection over the design graph: register identification,
//! constant-driver analysis, counter/explicit classification, transition-arc
//! extraction, pipeline merging, and coupled-FSM grouping.
mod couple;
mod fsm;
mod identify;
mod registers;

pub use couple::{group_fsms, merge_pipelined_fsms};
pub use fsm::FsmResult;
pub use identify::{extract_arcs, identify_fsms, with_worker_pool};
pub use registers::{constant_driver, constant_source, identify_registers};
