//! The data-parallel FSM identification pipeline.
//!
//! Candidate registers are analysed independently on a worker pool sized by
//! [`stator_utils::worker_threads`]; the graph is read-only during the
//! parallel phases and results are collected under a mutex, then put back
//! into canonical (hierarchical-name) order on the calling thread.
use ahash::AHashSet;
use rayon::prelude::*;
use std::sync::Mutex;

use crate::fsm::FsmResult;
use crate::registers;
use stator_graph::Graph;
use stator_utils::worker_threads;

/// Run `f` on a pool of [`worker_threads`] threads. Falls back to the
/// calling thread when the pool cannot be built.
pub fn with_worker_pool<R, F>(f: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(worker_threads())
        .build()
    {
        Ok(pool) => pool.install(f),
        Err(_) => f(),
    }
}

/// Find every FSM in the design: promote registers, then keep the ones
/// driven by at least two distinct constants whose feedback passes through
/// control flow.
pub fn identify_fsms(g: &mut Graph) -> Vec<FsmResult> {
    registers::identify_registers(g);
    let candidates = registers::registers(g);
    let graph: &Graph = g;

    let results: Mutex<Vec<FsmResult>> = Mutex::new(vec![]);
    with_worker_pool(|| {
        candidates.par_iter().for_each(|&n| {
            let Some(const_src) = registers::constant_source(graph, n)
            else {
                return;
            };
            let distinct: AHashSet<i64> = const_src
                .iter()
                .map(|&e| graph.node(graph.endpoints(e).0).value)
                .collect();
            if distinct.len() < 2 {
                return;
            }
            if !graph.has_control_loop(n) {
                return;
            }
            let fsm = FsmResult::new(graph, n, const_src);
            results.lock().unwrap().push(fsm);
        });
    });

    let mut fsms = results.into_inner().unwrap();
    fsms.sort_by_key(|f| graph.handle_name(f.node()));
    log::info!("Detected {} FSM(s)", fsms.len());
    fsms
}

/// Compute every FSM's transition arcs, one FSM per worker.
pub fn extract_arcs(g: &Graph, fsms: &mut [FsmResult]) {
    with_worker_pool(|| {
        fsms.par_iter_mut().for_each(|fsm| fsm.compute_arcs(g));
    });
}
