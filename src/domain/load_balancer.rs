use std::collections::{HashMap, HashSet};

use crate::domain::contention_graph::ContentionGraph;
use crate::domain::edge_coloring::EdgeColorer;
use crate::domain::flow::{Flow, FlowKey};
use crate::domain::usage_ledger::{CapacityDeficit, UsageLedger};
use crate::error::{Error, Result};

/// One flow's routing decision: an ordered list of (uplink index, weight)
/// pairs with weights summing to 1.0. Today every flow is single-path, so
/// the list holds exactly one pair with weight 1.0; the shape leaves room
/// for multi-path splitting.
pub type UplinkShares = Vec<(usize, f64)>;

/// Time window spanning every processed flow's interval. Absent entirely for
/// empty input, so the caller can never mistake a sentinel for a real window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffectedWindow {
    pub min_time: i64,
    pub max_time: i64,
}

impl AffectedWindow {
    fn extend(window: Option<AffectedWindow>, start: i64, end: i64) -> Option<AffectedWindow> {
        match window {
            None => Some(AffectedWindow { min_time: start, max_time: end }),
            Some(w) => Some(AffectedWindow { min_time: w.min_time.min(start), max_time: w.max_time.max(end) }),
        }
    }
}

/// Full result of one load-balancing pass.
#[derive(Debug, Clone)]
pub struct BalanceOutcome {
    pub decisions: HashMap<FlowKey, UplinkShares>,
    pub window: Option<AffectedWindow>,

    /// Every capacity deficit the ledger reported while booking this pass,
    /// in booking order. Oversubscription is reported, never refused.
    pub deficits: Vec<CapacityDeficit>,
}

/// Batch flow-to-uplink load balancer for a leaf-spine fabric.
///
/// Sorts the input by the composite key (eff_start_time, job_id), walks the
/// sorted sequence, and processes each maximal run with identical key as one
/// batch: build the contention multigraph, edge-color it, map color `c` to
/// uplink `(c - 1) % num_uplinks`, and book the flow on the usage ledger.
///
/// Sorting on both fields keeps flows of different jobs that share an exact
/// start time from being interleaved ambiguously. Batches only interact
/// through the shared ledger.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    num_uplinks: usize,
    rack_inventory: Option<HashSet<String>>,
}

impl LoadBalancer {
    pub fn new(num_uplinks: usize) -> Self {
        Self { num_uplinks, rack_inventory: None }
    }

    /// Restricts accepted rack identifiers to the given inventory. Without
    /// one, any non-empty rack id is accepted.
    pub fn with_rack_inventory(mut self, racks: HashSet<String>) -> Self {
        self.rack_inventory = Some(racks);
        self
    }

    pub fn num_uplinks(&self) -> usize {
        self.num_uplinks
    }

    /// Runs one load-balancing pass over `flows`, booking every decision on
    /// `ledger`. Input order does not matter; the result is deterministic for
    /// identical input.
    pub fn balance(&self, flows: &[Flow], ledger: &mut UsageLedger) -> Result<BalanceOutcome> {
        if self.num_uplinks == 0 {
            return Err(Error::InternalInvariant("load balancer configured with zero uplinks".to_string()));
        }

        // The assigner may pick any uplink below its own count, so the ledger
        // must track at least that many.
        if ledger.num_uplinks() < self.num_uplinks {
            return Err(Error::InternalInvariant(format!(
                "ledger tracks {} uplinks but the balancer assigns across {}",
                ledger.num_uplinks(),
                self.num_uplinks
            )));
        }

        // All validation happens before any graph construction.
        for flow in flows {
            flow.validate(self.rack_inventory.as_ref())?;
        }

        let mut sorted: Vec<&Flow> = flows.iter().collect();
        sorted.sort_by(|a, b| (a.eff_start_time, &a.key.job_id).cmp(&(b.eff_start_time, &b.key.job_id)));

        let mut outcome = BalanceOutcome { decisions: HashMap::with_capacity(flows.len()), window: None, deficits: Vec::new() };

        let mut batch_start = 0;
        while batch_start < sorted.len() {
            let mut batch_end = batch_start + 1;

            while batch_end < sorted.len()
                && sorted[batch_end].eff_start_time == sorted[batch_start].eff_start_time
                && sorted[batch_end].key.job_id == sorted[batch_start].key.job_id
            {
                batch_end += 1;
            }

            self.balance_batch(&sorted[batch_start..batch_end], ledger, &mut outcome)?;

            batch_start = batch_end;
        }

        log::info!(
            "Load balancing finished: {} flows in {} decisions across {} uplinks, {} capacity deficits.",
            flows.len(),
            outcome.decisions.len(),
            self.num_uplinks,
            outcome.deficits.len(),
        );

        Ok(outcome)
    }

    /// Processes one batch of simultaneous same-job flows: color the
    /// contention graph, then assign and book every flow in ordinal order.
    fn balance_batch(&self, batch: &[&Flow], ledger: &mut UsageLedger, outcome: &mut BalanceOutcome) -> Result<()> {
        let graph = ContentionGraph::from_batch(batch);
        let coloring = EdgeColorer::color(&graph)?;

        log::debug!("Batch of {} flows: Δ = {}, colors used = {}.", batch.len(), graph.max_degree(), coloring.num_colors);

        for (index, flow) in batch.iter().enumerate() {
            let color = coloring.colors[index];

            // Colors past the uplink count wrap around. That can reintroduce
            // contention the coloring avoided; accepted tradeoff, the
            // assigner never refuses to assign.
            let chosen_uplink = (color - 1) % self.num_uplinks;

            outcome.decisions.insert(flow.key.clone(), vec![(chosen_uplink, 1.0)]);

            if let Some(deficit) = ledger.reserve(chosen_uplink, flow.eff_start_time, flow.eff_end_time, flow.rate, &flow.key, &flow.src_rack, &flow.dst_rack) {
                outcome.deficits.push(deficit);
            }

            outcome.window = AffectedWindow::extend(outcome.window, flow.eff_start_time, flow.eff_end_time);
        }

        Ok(())
    }
}
