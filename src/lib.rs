use crate::api::flow_dto::FlowSetDto;
use crate::domain::flow::Flow;
use crate::domain::load_balancer::{BalanceOutcome, LoadBalancer};
use crate::domain::usage_ledger::UsageLedger;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a flow set from a JSON file and runs one load-balancing pass over
/// it, booking every decision on `ledger`.
///
/// Convenience entry point for the enclosing simulator; callers that already
/// hold domain `Flow` values use `LoadBalancer::balance` directly.
pub fn balance_flow_file(file_path: &str, balancer: &LoadBalancer, ledger: &mut UsageLedger) -> Result<BalanceOutcome> {
    logger::init();

    let flow_set: FlowSetDto = parse_json_file::<FlowSetDto>(file_path)?;
    log::info!("Flow input file parsed successfully: {} flows.", flow_set.flows.len());

    let flows = flow_set.flows.into_iter().map(Flow::from_dto).collect::<Result<Vec<Flow>>>()?;

    balancer.balance(&flows, ledger)
}
