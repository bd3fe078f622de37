pub mod contention_graph;
pub mod edge_coloring;
pub mod flow;
pub mod load_balancer;
pub mod single_flight;
pub mod usage_ledger;
