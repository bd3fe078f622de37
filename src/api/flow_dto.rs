use serde::{Deserialize, Serialize};

/// Wire representation of a single data-transfer flow, as emitted by the
/// enclosing simulator's workload generator.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FlowDto {
    pub job_id: String,
    pub flow_id: String,
    pub iteration: u32,

    pub src_rack: String,
    pub dst_rack: String,

    // Time windows in s
    pub eff_start_time: i64,
    pub eff_end_time: i64,

    /// Requested transfer rate in the same unit as the uplink capacity.
    pub rate: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FlowSetDto {
    pub flows: Vec<FlowDto>,
}
