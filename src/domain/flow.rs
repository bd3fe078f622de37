use std::collections::HashSet;
use std::fmt;

use crate::api::flow_dto::FlowDto;
use crate::error::{Error, Result};

/// Uniquely identifies a flow within one simulation run.
///
/// The same (job, flow) pair reappears once per training iteration, so the
/// iteration number is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub job_id: String,
    pub flow_id: String,
    pub iteration: u32,
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/it{}", self.job_id, self.flow_id, self.iteration)
    }
}

/// A single data-transfer flow between two racks of the fabric.
///
/// Immutable once constructed. The caller is responsible for creating one
/// `Flow` per (job, flow, iteration); the balancer never mutates it.
#[derive(Debug, Clone)]
pub struct Flow {
    pub key: FlowKey,

    /// Leaf switch the transfer originates from.
    pub src_rack: String,

    /// Leaf switch the transfer terminates at.
    pub dst_rack: String,

    // Time windows in s
    /// The effective time the transfer **starts** occupying its uplink.
    pub eff_start_time: i64,

    /// The effective time the transfer **stops** occupying its uplink (exclusive).
    pub eff_end_time: i64,

    /// Requested rate, in the same unit as the uplink's nominal capacity.
    pub rate: f64,
}

impl Flow {
    pub fn new(job_id: &str, flow_id: &str, iteration: u32, src_rack: &str, dst_rack: &str, eff_start_time: i64, eff_end_time: i64, rate: f64) -> Self {
        Self {
            key: FlowKey { job_id: job_id.to_string(), flow_id: flow_id.to_string(), iteration },
            src_rack: src_rack.to_string(),
            dst_rack: dst_rack.to_string(),
            eff_start_time,
            eff_end_time,
            rate,
        }
    }

    /// Builds the internal domain flow from its wire DTO, running full input
    /// validation. Malformed input fails here, before any graph construction.
    pub fn from_dto(dto: FlowDto) -> Result<Self> {
        let flow = Flow {
            key: FlowKey { job_id: dto.job_id, flow_id: dto.flow_id, iteration: dto.iteration },
            src_rack: dto.src_rack,
            dst_rack: dto.dst_rack,
            eff_start_time: dto.eff_start_time,
            eff_end_time: dto.eff_end_time,
            rate: dto.rate,
        };

        flow.validate(None)?;
        Ok(flow)
    }

    /// Checks the structural validity of this flow.
    ///
    /// When `rack_inventory` is given, both rack ids must additionally be
    /// contained in it; without an inventory any non-empty rack id passes.
    pub fn validate(&self, rack_inventory: Option<&HashSet<String>>) -> Result<()> {
        if self.eff_start_time < 0 {
            return Err(self.invalid(format!("negative start time {}", self.eff_start_time)));
        }

        if self.eff_end_time <= self.eff_start_time {
            return Err(self.invalid(format!("inverted or empty time interval [{}, {})", self.eff_start_time, self.eff_end_time)));
        }

        if self.src_rack.is_empty() || self.dst_rack.is_empty() {
            return Err(self.invalid("empty rack identifier".to_string()));
        }

        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(self.invalid(format!("non-positive rate {}", self.rate)));
        }

        if let Some(inventory) = rack_inventory {
            for rack in [&self.src_rack, &self.dst_rack] {
                if !inventory.contains(rack.as_str()) {
                    return Err(self.invalid(format!("unknown rack identifier '{}'", rack)));
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidFlow { flow: self.key.to_string(), reason }
    }
}
