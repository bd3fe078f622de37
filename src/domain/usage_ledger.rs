use crate::domain::flow::FlowKey;

/// One capacity reservation on an uplink over the half-open interval
/// `[start, end)`.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub flow: FlowKey,
    pub src_rack: String,
    pub dst_rack: String,
    pub start: i64,
    pub end: i64,
    pub rate: f64,
}

/// Structured event reporting that an uplink's cumulative reserved rate
/// exceeds its nominal capacity somewhere inside a newly reserved interval.
///
/// Reported, never raised: the enclosing simulator decides whether
/// oversubscription is acceptable for the modeled scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityDeficit {
    pub uplink: usize,
    /// Instant at which the cumulative rate peaks within the new interval.
    pub instant: i64,
    pub cumulative_rate: f64,
    pub capacity: f64,
}

/// Time-windowed capacity ledger for the fabric's uplinks.
///
/// Keeps, per uplink, an event-sorted timeline of reservations over
/// arbitrary, overlapping intervals; the time domain is unbounded, so there
/// is no fixed per-timestep array. The ledger is owned by exactly one
/// simulation run and driven from a single logical thread of control, hence
/// no internal synchronization.
#[derive(Debug, Clone)]
pub struct UsageLedger {
    capacity: f64,
    reservations: Vec<Vec<Reservation>>,
}

impl UsageLedger {
    pub fn new(num_uplinks: usize, uplink_capacity: f64) -> Self {
        Self { capacity: uplink_capacity, reservations: vec![Vec::new(); num_uplinks] }
    }

    pub fn num_uplinks(&self) -> usize {
        self.reservations.len()
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Adds a reservation of `rate` on `uplink` over `[start, end)`.
    ///
    /// The reservation itself always succeeds. If the cumulative reserved
    /// rate now exceeds the uplink's nominal capacity at any instant within
    /// the new interval, the peak is reported as a `CapacityDeficit` event
    /// and logged; the booking is kept either way.
    pub fn reserve(&mut self, uplink: usize, start: i64, end: i64, rate: f64, flow: &FlowKey, src_rack: &str, dst_rack: &str) -> Option<CapacityDeficit> {
        let reservation = Reservation {
            flow: flow.clone(),
            src_rack: src_rack.to_string(),
            dst_rack: dst_rack.to_string(),
            start,
            end,
            rate,
        };

        self.reservations[uplink].push(reservation);

        let deficit = self.peak_overload(uplink, start, end);

        if let Some(ref deficit) = deficit {
            log::warn!(
                "Uplink {} oversubscribed at t = {}: reserved rate {:.3} exceeds capacity {:.3} (flow {}, {} -> {}).",
                uplink,
                deficit.instant,
                deficit.cumulative_rate,
                deficit.capacity,
                flow,
                src_rack,
                dst_rack,
            );
        }

        deficit
    }

    /// Capacity left on `uplink` at `instant`: nominal capacity minus the
    /// rates of all reservations whose interval covers the instant. May go
    /// negative when the uplink is oversubscribed.
    pub fn remaining(&self, uplink: usize, instant: i64) -> f64 {
        self.capacity - self.rate_at(uplink, instant)
    }

    /// All reservations currently booked on `uplink`, in booking order.
    pub fn reservations(&self, uplink: usize) -> &[Reservation] {
        &self.reservations[uplink]
    }

    fn rate_at(&self, uplink: usize, instant: i64) -> f64 {
        self.reservations[uplink].iter().filter(|r| r.start <= instant && instant < r.end).map(|r| r.rate).sum()
    }

    /// Searches the window `[start, end)` for the instant with the highest
    /// cumulative rate. The cumulative rate is piecewise constant and only
    /// changes where some overlapping reservation starts, so checking `start`
    /// plus every reservation start inside the window covers every level.
    fn peak_overload(&self, uplink: usize, start: i64, end: i64) -> Option<CapacityDeficit> {
        let mut candidates: Vec<i64> = vec![start];

        for reservation in &self.reservations[uplink] {
            if reservation.start > start && reservation.start < end {
                candidates.push(reservation.start);
            }
        }

        candidates.sort_unstable();
        candidates.dedup();

        let mut peak_instant = start;
        let mut peak_rate = f64::MIN;

        for instant in candidates {
            let rate = self.rate_at(uplink, instant);
            if rate > peak_rate {
                peak_rate = rate;
                peak_instant = instant;
            }
        }

        if peak_rate > self.capacity {
            return Some(CapacityDeficit { uplink, instant: peak_instant, cumulative_rate: peak_rate, capacity: self.capacity });
        }

        None
    }
}
