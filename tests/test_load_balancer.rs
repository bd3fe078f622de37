use uplink_balancer::domain::flow::{Flow, FlowKey};
use uplink_balancer::domain::load_balancer::{BalanceOutcome, LoadBalancer};
use uplink_balancer::domain::usage_ledger::UsageLedger;
use uplink_balancer::error::Error;

use std::collections::HashSet;

fn flow(job: &str, name: &str, src: &str, dst: &str, start: i64, end: i64, rate: f64) -> Flow {
    Flow::new(job, name, 1, src, dst, start, end, rate)
}

fn key(job: &str, name: &str) -> FlowKey {
    FlowKey { job_id: job.to_string(), flow_id: name.to_string(), iteration: 1 }
}

fn uplink_of(outcome: &BalanceOutcome, job: &str, name: &str) -> usize {
    let shares = outcome.decisions.get(&key(job, name)).unwrap_or_else(|| panic!("no decision for {}/{}", job, name));

    assert_eq!(shares.len(), 1, "single-path routing must yield exactly one uplink share");
    assert_eq!(shares[0].1, 1.0, "single-path weight must be 1.0");
    shares[0].0
}

#[test]
fn test_scenario_a_shared_source_gets_two_uplinks() {
    // Two flows, same job and start time, both sourced at rack-a. Degree of
    // rack-a-L is 2, so the colors differ and so must the uplinks.
    let flows = vec![
        flow("job-0", "f1", "rack-a", "rack-b", 0, 10, 1.0),
        flow("job-0", "f2", "rack-a", "rack-c", 0, 10, 1.0),
    ];

    let balancer = LoadBalancer::new(4);
    let mut ledger = UsageLedger::new(4, 10.0);
    let outcome = balancer.balance(&flows, &mut ledger).unwrap();

    let first = uplink_of(&outcome, "job-0", "f1");
    let second = uplink_of(&outcome, "job-0", "f2");

    assert_ne!(first, second, "contending flows must not share an uplink when enough uplinks exist");
}

#[test]
fn test_scenario_b_isolated_flow_gets_uplink_zero() {
    let flows = vec![flow("job-0", "f1", "rack-a", "rack-b", 5, 15, 1.0)];

    let balancer = LoadBalancer::new(8);
    let mut ledger = UsageLedger::new(8, 10.0);
    let outcome = balancer.balance(&flows, &mut ledger).unwrap();

    assert_eq!(uplink_of(&outcome, "job-0", "f1"), 0, "a lone edge is color 1 and therefore uplink 0");
}

#[test]
fn test_every_uplink_in_range_even_past_wraparound() {
    // Five parallel flows on the same rack pair with only two uplinks: colors
    // 1..=5 wrap onto uplinks {0, 1}. The assigner must never refuse.
    let flows: Vec<Flow> = (0..5).map(|n| flow("job-0", &format!("f{}", n), "rack-a", "rack-b", 0, 10, 1.0)).collect();

    let balancer = LoadBalancer::new(2);
    let mut ledger = UsageLedger::new(2, 100.0);
    let outcome = balancer.balance(&flows, &mut ledger).unwrap();

    assert_eq!(outcome.decisions.len(), 5);
    for shares in outcome.decisions.values() {
        assert!(shares[0].0 < 2, "uplink {} out of range", shares[0].0);
    }
}

#[test]
fn test_affected_window_spans_all_flows() {
    let flows = vec![
        flow("job-0", "f1", "rack-a", "rack-b", 20, 30, 1.0),
        flow("job-1", "f2", "rack-c", "rack-d", 5, 12, 1.0),
        flow("job-2", "f3", "rack-a", "rack-d", 8, 40, 1.0),
    ];

    let balancer = LoadBalancer::new(4);
    let mut ledger = UsageLedger::new(4, 10.0);
    let outcome = balancer.balance(&flows, &mut ledger).unwrap();

    let window = outcome.window.expect("non-empty input must produce a window");
    assert_eq!(window.min_time, 5);
    assert_eq!(window.max_time, 40);
}

#[test]
fn test_empty_input_yields_absent_window() {
    let balancer = LoadBalancer::new(4);
    let mut ledger = UsageLedger::new(4, 10.0);
    let outcome = balancer.balance(&[], &mut ledger).unwrap();

    assert!(outcome.decisions.is_empty());
    assert!(outcome.window.is_none(), "empty input must yield an absent window, not a sentinel");
}

#[test]
fn test_determinism_across_repeated_runs() {
    let flows: Vec<Flow> = (0..20)
        .map(|n| flow(&format!("job-{}", n % 3), &format!("f{}", n), &format!("rack-{}", n % 4), &format!("rack-{}", (n + 2) % 5), (n % 2) as i64, 10, 1.0))
        .collect();

    let balancer = LoadBalancer::new(3);

    let mut ledger_a = UsageLedger::new(3, 100.0);
    let mut ledger_b = UsageLedger::new(3, 100.0);

    let first = balancer.balance(&flows, &mut ledger_a).unwrap();
    let second = balancer.balance(&flows, &mut ledger_b).unwrap();

    assert_eq!(first.decisions.len(), second.decisions.len());
    for (flow_key, shares) in &first.decisions {
        assert_eq!(second.decisions.get(flow_key), Some(shares), "decision for {} differs between runs", flow_key);
    }
}

#[test]
fn test_same_start_time_different_jobs_form_separate_batches() {
    // Two jobs share start time 0 and rack-a as source. Separate batches mean
    // the flows never contend with each other, so both may land on uplink 0.
    let flows = vec![
        flow("job-a", "f1", "rack-a", "rack-b", 0, 10, 1.0),
        flow("job-b", "f1", "rack-a", "rack-c", 0, 10, 1.0),
    ];

    let balancer = LoadBalancer::new(4);
    let mut ledger = UsageLedger::new(4, 10.0);
    let outcome = balancer.balance(&flows, &mut ledger).unwrap();

    assert_eq!(uplink_of(&outcome, "job-a", "f1"), 0);
    assert_eq!(uplink_of(&outcome, "job-b", "f1"), 0);
}

#[test]
fn test_decisions_are_booked_on_the_ledger() {
    let flows = vec![
        flow("job-0", "f1", "rack-a", "rack-b", 0, 10, 3.0),
        flow("job-0", "f2", "rack-a", "rack-c", 0, 10, 2.0),
    ];

    let balancer = LoadBalancer::new(2);
    let mut ledger = UsageLedger::new(2, 10.0);
    balancer.balance(&flows, &mut ledger).unwrap();

    let booked: usize = (0..2).map(|u| ledger.reservations(u).len()).sum();
    assert_eq!(booked, 2, "every decision must be reserved on the ledger");

    // The two flows landed on distinct uplinks, so each uplink carries one rate.
    let occupied: Vec<f64> = (0..2).map(|u| 10.0 - ledger.remaining(u, 5)).collect();
    let mut sorted = occupied.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(sorted, vec![2.0, 3.0]);
}

#[test]
fn test_oversubscription_is_reported_not_refused() {
    // Three parallel flows, one uplink, capacity below the combined rate.
    let flows: Vec<Flow> = (0..3).map(|n| flow("job-0", &format!("f{}", n), "rack-a", "rack-b", 0, 10, 4.0)).collect();

    let balancer = LoadBalancer::new(1);
    let mut ledger = UsageLedger::new(1, 10.0);
    let outcome = balancer.balance(&flows, &mut ledger).unwrap();

    assert_eq!(outcome.decisions.len(), 3, "oversubscription must never block assignment");
    assert!(!outcome.deficits.is_empty(), "12.0 reserved on capacity 10.0 must report a deficit");
    assert_eq!(ledger.remaining(0, 5), -2.0);
}

#[test]
fn test_undersized_ledger_is_an_error_not_a_panic() {
    // Three parallel flows force colors up to 3, so the balancer would pick
    // uplink 2 while the ledger only tracks uplinks 0 and 1. The mismatch
    // must surface as an error before any booking.
    let flows: Vec<Flow> = (0..3).map(|n| flow("job-0", &format!("f{}", n), "rack-a", "rack-b", 0, 10, 1.0)).collect();

    let balancer = LoadBalancer::new(4);
    let mut ledger = UsageLedger::new(2, 10.0);
    let err = balancer.balance(&flows, &mut ledger).unwrap_err();

    assert!(matches!(err, Error::InternalInvariant(_)), "expected InternalInvariant, got {:?}", err);
    assert!(ledger.reservations(0).is_empty() && ledger.reservations(1).is_empty());
}

#[test]
fn test_validation_runs_before_any_booking() {
    // Second flow is inverted; nothing at all may reach the ledger.
    let flows = vec![
        flow("job-0", "f1", "rack-a", "rack-b", 0, 10, 1.0),
        flow("job-0", "f2", "rack-a", "rack-c", 10, 5, 1.0),
    ];

    let balancer = LoadBalancer::new(2);
    let mut ledger = UsageLedger::new(2, 10.0);
    let err = balancer.balance(&flows, &mut ledger).unwrap_err();

    assert!(matches!(err, Error::InvalidFlow { .. }), "expected InvalidFlow, got {:?}", err);
    assert!(ledger.reservations(0).is_empty() && ledger.reservations(1).is_empty());
}

#[test]
fn test_rack_inventory_rejects_unknown_racks() {
    let inventory: HashSet<String> = ["rack-a".to_string(), "rack-b".to_string()].into_iter().collect();
    let balancer = LoadBalancer::new(2).with_rack_inventory(inventory);

    let mut ledger = UsageLedger::new(2, 10.0);
    let err = balancer.balance(&[flow("job-0", "f1", "rack-a", "rack-z", 0, 10, 1.0)], &mut ledger).unwrap_err();

    assert!(err.to_string().contains("unknown rack identifier 'rack-z'"), "unexpected error: {}", err);
}

#[test]
fn test_balance_flow_file_round_trip() {
    let json = r#"{
        "flows": [
            {
                "jobId": "job-0", "flowId": "f1", "iteration": 1,
                "srcRack": "rack-a", "dstRack": "rack-b",
                "effStartTime": 0, "effEndTime": 10, "rate": 1.5
            },
            {
                "jobId": "job-0", "flowId": "f2", "iteration": 1,
                "srcRack": "rack-a", "dstRack": "rack-c",
                "effStartTime": 0, "effEndTime": 10, "rate": 1.5
            }
        ]
    }"#;

    let path = std::env::temp_dir().join("uplink_balancer_test_flows.json");
    std::fs::write(&path, json).unwrap();

    let balancer = LoadBalancer::new(4);
    let mut ledger = UsageLedger::new(4, 10.0);
    let outcome = uplink_balancer::balance_flow_file(path.to_str().unwrap(), &balancer, &mut ledger).unwrap();

    std::fs::remove_file(&path).ok();

    assert_eq!(outcome.decisions.len(), 2);
    assert_ne!(uplink_of(&outcome, "job-0", "f1"), uplink_of(&outcome, "job-0", "f2"));
}
