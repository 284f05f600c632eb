use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use rstest::rstest;
use shim_hardware::SimulatedTrigger;

#[rstest]
fn simulated_trigger_fires_repeatedly() {
    let edges = Arc::new(AtomicU32::new(0));
    let edges_bg = edges.clone();
    let trig = SimulatedTrigger::spawn(Duration::from_millis(2), move || {
        edges_bg.fetch_add(1, Ordering::Relaxed);
    });

    let mut waited = Duration::ZERO;
    while edges.load(Ordering::Relaxed) < 3 && waited < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(5));
        waited += Duration::from_millis(5);
    }
    drop(trig);
    assert!(edges.load(Ordering::Relaxed) >= 3, "expected at least 3 edges");
}

#[rstest]
fn simulated_trigger_stops_after_drop() {
    let edges = Arc::new(AtomicU32::new(0));
    let edges_bg = edges.clone();
    let trig = SimulatedTrigger::spawn(Duration::from_millis(1), move || {
        edges_bg.fetch_add(1, Ordering::Relaxed);
    });
    thread::sleep(Duration::from_millis(10));
    drop(trig);

    let after_drop = edges.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(10));
    assert_eq!(edges.load(Ordering::Relaxed), after_drop);
}

#[rstest]
fn long_period_trigger_drops_promptly() {
    let trig = SimulatedTrigger::spawn(Duration::from_secs(60), || {});
    let t0 = std::time::Instant::now();
    drop(trig);
    assert!(t0.elapsed() < Duration::from_secs(5));
}
