#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use shim_core::{ShimTable, TriggerClock, TriggerEdge};
use shim_traits::Clock;
use shim_traits::clock::ManualClock;

/// Manual clock that fires scheduled trigger edges while the sequencer sleeps.
pub struct ScriptedClock {
    inner: ManualClock,
    t0: Instant,
    edge: TriggerEdge,
    pending: Mutex<VecDeque<Duration>>,
    min_step: Duration,
}

impl ScriptedClock {
    /// `edges` are offsets from now, in ascending order.
    pub fn new(edges: Vec<Duration>) -> (Arc<Self>, TriggerClock) {
        let inner = ManualClock::new();
        let t0 = inner.now();
        let (edge, trigger) = TriggerClock::new(t0);
        let clock = Arc::new(Self {
            inner,
            t0,
            edge,
            pending: Mutex::new(edges.into()),
            min_step: Duration::from_millis(1),
        });
        (clock, trigger)
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.elapsed()
    }

    fn fire_due(&self) {
        let now = self.inner.elapsed();
        let mut pending = self.pending.lock().unwrap();
        while let Some(&at) = pending.front() {
            if at > now {
                break;
            }
            pending.pop_front();
            self.edge.on_edge(self.t0 + at);
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> Instant {
        self.inner.now()
    }

    fn sleep(&self, d: Duration) {
        self.inner.advance(d.max(self.min_step));
        self.fire_due();
    }
}

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Edges every `period` ms in `[from, to]`.
pub fn every(period: u64, from: u64, to: u64) -> Vec<Duration> {
    (from..=to).step_by(period as usize).map(ms).collect()
}

/// Five-column table: DAC 0 reads column 4, DAC 1 reads column 0.
pub fn table5(rows: &[(f32, f32)]) -> ShimTable {
    let rows: Vec<Vec<f32>> = rows
        .iter()
        .map(|&(ch0, ch1)| vec![ch1, 0.0, 0.0, 0.0, ch0])
        .collect();
    ShimTable::from_rows(&rows).unwrap()
}

pub fn code(amps: f32) -> u16 {
    shim_core::quantize(amps).0
}
