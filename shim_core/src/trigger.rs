//! Scanner trigger counter and timestamp shared between the edge handler and
//! the control loop.
//!
//! The pair is published through a single-writer seqlock: readers never see
//! a counter from one edge combined with the timestamp of another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering, fence};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct TriggerCell {
    epoch: Instant,
    seq: AtomicU32,
    slices: AtomicU32,
    /// Last edge, in nanoseconds since `epoch`.
    stamp_ns: AtomicU64,
}

/// Consistent view of the trigger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSnapshot {
    /// Edges seen since start.
    pub slice: u32,
    /// Time of the last edge (the epoch before the first edge).
    pub at: Instant,
}

/// Read side, cloneable across threads.
#[derive(Debug, Clone)]
pub struct TriggerClock {
    cell: Arc<TriggerCell>,
}

/// Write side. There is exactly one per `TriggerClock`; move it into the
/// interrupt callback.
#[derive(Debug)]
pub struct TriggerEdge {
    cell: Arc<TriggerCell>,
}

impl TriggerClock {
    /// New trigger state with no edges; timestamps are kept relative to `epoch`.
    pub fn new(epoch: Instant) -> (TriggerEdge, TriggerClock) {
        let cell = Arc::new(TriggerCell {
            epoch,
            seq: AtomicU32::new(0),
            slices: AtomicU32::new(0),
            stamp_ns: AtomicU64::new(0),
        });
        (TriggerEdge { cell: cell.clone() }, TriggerClock { cell })
    }

    pub fn snapshot(&self) -> TriggerSnapshot {
        let cell = &self.cell;
        loop {
            let s1 = cell.seq.load(Ordering::Acquire);
            if s1 & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let slice = cell.slices.load(Ordering::Relaxed);
            let ns = cell.stamp_ns.load(Ordering::Relaxed);
            fence(Ordering::Acquire);
            if cell.seq.load(Ordering::Relaxed) == s1 {
                return TriggerSnapshot {
                    slice,
                    at: cell.epoch + Duration::from_nanos(ns),
                };
            }
        }
    }

    #[inline]
    pub fn current_slice(&self) -> u32 {
        self.cell.slices.load(Ordering::Acquire)
    }

    pub fn last_trigger_time(&self) -> Instant {
        self.snapshot().at
    }

    /// Time from the last edge to `reference`, zero if the edge is later.
    pub fn elapsed_since_trigger(&self, reference: Instant) -> Duration {
        reference.saturating_duration_since(self.last_trigger_time())
    }
}

impl TriggerEdge {
    /// Record one trigger edge observed at `now`.
    pub fn on_edge(&self, now: Instant) {
        let cell = &self.cell;
        #[allow(clippy::cast_possible_truncation)]
        let ns = now.saturating_duration_since(cell.epoch).as_nanos().min(u128::from(u64::MAX)) as u64;
        let s = cell.seq.load(Ordering::Relaxed);
        cell.seq.store(s.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        let n = cell.slices.load(Ordering::Relaxed).wrapping_add(1);
        cell.slices.store(n, Ordering::Relaxed);
        cell.stamp_ns.store(ns, Ordering::Relaxed);
        cell.seq.store(s.wrapping_add(2), Ordering::Release);
        tracing::trace!(slice = n, "trigger edge");
    }

    /// Read side for this edge source.
    pub fn clock(&self) -> TriggerClock {
        TriggerClock {
            cell: self.cell.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_with_epoch_stamp() {
        let epoch = Instant::now();
        let (_edge, clock) = TriggerClock::new(epoch);
        assert_eq!(
            clock.snapshot(),
            TriggerSnapshot {
                slice: 0,
                at: epoch
            }
        );
    }

    #[test]
    fn edges_advance_counter_and_stamp() {
        let epoch = Instant::now();
        let (edge, clock) = TriggerClock::new(epoch);
        edge.on_edge(epoch + Duration::from_millis(100));
        edge.on_edge(epoch + Duration::from_millis(300));
        assert_eq!(clock.current_slice(), 2);
        assert_eq!(clock.last_trigger_time(), epoch + Duration::from_millis(300));
        assert_eq!(
            clock.elapsed_since_trigger(epoch + Duration::from_millis(450)),
            Duration::from_millis(150)
        );
        assert_eq!(clock.elapsed_since_trigger(epoch), Duration::ZERO);
    }

    #[test]
    fn snapshot_pairs_stay_consistent_across_threads() {
        let epoch = Instant::now();
        let (edge, clock) = TriggerClock::new(epoch);
        let writer = std::thread::spawn(move || {
            for i in 1..=20_000u64 {
                edge.on_edge(epoch + Duration::from_micros(i));
            }
        });
        for _ in 0..20_000 {
            let snap = clock.snapshot();
            let expected = epoch + Duration::from_micros(u64::from(snap.slice));
            assert_eq!(snap.at, expected);
        }
        writer.join().unwrap();
        assert_eq!(clock.current_slice(), 20_000);
    }
}
