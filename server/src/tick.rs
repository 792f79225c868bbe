//! Fixed-rate server loop.
//!
//! Each iteration prunes inactive connections when the housekeeping interval
//! has passed, pumps the network, advances the world with the current time
//! and then sleeps off whatever is left of the tick budget. An overrun tick
//! is followed immediately by the next one; lost time is never made up.

use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the server's single time base.
pub trait Clock {
    /// Milliseconds since the loop started.
    fn now(&self) -> u64;

    fn sleep(&self, duration: Duration);
}

/// Wall clock starting at zero when created.
pub struct GameClock {
    start: Instant,
}

impl GameClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for GameClock {
    fn now(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// The work done by one tick, in the order it is called.
pub trait TickHandler {
    fn prune_inactive(&mut self, now: u64);

    fn heartbeat(&mut self, now: u64);

    fn update(&mut self, now: u64);
}

/// What happened during one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub housekeeping: bool,
    pub work_ms: u64,
    pub slept_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    /// Ticks whose work took longer than the budget.
    pub late_ticks: u64,
    pub max_work_ms: u64,
}

pub struct TickLoop<C: Clock> {
    clock: C,
    tick_ms: u64,
    housekeeping_ms: u64,
    last_housekeeping: u64,
    running: Arc<AtomicBool>,
    stats: TickStats,
}

impl<C: Clock> TickLoop<C> {
    pub fn new(clock: C, tick: Duration, housekeeping: Duration) -> Self {
        let last_housekeeping = clock.now();
        Self {
            clock,
            tick_ms: tick.as_millis() as u64,
            housekeeping_ms: housekeeping.as_millis() as u64,
            last_housekeeping,
            running: Arc::new(AtomicBool::new(true)),
            stats: TickStats::default(),
        }
    }

    /// Flag that keeps the loop going; clearing it stops the loop at the
    /// start of the next iteration.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn run_iteration(&mut self, handler: &mut dyn TickHandler) -> TickReport {
        let start = self.clock.now();

        let housekeeping = start.saturating_sub(self.last_housekeeping) > self.housekeeping_ms;
        if housekeeping {
            handler.prune_inactive(start);
            self.last_housekeeping = start;
        }

        handler.heartbeat(start);
        handler.update(start);

        let work_ms = self.clock.now().saturating_sub(start);
        self.stats.ticks += 1;
        self.stats.max_work_ms = self.stats.max_work_ms.max(work_ms);

        let slept_ms = match self.tick_ms.checked_sub(work_ms) {
            Some(remaining) if remaining > 0 => {
                self.clock.sleep(Duration::from_millis(remaining));
                remaining
            }
            _ => {
                if work_ms > self.tick_ms {
                    self.stats.late_ticks += 1;
                    debug!("Tick took {}ms, budget is {}ms", work_ms, self.tick_ms);
                }
                0
            }
        };

        TickReport {
            housekeeping,
            work_ms,
            slept_ms,
        }
    }

    /// Ticks until the running flag is cleared.
    pub fn run(&mut self, handler: &mut dyn TickHandler) {
        info!(
            "Tick loop started ({}ms ticks, housekeeping every {}s)",
            self.tick_ms,
            self.housekeeping_ms / 1000
        );
        while self.is_running() {
            self.run_iteration(handler);
        }
        info!(
            "Tick loop stopped after {} ticks ({} late, slowest {}ms)",
            self.stats.ticks, self.stats.late_ticks, self.stats.max_work_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct ManualClock {
        now: Rc<Cell<u64>>,
        sleeps: Rc<RefCell<Vec<u64>>>,
    }

    impl ManualClock {
        fn advance(&self, ms: u64) {
            self.now.set(self.now.get() + ms);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> u64 {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            let ms = duration.as_millis() as u64;
            self.sleeps.borrow_mut().push(ms);
            self.advance(ms);
        }
    }

    /// Pretends each update takes `work_ms`.
    struct Busy {
        clock: ManualClock,
        work_ms: u64,
        calls: Vec<(&'static str, u64)>,
    }

    impl TickHandler for Busy {
        fn prune_inactive(&mut self, now: u64) {
            self.calls.push(("prune", now));
        }

        fn heartbeat(&mut self, now: u64) {
            self.calls.push(("heartbeat", now));
        }

        fn update(&mut self, now: u64) {
            self.calls.push(("update", now));
            self.clock.advance(self.work_ms);
        }
    }

    fn setup(work_ms: u64) -> (TickLoop<ManualClock>, Busy, ManualClock) {
        let clock = ManualClock::default();
        let tick = TickLoop::new(
            clock.clone(),
            Duration::from_millis(5),
            Duration::from_secs(60),
        );
        let busy = Busy {
            clock: clock.clone(),
            work_ms,
            calls: Vec::new(),
        };
        (tick, busy, clock)
    }

    #[test]
    fn test_sleeps_off_remaining_budget() {
        let (mut tick, mut busy, clock) = setup(2);
        let report = tick.run_iteration(&mut busy);
        assert_eq!(report.work_ms, 2);
        assert_eq!(report.slept_ms, 3);
        assert_eq!(*clock.sleeps.borrow(), vec![3]);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn test_overrun_does_not_sleep_or_catch_up() {
        let (mut tick, mut busy, clock) = setup(8);
        tick.run_iteration(&mut busy);
        busy.work_ms = 1;
        let second = tick.run_iteration(&mut busy);

        assert!(clock.sleeps.borrow().len() == 1);
        assert_eq!(second.slept_ms, 4);
        assert_eq!(tick.stats().late_ticks, 1);
        assert_eq!(tick.stats().max_work_ms, 8);
    }

    #[test]
    fn test_order_and_time_base() {
        let (mut tick, mut busy, clock) = setup(1);
        clock.advance(60_001);
        tick.run_iteration(&mut busy);
        assert_eq!(
            busy.calls,
            vec![("prune", 60_001), ("heartbeat", 60_001), ("update", 60_001)]
        );
    }

    #[test]
    fn test_housekeeping_at_most_once_per_interval() {
        let (mut tick, mut busy, _clock) = setup(1);
        let mut prunes = Vec::new();
        // Five simulated minutes of 5ms ticks.
        for _ in 0..60_000 {
            if tick.run_iteration(&mut busy).housekeeping {
                prunes.push(tick.clock().now());
            }
        }
        assert!(prunes.len() >= 4);
        for pair in prunes.windows(2) {
            assert!(pair[1] - pair[0] >= 60_000);
        }
    }

    #[test]
    fn test_stop_is_observed_before_next_iteration() {
        let (mut tick, mut busy, _clock) = setup(1);
        tick.stop();
        tick.run(&mut busy);
        assert!(busy.calls.is_empty());
    }
}
