//! Periodic driver for the pipeline.
//!
//! The driver owns two kinds of worker threads: a high-frequency tick thread
//! that feeds a [`RollingRateSource`], and a single send worker that runs
//! [`StatusManager::send`] on a fixed interval. A slow or hung collector only
//! delays the send worker; ticks keep flowing. Because there is exactly one
//! send worker, an overdue send pushes the next trigger back instead of
//! overlapping it.
//!
//! Every registration pushes a revoke action on a [`Teardown`] stack, which
//! runs last-registered-first so nothing keeps running after something it
//! depends on has been stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::manager::StatusManager;
use crate::sources::RollingRateSource;

/// Longest a worker sleeps before re-checking its stop flag.
const STOP_POLL: Duration = Duration::from_millis(10);

type Revoke = Box<dyn FnOnce() + Send>;

/// Stack of revoke actions, run in reverse registration order.
#[derive(Default)]
pub struct Teardown {
    actions: Vec<(String, Revoke)>,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `revoke`, to run before everything registered earlier.
    pub fn push(&mut self, label: impl Into<String>, revoke: impl FnOnce() + Send + 'static) {
        self.actions.push((label.into(), Box::new(revoke)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Labels in the order they will be revoked.
    pub fn pending(&self) -> Vec<&str> {
        self.actions.iter().rev().map(|(l, _)| l.as_str()).collect()
    }

    /// Run every revoke action, newest first.
    pub fn run(&mut self) {
        while let Some((label, revoke)) = self.actions.pop() {
            debug!("revoking {label}");
            revoke();
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.run();
    }
}

/// Sleep until `deadline`, waking early if `running` clears.
/// Returns whether the worker should keep going.
fn sleep_until(deadline: Instant, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(STOP_POLL));
    }
}

/// Run `task` every `period` after `initial_delay` until `running` clears.
///
/// Fixed-rate: deadlines advance by `period`; if a run overruns, the next
/// one starts immediately and the schedule re-anchors to now.
fn run_periodic(
    running: &AtomicBool,
    period: Duration,
    initial_delay: Duration,
    mut task: impl FnMut(),
) {
    let mut next = Instant::now() + initial_delay;
    while sleep_until(next, running) {
        task();
        next += period;
        let now = Instant::now();
        if next < now {
            next = now;
        }
    }
}

/// Owns the periodic workers and their teardown order.
pub struct Driver {
    teardown: Teardown,
}

impl Driver {
    /// Empty driver with nothing registered.
    pub fn new() -> Self {
        Self {
            teardown: Teardown::new(),
        }
    }

    /// Start ticking `rolling` every `tick_period` and, when `interval` is
    /// set, sending through `manager` every `interval`.
    pub fn start(
        manager: Arc<StatusManager>,
        rolling: Arc<RollingRateSource>,
        tick_period: Duration,
        interval: Option<Duration>,
    ) -> Self {
        let mut driver = Self::new();

        driver.spawn_periodic("tick", tick_period, Duration::ZERO, move || rolling.on_tick());

        match interval {
            Some(interval) => {
                info!(
                    "sending {} sources every {}s",
                    manager.source_count(),
                    interval.as_secs_f64()
                );
                driver.spawn_periodic("send", interval, interval, move || {
                    manager.send();
                });
            }
            None => warn!("interval <= 0, periodic sending disabled"),
        }

        driver
    }

    /// Spawn a worker thread running `task` periodically and register its
    /// shutdown.
    ///
    /// A zero period is treated as one millisecond.
    pub fn spawn_periodic(
        &mut self,
        label: &str,
        period: Duration,
        initial_delay: Duration,
        task: impl FnMut() + Send + 'static,
    ) {
        let period = period.max(Duration::from_millis(1));
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let spawned = thread::Builder::new()
            .name(format!("trapper-{label}"))
            .spawn(move || run_periodic(&flag, period, initial_delay, task));

        let handle: JoinHandle<()> = match spawned {
            Ok(h) => h,
            Err(e) => {
                warn!("failed to spawn {label} worker: {e}");
                return;
            }
        };
        debug!("started {label} worker, period {period:?}");

        let label = label.to_string();
        let name = label.clone();
        self.teardown.push(label, move || {
            running.store(false, Ordering::Release);
            if handle.join().is_err() {
                warn!("{name} worker panicked");
            }
        });
    }

    /// Register an arbitrary revoke action, such as unhooking an event
    /// listener.
    pub fn on_shutdown(&mut self, label: impl Into<String>, revoke: impl FnOnce() + Send + 'static) {
        self.teardown.push(label, revoke);
    }

    /// Labels in the order they will be revoked.
    pub fn pending(&self) -> Vec<&str> {
        self.teardown.pending()
    }

    /// Stop everything, newest registration first.
    pub fn shutdown(mut self) {
        self.teardown.run();
        info!("driver stopped");
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU64;

    use crate::error::Result;
    use crate::manager::ManagerConfig;
    use crate::sender::{SendResult, StatusSender};
    use crate::status::Status;

    struct CountingSender {
        sends: Arc<AtomicU64>,
        delay: Duration,
    }

    impl StatusSender for CountingSender {
        fn send(&self, _statuses: &[Status]) -> Result<SendResult> {
            thread::sleep(self.delay);
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(SendResult::default())
        }

        fn destination(&self) -> String {
            "counting".to_string()
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    #[test]
    fn test_teardown_runs_lifo() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut t = Teardown::new();
        for name in ["tick", "events", "send", "command"] {
            let order = Arc::clone(&order);
            t.push(name, move || order.lock().unwrap().push(name));
        }
        assert_eq!(t.pending(), vec!["command", "send", "events", "tick"]);
        t.run();
        assert!(t.is_empty());
        assert_eq!(
            *order.lock().unwrap(),
            vec!["command", "send", "events", "tick"]
        );
    }

    #[test]
    fn test_teardown_runs_on_drop() {
        let ran = Arc::new(AtomicBool::new(false));
        {
            let mut t = Teardown::new();
            let ran = Arc::clone(&ran);
            t.push("x", move || ran.store(true, Ordering::SeqCst));
            assert_eq!(t.len(), 1);
        }
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_teardown_runs_once() {
        let count = Arc::new(AtomicU64::new(0));
        let mut t = Teardown::new();
        let c = Arc::clone(&count);
        t.push("x", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        t.run();
        t.run();
        drop(t);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    // -----------------------------------------------------------------------
    // Periodic workers
    // -----------------------------------------------------------------------

    #[test]
    fn test_periodic_worker_runs_and_stops() {
        let runs = Arc::new(AtomicU64::new(0));
        let mut d = Driver::new();
        let r = Arc::clone(&runs);
        d.spawn_periodic("count", Duration::from_millis(5), Duration::ZERO, move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(100));
        d.shutdown();
        let after = runs.load(Ordering::SeqCst);
        assert!(after >= 2, "ran {after} times");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(runs.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_start_ticks_and_sends() {
        let sends = Arc::new(AtomicU64::new(0));
        let rolling = Arc::new(RollingRateSource::new());
        let manager = Arc::new(
            StatusManager::new(
                ManagerConfig::new("srv1")
                    .sender(CountingSender {
                        sends: Arc::clone(&sends),
                        delay: Duration::ZERO,
                    })
                    .source(rolling.clone()),
            )
            .unwrap(),
        );
        let d = Driver::start(
            manager,
            Arc::clone(&rolling),
            Duration::from_millis(5),
            Some(Duration::from_millis(40)),
        );
        assert_eq!(d.pending(), vec!["send", "tick"]);
        thread::sleep(Duration::from_millis(200));
        d.shutdown();
        assert!(rolling.tick_count() > 5);
        assert!(sends.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_disabled_interval_registers_only_ticks() {
        let rolling = Arc::new(RollingRateSource::new());
        let manager = Arc::new(
            StatusManager::new(ManagerConfig::new("srv1").sender(CountingSender {
                sends: Arc::new(AtomicU64::new(0)),
                delay: Duration::ZERO,
            }))
            .unwrap(),
        );
        let d = Driver::start(manager, rolling, Duration::from_millis(50), None);
        assert_eq!(d.pending(), vec!["tick"]);
        d.shutdown();
    }

    #[test]
    fn test_slow_send_does_not_stall_ticks() {
        let sends = Arc::new(AtomicU64::new(0));
        let rolling = Arc::new(RollingRateSource::new());
        let manager = Arc::new(
            StatusManager::new(ManagerConfig::new("srv1").sender(CountingSender {
                sends: Arc::clone(&sends),
                delay: Duration::from_millis(150),
            }))
            .unwrap(),
        );
        let d = Driver::start(
            manager,
            Arc::clone(&rolling),
            Duration::from_millis(5),
            Some(Duration::from_millis(10)),
        );
        thread::sleep(Duration::from_millis(100));
        // The first send is still sleeping; ticks kept coming.
        assert!(rolling.tick_count() >= 5, "ticks {}", rolling.tick_count());
        d.shutdown();
        assert!(sends.load(Ordering::SeqCst) >= 1);
    }
}
