//! RollingRateSource - per-second tick rate averaged over sliding windows.
//!
//! The host calls [`RollingRateSource::on_tick`] once per scheduler tick. Each
//! window keeps the timestamps of the ticks that fall inside it in a ring
//! preallocated to the window's capacity at the target cadence, so the tick
//! path does not reallocate (windows longer than 65536 slots reserve that
//! much and grow on demand). The derived rate is published as `f64` bits in an
//! atomic; readers on the reporting path never touch the rings.
//!
//! With `n` samples inside a window of `w` seconds and a target cadence of
//! `hz`, the reported rate is `min(hz * w, n) / w`. Before the first full
//! window has elapsed, the rate is `(n - 1) / elapsed`. Both are capped at
//! `hz` and never negative or NaN.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::source::{MetricSource, SourceInfo, SourceKind};
use crate::status::{Reading, StatusValue};

/// Default target cadence in ticks per second.
pub const DEFAULT_TICK_HZ: u32 = 20;
/// Highest supported target cadence.
pub const MAX_TICK_HZ: u32 = 1000;
/// Ring slots reserved up front per window. Longer rings grow on demand.
const MAX_PREALLOC: usize = 1 << 16;

/// Default averaging windows.
pub const DEFAULT_WINDOWS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(15),
];

/// Key prefix for the per-window rates.
pub const RATE_KEY: &str = "tick_rate";
/// Key of the total tick count.
pub const COUNT_KEY: &str = "tick_count";

/// One averaging window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindow {
    pub span: Duration,
    pub label: String,
}

impl RateWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            label: label_for(span),
            span,
        }
    }

    /// Reported key, e.g. `tick_rate.5s`.
    pub fn key(&self) -> String {
        format!("{RATE_KEY}.{}", self.label)
    }
}

/// `1s`, `15s`, `2m`, `1500ms`.
fn label_for(span: Duration) -> String {
    let ms = span.as_millis();
    if ms % 60_000 == 0 && ms > 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

/// Samples a window can hold at `tick_hz`: one per expected tick plus one.
/// Saturates instead of overflowing for very long spans.
fn ring_limit(tick_hz: u32, span: Duration) -> usize {
    let slots = (f64::from(tick_hz) * span.as_secs_f64()).ceil();
    if slots.is_finite() && slots < usize::MAX as f64 {
        (slots as usize).saturating_add(1)
    } else {
        usize::MAX
    }
}

/// Single-writer ring state, touched only by the tick path.
struct TickState {
    first_tick: Option<u64>,
    rings: Vec<VecDeque<u64>>,
    limits: Vec<usize>,
}

pub struct RollingRateSource {
    info: SourceInfo,
    tick_hz: u32,
    windows: Vec<RateWindow>,
    epoch: Instant,
    state: Mutex<TickState>,
    rates: Arc<[AtomicU64]>,
    ticks: Arc<AtomicU64>,
}

impl RollingRateSource {
    /// Source with the default cadence and windows.
    pub fn new() -> Self {
        Self::with_windows(DEFAULT_TICK_HZ, &DEFAULT_WINDOWS)
    }

    /// Source with an explicit target cadence and set of windows.
    ///
    /// The cadence is clamped to `1..=MAX_TICK_HZ`; zero-length windows
    /// are dropped.
    pub fn with_windows(tick_hz: u32, spans: &[Duration]) -> Self {
        let tick_hz = tick_hz.clamp(1, MAX_TICK_HZ);
        let windows: Vec<RateWindow> = spans
            .iter()
            .filter(|s| !s.is_zero())
            .map(|s| RateWindow::new(*s))
            .collect();

        let limits: Vec<usize> = windows
            .iter()
            .map(|w| ring_limit(tick_hz, w.span))
            .collect();
        let rings = limits
            .iter()
            .map(|&n| VecDeque::with_capacity(n.min(MAX_PREALLOC)))
            .collect();
        let rates: Arc<[AtomicU64]> = windows
            .iter()
            .map(|_| AtomicU64::new(0f64.to_bits()))
            .collect();

        Self {
            info: SourceInfo {
                name: "tick_rate",
                description: "Host tick rate averaged over sliding windows",
                kind: SourceKind::RollingRate,
            },
            tick_hz,
            windows,
            epoch: Instant::now(),
            state: Mutex::new(TickState {
                first_tick: None,
                rings,
                limits,
            }),
            rates,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    pub fn windows(&self) -> &[RateWindow] {
        &self.windows
    }

    /// Record a tick at the current instant.
    pub fn on_tick(&self) {
        let now = self.epoch.elapsed().as_nanos() as u64;
        self.on_tick_at(now);
    }

    /// Record a tick at `now_nanos`, a monotonic timestamp in nanoseconds.
    ///
    /// Timestamps must not go backwards; a stale timestamp is clamped to the
    /// newest one already recorded.
    pub fn on_tick_at(&self, now_nanos: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let first = *state.first_tick.get_or_insert(now_nanos);
        let max_rate = f64::from(self.tick_hz);

        let TickState { rings, limits, .. } = &mut *state;
        for (i, (ring, &limit)) in rings.iter_mut().zip(limits.iter()).enumerate() {
            let span = self.windows[i].span;
            let span_nanos = u64::try_from(span.as_nanos()).unwrap_or(u64::MAX);
            let now = ring.back().map_or(now_nanos, |&last| now_nanos.max(last));

            while let Some(&front) = ring.front() {
                if now - front >= span_nanos {
                    ring.pop_front();
                } else {
                    break;
                }
            }
            if ring.len() == limit {
                ring.pop_front();
            }
            ring.push_back(now);

            let span_secs = span.as_secs_f64();
            let elapsed = now.saturating_sub(first);
            let rate = if elapsed >= span_nanos {
                let target = max_rate * span_secs;
                target.min(ring.len() as f64) / span_secs
            } else if elapsed == 0 {
                0.0
            } else {
                (ring.len() - 1) as f64 / (elapsed as f64 / 1e9)
            };
            let rate = if rate.is_finite() {
                rate.clamp(0.0, max_rate)
            } else {
                0.0
            };
            self.rates[i].store(rate.to_bits(), Ordering::Release);
        }
        drop(state);

        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Most recently computed rate for window `index`; 0.0 for an unknown
    /// window or before the second tick.
    pub fn current_rate(&self, index: usize) -> f64 {
        self.rates
            .get(index)
            .map_or(0.0, |r| f64::from_bits(r.load(Ordering::Acquire)))
    }

    /// Rate for the window with the given label (`"5s"`).
    pub fn rate_for(&self, label: &str) -> Option<f64> {
        self.windows
            .iter()
            .position(|w| w.label == label)
            .map(|i| self.current_rate(i))
    }

    /// `(label, rate)` for every window, shortest first as configured.
    pub fn rates(&self) -> Vec<(String, f64)> {
        self.windows
            .iter()
            .enumerate()
            .map(|(i, w)| (w.label.clone(), self.current_rate(i)))
            .collect()
    }

    /// Total ticks observed since construction.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for RollingRateSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for RollingRateSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn readings(&self) -> Vec<Reading> {
        let mut out = Vec::with_capacity(self.windows.len() + 1);
        for (i, w) in self.windows.iter().enumerate() {
            let rates = Arc::clone(&self.rates);
            out.push(Reading::new(
                w.key(),
                StatusValue::deferred(move || {
                    format!("{:.2}", f64::from_bits(rates[i].load(Ordering::Acquire)))
                }),
            ));
        }
        let ticks = Arc::clone(&self.ticks);
        out.push(Reading::new(
            COUNT_KEY,
            StatusValue::deferred(move || ticks.load(Ordering::Relaxed).to_string()),
        ));
        out
    }
}
