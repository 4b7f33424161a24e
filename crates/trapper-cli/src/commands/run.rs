//! `trapper run` - simulate a host and report its metrics periodically.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::info;
use rand::Rng;
use trapper_core::sources::rolling_rate::DEFAULT_WINDOWS;
use trapper_core::{CounterSource, Driver, MetricSource, RollingRateSource, StatusManager};

use super::load_config;

/// Event categories the simulated host emits.
const CATEGORIES: &[&str] = &["join", "quit", "chat", "command"];

/// Run the run command.
pub fn run(config: &Path, duration: Option<u64>, events_per_sec: u32) {
    let cfg = load_config(config);

    let rolling = Arc::new(RollingRateSource::with_windows(cfg.tick_hz, &DEFAULT_WINDOWS));
    let events = Arc::new(CounterSource::new());
    let sources: Vec<Arc<dyn MetricSource>> = vec![rolling.clone(), events.clone()];

    let manager = match StatusManager::new(cfg.manager_config().sources(sources)) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: cannot install Ctrl+C handler: {e}");
    }

    println!("Simulating host '{}'", manager.host());
    println!("  Collector: {}:{}", cfg.server, cfg.port);
    println!("  Tick rate: {} Hz", cfg.tick_hz);
    match cfg.interval() {
        Some(iv) => println!("  Interval:  {}s", iv.as_secs()),
        None => println!("  Interval:  disabled"),
    }
    println!("  Events:    ~{events_per_sec}/s");
    match duration {
        Some(d) => println!("  Duration:  {d}s"),
        None => println!("  Duration:  until Ctrl+C"),
    }
    println!();

    let tick_period = Duration::from_secs(1) / cfg.tick_hz;
    let mut driver = Driver::start(manager.clone(), rolling.clone(), tick_period, cfg.interval());

    if let Some(period) = event_period(events_per_sec) {
        let sink = events.clone();
        driver.spawn_periodic("events", period, period, move || {
            let mut rng = rand::rng();
            sink.increment(CATEGORIES[rng.random_range(0..CATEGORIES.len())]);
        });
    }

    let start = Instant::now();
    let limit = duration.map(Duration::from_secs);
    while running.load(Ordering::SeqCst) {
        if limit.is_some_and(|max| start.elapsed() >= max) {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("stopping: {}", driver.pending().join(" -> "));
    driver.shutdown();

    let stats = manager.stats();
    println!();
    println!("Ticks:    {}", rolling.tick_count());
    for (label, rate) in rolling.rates() {
        println!("  {label:>4}: {rate:.2}/s");
    }
    println!("Events:");
    for (category, count) in events.snapshot() {
        println!("  {category}: {count}");
    }
    println!(
        "Sends:    {} ok, {} failed, {} skipped",
        stats.sends, stats.failures, stats.skipped
    );
    if let Some(err) = stats.last_error {
        println!("Last error: {err}");
    }
}

/// Spacing between simulated events, or `None` for no events.
fn event_period(events_per_sec: u32) -> Option<Duration> {
    (events_per_sec > 0).then(|| Duration::from_secs(1) / events_per_sec)
}
