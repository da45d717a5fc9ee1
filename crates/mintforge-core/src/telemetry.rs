//! Live mint telemetry

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::worker::TelemetryEvent;

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// One line of the log history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    /// Emitting worker, `None` for controller lines
    pub worker: Option<usize>,
    pub message: String,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(None, LogLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(None, LogLevel::Error, message)
    }

    pub fn new(worker: Option<usize>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            worker,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.timestamp.format("%H:%M:%S"))?;
        if let Some(worker) = self.worker {
            write!(f, "[worker {}] ", worker)?;
        }
        if self.level == LogLevel::Error {
            f.write_str("ERROR: ")?;
        }
        f.write_str(&self.message)
    }
}

/// Point-in-time copy of the aggregate state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// Newest first
    pub logs: Vec<LogEntry>,
    /// Sum of the latest sample of every worker that reported one
    pub total_rate: f64,
    pub success_count: u64,
    /// Latest sample per worker ordinal
    pub rates: Vec<Option<f64>>,
}

impl TelemetrySnapshot {
    /// Number of workers the rate array is sized for
    pub fn worker_count(&self) -> usize {
        self.rates.len()
    }
}

#[derive(Debug, Default)]
struct AggregateState {
    logs: VecDeque<LogEntry>,
    rates: Vec<Option<f64>>,
    success_count: u64,
    generation: u64,
}

impl AggregateState {
    fn apply(&mut self, index: usize, event: TelemetryEvent) {
        if let Some(message) = event.log {
            let level = if event.error {
                LogLevel::Error
            } else {
                LogLevel::Info
            };
            self.logs
                .push_front(LogEntry::new(Some(index), level, message));
            // Every log-bearing event is counted as a success, error lines
            // included. Callers that need a true mint count must not rely on
            // this counter.
            self.success_count += 1;
        }

        if let Some(rate) = event.rate {
            match self.rates.get_mut(index) {
                Some(slot) if rate.is_finite() => *slot = Some(rate),
                Some(_) => debug!(worker = index, rate, "ignoring non-finite rate sample"),
                None => debug!(worker = index, "rate sample for unknown worker"),
            }
        }
    }

    fn total_rate(&self) -> f64 {
        self.rates.iter().flatten().sum()
    }
}

/// Folds worker telemetry into log history, rates and a success counter.
///
/// All mutation goes through one mutex, so events may arrive from any number
/// of threads. A poisoned lock is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct TelemetryAggregator {
    state: Mutex<AggregateState>,
}

impl TelemetryAggregator {
    /// Create an aggregator sized for `worker_count` workers
    pub fn new(worker_count: usize) -> Self {
        Self {
            state: Mutex::new(AggregateState {
                rates: vec![None; worker_count],
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one worker event
    pub fn on_event(&self, index: usize, event: TelemetryEvent) {
        self.lock().apply(index, event);
    }

    /// Apply an event only if it belongs to the current run
    pub(crate) fn on_run_event(&self, generation: u64, index: usize, event: TelemetryEvent) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.apply(index, event);
        true
    }

    /// Start a new run: fresh rate slots, logs and successes kept
    pub(crate) fn begin_run(&self, worker_count: usize) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.rates = vec![None; worker_count];
        state.generation
    }

    /// Close the current run; anything still in flight is dropped
    pub(crate) fn end_run(&self) {
        self.lock().generation += 1;
    }

    /// Resize the rate array to `worker_count` empty slots
    pub fn resize(&self, worker_count: usize) {
        self.lock().rates = vec![None; worker_count];
    }

    /// Prepend a controller log line; does not count as a success
    pub fn push_log(&self, entry: LogEntry) {
        self.lock().logs.push_front(entry);
    }

    /// Empty the log history; rates and successes are untouched
    pub fn clear(&self) {
        self.lock().logs.clear();
    }

    pub fn total_rate(&self) -> f64 {
        self.lock().total_rate()
    }

    pub fn success_count(&self) -> u64 {
        self.lock().success_count
    }

    pub fn log_len(&self) -> usize {
        self.lock().logs.len()
    }

    /// Consistent copy of every field, taken under one lock
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let state = self.lock();
        TelemetrySnapshot {
            logs: state.logs.iter().cloned().collect(),
            total_rate: state.total_rate(),
            success_count: state.success_count,
            rates: state.rates.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_total_rate_uses_latest_sample() {
        let agg = TelemetryAggregator::new(3);
        agg.on_event(0, TelemetryEvent::rate(100.0));
        agg.on_event(0, TelemetryEvent::rate(40.0));
        agg.on_event(2, TelemetryEvent::rate(2.5));

        let snap = agg.snapshot();
        assert_eq!(snap.total_rate, 42.5);
        assert_eq!(snap.rates, vec![Some(40.0), None, Some(2.5)]);
    }

    #[test]
    fn test_every_log_counts_as_success() {
        let agg = TelemetryAggregator::new(2);
        agg.on_event(0, TelemetryEvent::log("Minted ierc-m5"));
        agg.on_event(1, TelemetryEvent::log("insufficient funds"));
        agg.on_event(1, TelemetryEvent::error("Worker 1 error: boom"));
        agg.on_event(0, TelemetryEvent::rate(5.0));

        assert_eq!(agg.success_count(), 3);
        let snap = agg.snapshot();
        assert_eq!(snap.logs.len(), 3);
        // Newest first
        assert_eq!(snap.logs[0].message, "Worker 1 error: boom");
        assert_eq!(snap.logs[0].level, LogLevel::Error);
        assert_eq!(snap.logs[0].worker, Some(1));
        assert_eq!(snap.logs[2].message, "Minted ierc-m5");
        assert_eq!(snap.logs[2].level, LogLevel::Info);
    }

    #[test]
    fn test_log_and_rate_in_one_event() {
        let agg = TelemetryAggregator::new(1);
        agg.on_event(0, TelemetryEvent::log("both").with_rate(7.0));
        assert_eq!(agg.success_count(), 1);
        assert_eq!(agg.total_rate(), 7.0);
        assert_eq!(agg.log_len(), 1);
    }

    #[test]
    fn test_empty_event_is_a_no_op() {
        let agg = TelemetryAggregator::new(1);
        agg.on_event(0, TelemetryEvent::default());
        let snap = agg.snapshot();
        assert!(snap.logs.is_empty());
        assert_eq!(snap.success_count, 0);
        assert_eq!(snap.total_rate, 0.0);
    }

    #[test]
    fn test_clear_keeps_rate_and_successes() {
        let agg = TelemetryAggregator::new(1);
        agg.on_event(0, TelemetryEvent::log("found"));
        agg.on_event(0, TelemetryEvent::rate(12.5));
        agg.clear();

        let snap = agg.snapshot();
        assert!(snap.logs.is_empty());
        assert_eq!(snap.success_count, 1);
        assert_eq!(snap.total_rate, 12.5);
    }

    #[test]
    fn test_controller_logs_do_not_count() {
        let agg = TelemetryAggregator::new(1);
        agg.push_log(LogEntry::info("Start mining"));
        agg.push_log(LogEntry::error("No tick"));
        assert_eq!(agg.log_len(), 2);
        assert_eq!(agg.success_count(), 0);
    }

    #[test]
    fn test_out_of_range_rate_ignored() {
        let agg = TelemetryAggregator::new(2);
        agg.on_event(5, TelemetryEvent::rate(9.0));
        agg.on_event(0, TelemetryEvent::rate(f64::NAN));
        assert_eq!(agg.snapshot().rates, vec![None, None]);
        assert_eq!(agg.total_rate(), 0.0);
    }

    #[test]
    fn test_stale_run_events_dropped() {
        let agg = TelemetryAggregator::new(0);
        let first = agg.begin_run(2);
        assert!(agg.on_run_event(first, 1, TelemetryEvent::rate(3.0)));

        agg.end_run();
        assert!(!agg.on_run_event(first, 1, TelemetryEvent::rate(8.0)));

        let second = agg.begin_run(1);
        assert_ne!(first, second);
        assert!(!agg.on_run_event(first, 0, TelemetryEvent::log("late")));
        assert_eq!(agg.snapshot().rates, vec![None]);
        assert_eq!(agg.success_count(), 0);
    }

    #[test]
    fn test_begin_run_resets_rates_only() {
        let agg = TelemetryAggregator::new(0);
        let generation = agg.begin_run(2);
        agg.on_run_event(generation, 0, TelemetryEvent::log("found").with_rate(4.0));

        agg.begin_run(3);
        let snap = agg.snapshot();
        assert_eq!(snap.rates, vec![None, None, None]);
        assert_eq!(snap.total_rate, 0.0);
        assert_eq!(snap.success_count, 1);
        assert_eq!(snap.logs.len(), 1);
    }

    #[test]
    fn test_concurrent_events_not_lost() {
        let agg = Arc::new(TelemetryAggregator::new(8));
        let threads: Vec<_> = (0..8)
            .map(|index| {
                let agg = Arc::clone(&agg);
                thread::spawn(move || {
                    for i in 0..500 {
                        agg.on_event(index, TelemetryEvent::log("x").with_rate(i as f64));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let snap = agg.snapshot();
        assert_eq!(snap.success_count, 8 * 500);
        assert_eq!(snap.logs.len(), 8 * 500);
        assert_eq!(snap.total_rate, 8.0 * 499.0);
    }

    #[test]
    fn test_log_entry_display() {
        let entry = LogEntry::new(Some(3), LogLevel::Error, "boom");
        let text = entry.to_string();
        assert!(text.starts_with('['));
        assert!(text.ends_with("[worker 3] ERROR: boom"));

        let plain = LogEntry::info("Start mining").to_string();
        assert!(plain.ends_with("] Start mining"));
        assert!(!plain.contains("worker"));
    }
}
