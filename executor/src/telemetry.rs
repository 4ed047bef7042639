//! Process-wide observability aggregates.
//!
//! [`Throughput`] accumulates gas, byte and transaction totals over all
//! completed requests and derives rates over a sliding window and over the
//! whole process lifetime. [`TimeMetricStorage`] accumulates time spent per
//! named pipeline phase. Both are updated with one call per request and read
//! through copied snapshots.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use itertools::Itertools;
use parking_lot::Mutex;

use crate::executor::OpcodeInfo;

/// Window over which the recent throughput is computed, unless configured
/// otherwise.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Totals contributed by one completed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSample {
    pub gas: u64,
    pub bytes: u64,
    pub txs: u64,
    pub elapsed: Duration,
}

impl BatchSample {
    pub fn rates(&self) -> Rates {
        Rates::over(self.gas, self.bytes, self.txs, self.elapsed.as_secs_f64())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rates {
    pub gas_per_sec: f64,
    pub bytes_per_sec: f64,
    pub txs_per_sec: f64,
}

impl Rates {
    fn over(gas: u64, bytes: u64, txs: u64, secs: f64) -> Self {
        // Sub-microsecond batches would otherwise report infinite rates.
        let secs = secs.max(1e-6);
        Self {
            gas_per_sec: gas as f64 / secs,
            bytes_per_sec: bytes as f64 / secs,
            txs_per_sec: txs as f64 / secs,
        }
    }

    pub fn gas_per_byte(&self) -> f64 {
        self.gas_per_sec / self.bytes_per_sec.max(1.0)
    }
}

/// Copy of the aggregate right after an update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputSnapshot {
    pub counter: u64,
    pub total_gas: u64,
    pub total_bytes: u64,
    pub total_txs: u64,
    pub total_time: Duration,
    /// Rates over the last completed window.
    pub window: Rates,
    /// Rates since the aggregate was created.
    pub ever: Rates,
}

#[derive(Debug)]
struct Aggregate {
    counter: u64,
    total_gas: u64,
    total_bytes: u64,
    total_txs: u64,
    total_time: Duration,
    started: Instant,
    window_started: Instant,
    window_gas: u64,
    window_bytes: u64,
    window_txs: u64,
    window: Rates,
}

impl Aggregate {
    fn snapshot(&self, now: Instant) -> ThroughputSnapshot {
        let since_start = now.saturating_duration_since(self.started).as_secs_f64();
        ThroughputSnapshot {
            counter: self.counter,
            total_gas: self.total_gas,
            total_bytes: self.total_bytes,
            total_txs: self.total_txs,
            total_time: self.total_time,
            window: self.window,
            ever: Rates::over(
                self.total_gas,
                self.total_bytes,
                self.total_txs,
                since_start.max(1.0),
            ),
        }
    }
}

/// Running throughput aggregate shared by all requests.
#[derive(Debug)]
pub struct Throughput {
    window: Duration,
    inner: Mutex<Aggregate>,
}

impl Default for Throughput {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Throughput {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, started: Instant) -> Self {
        Self {
            window,
            inner: Mutex::new(Aggregate {
                counter: 0,
                total_gas: 0,
                total_bytes: 0,
                total_txs: 0,
                total_time: Duration::ZERO,
                started,
                window_started: started,
                window_gas: 0,
                window_bytes: 0,
                window_txs: 0,
                window: Rates::default(),
            }),
        }
    }

    pub fn record(&self, sample: BatchSample) -> ThroughputSnapshot {
        self.record_at(sample, Instant::now())
    }

    /// Adds `sample` to the totals. The window rates are recomputed once at
    /// least one full window has elapsed since the previous recomputation.
    pub fn record_at(&self, sample: BatchSample, now: Instant) -> ThroughputSnapshot {
        let mut agg = self.inner.lock();
        agg.counter += 1;
        agg.total_gas += sample.gas;
        agg.total_bytes += sample.bytes;
        agg.total_txs += sample.txs;
        agg.total_time += sample.elapsed;

        let since_window = now.saturating_duration_since(agg.window_started);
        if since_window >= self.window {
            agg.window = Rates::over(
                agg.total_gas - agg.window_gas,
                agg.total_bytes - agg.window_bytes,
                agg.total_txs - agg.window_txs,
                since_window.as_secs_f64().max(1.0),
            );
            agg.window_gas = agg.total_gas;
            agg.window_bytes = agg.total_bytes;
            agg.window_txs = agg.total_txs;
            agg.window_started = now;
        }
        agg.snapshot(now)
    }

    pub fn snapshot(&self) -> ThroughputSnapshot {
        self.inner.lock().snapshot(Instant::now())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeMetric {
    pub time: Duration,
    pub times: u64,
}

/// Accumulated time per named phase.
#[derive(Debug, Default)]
pub struct TimeMetricStorage {
    map: Mutex<HashMap<String, TimeMetric>>,
}

impl TimeMetricStorage {
    pub fn add(&self, name: &str, time: Duration, times: u64) {
        let mut map = self.map.lock();
        let metric = map.entry(name.to_string()).or_default();
        metric.time += time;
        metric.times += times;
    }

    pub fn get(&self, name: &str) -> Option<TimeMetric> {
        self.map.lock().get(name).copied()
    }

    /// One line per phase, largest total first, with its share of the
    /// overall time.
    pub fn report(&self, title: &str) -> String {
        let map = self.map.lock().clone();
        let total: Duration = map.values().map(|m| m.time).sum();
        let mut out = format!("{title}:");
        for (name, metric) in map.iter().sorted_by(|a, b| b.1.time.cmp(&a.1.time)) {
            let share = 100.0 * metric.time.as_secs_f64() / total.as_secs_f64().max(f64::EPSILON);
            let _ = write!(
                out,
                "\n    {name:<32} {:>10}us {share:>6.2}% {:>8} times",
                metric.time.as_micros(),
                metric.times
            );
        }
        out
    }
}

/// One line per opcode, in opcode order, with its call count, every gas cost
/// and duration seen, and the resulting gas throughput.
pub fn opcode_summary(opcodes: &[OpcodeInfo]) -> String {
    let mut out = format!("Received {} opcodes:", opcodes.len());
    for (op, infos) in opcodes
        .iter()
        .into_group_map_by(|info| info.op)
        .into_iter()
        .sorted_by_key(|(op, _)| *op)
    {
        let total_gas: u64 = infos.iter().map(|info| info.gas_cost).sum();
        let total_duration: Duration = infos.iter().map(|info| info.duration).sum();
        let _ = write!(
            out,
            "\n    0x{op:02x}={} called {} times gas={} duration={} TP={:.2}gas/s",
            infos[0].opcode,
            infos.len(),
            infos.iter().map(|info| info.gas_cost).join(","),
            infos.iter().map(|info| info.duration.as_micros()).join(","),
            total_gas as f64 / total_duration.as_secs_f64().max(1e-6),
        );
    }
    out
}
