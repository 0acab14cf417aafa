use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    pub malformed_datagrams: u64,
    /// Capsules discarded because a receive queue was full.
    pub dropped_capsules: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    datagrams_sent: AtomicU64,
    datagrams_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    send_errors: AtomicU64,
    malformed_datagrams: AtomicU64,
    dropped_capsules: AtomicU64,
}

impl StatsCounters {
    pub fn record_sent(&self, bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_datagrams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_capsules.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            malformed_datagrams: self.malformed_datagrams.load(Ordering::Relaxed),
            dropped_capsules: self.dropped_capsules.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    /// Datagrams per second sent since the previous sample.
    pub send_frequency: f32,
    pub recv_frequency: f32,
    pub stats: TransportStats,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Diagnostics: frequencies (send={:.1} recv={:.1})>",
            self.send_frequency, self.recv_frequency
        )
    }
}

/// Turns cumulative counters into per-interval rates.
#[derive(Debug)]
pub(crate) struct RateMeter {
    last_sample: Instant,
    last_sent: u64,
    last_received: u64,
}

impl RateMeter {
    pub fn new() -> Self {
        Self {
            last_sample: Instant::now(),
            last_sent: 0,
            last_received: 0,
        }
    }

    pub fn sample(&mut self, stats: TransportStats) -> Diagnostics {
        self.sample_at(stats, Instant::now())
    }

    fn sample_at(&mut self, stats: TransportStats, now: Instant) -> Diagnostics {
        let elapsed = now.duration_since(self.last_sample).as_secs_f32();
        let rate = |current: u64, previous: u64| {
            if elapsed > 0.0 {
                current.saturating_sub(previous) as f32 / elapsed
            } else {
                0.0
            }
        };
        let diagnostics = Diagnostics {
            send_frequency: rate(stats.datagrams_sent, self.last_sent),
            recv_frequency: rate(stats.datagrams_received, self.last_received),
            stats,
        };
        self.last_sample = now;
        self.last_sent = diagnostics.stats.datagrams_sent;
        self.last_received = diagnostics.stats.datagrams_received;
        diagnostics
    }
}
