use std::{
    fmt::Write,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Header checks, identity keys and schema normalization
    Check,
    Detect,
    Read,
    Write,
}

pub struct Stopwatch(Instant);

impl Stopwatch {
    pub fn start() -> Self {
        Stopwatch(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Counters and phase timings for one run. Pure bookkeeping.
#[derive(Debug, Default, Clone)]
pub struct RunReporter {
    pub processed: u64,
    pub written: u64,
    pub pages: u64,
    pub skipped: u64,
    pub duplicates: u64,
    pub errors: u64,
    time_check: Duration,
    time_detect: Duration,
    time_read: Duration,
    time_write: Duration,
}

impl RunReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_time(&mut self, phase: Phase, elapsed: Duration) {
        *self.slot(phase) += elapsed;
    }

    pub fn record(&mut self, phase: Phase, watch: Stopwatch) {
        self.add_time(phase, watch.elapsed());
    }

    pub fn time(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Check => self.time_check,
            Phase::Detect => self.time_detect,
            Phase::Read => self.time_read,
            Phase::Write => self.time_write,
        }
    }

    /// A rejected duplicate, either exact or semantic.
    pub fn duplicate(&mut self) {
        self.duplicates += 1;
        self.skipped += 1;
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let counters = [
            ("processed", self.processed),
            ("written", self.written),
            ("pages", self.pages),
            ("skipped", self.skipped),
            ("duplicates", self.duplicates),
            ("errors", self.errors),
        ];
        for (label, value) in counters {
            // Writing into a String cannot fail
            writeln!(out, "{label:<12}: {value:>12}").ok();
        }

        let timings = [
            ("time check", Phase::Check),
            ("time detect", Phase::Detect),
            ("time read", Phase::Read),
            ("time write", Phase::Write),
        ];
        for (label, phase) in timings {
            writeln!(out, "{label:<12}: {:>11.3}s", self.time(phase).as_secs_f64()).ok();
        }
        out
    }

    fn slot(&mut self, phase: Phase) -> &mut Duration {
        match phase {
            Phase::Check => &mut self.time_check,
            Phase::Detect => &mut self.time_detect,
            Phase::Read => &mut self.time_read,
            Phase::Write => &mut self.time_write,
        }
    }
}
