use metrics::{counter, gauge, Counter, Gauge};

/// Why a point was emitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EmitReason {
    /// A sample from a later window arrived.
    WindowAdvance,

    /// The series went stale and was evicted.
    Stale,

    /// The collector shut down.
    Drain,
}

impl EmitReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EmitReason::WindowAdvance => "window_advance",
            EmitReason::Stale => "stale",
            EmitReason::Drain => "drain",
        }
    }
}

#[derive(Clone)]
pub struct Telemetry {
    active_series: Gauge,
    emitted_window_advance: Counter,
    emitted_stale: Counter,
    emitted_drain: Counter,
    send_failures: Counter,
    points_dropped: Counter,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            active_series: gauge!("rollup_active_series"),
            emitted_window_advance: counter!("rollup_points_emitted_total", "reason" => EmitReason::WindowAdvance.as_str()),
            emitted_stale: counter!("rollup_points_emitted_total", "reason" => EmitReason::Stale.as_str()),
            emitted_drain: counter!("rollup_points_emitted_total", "reason" => EmitReason::Drain.as_str()),
            send_failures: counter!("rollup_send_failures_total"),
            points_dropped: counter!("rollup_points_dropped_total"),
        }
    }

    #[cfg(test)]
    pub fn noop() -> Self {
        Self {
            active_series: Gauge::noop(),
            emitted_window_advance: Counter::noop(),
            emitted_stale: Counter::noop(),
            emitted_drain: Counter::noop(),
            send_failures: Counter::noop(),
            points_dropped: Counter::noop(),
        }
    }

    pub fn series_created(&self) {
        self.active_series.increment(1.0);
    }

    pub fn series_removed(&self, count: usize) {
        self.active_series.decrement(count as f64);
    }

    pub fn points_emitted(&self, reason: EmitReason, count: usize) {
        let counter = match reason {
            EmitReason::WindowAdvance => &self.emitted_window_advance,
            EmitReason::Stale => &self.emitted_stale,
            EmitReason::Drain => &self.emitted_drain,
        };
        counter.increment(count as u64);
    }

    pub fn send_failed(&self, points: usize) {
        self.send_failures.increment(1);
        self.points_dropped.increment(points as u64);
    }
}
