use crate::prober::ProbeOutcome;
use serde::Serialize;

/// Outcome history for one run. Owned by the probe loop.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    attempted: u64,
    connected: u64,
    failed: u64,
    latencies_ms: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub attempted: u64,
    pub connected: u64,
    pub failed: u64,
    pub failed_percent: f64,
    /// Absent until at least one attempt connected.
    pub latency: Option<LatencySummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.attempted += 1;
        match outcome {
            ProbeOutcome::Success { duration_ms, .. } => {
                self.connected += 1;
                self.latencies_ms.push(*duration_ms);
            }
            ProbeOutcome::Failure { .. } => self.failed += 1,
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let failed_percent = if self.attempted == 0 {
            0.0
        } else {
            self.failed as f64 / self.attempted as f64 * 100.0
        };
        StatsSnapshot {
            attempted: self.attempted,
            connected: self.connected,
            failed: self.failed,
            failed_percent,
            latency: LatencySummary::over(&self.latencies_ms),
        }
    }
}

impl LatencySummary {
    fn over(samples: &[f64]) -> Option<Self> {
        let (&first, rest) = samples.split_first()?;
        let (min_ms, max_ms, sum) = rest
            .iter()
            .fold((first, first, first), |(lo, hi, sum), &t| (lo.min(t), hi.max(t), sum + t));
        // clamp guards against rounding pushing the mean outside [min, max]
        let avg_ms = (sum / samples.len() as f64).clamp(min_ms, max_ms);
        Some(Self { min_ms, max_ms, avg_ms })
    }
}
