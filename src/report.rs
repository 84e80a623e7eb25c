use crate::config::{OutputFormat, ProbeConfig};
use crate::prober::ProbeOutcome;
use crate::stats::StatsSnapshot;
use serde::Serialize;
use std::io::{self, Write};

/// Writes the banner, one line per attempt and the final summary.
pub struct Reporter<W> {
    out: W,
    format: OutputFormat,
    port: u16,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum Event<'a> {
    Start { config: &'a ProbeConfig },
    Attempt { seq: u32, outcome: &'a ProbeOutcome },
    Summary { stats: &'a StatsSnapshot },
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, config: &ProbeConfig) -> Self {
        Self { out, format: config.format, port: config.port }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn banner(&mut self, config: &ProbeConfig) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.event(&Event::Start { config }),
            OutputFormat::Text => {
                writeln!(self.out, "{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))?;
                writeln!(self.out, "\nConnecting to {} on TCP {}:\n", config.host, config.port)?;
                self.out.flush()
            }
        }
    }

    pub fn attempt(&mut self, seq: u32, outcome: &ProbeOutcome) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => return self.event(&Event::Attempt { seq, outcome }),
            OutputFormat::Text => match outcome {
                ProbeOutcome::Success { address, duration_ms } => writeln!(
                    self.out,
                    "Connected to {}: time={:.2}ms protocol=TCP port={}",
                    address, duration_ms, self.port
                )?,
                ProbeOutcome::Failure { reason } => writeln!(self.out, "{reason}")?,
            },
        }
        self.out.flush()
    }

    pub fn summary(&mut self, stats: &StatsSnapshot) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return self.event(&Event::Summary { stats });
        }
        if stats.attempted == 0 {
            return Ok(());
        }
        writeln!(self.out, "\nConnection statistics:")?;
        writeln!(
            self.out,
            "\tAttempted = {}, Connected = {}, Failed = {} ({:.2}%)",
            stats.attempted, stats.connected, stats.failed, stats.failed_percent
        )?;
        if let Some(latency) = &stats.latency {
            writeln!(self.out, "Approximate connection times:")?;
            writeln!(
                self.out,
                "\tMinimum = {:.2}ms, Maximum = {:.2}ms, Average = {:.2}ms",
                latency.min_ms, latency.max_ms, latency.avg_ms
            )?;
        }
        self.out.flush()
    }

    fn event(&mut self, event: &Event<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
