use crate::config::ProbeConfig;
use crate::prober::tcp_connect::probe_tcp;
use crate::report::Reporter;
use crate::resolver::NameService;
use crate::stats::{StatsAccumulator, StatsSnapshot};
use anyhow::{ensure, Result};
use std::io::Write;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
    Terminated,
}

/// Cancellation levels, raised one signal at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Shutdown {
    Running,
    /// Finish the current attempt, skip the remaining ones.
    Stop,
    /// Abandon the current attempt as well. It is not recorded.
    Abort,
}

/// Drives attempt, record and sleep until the count is reached or the
/// shutdown token is raised.
pub struct ProbeLoop<N, W> {
    config: ProbeConfig,
    names: N,
    reporter: Reporter<W>,
    stats: StatsAccumulator,
    state: LoopState,
}

impl<N: NameService, W: Write> ProbeLoop<N, W> {
    pub fn new(config: ProbeConfig, names: N, out: W) -> Self {
        let reporter = Reporter::new(out, &config);
        Self {
            config,
            names,
            reporter,
            stats: StatsAccumulator::new(),
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn into_output(self) -> W {
        self.reporter.into_inner()
    }

    /// Runs to completion and returns the final snapshot. The summary is
    /// rendered exactly once, on completion and on cancellation alike. A loop
    /// runs only once.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<Shutdown>) -> Result<StatsSnapshot> {
        ensure!(self.state == LoopState::Idle, "probe loop already started ({:?})", self.state);
        self.transition(LoopState::Running);
        self.reporter.banner(&self.config)?;

        let interval = self.config.interval();
        let mut done: u32 = 0;
        while self.config.count.allows(done) {
            let outcome = tokio::select! {
                outcome = probe_tcp(&self.names, &self.config) => outcome,
                _ = raised(&mut shutdown, Shutdown::Abort) => {
                    debug!("attempt abandoned");
                    break;
                }
            };
            self.stats.record(&outcome);
            self.reporter.attempt(done, &outcome)?;
            done = done.saturating_add(1);

            if !self.config.count.allows(done) {
                break;
            }
            if *shutdown.borrow_and_update() >= Shutdown::Stop {
                debug!("cancelled after attempt");
                break;
            }
            tokio::select! {
                _ = sleep(interval) => {}
                _ = raised(&mut shutdown, Shutdown::Stop) => {
                    debug!("cancelled during interval");
                    break;
                }
            }
        }

        self.transition(LoopState::Stopping);
        let snapshot = self.stats.snapshot();
        self.reporter.summary(&snapshot)?;
        self.transition(LoopState::Terminated);
        Ok(snapshot)
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "probe loop state");
        self.state = next;
    }
}

/// Resolves once the token reaches `level`. A dropped sender never cancels.
async fn raised(shutdown: &mut watch::Receiver<Shutdown>, level: Shutdown) {
    if shutdown.wait_for(|now| *now >= level).await.is_err() {
        std::future::pending::<()>().await;
    }
}
