//! The long-running control loop.
//!
//! ```text
//!   INIT ──► RUNNING ──► STOPPED
//!              │ ▲
//!              └─┘ refresh list → poll each source → summary → sleep
//! ```
//!
//! One task drives everything, sources are polled one after another, so a
//! source's seen-set is never touched concurrently.  The stop signal is a
//! [`CancellationToken`]: it is checked before each source and raced against
//! the inter-cycle sleep, so a source already being polled always finishes.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::convert::Converter;
use crate::error::ConfigError;
use crate::poll::{self, PollReport};
use crate::registry::{SourceId, SourceRegistry};
use crate::source::FeedFetcher;
use crate::store::SeenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Init,
    Running,
    Stopped,
}

/// How often cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// One cycle, then stop.
    Once,
    Every(Duration),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    pub schedule: Schedule,
}

/// Per-source line of a cycle summary.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub url: String,
    pub id: SourceId,
    pub new_count: usize,
    pub seen_count: usize,
    pub errors: usize,
}

impl SourceSummary {
    fn from_report(url: &str, id: &SourceId, report: &PollReport) -> Self {
        Self {
            url: url.to_string(),
            id: id.clone(),
            new_count: report.new_count,
            seen_count: report.seen_count,
            errors: report.errors.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub cycle: u64,
    pub sources: Vec<SourceSummary>,
    /// The stop signal cut the cycle short.
    pub interrupted: bool,
}

impl CycleSummary {
    pub fn new_items(&self) -> usize {
        self.sources.iter().map(|s| s.new_count).sum()
    }

    pub fn errors(&self) -> usize {
        self.sources.iter().map(|s| s.errors).sum()
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cycles: u64,
    pub new_items: usize,
    pub errors: usize,
    pub uptime: Duration,
}

pub struct Monitor {
    registry: SourceRegistry,
    settings: Settings,
    fetcher: Box<dyn FeedFetcher>,
    converter: Converter,
    store: SeenStore,
    state: MonitorState,
    started: Option<Instant>,
    cycle: u64,
}

impl Monitor {
    pub fn new(
        registry: SourceRegistry,
        settings: Settings,
        fetcher: Box<dyn FeedFetcher>,
        converter: Converter,
    ) -> Self {
        let store = SeenStore::new(settings.state_dir.clone());
        Self {
            registry,
            settings,
            fetcher,
            converter,
            store,
            state: MonitorState::Init,
            started: None,
            cycle: 0,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// INIT: make sure the output and state directories exist and take
    /// writes.
    pub fn init(&mut self) -> Result<(), ConfigError> {
        if self.state != MonitorState::Init {
            return Ok(());
        }

        let output = &self.settings.output_dir;
        probe_writable(output).map_err(|source| ConfigError::OutputDir {
            path: output.clone(),
            source,
        })?;
        let state = self.store.dir();
        probe_writable(state).map_err(|source| ConfigError::StateDir {
            path: state.to_path_buf(),
            source,
        })?;

        info!(
            output = %output.display(),
            state = %self.settings.state_dir.display(),
            sources = self.registry.snapshot().len(),
            "monitor initialised"
        );
        self.started = Some(Instant::now());
        self.state = MonitorState::Running;
        Ok(())
    }

    /// One RUNNING iteration: reload if needed, then poll every source.
    ///
    /// A reload only ever happens here, before the first source, so a list
    /// change never lands mid-cycle.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleSummary {
        self.cycle += 1;
        let mut summary = CycleSummary {
            cycle: self.cycle,
            ..CycleSummary::default()
        };

        if let Some(diff) = self.registry.refresh() {
            if diff.is_empty() {
                debug!("source list rewritten without changes");
            }
            for source in &diff.removed {
                self.store.forget(&source.id);
            }
        }

        for source in &self.registry.snapshot().sources {
            if cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let output_dir = self.settings.output_dir.join(source.id.as_str());
            let report = poll::poll(
                source,
                self.fetcher.as_ref(),
                &mut self.store,
                &self.converter,
                &output_dir,
            )
            .await;

            for err in &report.errors {
                debug!(source = %source.url, "{err}");
            }
            summary
                .sources
                .push(SourceSummary::from_report(&source.url, &source.id, &report));
        }

        for s in &summary.sources {
            info!(source = %s.url, new = s.new_count, seen = s.seen_count, errors = s.errors, "source summary");
        }
        info!(
            cycle = summary.cycle,
            sources = summary.sources.len(),
            new = summary.new_items(),
            errors = summary.errors(),
            "cycle complete"
        );
        if summary.interrupted {
            warn!(cycle = summary.cycle, "cycle interrupted by stop signal");
        }

        summary
    }

    /// Drive the loop until the schedule ends or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<RunSummary, ConfigError> {
        self.init()?;
        let mut totals = RunSummary::default();

        loop {
            let summary = self.run_cycle(&cancel).await;
            totals.cycles += 1;
            totals.new_items += summary.new_items();
            totals.errors += summary.errors();

            let interval = match self.settings.schedule {
                Schedule::Once => break,
                Schedule::Every(interval) => interval,
            };
            if summary.interrupted {
                break;
            }

            debug!(secs = interval.as_secs(), "sleeping until next cycle");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.state = MonitorState::Stopped;
        totals.uptime = self.started.map(|s| s.elapsed()).unwrap_or_default();
        info!(
            cycles = totals.cycles,
            new = totals.new_items,
            errors = totals.errors,
            uptime_secs = totals.uptime.as_secs(),
            "monitor stopped"
        );
        Ok(totals)
    }
}

/// Create `dir` if needed and check a file can be created in it.
fn probe_writable(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    tempfile::NamedTempFile::new_in(dir).map(drop)
}
