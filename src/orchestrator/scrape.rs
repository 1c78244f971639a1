//! Scrape Orchestrator
//!
//! Fans one scrape out to every active collector and gathers the results into
//! a single batch.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::meta::{MetaMetrics, ScrapeOutcome, ScrapeResult};
use crate::collector::{Collector, CollectorContext, Sink, DEFAULT_NAMESPACE};
use crate::config::CollectorSelection;
use crate::error::{Error, Result};
use crate::metric::Observation;
use crate::registry::CollectorRegistry;

/// Default scrape deadline (10 seconds).
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Configuration
// =============================================================================

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Namespace of the meta-metrics
    pub namespace: String,
    /// Upper bound on the wall-clock time of one scrape
    pub scrape_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
        }
    }
}

impl OrchestratorConfig {
    /// Deadline for one scrape given an optional caller hint.
    ///
    /// A non-zero hint can only shorten the configured timeout.
    pub fn effective_timeout(&self, hint: Option<Duration>) -> Duration {
        match hint {
            Some(h) if !h.is_zero() => h.min(self.scrape_timeout),
            _ => self.scrape_timeout,
        }
    }
}

// =============================================================================
// Scrape Batch
// =============================================================================

/// Everything one scrape produced.
#[derive(Debug, Clone, Default)]
pub struct ScrapeBatch {
    /// Collector observations followed by their meta-metrics
    pub observations: Vec<Observation>,
    /// One result per scraped collector
    pub results: Vec<ScrapeResult>,
}

impl ScrapeBatch {
    /// Result for one collector
    pub fn result(&self, collector: &str) -> Option<&ScrapeResult> {
        self.results.iter().find(|r| r.collector == collector)
    }

    /// Observations of one metric family
    pub fn family<'a>(&'a self, fq_name: &'a str) -> impl Iterator<Item = &'a Observation> + 'a {
        self.observations.iter().filter(move |o| o.fq_name() == fq_name)
    }

    /// True if every collector succeeded
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    fn push(&mut self, meta: &MetaMetrics, report: CollectorReport) {
        let result = ScrapeResult::new(&report.name, report.duration, report.outcome);
        self.observations.extend(report.observations);
        self.observations.extend(meta.observe(&result));
        self.results.push(result);
    }
}

/// What one update task sends back to the orchestrator.
#[derive(Debug)]
struct CollectorReport {
    name: Arc<str>,
    duration: Duration,
    outcome: ScrapeOutcome,
    observations: Vec<Observation>,
}

impl CollectorReport {
    fn empty(name: Arc<str>, duration: Duration, outcome: ScrapeOutcome) -> Self {
        Self {
            name,
            duration,
            outcome,
            observations: Vec::new(),
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

type Instance = Arc<Mutex<Box<dyn Collector>>>;

struct CollectorSlot {
    name: Arc<str>,
    instance: Instance,
}

/// Runs every active collector concurrently on each scrape.
///
/// Instances are built once in [`new`](Self::new) and reused. Each instance
/// sits behind an async mutex that its update task holds for the whole
/// update, so at most one update per instance is ever in flight. Overlapping
/// scrapes queue on the mutex; a collector whose mutex is still held when the
/// scrape deadline passes is reported as [`ScrapeOutcome::Busy`].
pub struct ScrapeOrchestrator {
    config: OrchestratorConfig,
    meta: MetaMetrics,
    slots: Vec<CollectorSlot>,
    registered: BTreeSet<String>,
    last_results: RwLock<Vec<ScrapeResult>>,
}

impl ScrapeOrchestrator {
    /// Build one instance per name in `active`.
    ///
    /// Fails if a name is not registered or a factory fails.
    pub fn new(
        registry: &CollectorRegistry,
        active: &[String],
        ctx: &CollectorContext,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let meta = MetaMetrics::new(&config.namespace)?;
        let mut slots = Vec::with_capacity(active.len());

        for name in active.iter().collect::<BTreeSet<_>>() {
            let entry = registry
                .get(name)
                .ok_or_else(|| Error::UnknownCollector(name.clone()))?;
            let instance = entry.build(ctx).map_err(|e| {
                error!(collector = %name, error = %e, "Collector factory failed");
                Error::FactoryFailed {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            info!(collector = %name, "Enabled collector");

            slots.push(CollectorSlot {
                name: Arc::from(name.as_str()),
                instance: Arc::new(Mutex::new(instance)),
            });
        }

        Ok(Self {
            config,
            meta,
            slots,
            registered: registry.names().into_iter().map(str::to_string).collect(),
            last_results: RwLock::new(Vec::new()),
        })
    }

    /// Resolve `selection` against `registry`, then build.
    pub fn from_selection(
        registry: &CollectorRegistry,
        selection: &CollectorSelection,
        ctx: &CollectorContext,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let active = selection.resolve(registry)?;
        Self::new(registry, &active, ctx, config)
    }

    /// Active collector names, ordered
    pub fn collector_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_ref()).collect()
    }

    /// Configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Results of the most recent scrape
    pub fn last_results(&self) -> Vec<ScrapeResult> {
        self.last_results.read().clone()
    }

    /// Scrape every active collector with the configured deadline.
    pub async fn collect(&self) -> ScrapeBatch {
        self.collect_with_timeout(None).await
    }

    /// Scrape every active collector, shortening the deadline to `hint` when
    /// it is smaller than the configured one.
    pub async fn collect_with_timeout(&self, hint: Option<Duration>) -> ScrapeBatch {
        let slots: Vec<&CollectorSlot> = self.slots.iter().collect();
        self.run(slots, self.config.effective_timeout(hint)).await
    }

    /// Scrape only the named collectors.
    ///
    /// An empty `names` scrapes everything. Each name must be active.
    pub async fn collect_filtered(
        &self,
        names: &[String],
        hint: Option<Duration>,
    ) -> Result<ScrapeBatch> {
        if names.is_empty() {
            return Ok(self.collect_with_timeout(hint).await);
        }

        let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        for name in &wanted {
            if !self.slots.iter().any(|s| s.name.as_ref() == *name) {
                return Err(if self.registered.contains(*name) {
                    Error::DisabledCollector(name.to_string())
                } else {
                    Error::UnknownCollector(name.to_string())
                });
            }
        }

        let slots: Vec<&CollectorSlot> = self
            .slots
            .iter()
            .filter(|s| wanted.contains(s.name.as_ref()))
            .collect();
        Ok(self.run(slots, self.config.effective_timeout(hint)).await)
    }

    async fn run(&self, slots: Vec<&CollectorSlot>, timeout: Duration) -> ScrapeBatch {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut batch = ScrapeBatch::default();
        let mut pending: HashSet<Arc<str>> = HashSet::with_capacity(slots.len());

        let (tx, mut rx) = mpsc::unbounded_channel::<CollectorReport>();
        for slot in slots {
            pending.insert(Arc::clone(&slot.name));
            spawn_update(
                Arc::clone(&slot.name),
                Arc::clone(&slot.instance),
                deadline,
                tx.clone(),
            );
        }
        drop(tx);

        while !pending.is_empty() {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(report)) => {
                    pending.remove(&report.name);
                    batch.push(&self.meta, report);
                }
                Ok(None) | Err(_) => break,
            }
        }

        let elapsed = started.elapsed();
        let mut leftover: Vec<Arc<str>> = pending.into_iter().collect();
        leftover.sort();
        for name in leftover {
            error!(
                collector = %name,
                timeout_secs = timeout.as_secs_f64(),
                "Collector did not finish before the scrape deadline"
            );
            batch.push(
                &self.meta,
                CollectorReport::empty(name, elapsed, ScrapeOutcome::TimedOut),
            );
        }

        debug!(
            collectors = batch.results.len(),
            observations = batch.observations.len(),
            duration_secs = elapsed.as_secs_f64(),
            "Scrape complete"
        );
        *self.last_results.write() = batch.results.clone();
        batch
    }
}

impl std::fmt::Debug for ScrapeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeOrchestrator")
            .field("config", &self.config)
            .field("collectors", &self.collector_names())
            .finish_non_exhaustive()
    }
}

/// Wait for the instance, run one update on the blocking pool and forward
/// its report.
///
/// The wait is bounded by the scrape deadline. The guard moves into the
/// blocking task, so the instance stays locked until `update` returns even if
/// the scrape that started it has already given up.
fn spawn_update(
    name: Arc<str>,
    instance: Instance,
    deadline: tokio::time::Instant,
    tx: mpsc::UnboundedSender<CollectorReport>,
) {
    tokio::spawn(async move {
        let begin = Instant::now();
        let mut guard = match tokio::time::timeout_at(deadline, instance.lock_owned()).await {
            Ok(guard) if tokio::time::Instant::now() < deadline => guard,
            _ => {
                warn!(
                    collector = %name,
                    "Previous update still running at the scrape deadline, skipping collector"
                );
                let _ = tx.send(CollectorReport::empty(
                    name,
                    begin.elapsed(),
                    ScrapeOutcome::Busy,
                ));
                return;
            }
        };

        let task_name = Arc::clone(&name);
        let handle = tokio::task::spawn_blocking(move || execute(task_name, &mut **guard));
        let report = match handle.await {
            Ok(report) => report,
            Err(e) => {
                error!(collector = %name, error = %e, "Collector update panicked");
                CollectorReport::empty(name, begin.elapsed(), ScrapeOutcome::Panicked)
            }
        };
        // The receiver is gone once the scrape deadline has passed.
        let _ = tx.send(report);
    });
}

/// Call `update` once and classify the outcome.
fn execute(name: Arc<str>, collector: &mut dyn Collector) -> CollectorReport {
    let begin = Instant::now();
    let mut sink = Sink::new();
    let result = collector.update(&mut sink);
    let duration = begin.elapsed();
    let duration_secs = duration.as_secs_f64();

    match result {
        Ok(()) => {
            debug!(collector = %name, duration_secs, "Collector succeeded");
            CollectorReport {
                name,
                duration,
                outcome: ScrapeOutcome::Success,
                observations: sink.into_observations(),
            }
        }
        Err(e) if e.is_no_data() => {
            debug!(collector = %name, duration_secs, "Collector returned no data");
            CollectorReport::empty(name, duration, ScrapeOutcome::NoData)
        }
        Err(e) => {
            error!(collector = %name, duration_secs, error = %e, "Collector failed");
            CollectorReport::empty(name, duration, ScrapeOutcome::Failed)
        }
    }
}
