//! Pipeline execution implementation.

use super::classify::{reconcile_file, Reconciliation};
use super::report::{ScanCounts, ScanOutcome, ScanReport, ScanWarning};
use super::session::{ScanCoordinator, ScanSession, ScanState};
use crate::core::catalog::{Catalog, InMemoryCatalog};
use crate::core::hasher::{ContentHash, HasherConfig};
use crate::core::library::{ExcludedPath, LibraryConfig, ScanTarget};
use crate::core::rules::RuleSet;
use crate::core::scanner::{BookScanner, ScanConfig, WalkDirScanner, WalkResult};
use crate::error::{CatalogError, CatalogerError, HashError, ScanError};
use crate::events::{
    null_sender, Event, EventSender, HashEvent, HashProgress, ReconcileEvent, ScanPhase,
    SessionEvent,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for the pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Folders to scan
    pub targets: Vec<ScanTarget>,
    /// Folders never descended
    pub excluded: Vec<ExcludedPath>,
    /// Scanner configuration
    pub scan_config: ScanConfig,
    /// Hashing limits
    pub hasher: HasherConfig,
    /// Hashing workers (None = one per CPU)
    pub hash_threads: Option<usize>,
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: PipelineConfig,
    rules: Option<RuleSet>,
    catalog: Option<Arc<dyn Catalog>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            rules: None,
            catalog: None,
        }
    }

    /// Set the folders to scan
    pub fn targets(mut self, targets: Vec<ScanTarget>) -> Self {
        self.config.targets = targets;
        self
    }

    /// Add one folder to scan
    pub fn target(mut self, target: ScanTarget) -> Self {
        self.config.targets.push(target);
        self
    }

    /// Set the folders to prune
    pub fn excluded(mut self, excluded: Vec<ExcludedPath>) -> Self {
        self.config.excluded = excluded;
        self
    }

    /// Set the filename parsing rules
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Set the catalog backend
    pub fn catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set hashing limits
    pub fn hasher(mut self, hasher: HasherConfig) -> Self {
        self.config.hasher = hasher;
        self
    }

    /// Restrict the walk to these extensions (empty = defaults)
    pub fn extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.scan_config.extensions = Some(extensions);
        self
    }

    /// Set scanner configuration
    pub fn scan_config(mut self, config: ScanConfig) -> Self {
        self.config.scan_config = config;
        self
    }

    /// Include hidden files
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.scan_config.include_hidden = include;
        self
    }

    /// Number of hashing workers
    pub fn hash_threads(mut self, threads: usize) -> Self {
        self.config.hash_threads = Some(threads.max(1));
        self
    }

    /// Apply everything a library config file specifies
    pub fn library(mut self, library: &LibraryConfig) -> Self {
        self.config.targets.extend(library.targets.iter().cloned());
        self.config.excluded.extend(library.excluded.iter().cloned());
        if !library.extensions.is_empty() {
            self.config.scan_config.extensions = Some(library.extensions.clone());
        }
        if let Some(bytes) = library.max_file_size {
            self.config.hasher = self.config.hasher.max_file_size(bytes);
        }
        if let Some(secs) = library.read_timeout_secs {
            self.config.hasher = self.config.hasher.read_timeout(Duration::from_secs(secs));
        }
        if let Some(threads) = library.hash_threads {
            self = self.hash_threads(threads);
        }
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            config: self.config,
            rules: self.rules.unwrap_or_else(RuleSet::builtin),
            catalog: self
                .catalog
                .unwrap_or_else(|| Arc::new(InMemoryCatalog::new())),
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The scan-and-reconcile pipeline
pub struct Pipeline {
    config: PipelineConfig,
    rules: RuleSet,
    catalog: Arc<dyn Catalog>,
}

/// Running tallies for one scan
#[derive(Default)]
struct Ledger {
    counts: ScanCounts,
    warnings: Vec<ScanWarning>,
}

impl Ledger {
    fn warn(&mut self, path: &Path, reason: impl Into<String>, events: &EventSender) {
        let reason = reason.into();
        warn!(path = %path.display(), "{}", reason);
        events.send(Event::Reconcile(ReconcileEvent::Warning {
            path: path.to_path_buf(),
            message: reason.clone(),
        }));
        self.warnings.push(ScanWarning {
            path: path.to_path_buf(),
            reason,
        });
    }

    fn skip(&mut self, path: &Path, reason: impl Into<String>, events: &EventSender) {
        self.counts.skipped += 1;
        self.warn(path, reason, events);
    }

    fn record(&mut self, path: &Path, outcome: Reconciliation, events: &EventSender) {
        match outcome {
            Reconciliation::Unchanged { .. } => self.counts.unchanged += 1,
            Reconciliation::Inserted { id } => {
                self.counts.inserted += 1;
                events.send(Event::Reconcile(ReconcileEvent::Inserted {
                    id,
                    path: path.to_path_buf(),
                }));
            }
            Reconciliation::Moved { id, from, replaced } => {
                if let Some(displaced) = replaced {
                    self.counts.deleted += 1;
                    events.send(Event::Reconcile(ReconcileEvent::Replaced {
                        id: displaced,
                        path: path.to_path_buf(),
                    }));
                }
                self.counts.moved += 1;
                events.send(Event::Reconcile(ReconcileEvent::Moved {
                    id,
                    from,
                    to: path.to_path_buf(),
                }));
            }
            Reconciliation::ContentChanged { id, .. } => {
                self.counts.content_updated += 1;
                events.send(Event::Reconcile(ReconcileEvent::ContentChanged {
                    id,
                    path: path.to_path_buf(),
                }));
            }
            Reconciliation::Duplicate { original, .. } => {
                self.skip(
                    path,
                    format!("duplicate content of {}", original.display()),
                    events,
                );
            }
        }
    }
}

/// Why a phase stopped the scan early
enum Halt {
    Cancelled,
    Fatal(String),
}

impl Halt {
    fn reason(self) -> String {
        match self {
            Halt::Cancelled => ScanError::Cancelled.to_string(),
            Halt::Fatal(reason) => reason,
        }
    }
}

impl From<CatalogError> for Halt {
    fn from(error: CatalogError) -> Self {
        Halt::Fatal(error.to_string())
    }
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Acquire a session from `coordinator` and run a scan with it.
    ///
    /// Fails with [`ScanError::ConcurrencyRejected`] if another scan holds
    /// the coordinator.
    pub fn scan(&self, coordinator: &ScanCoordinator) -> Result<ScanReport, CatalogerError> {
        let session = coordinator.begin()?;
        self.run(session)
    }

    /// Run the pipeline without events
    pub fn run(&self, session: ScanSession) -> Result<ScanReport, CatalogerError> {
        self.run_with_events(session, &null_sender())
    }

    /// Run the pipeline with event reporting.
    ///
    /// Unrecoverable conditions (every target unreadable, catalog
    /// unavailable, cancellation) end the scan with an `Aborted` report
    /// rather than an error. Only a failure to start the hashing workers
    /// is returned as `Err`.
    pub fn run_with_events(
        &self,
        mut session: ScanSession,
        events: &EventSender,
    ) -> Result<ScanReport, CatalogerError> {
        let start_time = Instant::now();
        let mut ledger = Ledger::default();

        session.advance(ScanState::Scanning);
        info!(session = %session.id(), targets = self.config.targets.len(), "scan started");
        events.send(Event::Session(SessionEvent::Started {
            session_id: session.id().to_string(),
            targets: self.config.targets.iter().map(|t| t.path.clone()).collect(),
        }));

        let outcome = match self.execute(&mut session, &mut ledger, events) {
            Ok(()) => {
                session.advance(ScanState::Completed);
                ScanOutcome::Completed
            }
            Err(PhaseError::Halt(halt)) => {
                session.advance(ScanState::Aborted);
                ScanOutcome::Aborted {
                    reason: halt.reason(),
                }
            }
            Err(PhaseError::Setup(error)) => {
                session.advance(ScanState::Aborted);
                return Err(error.into());
            }
        };

        let report = ScanReport {
            session_id: session.id(),
            outcome,
            counts: ledger.counts,
            warnings: ledger.warnings,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        match &report.outcome {
            ScanOutcome::Completed => {
                info!(
                    session = %report.session_id,
                    inserted = report.counts.inserted,
                    moved = report.counts.moved,
                    content_updated = report.counts.content_updated,
                    deleted = report.counts.deleted,
                    skipped = report.counts.skipped,
                    duration_ms = report.duration_ms,
                    "scan completed"
                );
                events.send(Event::Session(SessionEvent::Completed {
                    summary: report.summary(),
                }));
            }
            ScanOutcome::Aborted { reason } => {
                warn!(session = %report.session_id, reason = %reason, "scan aborted");
                events.send(Event::Session(SessionEvent::Aborted {
                    reason: reason.clone(),
                }));
            }
        }

        Ok(report)
    }

    fn execute(
        &self,
        session: &mut ScanSession,
        ledger: &mut Ledger,
        events: &EventSender,
    ) -> Result<(), PhaseError> {
        // Phase 1: Walking
        events.send(Event::Session(SessionEvent::PhaseChanged {
            phase: ScanPhase::Walking,
        }));

        let scanner = WalkDirScanner::new(self.config.scan_config.clone());
        let walk = scanner.scan_with_events(&self.config.targets, &self.config.excluded, events);

        for error in &walk.errors {
            let path = error.path().map(Path::to_path_buf).unwrap_or_default();
            ledger.warn(&path, error.to_string(), events);
        }

        if walk.all_targets_unreadable() {
            return Err(PhaseError::Halt(Halt::Fatal(
                "every scan target is missing or unreadable".to_string(),
            )));
        }
        ledger.counts.files_seen = walk.files.len();
        checkpoint(session)?;

        // Phase 2: Hashing
        events.send(Event::Session(SessionEvent::PhaseChanged {
            phase: ScanPhase::Hashing,
        }));
        let hashed = self.hash_files(session, &walk, ledger, events)?;
        checkpoint(session)?;

        // Phase 3: Classifying
        session.advance(ScanState::Reconciling);
        events.send(Event::Session(SessionEvent::PhaseChanged {
            phase: ScanPhase::Classifying,
        }));

        let observed: HashMap<PathBuf, ContentHash> = hashed.iter().cloned().collect();

        for (path, hash) in &hashed {
            checkpoint(session)?;

            match reconcile_file(self.catalog.as_ref(), &self.rules, path, hash, &observed) {
                Ok(outcome) => ledger.record(path, outcome, events),
                Err(error) if error.is_fatal() => return Err(Halt::from(error).into()),
                Err(error) => ledger.skip(path, error.to_string(), events),
            }
        }

        // Phase 4: Sweeping
        events.send(Event::Session(SessionEvent::PhaseChanged {
            phase: ScanPhase::Sweeping,
        }));
        self.sweep_deleted(session, &walk, &observed, ledger, events)
    }

    /// Hash every walked file on a bounded pool. Results keep walk order.
    fn hash_files(
        &self,
        session: &ScanSession,
        walk: &WalkResult,
        ledger: &mut Ledger,
        events: &EventSender,
    ) -> Result<Vec<(PathBuf, ContentHash)>, PhaseError> {
        let total_files = walk.files.len();
        events.send(Event::Hash(HashEvent::Started { total_files }));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.hash_threads.unwrap_or(0))
            .build()
            .map_err(|e| PhaseError::Setup(ScanError::ThreadPool(e.to_string())))?;

        let hasher = self.config.hasher.clone().build();
        let cancel = session.cancellation_token();
        let completed = AtomicUsize::new(0);

        let results: Vec<(PathBuf, Option<Result<ContentHash, HashError>>)> = pool.install(|| {
            walk.files
                .par_iter()
                .map(|file| {
                    if cancel.is_cancelled() {
                        return (file.path.clone(), None);
                    }

                    let result = hasher.hash_file(&file.path);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    events.send(Event::Hash(HashEvent::Progress(HashProgress {
                        completed: done,
                        total: total_files,
                        current_path: file.path.clone(),
                    })));
                    (file.path.clone(), Some(result))
                })
                .collect()
        });

        checkpoint(session)?;

        let mut hashed = Vec::with_capacity(results.len());
        let mut failed = 0;
        for (path, result) in results {
            match result {
                Some(Ok(hash)) => hashed.push((path, hash)),
                Some(Err(error)) => {
                    failed += 1;
                    events.send(Event::Hash(HashEvent::Error {
                        path: path.clone(),
                        message: error.to_string(),
                    }));
                    ledger.skip(&path, error.to_string(), events);
                }
                None => return Err(Halt::Cancelled.into()),
            }
        }

        events.send(Event::Hash(HashEvent::Completed {
            total_hashed: hashed.len(),
            failed,
        }));
        debug!(hashed = hashed.len(), failed, "hashing finished");

        Ok(hashed)
    }

    /// Soft-delete active entries whose file is gone
    fn sweep_deleted(
        &self,
        session: &ScanSession,
        walk: &WalkResult,
        observed: &HashMap<PathBuf, ContentHash>,
        ledger: &mut Ledger,
        events: &EventSender,
    ) -> Result<(), PhaseError> {
        let active = match self.catalog.list_active() {
            Ok(active) => active,
            Err(error) if error.is_fatal() => return Err(Halt::from(error).into()),
            Err(error) => {
                ledger.warn(
                    Path::new(""),
                    format!("deletion pass skipped: {error}"),
                    events,
                );
                return Ok(());
            }
        };

        let excluded: Vec<ExcludedPath> = self
            .config
            .excluded
            .iter()
            .flat_map(|x| [x.clone(), x.resolved()])
            .collect();

        for entry in active {
            checkpoint(session)?;

            let path = &entry.file_path;
            if observed.contains_key(path) || is_readable_file(path) {
                continue;
            }
            if excluded.iter().any(|x| x.covers(path)) {
                continue;
            }
            if walk.is_unobserved(path) {
                ledger.warn(
                    path,
                    "kept: its folder could not be read during this scan",
                    events,
                );
                continue;
            }

            match self.catalog.mark_deleted(entry.id) {
                Ok(()) => {
                    debug!(id = entry.id, path = %path.display(), "soft-deleted");
                    ledger.counts.deleted += 1;
                    events.send(Event::Reconcile(ReconcileEvent::Deleted {
                        id: entry.id,
                        path: path.clone(),
                    }));
                }
                Err(error) if error.is_fatal() => return Err(Halt::from(error).into()),
                Err(error) => ledger.warn(path, error.to_string(), events),
            }
        }

        Ok(())
    }
}

/// A phase either halts the scan or cannot start at all
enum PhaseError {
    Halt(Halt),
    Setup(ScanError),
}

impl From<Halt> for PhaseError {
    fn from(halt: Halt) -> Self {
        PhaseError::Halt(halt)
    }
}

fn checkpoint(session: &ScanSession) -> Result<(), PhaseError> {
    if session.is_cancelled() {
        return Err(Halt::Cancelled.into());
    }
    Ok(())
}

fn is_readable_file(path: &Path) -> bool {
    File::open(path)
        .and_then(|f| f.metadata())
        .map(|m| m.is_file())
        .unwrap_or(false)
}
