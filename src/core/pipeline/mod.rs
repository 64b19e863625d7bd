//! # Pipeline Module
//!
//! Orchestrates a scan: keeps the catalog in step with the folders.
//!
//! ## Pipeline Stages
//! 1. **Walk** - Discover candidate files under every scan target
//! 2. **Hash** - Fingerprint files in parallel on a bounded pool
//! 3. **Classify** - One file at a time: insert, move, content change,
//!    unchanged or duplicate
//! 4. **Sweep** - Soft-delete entries whose file is gone
//!
//! Classification for every target finishes before the sweep starts, so
//! a file moved between two targets is never taken for deleted.
//!
//! ## Concurrency
//! Hashing uses rayon; every catalog call is made from the calling
//! thread. A [`ScanCoordinator`] hands out at most one [`ScanSession`]
//! at a time; given a lock file it also excludes scans in other processes.

mod classify;
mod executor;
mod report;
mod session;

pub use classify::{reconcile_file, Reconciliation};
pub use executor::{Pipeline, PipelineBuilder, PipelineConfig};
pub use report::{ScanCounts, ScanOutcome, ScanReport, ScanWarning};
pub use session::{lock_path_for, CancellationToken, ScanCoordinator, ScanSession, ScanState};
