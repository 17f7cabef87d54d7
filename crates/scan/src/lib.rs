//! Scan lifecycle tracking and result aggregation for external
//! accessibility scan engines.
//!
//! # Architecture
//!
//! - **reader**: loads the engine's CSV result files into rows
//! - **aggregate**: grouped counts, top-N rankings and per-directory summaries
//! - **resolver**: finds the timestamped output directory a job produced
//! - **tracker**: registry of launched jobs with non-blocking status polling
//! - **config_builder**: typed scan options and the on-disk launch artifacts
//! - **environment**: engine discovery and scan mode selection
//! - **runner**: command lines for the engine, fallback scanner and exporter
//! - **report**: report export and Markdown rendering
//! - **service**: the caller-facing query surface

pub mod aggregate;
pub mod config_builder;
pub mod environment;
pub mod reader;
pub mod report;
pub mod resolver;
pub mod runner;
pub mod service;
pub mod tracker;

pub use aggregate::{count_by_field, summarize, top_n_by_field, Summary, ViolationCount};
pub use config_builder::{sanitize_label, ScanOptions, Viewport};
pub use environment::{check_environment, EngineEnvironment};
pub use reader::{list_result_dirs, read_rows, ResultDirEntry, ResultRow, ValueFilter};
pub use resolver::resolve;
pub use runner::ScanCommand;
pub use service::{
    JobEntry, QueryError, ReportOutcome, ScanListing, ScanResults, ScanService, ScanStarted,
    ScanStatus, ScanSummary,
};
pub use tracker::{ScanArtifacts, ScanRecord, ScanTracker};
