//! `wordtrail-readmodels` — read-side projections.
//!
//! Each read model subscribes to committed events and maintains its own
//! query-optimized state, independent of the event log. All projections are:
//! - **Rebuildable**: reconstructable from the event stream
//! - **Idempotent**: safe under at-least-once delivery

pub mod project_progress;
pub mod writer_directory;

pub use project_progress::{ProjectProgress, ProjectStatus};
pub use writer_directory::{WriterDetails, WriterDirectory};
