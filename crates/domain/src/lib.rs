//! `wordtrail-domain` — the concrete aggregates hosted on the runtime.
//!
//! Two aggregates: [`writer::Writer`] (a registered author and their project
//! catalogue) and [`project::Project`] (one writing project and its
//! word-count history). The runtime is agnostic to both; they plug in via
//! the dispatcher's registration table.

pub mod project;
pub mod writer;

pub use project::{Project, ProjectCommand, ProjectEvent, ProjectId, WordCountUpdateId};
pub use writer::{Writer, WriterCommand, WriterEvent, WriterId};
