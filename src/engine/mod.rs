//! Issue state and concurrency engine.
//!
//! Writes flow through the hierarchy validator, the version guard and the
//! board consistency rules inside one store transaction; creates draw their
//! number from the sequence allocator in that same transaction. Progress is
//! computed on read paths only.

pub mod board;
pub mod columns;
pub mod error;
pub mod hierarchy;
pub mod issues;
pub mod model;
pub mod progress;
pub mod projects;
pub mod sequence;
pub mod store;
pub mod transition;
pub mod version;

pub use error::{EngineError, EngineResult, Entity, ValidationReason};
pub use issues::{CreateIssueCommand, IssueEngine, MoveIssueCommand, UpdateIssueCommand};
pub use progress::Progress;
pub use sequence::IssueKey;
pub use store::{IssueStore, StoreProvider};
pub use transition::{NoopSink, Transition, TransitionKind, TransitionSink};
