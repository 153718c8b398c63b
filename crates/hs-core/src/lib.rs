//! hs-core: Shared types for histscope
//!
//! This crate has zero internal crate dependencies and defines the
//! canonical types used across all other hs-* crates.

pub mod config;
pub mod event;
pub mod execution;
pub mod failures;
pub mod lifecycle;
pub mod timeline;
pub mod trace;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::config::AnalysisConfig;
    pub use crate::event::{EventKind, History, RawEvent};
    pub use crate::execution::{ExecutionInfo, ExecutionRef, WorkflowStatus};
    pub use crate::failures::{FailureEntry, FailureGroup, FailuresResult, GroupBy};
    pub use crate::lifecycle::{Category, FailureInfo, LifecycleRecord, LifecycleStatus, Stage};
    pub use crate::timeline::{TimelineEvent, TimelineResult};
    pub use crate::trace::{
        ChainNode, FailureDescriptor, FailureOutcome, FailureSource, RootCause, RootCauseKind,
        TraceResult,
    };
}
