//! The durable execution substrate the workflows run on.
//!
//! - [`policy`]: per-call-site timeout and retry configuration
//! - [`invoke`]: the timeout/retry wrapper around activity calls
//! - [`context`]: the journal-backed step cache that makes runs resumable
//! - [`status`]: queryable in-flight progress cells
//! - [`replay`]: offline journal verification

pub mod context;
pub mod invoke;
pub mod policy;
pub mod replay;
pub mod status;

pub use context::{StepOutcome, WorkflowCtx};
pub use invoke::invoke;
pub use policy::{ActivityOptions, RetryPolicy};
pub use replay::{replay_inspect, ReplaySummary};
pub use status::{StatusCell, StatusReader};
