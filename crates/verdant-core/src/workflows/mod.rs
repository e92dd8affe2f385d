//! The four durable pipeline workflows.
//!
//! Each workflow owns one [`crate::runtime::WorkflowCtx`]: its side
//! effects go through journaled steps, so an interrupted run resumes
//! from the journal with every settled step cached.

pub mod analysis;
pub mod batch;
pub mod handle;
pub mod janitor;
pub mod portfolio;

pub use analysis::{AnalysisInput, AnalysisWorkflow};
pub use batch::{BatchGardeningInput, BatchGardeningWorkflow};
pub use handle::WorkflowHandle;
pub use janitor::{JanitorInput, JanitorWorkflow};
pub use portfolio::{PortfolioInput, PortfolioWorkflow};
