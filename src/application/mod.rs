//! Application layer - Generic services that use ports.

pub mod analysis;
pub mod orchestrator;
pub mod query;
pub mod render;
pub mod scratch;
pub mod tasks;
pub mod worker;

pub use analysis::AnalysisChain;
pub use orchestrator::OrchestratorService;
pub use query::{QueryOutcome, QueryService};
pub use render::{RenderOutcome, RenderService};
pub use tasks::TaskDispatcher;
pub use worker::WorkerService;
