//! planchain engine: validation, repair, reference resolution, and
//! sequential execution of operation plans.

pub mod context;
pub mod engine;
pub mod orchestrator;
pub mod repair;
pub mod resolver;
pub mod validator;

pub use context::ExecutionContext;
pub use engine::{ExecutionEngine, NO_CALLS_MESSAGE};
pub use orchestrator::{Orchestrator, OrchestratorStatus, RunMode};
pub use repair::PlanRepairer;
pub use resolver::{Reference, ResolutionFailure, Resolver};
pub use validator::validate;
