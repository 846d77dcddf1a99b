//! Failover orchestration: the execution record, the one-step state
//! machine, its persistent store, and the tick loop that drives live
//! executions forward.

pub mod context;
pub mod db;
pub mod machine;
pub mod scheduler;

pub use context::{ExecutionContext, ExecutionResult, FailureCause, FailureKind, StateTransition};
pub use db::ExecutionDb;
pub use machine::{FailoverSettings, Orchestrator, StepOutcome};
pub use scheduler::{drive_to_completion, Scheduler, TickReport};
