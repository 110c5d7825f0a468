//! Workflow execution engine for promptloom.
//!
//! Runs an ordered sequence of typed steps, resolving variable bindings
//! between them and fanning PROMPT steps out to model providers under a
//! routing policy. Guarantees: strict step ordering, bounded concurrency
//! inside the router, retry/timeout discipline per call, and cooperative
//! cancellation.
//!
//! # Components
//!
//! - **[`WorkflowRunner`]** - sequential driver threading the run context
//! - **[`ModelRouter`]** - fallback or bounded-parallel provider fan-out
//! - **[`steps`]** - one executor per step type
//! - **[`store`]** - the consumed persistence seams

pub mod retry;
pub mod router;
pub mod runner;
pub mod steps;
pub mod store;

pub use retry::{with_retry, Retryable};
pub use router::{ModelRouter, PromptPayload, RouteError, RoutedOutput};
pub use runner::{RunOptions, WorkflowRunner};
pub use steps::{executor_for, ExecEnv, StepExecutor};
pub use store::{ExecutionStore, InMemoryExecutionStore, InMemoryWorkflowStore, WorkflowStore};
