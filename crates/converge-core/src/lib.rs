//! converge-core: Resource orchestration
//!
//! Turns a playbook into a dependency-ordered execution plan by way of the
//! line-oriented record transport, then converges each resource through a
//! typed module registry.
//!
//! Playbook → [`codec`] → [`graph`] → [`scheduler`] → [`ConvergenceEngine`]
//! → [`Report`]

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod graph;
pub mod module;
pub mod plan;
pub mod playbook;
pub mod report;
pub mod scheduler;
pub mod state;

pub use codec::{decode, encode};
pub use config::EngineOptions;
pub use engine::ConvergenceEngine;
pub use error::{
    CodecError, ConvergeError, GraphError, InvokeError, ModuleError, PlaybookError,
    ValidationError,
};
pub use event::RunEvent;
pub use graph::{ResourceGraph, ResourceNode};
pub use module::{
    ExternalModule, FileModule, Module, ModuleContext, ModuleInvoker, ModuleRegistry,
    ModuleResult, PackageModule,
};
pub use plan::{ExecutionPlan, PlanStep};
pub use playbook::{Playbook, ResourceDeclaration};
pub use report::{Report, ResourceOutcome, RunSummary};
pub use state::ResourceState;
