//! Convergence engine
//!
//! Drives an [`ExecutionPlan`] through the module invoker. Resources start
//! only once every dependency has converged; when a dependency fails or is
//! skipped, everything downstream of it is skipped without invocation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineOptions;
use crate::event::RunEvent;
use crate::module::{ModuleInvoker, ModuleRegistry, ModuleResult};
use crate::plan::{ExecutionPlan, PlanStep};
use crate::report::{Report, ResourceOutcome};
use crate::state::ResourceState;

/// Runs execution plans against a module registry
pub struct ConvergenceEngine {
    invoker: ModuleInvoker,
    options: EngineOptions,
    event_tx: broadcast::Sender<RunEvent>,
    cancel: CancellationToken,
}

impl ConvergenceEngine {
    /// Create an engine
    ///
    /// # Arguments
    /// * `registry` - Modules available to this engine
    /// * `options` - Timeout and concurrency settings
    pub fn new(registry: Arc<ModuleRegistry>, options: EngineOptions) -> Self {
        let (event_tx, _) = broadcast::channel(options.event_channel_capacity.max(1));
        Self {
            invoker: ModuleInvoker::new(registry, options.timeout),
            options,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Receive progress events for subsequent runs
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.event_tx.subscribe()
    }

    /// Token that stops scheduling new resources when cancelled
    ///
    /// Invocations already in flight run to completion or to their timeout.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Converge every resource in `plan`
    ///
    /// Never fails: every resource ends in a terminal state recorded in the
    /// returned report, ordered as in the plan.
    #[instrument(skip(self, plan), fields(resources = plan.len()))]
    pub async fn run(&self, plan: &ExecutionPlan, check_mode: bool) -> Report {
        let started_at = Utc::now();
        let steps = plan.steps();
        let jobs = self.options.jobs.max(1);
        let mut run = RunState::new(steps, &self.event_tx);

        info!(jobs, "starting convergence run");
        self.emit(RunEvent::RunStarted {
            total: steps.len(),
            check_mode,
        });

        loop {
            run.skip_blocked();

            if self.cancel.is_cancelled() {
                warn!("run cancelled, skipping remaining resources");
                run.skip_pending("Skipped: run cancelled.");
                break;
            }

            let batch = run.ready(jobs);
            if batch.is_empty() {
                break;
            }

            for &pos in &batch {
                run.start(pos);
            }

            let invocations = batch
                .iter()
                .map(|&pos| self.invoke_timed(&steps[pos], check_mode));
            let results = join_all(invocations).await;

            for (pos, (result, elapsed_ms)) in batch.into_iter().zip(results) {
                run.finish(pos, result, elapsed_ms);
            }
        }

        let report = Report {
            check_mode,
            started_at,
            finished_at: Utc::now(),
            outcomes: run.into_outcomes(),
        };

        let summary = report.summary();
        info!(
            success = report.success(),
            converged = summary.converged,
            changed = summary.changed,
            failed = summary.failed,
            skipped = summary.skipped,
            "convergence run finished"
        );
        self.emit(RunEvent::RunFinished {
            success: report.success(),
            changed: summary.changed,
        });

        report
    }

    async fn invoke_timed(&self, step: &PlanStep, check_mode: bool) -> (ModuleResult, u64) {
        let start = Instant::now();
        let result = self.invoker.invoke_captured(step, check_mode).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        (result, elapsed_ms)
    }

    fn emit(&self, event: RunEvent) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

/// Mutable state of one run, owned by [`ConvergenceEngine::run`]
struct RunState<'a> {
    steps: &'a [PlanStep],
    states: Vec<ResourceState>,
    outcomes: Vec<Option<ResourceOutcome>>,
    event_tx: &'a broadcast::Sender<RunEvent>,
}

impl<'a> RunState<'a> {
    fn new(steps: &'a [PlanStep], event_tx: &'a broadcast::Sender<RunEvent>) -> Self {
        Self {
            steps,
            states: vec![ResourceState::Pending; steps.len()],
            outcomes: vec![None; steps.len()],
            event_tx,
        }
    }

    fn transition(&mut self, pos: usize, next: ResourceState) {
        debug_assert!(
            self.states[pos].can_transition_to(next),
            "invalid transition {} -> {next} for '{}'",
            self.states[pos],
            self.steps[pos].id
        );
        self.states[pos] = next;
    }

    /// Skip pending resources with a dependency that will never converge
    ///
    /// Dependencies always sit earlier in the plan, so one forward pass
    /// covers transitive dependents.
    fn skip_blocked(&mut self) {
        for pos in 0..self.steps.len() {
            if self.states[pos] != ResourceState::Pending {
                continue;
            }
            let blocker = self.steps[pos].depends_on.iter().copied().find(|&dep| {
                matches!(
                    self.states[dep],
                    ResourceState::Failed | ResourceState::Skipped
                )
            });
            if let Some(dep) = blocker {
                let msg = format!(
                    "Skipped: dependency '{}' did not converge.",
                    self.steps[dep].id
                );
                self.skip(pos, msg);
            }
        }
    }

    fn skip_pending(&mut self, msg: &str) {
        for pos in 0..self.steps.len() {
            if self.states[pos] == ResourceState::Pending {
                self.skip(pos, msg.to_string());
            }
        }
    }

    fn skip(&mut self, pos: usize, msg: String) {
        debug!(resource = %self.steps[pos].id, reason = %msg, "skipping resource");
        self.transition(pos, ResourceState::Skipped);
        self.record(pos, ResourceState::Skipped, false, msg, Default::default(), 0);
    }

    /// Pending resources whose dependencies all converged, in plan order
    fn ready(&self, limit: usize) -> Vec<usize> {
        (0..self.steps.len())
            .filter(|&pos| {
                self.states[pos] == ResourceState::Pending
                    && self.steps[pos]
                        .depends_on
                        .iter()
                        .all(|&dep| self.states[dep] == ResourceState::Converged)
            })
            .take(limit)
            .collect()
    }

    fn start(&mut self, pos: usize) {
        let steps = self.steps;
        let step = &steps[pos];
        debug!(resource = %step.id, kind = %step.kind(), "starting resource");
        self.event_tx
            .send(RunEvent::ResourceStarted {
                id: step.id.clone(),
                kind: step.kind().to_string(),
            })
            .ok();
        self.transition(pos, ResourceState::Running);
    }

    fn finish(&mut self, pos: usize, result: ModuleResult, elapsed_ms: u64) {
        let state = if result.success {
            ResourceState::Converged
        } else {
            ResourceState::Failed
        };
        let steps = self.steps;
        let id = &steps[pos].id;
        if state == ResourceState::Failed {
            warn!(resource = %id, msg = %result.msg, "resource failed");
        } else {
            info!(resource = %id, changed = result.changed, msg = %result.msg, "resource converged");
        }

        self.transition(pos, state);
        self.record(
            pos,
            state,
            result.changed,
            result.msg,
            result.diagnostics,
            elapsed_ms,
        );
    }

    fn record(
        &mut self,
        pos: usize,
        state: ResourceState,
        changed: bool,
        msg: String,
        diagnostics: BTreeMap<String, Value>,
        duration_ms: u64,
    ) {
        debug_assert!(state.is_terminal(), "recorded non-terminal state {state}");
        let steps = self.steps;
        let step = &steps[pos];
        self.event_tx
            .send(RunEvent::ResourceFinished {
                id: step.id.clone(),
                state,
                changed,
                msg: msg.clone(),
            })
            .ok();
        self.outcomes[pos] = Some(ResourceOutcome {
            id: step.id.clone(),
            kind: step.kind().to_string(),
            state,
            changed,
            msg,
            diagnostics,
            duration_ms,
        });
    }

    fn into_outcomes(self) -> Vec<ResourceOutcome> {
        self.outcomes.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ModuleError;
    use crate::module::{Module, ModuleContext};
    use crate::playbook::ResourceDeclaration;

    /// Succeeds unless the `fail` param is set
    struct Scripted;

    #[async_trait]
    impl Module for Scripted {
        async fn run(&self, ctx: &ModuleContext) -> Result<ModuleResult, ModuleError> {
            if ctx.param("fail").is_some() {
                Ok(ModuleResult::failed(format!("{} broke", ctx.resource_id)))
            } else {
                Ok(ModuleResult::changed(format!("{} done", ctx.resource_id)))
            }
        }
    }

    fn engine() -> ConvergenceEngine {
        ConvergenceEngine::new(
            Arc::new(ModuleRegistry::new().with("noop", Scripted)),
            EngineOptions::default(),
        )
    }

    fn res(id: &str) -> ResourceDeclaration {
        ResourceDeclaration::new("noop").with_id(id)
    }

    #[tokio::test]
    async fn test_skip_message_names_blocking_dependency() {
        let plan = ExecutionPlan::build(&[
            res("a").with_param("fail", "1"),
            res("b").requiring("a"),
            res("c").requiring("b"),
        ])
        .unwrap();

        let report = engine().run(&plan, false).await;

        assert_eq!(
            report.outcome("b").unwrap().msg,
            "Skipped: dependency 'a' did not converge."
        );
        assert_eq!(
            report.outcome("c").unwrap().msg,
            "Skipped: dependency 'b' did not converge."
        );
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let engine = engine();
        let mut events = engine.subscribe();
        let plan = ExecutionPlan::build(&[res("a")]).unwrap();

        engine.run(&plan, true).await;

        assert_eq!(
            events.recv().await.unwrap(),
            RunEvent::RunStarted {
                total: 1,
                check_mode: true
            }
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            RunEvent::ResourceStarted { ref id, .. } if id == "a"
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            RunEvent::ResourceFinished { state: ResourceState::Converged, changed: true, .. }
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            RunEvent::RunFinished {
                success: true,
                changed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let engine = engine();
        engine.cancellation_token().cancel();
        let plan = ExecutionPlan::build(&[res("a"), res("b")]).unwrap();

        let report = engine.run(&plan, false).await;

        assert!(report.success());
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| o.state == ResourceState::Skipped && o.msg == "Skipped: run cancelled.")
        );
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let report = engine().run(&ExecutionPlan::default(), false).await;
        assert!(report.success());
        assert!(report.outcomes.is_empty());
    }
}
