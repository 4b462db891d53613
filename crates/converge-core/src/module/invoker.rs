//! Module invocation with timeout and error capture

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use super::{ModuleContext, ModuleRegistry, ModuleResult};
use crate::error::InvokeError;
use crate::plan::PlanStep;

/// Resolves a step's module and runs it under a timeout
#[derive(Debug, Clone)]
pub struct ModuleInvoker {
    registry: Arc<ModuleRegistry>,
    timeout: Duration,
}

impl ModuleInvoker {
    /// Create an invoker bounding each invocation by `timeout`
    pub fn new(registry: Arc<ModuleRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Invoke the module for `step`
    ///
    /// # Errors
    /// - `InvokeError::ModuleNotFound` if no module handles the kind
    /// - `InvokeError::ModuleTimeout` if the module exceeds the timeout
    /// - `InvokeError::InvalidModuleOutput` / `ModuleFailed` if the module
    ///   could not produce a result
    #[instrument(skip(self, step), fields(resource = %step.id, kind = %step.kind()))]
    pub async fn invoke(
        &self,
        step: &PlanStep,
        check_mode: bool,
    ) -> Result<ModuleResult, InvokeError> {
        let module = self
            .registry
            .get(step.kind())
            .ok_or_else(|| InvokeError::ModuleNotFound(step.kind().to_string()))?;

        let ctx = ModuleContext::for_step(step, check_mode);
        let start = Instant::now();

        // Dropping the module future on timeout also drops any child process
        // it spawned through the executor
        match tokio::time::timeout(self.timeout, module.run(&ctx)).await {
            Ok(result) => {
                let result = result?;
                debug!(
                    success = result.success,
                    changed = result.changed,
                    duration = ?start.elapsed(),
                    "module finished"
                );
                Ok(result)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "module timed out");
                Err(InvokeError::ModuleTimeout(self.timeout))
            }
        }
    }

    /// Invoke the module, folding every invocation error into a failed result
    ///
    /// The returned result carries an `error` diagnostic naming the error
    /// kind, so callers never need to handle invocation errors separately.
    pub async fn invoke_captured(&self, step: &PlanStep, check_mode: bool) -> ModuleResult {
        match self.invoke(step, check_mode).await {
            Ok(result) => result,
            Err(err) => captured_failure(&err),
        }
    }
}

fn captured_failure(err: &InvokeError) -> ModuleResult {
    let result = ModuleResult::failed(err.to_string()).with_diagnostic("error", err.kind_name());
    match err {
        InvokeError::InvalidModuleOutput(raw) => result.with_diagnostic("raw_output", raw.as_str()),
        InvokeError::ModuleTimeout(timeout) => {
            result.with_diagnostic("timeout_secs", timeout.as_secs_f64())
        }
        InvokeError::ModuleNotFound(_) | InvokeError::ModuleFailed(_) => result,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ModuleError;
    use crate::module::Module;
    use crate::plan::ExecutionPlan;
    use crate::playbook::ResourceDeclaration;

    struct Sleepy(Duration);

    #[async_trait]
    impl Module for Sleepy {
        async fn run(&self, _ctx: &ModuleContext) -> Result<ModuleResult, ModuleError> {
            tokio::time::sleep(self.0).await;
            Ok(ModuleResult::unchanged("woke up"))
        }
    }

    struct Echo;

    #[async_trait]
    impl Module for Echo {
        async fn run(&self, ctx: &ModuleContext) -> Result<ModuleResult, ModuleError> {
            let msg = format!(
                "{} check={} name={}",
                ctx.resource_id,
                ctx.check_mode,
                ctx.param("name").unwrap_or("-")
            );
            Ok(ModuleResult::unchanged(msg))
        }
    }

    struct Garbled;

    #[async_trait]
    impl Module for Garbled {
        async fn run(&self, _ctx: &ModuleContext) -> Result<ModuleResult, ModuleError> {
            ModuleResult::parse_output("not json")
        }
    }

    fn step(kind: &str) -> PlanStep {
        let plan =
            ExecutionPlan::build(&[ResourceDeclaration::new(kind).with_param("name", "curl")])
                .unwrap();
        plan.steps()[0].clone()
    }

    fn invoker(registry: ModuleRegistry, timeout: Duration) -> ModuleInvoker {
        ModuleInvoker::new(Arc::new(registry), timeout)
    }

    #[tokio::test]
    async fn test_context_is_built_from_step() {
        let invoker = invoker(ModuleRegistry::new().with("echo", Echo), Duration::from_secs(5));
        let result = invoker.invoke(&step("echo"), true).await.unwrap();

        assert_eq!(result.msg, "0 check=true name=curl");
    }

    #[tokio::test]
    async fn test_module_not_found() {
        let invoker = invoker(ModuleRegistry::new(), Duration::from_secs(5));
        let err = invoker.invoke(&step("service"), false).await.unwrap_err();

        assert!(matches!(err, InvokeError::ModuleNotFound(ref k) if k == "service"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_result() {
        let invoker = invoker(
            ModuleRegistry::new().with("slow", Sleepy(Duration::from_secs(10))),
            Duration::from_millis(50),
        );
        let result = invoker.invoke_captured(&step("slow"), false).await;

        assert!(!result.success);
        assert!(!result.changed);
        assert_eq!(result.diagnostic_str("error"), Some("ModuleTimeout"));
    }

    #[tokio::test]
    async fn test_invalid_output_keeps_raw_text() {
        let invoker = invoker(ModuleRegistry::new().with("bad", Garbled), Duration::from_secs(5));
        let result = invoker.invoke_captured(&step("bad"), false).await;

        assert!(!result.success);
        assert_eq!(result.diagnostic_str("error"), Some("InvalidModuleOutput"));
        assert_eq!(result.diagnostic_str("raw_output"), Some("not json"));
    }
}
