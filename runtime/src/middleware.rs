//! Ordered middleware steps.
//!
//! Each step receives the context and a [`Next`] continuation. Calling
//! `next.run(ctx)` runs the remaining steps and returns their exit code;
//! returning without calling it short-circuits the rest. Steps are sorted
//! by stage, then by order within the stage, with registration order
//! breaking ties.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::context::CommandContext;
use crate::error::{ExitCode, PipelineError, Result};

/// Pipeline phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareStage {
    /// Classifies the raw words.
    Tokenize,
    /// Applies leading `[...]` directives.
    Directives,
    /// Selects the command node; help and `[suggest]` stop here.
    ResolveCommand,
    /// Fills and converts argument values; `[parse]` stops here.
    BindValues,
    /// Runs interceptors and the handler.
    Invoke,
}

type StepFn = dyn Fn(&mut CommandContext, Next<'_>) -> Result<ExitCode> + Send + Sync;

/// One named step.
#[derive(Clone)]
pub struct MiddlewareStep {
    /// Stage the step belongs to.
    pub stage: MiddlewareStage,
    /// Position within the stage; built-in steps use 0.
    pub order: i32,
    /// Unique name, used in logs and duplicate checks.
    pub name: String,
    handler: Arc<StepFn>,
}

impl MiddlewareStep {
    /// Wraps `handler` as a named step.
    pub fn new<F>(stage: MiddlewareStage, order: i32, name: &str, handler: F) -> Self
    where
        F: Fn(&mut CommandContext, Next<'_>) -> Result<ExitCode> + Send + Sync + 'static,
    {
        Self {
            stage,
            order,
            name: name.to_string(),
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for MiddlewareStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareStep")
            .field("stage", &self.stage)
            .field("order", &self.order)
            .field("name", &self.name)
            .finish()
    }
}

/// Continuation over the steps that have not run yet.
pub struct Next<'a> {
    steps: &'a [MiddlewareStep],
}

impl Next<'_> {
    /// Runs the next step; `SUCCESS` when none are left.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] if cancellation was signalled
    /// before the next step, or whatever the step returns.
    pub fn run(self, ctx: &mut CommandContext) -> Result<ExitCode> {
        let Some((step, rest)) = self.steps.split_first() else {
            return Ok(crate::error::exit_code::SUCCESS);
        };
        ctx.check_cancelled()?;
        trace!(step = %step.name, stage = ?step.stage, "Entering middleware");
        (step.handler)(ctx, Next { steps: rest })
    }

    /// Steps left, including the one `run` would call.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

/// Sorted, immutable step list shared by every run.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Arc<[MiddlewareStep]>,
}

impl Pipeline {
    /// Sorts `steps` by stage and order, keeping registration order for ties.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when two steps share a name.
    ///
    /// # Examples
    ///
    /// ```
    /// use cmdpipe_runtime::{MiddlewareStage, MiddlewareStep, Pipeline};
    ///
    /// let pipeline = Pipeline::new(vec![
    ///     MiddlewareStep::new(MiddlewareStage::Invoke, 0, "invoke", |_, _| Ok(0)),
    ///     MiddlewareStep::new(MiddlewareStage::Tokenize, 0, "tokenize", |ctx, next| next.run(ctx)),
    /// ])
    /// .unwrap();
    /// assert_eq!(pipeline.step_names(), vec!["tokenize", "invoke"]);
    /// ```
    pub fn new(mut steps: Vec<MiddlewareStep>) -> Result<Self> {
        let mut names = HashSet::new();
        for step in &steps {
            if !names.insert(step.name.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "middleware step '{}' registered twice",
                    step.name
                )));
            }
        }
        steps.sort_by_key(|step| (step.stage, step.order));
        Ok(Self {
            steps: steps.into(),
        })
    }

    /// Runs every step against `ctx`.
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<ExitCode> {
        Next { steps: &self.steps }.run(ctx)
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.steps.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use cmdpipe_core::{CommandDecl, CommandModel, ModelOptions};
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn context() -> CommandContext {
        let model = CommandModel::build(&CommandDecl::new("app"), &ModelOptions::default()).unwrap();
        CommandContext::new(Arc::new(model), Vec::<String>::new())
    }

    fn recording(
        log: &Arc<Mutex<Vec<String>>>,
        stage: MiddlewareStage,
        order: i32,
        name: &str,
    ) -> MiddlewareStep {
        let log = Arc::clone(log);
        let label = name.to_string();
        MiddlewareStep::new(stage, order, name, move |ctx, next| {
            log.lock().unwrap().push(label.clone());
            next.run(ctx)
        })
    }

    #[test]
    fn test_steps_sorted_by_stage_then_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            recording(&log, MiddlewareStage::Invoke, 0, "invoke"),
            recording(&log, MiddlewareStage::BindValues, 5, "late-bind"),
            recording(&log, MiddlewareStage::BindValues, -5, "early-bind"),
            recording(&log, MiddlewareStage::Tokenize, 0, "tokenize"),
            recording(&log, MiddlewareStage::BindValues, 5, "late-bind-2"),
        ])
        .unwrap();

        let code = pipeline.execute(&mut context()).unwrap();

        assert_eq!(code, 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["tokenize", "early-bind", "late-bind", "late-bind-2", "invoke"]
        );
    }

    #[test]
    fn test_step_can_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            MiddlewareStep::new(MiddlewareStage::Directives, 0, "stop", |_, _| Ok(42)),
            recording(&log, MiddlewareStage::Invoke, 0, "invoke"),
        ])
        .unwrap();

        assert_eq!(pipeline.execute(&mut context()).unwrap(), 42);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = Pipeline::new(vec![
            recording(&log, MiddlewareStage::Tokenize, 0, "same"),
            recording(&log, MiddlewareStage::Invoke, 0, "same"),
        ])
        .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_cancellation_stops_before_next_step() {
        let token = CancellationToken::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let cancel = token.clone();
        let pipeline = Pipeline::new(vec![
            MiddlewareStep::new(MiddlewareStage::Tokenize, 0, "cancel", move |ctx, next| {
                cancel.cancel();
                next.run(ctx)
            }),
            recording(&log, MiddlewareStage::Invoke, 0, "invoke"),
        ])
        .unwrap();

        let mut ctx = context().with_cancellation(token);
        assert!(matches!(pipeline.execute(&mut ctx), Err(PipelineError::Cancelled)));
        assert!(log.lock().unwrap().is_empty());
    }
}
