//! The built-in middleware steps, one per stage.

use std::sync::Arc;

use tracing::{debug, info};

use crate::binder::Binder;
use crate::context::CommandContext;
use crate::descriptor::TypeRegistry;
use crate::directive::{DirectiveRegistry, PARSE_ITEM, SUGGEST_ITEM};
use crate::error::{PipelineError, exit_code};
use crate::handler::CommandTable;
use crate::help::{help_requested, render_usage, suggest_completions};
use crate::localize::keys;
use crate::middleware::{MiddlewareStage, MiddlewareStep};
use crate::settings::RunnerSettings;
use crate::token::tokenize;

/// Name of the built-in [`MiddlewareStage::Tokenize`] step.
pub const TOKENIZE: &str = "tokenize";
/// Name of the built-in [`MiddlewareStage::Directives`] step.
pub const DIRECTIVES: &str = "directives";
/// Name of the built-in [`MiddlewareStage::ResolveCommand`] step.
pub const RESOLVE_COMMAND: &str = "resolve-command";
/// Name of the built-in [`MiddlewareStage::BindValues`] step.
pub const BIND_VALUES: &str = "bind-values";
/// Name of the built-in [`MiddlewareStage::Invoke`] step.
pub const INVOKE: &str = "invoke";

/// Read-only runner state the built-in steps close over.
pub(crate) struct StageState {
    pub settings: RunnerSettings,
    pub registry: Arc<TypeRegistry>,
    pub directives: DirectiveRegistry,
    pub table: CommandTable,
}

pub(crate) fn builtin_steps(state: &Arc<StageState>) -> Vec<MiddlewareStep> {
    vec![
        tokenize_step(Arc::clone(state)),
        directives_step(Arc::clone(state)),
        resolve_step(Arc::clone(state)),
        bind_step(Arc::clone(state)),
        invoke_step(Arc::clone(state)),
    ]
}

fn tokenize_step(state: Arc<StageState>) -> MiddlewareStep {
    MiddlewareStep::new(MiddlewareStage::Tokenize, 0, TOKENIZE, move |ctx, next| {
        let stream = tokenize(ctx.args(), state.settings.enable_directives);
        debug!(
            directives = stream.directives().len(),
            arguments = stream.arguments().len(),
            "Tokenized input"
        );
        ctx.set_tokens(stream);
        next.run(ctx)
    })
}

fn directives_step(state: Arc<StageState>) -> MiddlewareStep {
    MiddlewareStep::new(MiddlewareStage::Directives, 0, DIRECTIVES, move |ctx, next| {
        let scope = state.directives.apply_all(ctx)?;
        let result = next.run(ctx);
        drop(scope);
        result
    })
}

fn resolve_step(state: Arc<StageState>) -> MiddlewareStep {
    MiddlewareStep::new(MiddlewareStage::ResolveCommand, 0, RESOLVE_COMMAND, move |ctx, next| {
        let model = Arc::clone(ctx.model());
        let words: Vec<String> = ctx
            .tokens()
            .arguments()
            .iter()
            .map(|token| token.raw.clone())
            .collect();

        if let Some(prefix) = ctx.take_item::<String>(SUGGEST_ITEM) {
            for candidate in suggest_completions(&model, &words[..], &prefix) {
                ctx.write(&format!("{candidate}\n"));
            }
            return Ok(exit_code::SUCCESS);
        }

        let threshold = state.settings.suggestion_threshold;
        let resolution = model.resolve(&words[..], threshold)?;
        let node = model.node(resolution.node);
        ctx.set_node(node.id);
        ctx.consume_path(&resolution);
        debug!(
            command = %node.path_string(),
            consumed = resolution.consumed,
            level_options = resolution.level_options.len(),
            "Resolved command"
        );

        if help_requested(ctx.remaining_tokens()) {
            ctx.write(&render_usage(&model, node.id, &state.registry, &**ctx.localizer()));
            return Ok(exit_code::SUCCESS);
        }
        if !node.is_invocable() {
            return Err(model.not_found(node.id, None, threshold).into());
        }
        next.run(ctx)
    })
}

fn bind_step(state: Arc<StageState>) -> MiddlewareStep {
    MiddlewareStep::new(MiddlewareStage::BindValues, 0, BIND_VALUES, move |ctx, next| {
        let node = ctx.node_id().ok_or_else(|| {
            PipelineError::Configuration("values bound before command resolution".to_string())
        })?;
        let values = Binder {
            model: ctx.model(),
            registry: &state.registry,
            environment: &**ctx.environment(),
            console: ctx.console(),
            cancellation: ctx.cancellation(),
            culture: ctx.culture(),
            prompting: state.settings.prompting,
            threshold: state.settings.suggestion_threshold,
        }
        .bind_with_levels(node, ctx.level_tokens(), ctx.remaining_tokens())?;
        debug!(bound = values.len(), "Bound values");
        ctx.set_values(values);

        if ctx.take_item::<bool>(PARSE_ITEM).is_some() {
            ctx.write(&parse_report(ctx));
            return Ok(exit_code::SUCCESS);
        }
        next.run(ctx)
    })
}

fn invoke_step(state: Arc<StageState>) -> MiddlewareStep {
    MiddlewareStep::new(MiddlewareStage::Invoke, 0, INVOKE, move |ctx, _next| {
        let node = ctx.node_id().ok_or_else(|| {
            PipelineError::Configuration("invocation before command resolution".to_string())
        })?;
        let code = state.table.invoke(ctx, node)?;
        info!(command = %ctx.model().node(node).path_string(), code, "Command finished");
        Ok(code)
    })
}

/// Full command path including the root name.
pub(crate) fn display_path(ctx: &CommandContext) -> String {
    let model = ctx.model();
    let mut parts = vec![model.root().name.clone()];
    if let Some(node) = ctx.node() {
        parts.extend(node.path().iter().cloned());
    }
    parts.join(" ")
}

fn parse_report(ctx: &CommandContext) -> String {
    let mut out = ctx.text(keys::PARSE_REPORT, &[&display_path(ctx)]);
    out.push('\n');
    for bound in ctx.values() {
        let arg = ctx.model().argument(bound.argument);
        out.push_str(&format!(
            "  {} = {} [{}]\n",
            arg.usage_name(),
            bound.value,
            bound.source
        ));
    }
    out
}
