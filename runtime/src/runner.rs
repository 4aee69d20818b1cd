//! Top-level entry point.
//!
//! A [`RunnerBuilder`] gathers the declaration, handlers, interceptors,
//! descriptors, directives and custom middleware, checks them once, and
//! produces an [`InvocationRunner`] whose configuration is read-only from
//! then on. Each call to [`InvocationRunner::run`] drives one invocation
//! through the shared pipeline and turns the outcome into an exit code.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use cmdpipe_core::{CommandDecl, CommandModel, ModelOptions, NameTransform, NodeId, Validator};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::console::{Console, SystemConsole};
use crate::context::CommandContext;
use crate::descriptor::{TypeDescriptor, TypeRegistry};
use crate::directive::{DirectiveHandler, DirectiveRegistry};
use crate::environment::{Environment, ProcessEnvironment};
use crate::error::{ExitCode, PipelineError, Result, exit_code};
use crate::handler::{CommandHandler, CommandTable, Resolved};
use crate::help::render_usage;
use crate::interceptor::Interceptor;
use crate::localize::{DefaultLocalizer, Localizer, keys};
use crate::middleware::{MiddlewareStage, MiddlewareStep, Next, Pipeline};
use crate::services::{Resolver, ServiceMap};
use crate::settings::RunnerSettings;
use crate::stages::{StageState, builtin_steps};

/// Collects runner configuration.
///
/// Command paths are the displayed names after the name transform, joined
/// by spaces; `""` is the root command.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cmdpipe_core::{ArgumentDecl, CommandDecl, ValueType};
/// use cmdpipe_runtime::{BufferConsole, InvocationRunner, handler_fn};
///
/// let decl = CommandDecl::new("greet")
///     .with_argument(ArgumentDecl::operand("name", ValueType::String));
/// let console = Arc::new(BufferConsole::new());
///
/// let runner = InvocationRunner::builder(decl)
///     .console(console.clone())
///     .handler("", handler_fn(|ctx| {
///         let name = ctx.values().get_str("name").unwrap_or_default().to_string();
///         ctx.write(&format!("hello {name}\n"));
///         Ok(0)
///     }))
///     .build()
///     .unwrap();
///
/// assert_eq!(runner.run(["world"]), 0);
/// assert_eq!(console.output(), "hello world\n");
/// ```
pub struct RunnerBuilder {
    declaration: CommandDecl,
    settings: RunnerSettings,
    transform: Option<NameTransform>,
    registry: TypeRegistry,
    directives: DirectiveRegistry,
    middleware: Vec<MiddlewareStep>,
    handlers: Vec<(String, Arc<dyn CommandHandler>)>,
    interceptors: Vec<(String, Arc<dyn Interceptor>)>,
    fallback: Option<Arc<dyn CommandHandler>>,
    console: Arc<dyn Console>,
    environment: Arc<dyn Environment>,
    services: Arc<dyn Resolver>,
    localizer: Arc<dyn Localizer>,
}

impl RunnerBuilder {
    fn new(declaration: CommandDecl) -> Self {
        Self {
            declaration,
            settings: RunnerSettings::default(),
            transform: None,
            registry: TypeRegistry::new(),
            directives: DirectiveRegistry::with_builtins(),
            middleware: Vec::new(),
            handlers: Vec::new(),
            interceptors: Vec::new(),
            fallback: None,
            console: Arc::new(SystemConsole),
            environment: Arc::new(ProcessEnvironment::new()),
            services: Arc::new(ServiceMap::new()),
            localizer: Arc::new(DefaultLocalizer),
        }
    }

    pub fn settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Overrides the name transform chosen by `settings.name_case`.
    pub fn name_transform(mut self, transform: impl Into<NameTransform>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    /// Adds a custom-tier type descriptor.
    pub fn type_descriptor(mut self, descriptor: impl TypeDescriptor + 'static) -> Self {
        self.registry.register(descriptor);
        self
    }

    /// Adds a structural fallback for `ValueType::Custom(type_name)`.
    pub fn register_from_str<T>(mut self, type_name: &str) -> Self
    where
        T: FromStr + Display + Send + Sync + 'static,
        T::Err: Display,
    {
        self.registry.register_from_str::<T>(type_name);
        self
    }

    pub fn directive(mut self, name: &str, handler: impl DirectiveHandler + 'static) -> Self {
        self.directives.register(name, handler);
        self
    }

    pub fn middleware(mut self, step: MiddlewareStep) -> Self {
        self.middleware.push(step);
        self
    }

    /// Adds a custom step. Built-in steps use order 0 in their stage.
    pub fn use_middleware<F>(self, stage: MiddlewareStage, order: i32, name: &str, step: F) -> Self
    where
        F: Fn(&mut CommandContext, Next<'_>) -> Result<ExitCode> + Send + Sync + 'static,
    {
        self.middleware(MiddlewareStep::new(stage, order, name, step))
    }

    pub fn handler(mut self, path: &str, handler: impl CommandHandler + 'static) -> Self {
        self.handlers.push((path.to_string(), Arc::new(handler)));
        self
    }

    /// Registers a handler of type `T` resolved from the services on each
    /// invocation.
    pub fn resolved_handler<T: CommandHandler + Any>(self, path: &str) -> Self {
        self.handler(path, Resolved::<T>::new())
    }

    /// Handler for invocable commands without their own.
    pub fn fallback_handler(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.fallback = Some(Arc::new(handler));
        self
    }

    pub fn interceptor(mut self, path: &str, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push((path.to_string(), Arc::new(interceptor)));
        self
    }

    pub fn console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn services(mut self, services: Arc<dyn Resolver>) -> Self {
        self.services = services;
        self
    }

    pub fn localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    /// Builds the model and pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when the declaration is
    /// invalid, a declared type has no descriptor, a pattern validator does
    /// not compile, a handler or interceptor names an unknown command, an
    /// invocable command has no handler, or two middleware steps share a
    /// name.
    pub fn build(self) -> Result<InvocationRunner> {
        let options = ModelOptions {
            transform: self
                .transform
                .unwrap_or_else(|| self.settings.name_case.into()),
            transform_overrides: self.settings.case_overrides,
        };
        let model = Arc::new(CommandModel::build(&self.declaration, &options)?);
        check_arguments(&model, &self.registry)?;

        let mut table = CommandTable::new();
        for (path, handler) in self.handlers {
            table.set_handler(find_node(&model, &path)?, handler);
        }
        if let Some(fallback) = self.fallback {
            table.set_fallback(fallback);
        }
        for (path, interceptor) in self.interceptors {
            table.add_interceptor(find_node(&model, &path)?, interceptor);
        }

        let missing: Vec<String> = model
            .nodes()
            .filter(|node| node.is_invocable() && !table.has_handler(node.id))
            .map(|node| format!("'{}'", node.path_string()))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "no handler for invocable command(s) {}",
                missing.join(", ")
            )));
        }

        let registry = Arc::new(self.registry);
        let state = Arc::new(StageState {
            settings: self.settings.clone(),
            registry: Arc::clone(&registry),
            directives: self.directives,
            table,
        });
        let mut steps = builtin_steps(&state);
        steps.extend(self.middleware);
        let pipeline = Pipeline::new(steps)?;

        info!(
            commands = model.nodes().count(),
            steps = ?pipeline.step_names(),
            "Built invocation runner"
        );

        Ok(InvocationRunner {
            model,
            pipeline,
            registry,
            settings: self.settings,
            console: self.console,
            environment: self.environment,
            services: self.services,
            localizer: self.localizer,
        })
    }
}

fn find_node(model: &CommandModel, path: &str) -> Result<NodeId> {
    model.find(path).map(|node| node.id).ok_or_else(|| {
        PipelineError::Configuration(format!("unknown command path '{path}'"))
    })
}

fn check_arguments(model: &CommandModel, registry: &TypeRegistry) -> Result<()> {
    for node in model.nodes() {
        for arg in node.arguments() {
            if !registry.supports(&arg.value_type) {
                return Err(PipelineError::Configuration(format!(
                    "no type descriptor supports {:?} used by '{}' on '{}'",
                    arg.value_type,
                    arg.name,
                    node.path_string()
                )));
            }
            for validator in &arg.validators {
                if let Validator::Pattern(pattern) = validator {
                    Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
                        PipelineError::Configuration(format!(
                            "invalid pattern for '{}': {err}",
                            arg.name
                        ))
                    })?;
                }
            }
        }
    }
    Ok(())
}

/// Runs invocations against a fixed configuration.
pub struct InvocationRunner {
    model: Arc<CommandModel>,
    pipeline: Pipeline,
    registry: Arc<TypeRegistry>,
    settings: RunnerSettings,
    console: Arc<dyn Console>,
    environment: Arc<dyn Environment>,
    services: Arc<dyn Resolver>,
    localizer: Arc<dyn Localizer>,
}

impl InvocationRunner {
    pub fn builder(declaration: CommandDecl) -> RunnerBuilder {
        RunnerBuilder::new(declaration)
    }

    pub fn model(&self) -> &CommandModel {
        &self.model
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Usage text for the command at `node`.
    pub fn usage(&self, node: NodeId) -> String {
        render_usage(&self.model, node, &self.registry, &*self.localizer)
    }

    /// Runs one invocation with a fresh cancellation token.
    pub fn run<I, S>(&self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_with_cancellation(args, CancellationToken::new())
    }

    /// Runs one invocation observing `cancellation`.
    ///
    /// Errors are written to the console's error sink; usage errors are
    /// followed by usage text. A panic in any step or command body is
    /// reported as an internal error after guards and teardowns ran.
    pub fn run_with_cancellation<I, S>(&self, args: I, cancellation: CancellationToken) -> ExitCode
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ctx = CommandContext::new(Arc::clone(&self.model), args)
            .with_console(Arc::clone(&self.console))
            .with_environment(Arc::clone(&self.environment))
            .with_services(Arc::clone(&self.services))
            .with_localizer(Arc::clone(&self.localizer))
            .with_cancellation(cancellation);
        debug!(args = ?ctx.args(), "Starting invocation");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.pipeline.execute(&mut ctx)));
        match outcome {
            Ok(Ok(code)) => code,
            Ok(Err(err)) => self.report(&ctx, &err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%message, "Invocation panicked");
                ctx.write_error(&format!("{}\n", ctx.text(keys::INTERNAL, &[&message])));
                exit_code::INTERNAL_ERROR
            }
        }
    }

    fn report(&self, ctx: &CommandContext, err: &PipelineError) -> ExitCode {
        let code = err.exit_code();
        debug!(error = %err, code, "Invocation failed");

        match err {
            PipelineError::Cancelled => {
                info!("Invocation cancelled");
                ctx.write_error(&format!("{}\n", ctx.text(keys::CANCELLED, &[])));
            }
            PipelineError::CommandNotFound(not_found) => {
                let mut out = format!("{}\n", ctx.text(keys::ERROR, &[&not_found.to_string()]));
                if let Some(best) = not_found.suggestions.first() {
                    out.push_str(&ctx.text(keys::DID_YOU_MEAN, &[&best.name]));
                    out.push('\n');
                } else if !not_found.available.is_empty() {
                    out.push_str(&ctx.text(keys::AVAILABLE, &[&not_found.available.join(", ")]));
                    out.push('\n');
                }
                out.push('\n');
                out.push_str(&self.usage(not_found.at));
                ctx.write_error(&out);
            }
            PipelineError::Configuration(_) | PipelineError::Io(_) | PipelineError::Yaml(_) => {
                error!(error = %err, "Internal error");
                ctx.write_error(&format!("{}\n", ctx.text(keys::INTERNAL, &[&err.to_string()])));
            }
            _ => {
                let mut out = String::new();
                for line in err.to_string().lines() {
                    out.push_str(&ctx.text(keys::ERROR, &[line]));
                    out.push('\n');
                }
                if err.is_usage_error() {
                    if let Some(node) = ctx.node_id() {
                        out.push('\n');
                        out.push_str(&self.usage(node));
                    }
                }
                ctx.write_error(&out);
            }
        }
        code
    }
}

impl std::fmt::Debug for InvocationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationRunner")
            .field("settings", &self.settings)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "command panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use cmdpipe_core::{ArgumentDecl, ValueType};

    use super::*;
    use crate::console::BufferConsole;
    use crate::interceptor::interceptor_fn;

    fn ok(_: &mut CommandContext) -> Result<ExitCode> {
        Ok(0)
    }

    #[test]
    fn test_build_requires_handlers_for_invocable_commands() {
        let decl = CommandDecl::new("app")
            .with_subcommand(CommandDecl::new("a"))
            .with_subcommand(CommandDecl::new("b"));

        let err = InvocationRunner::builder(decl).handler("a", ok).build().unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_build_rejects_unknown_paths() {
        let decl = CommandDecl::new("app");
        let err = InvocationRunner::builder(decl)
            .handler("", ok)
            .interceptor("nope", interceptor_fn(|ctx, next| next.proceed(ctx)))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown command path 'nope'"));
    }

    #[test]
    fn test_build_rejects_unsupported_types() {
        let decl = CommandDecl::new("app")
            .with_argument(ArgumentDecl::option("addr", ValueType::Custom("ipv4".into())));
        let err = InvocationRunner::builder(decl.clone())
            .handler("", ok)
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));

        let runner = InvocationRunner::builder(decl)
            .handler("", ok)
            .register_from_str::<std::net::Ipv4Addr>("ipv4")
            .build();
        assert!(runner.is_ok());
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let console = Arc::new(BufferConsole::new());
        let runner = InvocationRunner::builder(CommandDecl::new("app"))
            .console(console.clone())
            .handler("", |_: &mut CommandContext| -> Result<ExitCode> { panic!("kaboom") })
            .build()
            .unwrap();

        assert_eq!(runner.run(Vec::<String>::new()), exit_code::INTERNAL_ERROR);
        assert!(console.errors().contains("internal error: kaboom"));
    }

    #[test]
    fn test_runner_is_reusable() {
        let runner = InvocationRunner::builder(CommandDecl::new("app"))
            .console(Arc::new(BufferConsole::new()))
            .handler("", ok)
            .build()
            .unwrap();

        assert_eq!(runner.run(Vec::<String>::new()), 0);
        assert_eq!(runner.run(["--nope"]), exit_code::PARSE_ERROR);
        assert_eq!(runner.run(Vec::<String>::new()), 0);
    }
}
