//! Middleware pipeline that turns argument vectors into command invocations.
//!
//! An [`InvocationRunner`] is built once from a
//! [`CommandDecl`](cmdpipe_core::CommandDecl) plus handlers, and then drives
//! each invocation through five ordered stages:
//!
//! 1. tokenize: classify words as directives, options, operands or `--`.
//! 2. directives: apply `[name:value]` words before the command runs
//!    (`[culture:xx]`, `[parse]`, `[suggest:prefix]`).
//! 3. resolve-command: walk the command tree, handle help requests.
//! 4. bind-values: fill every visible argument from the command line,
//!    environment, settings, an interactive prompt, a default or a zero
//!    value, then convert and validate.
//! 5. invoke: run the interceptors of every command on the path, then the
//!    handler.
//!
//! Custom middleware can be inserted before or after any built-in step.
//! Errors become exit codes through [`exit_code`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cmdpipe_core::{ArgumentDecl, CommandDecl, ValueType};
//! use cmdpipe_runtime::{BufferConsole, InvocationRunner, exit_code, handler_fn};
//!
//! let decl = CommandDecl::new("tool").with_subcommand(
//!     CommandDecl::new("add")
//!         .with_argument(ArgumentDecl::operand("a", ValueType::Integer))
//!         .with_argument(ArgumentDecl::operand("b", ValueType::Integer)),
//! );
//! let console = Arc::new(BufferConsole::new());
//!
//! let runner = InvocationRunner::builder(decl)
//!     .console(console.clone())
//!     .handler("add", handler_fn(|ctx| {
//!         let sum = ctx.values().get_i64("a").unwrap_or(0) + ctx.values().get_i64("b").unwrap_or(0);
//!         ctx.write(&format!("{sum}\n"));
//!         Ok(exit_code::SUCCESS)
//!     }))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(runner.run(["add", "2", "40"]), 0);
//! assert_eq!(console.output(), "42\n");
//! assert_eq!(runner.run(["add", "2", "x"]), exit_code::PARSE_ERROR);
//! ```

mod binder;
mod completion;
mod console;
mod context;
pub mod culture;
mod descriptor;
mod directive;
mod environment;
mod error;
mod handler;
mod help;
mod interceptor;
mod localize;
mod middleware;
mod runner;
mod services;
mod settings;
pub mod stages;
mod token;
mod value;

pub use binder::{Binder, BoundValue, BoundValues, ValueSource};
pub use completion::{CompletionRegistrar, REGISTRATION_TIMEOUT};
pub use console::{BufferConsole, Console, SystemConsole};
pub use context::CommandContext;
pub use culture::{Culture, CultureGuard};
pub use descriptor::{FromStrDescriptor, TypeDescriptor, TypeRegistry};
pub use directive::{
    DirectiveGuard, DirectiveHandler, DirectiveRegistry, DirectiveScope, PARSE_ITEM, SUGGEST_ITEM,
    parse_directive,
};
pub use environment::{Environment, MapEnvironment, ProcessEnvironment};
pub use error::{
    ExitCode, ParseIssue, ParseReport, PipelineError, Result, ValidationFailure,
    ValidationReport, ValueParsingError, exit_code,
};
pub use handler::{CommandHandler, CommandTable, Resolved, handler_fn};
pub use help::{help_requested, render_usage, suggest_completions};
pub use interceptor::{Interceptor, InterceptorNext, Scoped, interceptor_fn, scoped};
pub use localize::{DefaultLocalizer, Localizer, format_template, keys};
pub use middleware::{MiddlewareStage, MiddlewareStep, Next, Pipeline};
pub use runner::{InvocationRunner, RunnerBuilder};
pub use services::{Resolver, Service, ServiceMap};
pub use settings::RunnerSettings;
pub use token::{SEPARATOR, Token, TokenKind, TokenStream, tokenize};
pub use value::{CustomValue, Value};
