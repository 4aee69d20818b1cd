//! Interceptors wrapping the invocation of commands below them.
//!
//! Interceptors declared on ancestors of the resolved command run outermost
//! first, root to leaf, then the handler runs. An interceptor may do work
//! before and after calling [`InterceptorNext::proceed`], or skip it to
//! short-circuit the handler.

use std::marker::PhantomData;
use std::sync::Arc;

use cmdpipe_core::NodeId;
use tracing::debug;

use crate::context::CommandContext;
use crate::error::{ExitCode, Result};
use crate::handler::CommandHandler;

/// Wraps invocation of the commands at and below the node it is attached to.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, ctx: &mut CommandContext, next: InterceptorNext<'_>) -> Result<ExitCode>;
}

impl<F> Interceptor for F
where
    F: Fn(&mut CommandContext, InterceptorNext<'_>) -> Result<ExitCode> + Send + Sync,
{
    fn intercept(&self, ctx: &mut CommandContext, next: InterceptorNext<'_>) -> Result<ExitCode> {
        self(ctx, next)
    }
}

/// Fixes a closure's signature as an interceptor.
pub fn interceptor_fn<F>(f: F) -> F
where
    F: Fn(&mut CommandContext, InterceptorNext<'_>) -> Result<ExitCode> + Send + Sync,
{
    f
}

/// The rest of the interceptor chain plus the handler.
pub struct InterceptorNext<'a> {
    chain: &'a [(NodeId, Arc<dyn Interceptor>)],
    handler: &'a dyn CommandHandler,
}

impl<'a> InterceptorNext<'a> {
    pub fn new(chain: &'a [(NodeId, Arc<dyn Interceptor>)], handler: &'a dyn CommandHandler) -> Self {
        Self { chain, handler }
    }

    /// Runs the next interceptor, or the handler when none are left.
    ///
    /// While an interceptor runs, [`CommandContext::interceptor_level`]
    /// names the node it was declared on.
    pub fn proceed(self, ctx: &mut CommandContext) -> Result<ExitCode> {
        ctx.check_cancelled()?;
        let Some(((level, interceptor), rest)) = self.chain.split_first() else {
            let previous = ctx.set_interceptor_level(None);
            let result = self.handler.invoke(ctx);
            ctx.set_interceptor_level(previous);
            return result;
        };

        debug!(level = level.index(), "Running interceptor");
        let previous = ctx.set_interceptor_level(Some(*level));
        let result = interceptor.intercept(
            ctx,
            InterceptorNext {
                chain: rest,
                handler: self.handler,
            },
        );
        ctx.set_interceptor_level(previous);
        result
    }
}

/// Interceptor with a setup step and a teardown that runs exactly once
/// after the inner chain, whether it returned normally, failed, or
/// unwound.
///
/// Built with [`scoped`].
pub struct Scoped<R, S, T> {
    setup: S,
    teardown: T,
    _resource: PhantomData<fn() -> R>,
}

/// Builds a [`Scoped`] interceptor. `setup` produces a resource that is
/// handed to `teardown` when the inner chain finishes.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use cmdpipe_runtime::{CommandContext, Interceptor, scoped};
///
/// let log: Arc<Mutex<Vec<String>>> = Arc::default();
/// let setup_log = Arc::clone(&log);
/// let interceptor = scoped(
///     move |_: &mut CommandContext| {
///         setup_log.lock().unwrap().push("open".to_string());
///         Ok(Arc::clone(&setup_log))
///     },
///     |log: Arc<Mutex<Vec<String>>>| log.lock().unwrap().push("close".to_string()),
/// );
/// # let _: &dyn Interceptor = &interceptor;
/// ```
pub fn scoped<R, S, T>(setup: S, teardown: T) -> Scoped<R, S, T>
where
    S: Fn(&mut CommandContext) -> Result<R> + Send + Sync,
    T: Fn(R) + Send + Sync,
{
    Scoped {
        setup,
        teardown,
        _resource: PhantomData,
    }
}

impl<R, S, T> Interceptor for Scoped<R, S, T>
where
    S: Fn(&mut CommandContext) -> Result<R> + Send + Sync,
    T: Fn(R) + Send + Sync,
{
    fn intercept(&self, ctx: &mut CommandContext, next: InterceptorNext<'_>) -> Result<ExitCode> {
        let resource = (self.setup)(ctx)?;
        let _teardown = Teardown {
            resource: Some(resource),
            teardown: &self.teardown,
        };
        next.proceed(ctx)
    }
}

struct Teardown<'a, R, T: Fn(R)> {
    resource: Option<R>,
    teardown: &'a T,
}

impl<R, T: Fn(R)> Drop for Teardown<'_, R, T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            (self.teardown)(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use cmdpipe_core::{ArgumentDecl, CommandDecl, CommandModel, ModelOptions, ValueType};

    use super::*;
    use crate::error::PipelineError;

    type Log = Arc<Mutex<Vec<String>>>;

    fn context() -> CommandContext {
        let decl = CommandDecl::new("app")
            .with_argument(ArgumentDecl::option("verbose", ValueType::Bool).inherited());
        let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();
        CommandContext::new(Arc::new(model), Vec::<String>::new())
    }

    fn tagging(log: &Log, tag: &'static str) -> Arc<dyn Interceptor> {
        let log = Arc::clone(log);
        Arc::new(move |ctx: &mut CommandContext, next: InterceptorNext<'_>| {
            log.lock().unwrap().push(format!("{tag}:before"));
            let result = next.proceed(ctx);
            log.lock().unwrap().push(format!("{tag}:after"));
            result
        })
    }

    #[test]
    fn test_chain_runs_outermost_first() {
        let log: Log = Arc::default();
        let chain = vec![
            (NodeId::ROOT, tagging(&log, "root")),
            (NodeId::ROOT, tagging(&log, "inner")),
        ];
        let handler_log = Arc::clone(&log);
        let handler = move |_: &mut CommandContext| -> Result<ExitCode> {
            handler_log.lock().unwrap().push("handler".into());
            Ok(0)
        };

        InterceptorNext::new(&chain, &handler)
            .proceed(&mut context())
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["root:before", "inner:before", "handler", "inner:after", "root:after"]
        );
    }

    #[test]
    fn test_scoped_teardown_runs_once_on_failure() {
        let log: Log = Arc::default();
        let setup_log = Arc::clone(&log);
        let interceptor: Arc<dyn Interceptor> = Arc::new(scoped(
            move |_: &mut CommandContext| {
                setup_log.lock().unwrap().push("setup".into());
                Ok(Arc::clone(&setup_log))
            },
            |log: Log| log.lock().unwrap().push("teardown".into()),
        ));
        let chain = vec![(NodeId::ROOT, interceptor)];
        let handler =
            |_: &mut CommandContext| -> Result<ExitCode> { Err(PipelineError::command_failed("boom")) };

        let err = InterceptorNext::new(&chain, &handler)
            .proceed(&mut context())
            .unwrap_err();

        assert!(matches!(err, PipelineError::CommandFailed(_)));
        assert_eq!(*log.lock().unwrap(), vec!["setup", "teardown"]);
    }

    #[test]
    fn test_interceptor_can_skip_handler() {
        let chain: Vec<(NodeId, Arc<dyn Interceptor>)> = vec![(
            NodeId::ROOT,
            Arc::new(|_: &mut CommandContext, _: InterceptorNext<'_>| -> Result<ExitCode> { Ok(5) }),
        )];
        let handler = |_: &mut CommandContext| -> Result<ExitCode> { panic!("handler must not run") };

        let code = InterceptorNext::new(&chain, &handler)
            .proceed(&mut context())
            .unwrap();
        assert_eq!(code, 5);
    }

    #[test]
    fn test_level_is_set_while_intercepting() {
        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        let chain: Vec<(NodeId, Arc<dyn Interceptor>)> = vec![(
            NodeId::ROOT,
            Arc::new(move |ctx: &mut CommandContext, next: InterceptorNext<'_>| {
                *seen_in.lock().unwrap() = ctx.interceptor_level();
                next.proceed(ctx)
            }),
        )];
        let handler = |ctx: &mut CommandContext| -> Result<ExitCode> {
            assert!(ctx.interceptor_level().is_none());
            Ok(0)
        };

        let mut ctx = context();
        InterceptorNext::new(&chain, &handler).proceed(&mut ctx).unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(NodeId::ROOT));
        assert!(ctx.interceptor_level().is_none());
    }
}
