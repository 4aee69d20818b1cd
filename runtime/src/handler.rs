//! Command bodies and the table that maps commands to them.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use cmdpipe_core::{CommandModel, NodeId};

use crate::context::CommandContext;
use crate::error::{ExitCode, PipelineError, Result};
use crate::interceptor::Interceptor;

/// The body of an invocable command.
pub trait CommandHandler: Send + Sync {
    fn invoke(&self, ctx: &mut CommandContext) -> Result<ExitCode>;
}

impl<F> CommandHandler for F
where
    F: Fn(&mut CommandContext) -> Result<ExitCode> + Send + Sync,
{
    fn invoke(&self, ctx: &mut CommandContext) -> Result<ExitCode> {
        self(ctx)
    }
}

/// Fixes a closure's signature as a command handler.
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&mut CommandContext) -> Result<ExitCode> + Send + Sync,
{
    f
}

/// Handler fetched from the service resolver at invocation time.
///
/// Lets the application construct handlers with their collaborators
/// instead of registering instances up front.
pub struct Resolved<T>(PhantomData<fn() -> T>);

impl<T> Resolved<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Resolved<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CommandHandler for Resolved<T>
where
    T: CommandHandler + Any,
{
    fn invoke(&self, ctx: &mut CommandContext) -> Result<ExitCode> {
        let handler = ctx.resolve::<T>()?;
        handler.invoke(ctx)
    }
}

/// Handlers and interceptors keyed by node.
#[derive(Clone, Default)]
pub struct CommandTable {
    handlers: HashMap<NodeId, Arc<dyn CommandHandler>>,
    fallback: Option<Arc<dyn CommandHandler>>,
    interceptors: HashMap<NodeId, Vec<Arc<dyn Interceptor>>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_handler(&mut self, node: NodeId, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(node, handler);
    }

    /// Handler used for invocable nodes without their own.
    pub fn set_fallback(&mut self, handler: Arc<dyn CommandHandler>) {
        self.fallback = Some(handler);
    }

    /// Appends an interceptor to `node`; several run in registration order.
    pub fn add_interceptor(&mut self, node: NodeId, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.entry(node).or_default().push(interceptor);
    }

    pub fn handler_for(&self, node: NodeId) -> Option<Arc<dyn CommandHandler>> {
        self.handlers
            .get(&node)
            .or(self.fallback.as_ref())
            .cloned()
    }

    pub fn has_handler(&self, node: NodeId) -> bool {
        self.handler_for(node).is_some()
    }

    /// Interceptors from the root down to `node`, each tagged with the node
    /// that declared it.
    pub fn chain_for(&self, model: &CommandModel, node: NodeId) -> Vec<(NodeId, Arc<dyn Interceptor>)> {
        model
            .lineage(node)
            .into_iter()
            .flat_map(|level| {
                self.interceptors
                    .get(&level)
                    .into_iter()
                    .flatten()
                    .map(move |interceptor| (level, Arc::clone(interceptor)))
            })
            .collect()
    }

    /// Runs the interceptor chain and handler for `node`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if no handler exists, or
    /// whatever the chain returns.
    pub fn invoke(&self, ctx: &mut CommandContext, node: NodeId) -> Result<ExitCode> {
        let handler = self.handler_for(node).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "no handler for command '{}'",
                ctx.model().node(node).path_string()
            ))
        })?;
        let chain = self.chain_for(ctx.model(), node);
        crate::interceptor::InterceptorNext::new(&chain, handler.as_ref()).proceed(ctx)
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTable")
            .field("handlers", &self.handlers.len())
            .field("fallback", &self.fallback.is_some())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use cmdpipe_core::{CommandDecl, ModelOptions};

    use super::*;
    use crate::services::ServiceMap;

    struct Greeter {
        greeting: String,
    }

    impl CommandHandler for Greeter {
        fn invoke(&self, ctx: &mut CommandContext) -> Result<ExitCode> {
            ctx.insert_item("greeting", self.greeting.clone());
            Ok(7)
        }
    }

    #[test]
    fn test_resolved_handler_comes_from_services() {
        let model = CommandModel::build(&CommandDecl::new("app"), &ModelOptions::default()).unwrap();
        let services = ServiceMap::new().with(Greeter {
            greeting: "hello".into(),
        });
        let mut ctx = CommandContext::new(Arc::new(model), Vec::<String>::new())
            .with_services(Arc::new(services));

        let mut table = CommandTable::new();
        table.set_handler(NodeId::ROOT, Arc::new(Resolved::<Greeter>::new()));

        assert_eq!(table.invoke(&mut ctx, NodeId::ROOT).unwrap(), 7);
        assert_eq!(ctx.item::<String>("greeting").map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_missing_handler_is_configuration_error() {
        let model = CommandModel::build(&CommandDecl::new("app"), &ModelOptions::default()).unwrap();
        let mut ctx = CommandContext::new(Arc::new(model), Vec::<String>::new());

        let err = CommandTable::new().invoke(&mut ctx, NodeId::ROOT).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
