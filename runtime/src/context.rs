//! Per-invocation state shared by every middleware step.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use cmdpipe_core::{CommandModel, CommandNode, NodeId, Resolution};
use tokio_util::sync::CancellationToken;

use crate::binder::BoundValues;
use crate::console::{Console, SystemConsole};
use crate::culture::{self, Culture};
use crate::environment::{Environment, ProcessEnvironment};
use crate::error::{PipelineError, Result};
use crate::localize::{DefaultLocalizer, Localizer};
use crate::services::{Resolver, ServiceMap};
use crate::token::{Token, TokenStream};

/// Mutable record of one invocation.
///
/// Created by the runner before the first step and discarded after the
/// last. Stages fill it in order: tokens, resolved command, bound values.
/// The `items` map carries arbitrary data between custom steps.
pub struct CommandContext {
    args: Vec<String>,
    tokens: TokenStream,
    remaining: Vec<Token>,
    level_tokens: Vec<(NodeId, Vec<Token>)>,
    model: Arc<CommandModel>,
    node: Option<NodeId>,
    values: BoundValues,
    cancellation: CancellationToken,
    console: Arc<dyn Console>,
    environment: Arc<dyn Environment>,
    services: Arc<dyn Resolver>,
    localizer: Arc<dyn Localizer>,
    culture: Culture,
    interceptor_level: Option<NodeId>,
    items: HashMap<String, Box<dyn Any + Send>>,
}

impl CommandContext {
    /// Context for `args` against `model`, wired to the process console and
    /// environment. The culture starts as the ambient one.
    pub fn new<I, S>(model: Arc<CommandModel>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            tokens: TokenStream::default(),
            remaining: Vec::new(),
            level_tokens: Vec::new(),
            model,
            node: None,
            values: BoundValues::default(),
            cancellation: CancellationToken::new(),
            console: Arc::new(SystemConsole),
            environment: Arc::new(ProcessEnvironment::new()),
            services: Arc::new(ServiceMap::new()),
            localizer: Arc::new(DefaultLocalizer),
            culture: culture::current(),
            interceptor_level: None,
            items: HashMap::new(),
        }
    }

    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_services(mut self, services: Arc<dyn Resolver>) -> Self {
        self.services = services;
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The raw argument list.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn tokens(&self) -> &TokenStream {
        &self.tokens
    }

    /// Replaces the token stream; custom tokenize-stage steps use this to
    /// rewrite input.
    pub fn set_tokens(&mut self, tokens: TokenStream) {
        self.remaining = tokens.arguments().to_vec();
        self.level_tokens.clear();
        self.tokens = tokens;
    }

    /// Argument tokens left after the command path.
    pub fn remaining_tokens(&self) -> &[Token] {
        &self.remaining
    }

    /// Options written inside the command path, each with the node whose
    /// visible options it is bound against.
    pub fn level_tokens(&self) -> &[(NodeId, Vec<Token>)] {
        &self.level_tokens
    }

    pub(crate) fn consume_path(&mut self, resolution: &Resolution) {
        let arguments = self.tokens.arguments();
        self.level_tokens = resolution
            .level_options
            .iter()
            .map(|option| (option.node, arguments[option.tokens.clone()].to_vec()))
            .collect();
        self.remaining = arguments[resolution.consumed..].to_vec();
    }

    pub fn model(&self) -> &Arc<CommandModel> {
        &self.model
    }

    /// The resolved command, once resolution has run.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node
    }

    pub fn node(&self) -> Option<&CommandNode> {
        self.node.map(|id| self.model.node(id))
    }

    pub(crate) fn set_node(&mut self, node: NodeId) {
        self.node = Some(node);
    }

    /// Values bound for the resolved command.
    pub fn values(&self) -> &BoundValues {
        &self.values
    }

    pub(crate) fn set_values(&mut self, values: BoundValues) {
        self.values = values;
    }

    /// Values declared at or above the node of the running interceptor.
    ///
    /// Outside an interceptor this is every bound value.
    pub fn inherited_values(&self) -> BoundValues {
        match self.interceptor_level {
            Some(level) => {
                let lineage = self.model.lineage(level);
                self.values
                    .filter(|bound| lineage.contains(&bound.argument.node))
            }
            None => self.values.clone(),
        }
    }

    /// Node whose interceptor is currently running.
    pub fn interceptor_level(&self) -> Option<NodeId> {
        self.interceptor_level
    }

    pub(crate) fn set_interceptor_level(&mut self, level: Option<NodeId>) -> Option<NodeId> {
        std::mem::replace(&mut self.interceptor_level, level)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fails with [`PipelineError::Cancelled`] once cancellation is signalled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    /// Writes to the output sink.
    pub fn write(&self, text: &str) {
        self.console.write(text);
    }

    /// Writes to the error sink.
    pub fn write_error(&self, text: &str) {
        self.console.write_error(text);
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    pub fn services(&self) -> &Arc<dyn Resolver> {
        &self.services
    }

    /// Resolves a collaborator from the service resolver.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when nothing is registered.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.services.resolve::<T>()
    }

    pub fn localizer(&self) -> &Arc<dyn Localizer> {
        &self.localizer
    }

    /// Localized string for `key`.
    pub fn text(&self, key: &str, args: &[&str]) -> String {
        self.localizer.get_string(key, args)
    }

    /// Culture used for value conversion in this invocation.
    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    pub fn set_culture(&mut self, culture: Culture) {
        self.culture = culture;
    }

    /// Stores `value` under `key`, returning the previous value if any.
    pub fn insert_item<T: Any + Send>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Option<Box<dyn Any + Send>> {
        self.items.insert(key.into(), Box::new(value))
    }

    /// Borrows the item under `key` if it has type `T`.
    pub fn item<T: Any + Send>(&self, key: &str) -> Option<&T> {
        self.items.get(key).and_then(|item| item.downcast_ref())
    }

    pub fn item_mut<T: Any + Send>(&mut self, key: &str) -> Option<&mut T> {
        self.items.get_mut(key).and_then(|item| item.downcast_mut())
    }

    /// Removes and returns the item under `key` if it has type `T`.
    ///
    /// An item of another type is left in place.
    pub fn take_item<T: Any + Send>(&mut self, key: &str) -> Option<T> {
        if !self.items.get(key).is_some_and(|item| item.is::<T>()) {
            return None;
        }
        self.items
            .remove(key)
            .and_then(|item| item.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn has_item(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("args", &self.args)
            .field("node", &self.node)
            .field("values", &self.values)
            .field("culture", &self.culture)
            .field("items", &self.items.keys().collect::<Vec<_>>())
            .finish()
    }
}
