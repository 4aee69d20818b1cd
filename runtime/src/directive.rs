//! Bracketed directives that adjust one invocation.
//!
//! A directive is written `[name]` or `[name:value]` ahead of the command
//! path. Its handler may change the context and may return a
//! [`DirectiveGuard`]; guards are kept alive for the rest of the pipeline
//! and dropped in reverse order afterwards, so every temporary change is
//! undone whether the invocation succeeded, failed or panicked.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::context::CommandContext;
use crate::culture::{self, Culture};
use crate::error::{PipelineError, Result};

static DIRECTIVE_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[([A-Za-z][A-Za-z0-9_-]*)(?::(.*))?\]$").expect("static regex must compile")
});

/// Item key set by `[parse]`.
pub const PARSE_ITEM: &str = "directive:parse";

/// Item key set by `[suggest]`; the item is the typed prefix.
pub const SUGGEST_ITEM: &str = "directive:suggest";

/// Undoes a directive's change when dropped.
#[must_use = "the change is reverted as soon as the guard is dropped"]
pub struct DirectiveGuard {
    revert: Option<Box<dyn FnOnce() + Send>>,
}

impl DirectiveGuard {
    /// Runs `revert` on drop.
    pub fn new(revert: impl FnOnce() + Send + 'static) -> Self {
        Self {
            revert: Some(Box::new(revert)),
        }
    }

    /// Keeps an RAII value alive until the guard is dropped.
    pub fn hold<T: Send + 'static>(value: T) -> Self {
        Self::new(move || drop(value))
    }
}

impl Drop for DirectiveGuard {
    fn drop(&mut self) {
        if let Some(revert) = self.revert.take() {
            revert();
        }
    }
}

impl std::fmt::Debug for DirectiveGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveGuard")
            .field("pending", &self.revert.is_some())
            .finish()
    }
}

/// Guards of every applied directive; reverts them last-applied first.
#[derive(Debug, Default)]
pub struct DirectiveScope {
    guards: Vec<DirectiveGuard>,
}

impl DirectiveScope {
    /// Number of directives waiting to be reverted.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// `true` when no applied directive needs reverting.
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl Drop for DirectiveScope {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

/// Applies one directive.
pub trait DirectiveHandler: Send + Sync {
    /// `value` is the text after `:`, if any.
    fn apply(&self, ctx: &mut CommandContext, value: Option<&str>)
    -> Result<Option<DirectiveGuard>>;
}

impl<F> DirectiveHandler for F
where
    F: Fn(&mut CommandContext, Option<&str>) -> Result<Option<DirectiveGuard>> + Send + Sync,
{
    fn apply(
        &self,
        ctx: &mut CommandContext,
        value: Option<&str>,
    ) -> Result<Option<DirectiveGuard>> {
        self(ctx, value)
    }
}

/// Splits `[name:value]` into its parts.
///
/// # Examples
///
/// ```
/// use cmdpipe_runtime::parse_directive;
///
/// assert_eq!(parse_directive("[parse]").unwrap(), ("parse".to_string(), None));
/// assert_eq!(
///     parse_directive("[culture:fr-FR]").unwrap(),
///     ("culture".to_string(), Some("fr-FR".to_string()))
/// );
/// assert!(parse_directive("[1bad]").is_err());
/// assert!(parse_directive("[open").is_err());
/// ```
pub fn parse_directive(token: &str) -> Result<(String, Option<String>)> {
    let caps = DIRECTIVE_SYNTAX
        .captures(token)
        .ok_or_else(|| PipelineError::MalformedDirective {
            token: token.to_string(),
            reason: "expected [name] or [name:value]".to_string(),
        })?;
    let name = caps[1].to_ascii_lowercase();
    let value = caps.get(2).map(|m| m.as_str().to_string());
    Ok((name, value))
}

/// Directive handlers by name.
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    handlers: HashMap<String, Arc<dyn DirectiveHandler>>,
}

impl DirectiveRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `culture`, `parse` and `suggest`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("culture", apply_culture);
        registry.register("parse", apply_parse);
        registry.register("suggest", apply_suggest);
        registry
    }

    /// Adds or replaces the handler for `name` (case-insensitive).
    pub fn register(&mut self, name: &str, handler: impl DirectiveHandler + 'static) {
        self.handlers
            .insert(name.to_ascii_lowercase(), Arc::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_ascii_lowercase())
    }

    /// Applies every directive token of the context in order.
    ///
    /// On error the guards collected so far are dropped, reverting the
    /// directives that were already applied.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedDirective`] for bad syntax or an
    /// unknown name, or whatever a handler returns.
    pub fn apply_all(&self, ctx: &mut CommandContext) -> Result<DirectiveScope> {
        let mut scope = DirectiveScope::default();
        let tokens = ctx.tokens().directives().to_vec();

        for token in tokens {
            let (name, value) = parse_directive(&token.raw)?;
            let handler = self.handlers.get(&name).cloned().ok_or_else(|| {
                PipelineError::MalformedDirective {
                    token: token.raw.clone(),
                    reason: format!("unknown directive '{name}'"),
                }
            })?;
            debug!(directive = %name, value = ?value, "Applying directive");
            if let Some(guard) = handler.apply(ctx, value.as_deref())? {
                scope.guards.push(guard);
            }
        }

        Ok(scope)
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("DirectiveRegistry")
            .field("handlers", &names)
            .finish()
    }
}

fn apply_culture(ctx: &mut CommandContext, value: Option<&str>) -> Result<Option<DirectiveGuard>> {
    let tag = value.unwrap_or_default();
    let culture = Culture::parse(tag).ok_or_else(|| PipelineError::MalformedDirective {
        token: format!("[culture:{tag}]"),
        reason: format!("'{tag}' is not a culture tag"),
    })?;
    ctx.set_culture(culture.clone());
    Ok(Some(DirectiveGuard::hold(culture::override_ambient(culture))))
}

fn apply_parse(ctx: &mut CommandContext, _value: Option<&str>) -> Result<Option<DirectiveGuard>> {
    ctx.insert_item(PARSE_ITEM, true);
    Ok(None)
}

fn apply_suggest(ctx: &mut CommandContext, value: Option<&str>) -> Result<Option<DirectiveGuard>> {
    ctx.insert_item(SUGGEST_ITEM, value.unwrap_or_default().to_string());
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use cmdpipe_core::{CommandDecl, CommandModel, ModelOptions};

    use super::*;
    use crate::token::tokenize;

    fn context(args: &[&str]) -> CommandContext {
        let model = CommandModel::build(&CommandDecl::new("app"), &ModelOptions::default()).unwrap();
        let mut ctx = CommandContext::new(Arc::new(model), args.iter().copied());
        ctx.set_tokens(tokenize(args, true));
        ctx
    }

    #[test]
    fn test_guards_revert_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DirectiveRegistry::new();
        for name in ["first", "second"] {
            let log = Arc::clone(&log);
            registry.register(name, move |_: &mut CommandContext, _: Option<&str>| {
                let log = Arc::clone(&log);
                Ok(Some(DirectiveGuard::new(move || {
                    log.lock().unwrap().push(name)
                })))
            });
        }

        let mut ctx = context(&["[first]", "[second]"]);
        let scope = registry.apply_all(&mut ctx).unwrap();
        assert_eq!(scope.len(), 2);
        drop(scope);

        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn test_unknown_directive_is_malformed() {
        let mut ctx = context(&["[nope]"]);
        let err = DirectiveRegistry::with_builtins()
            .apply_all(&mut ctx)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDirective { .. }));
    }

    #[test]
    fn test_parse_and_suggest_set_items() {
        let mut ctx = context(&["[parse]", "[suggest:st]"]);
        let scope = DirectiveRegistry::with_builtins()
            .apply_all(&mut ctx)
            .unwrap();

        assert!(scope.is_empty());
        assert_eq!(ctx.item::<bool>(PARSE_ITEM), Some(&true));
        assert_eq!(ctx.item::<String>(SUGGEST_ITEM).map(String::as_str), Some("st"));
    }
}
