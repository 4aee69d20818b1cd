//! Matching argument tokens to definitions, filling gaps from the source
//! chain, converting text, and running validators.
//!
//! Every argument visible at the resolved command is filled from the first
//! source that has a value:
//!
//! 1. the command line
//! 2. the declared environment variable
//! 3. the declared named setting
//! 4. an interactive prompt (masked for secrets)
//! 5. the declared default
//! 6. the type's zero value for optional flags, text, numbers and lists
//!
//! Conversion and matching problems are collected across all arguments
//! before binding fails, as are validation failures.

use std::collections::HashMap;
use std::sync::Arc;

use cmdpipe_core::{
    ArgumentDefinition, ArgumentId, Arity, CommandModel, DEFAULT_LIST_DELIMITER, NodeId,
    Validator, ValueType, suggest,
};
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::console::{Console, read_cancellable};
use crate::culture::Culture;
use crate::descriptor::TypeRegistry;
use crate::environment::Environment;
use crate::error::{
    ParseIssue, ParseReport, PipelineError, Result, ValidationFailure, ValidationReport,
    ValueParsingError,
};
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Where a bound value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Written on the command line.
    CommandLine,
    /// Read from the mapped environment variable.
    Environment,
    /// Read from the mapped named setting.
    Setting,
    /// Answered at an interactive prompt.
    Prompt,
    /// The declared default.
    Default,
    /// The type's zero value.
    ZeroValue,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueSource::CommandLine => "command line",
            ValueSource::Environment => "environment",
            ValueSource::Setting => "setting",
            ValueSource::Prompt => "prompt",
            ValueSource::Default => "default",
            ValueSource::ZeroValue => "zero value",
        };
        f.write_str(name)
    }
}

/// One argument's final value.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    /// The argument that received the value.
    pub argument: ArgumentId,
    /// Display name of the argument.
    pub name: String,
    /// The converted value.
    pub value: Value,
    /// Where the raw text came from.
    pub source: ValueSource,
}

/// Bound values of one invocation in visible-argument order.
///
/// Arguments with no value from any source are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundValues {
    values: Vec<BoundValue>,
}

impl BoundValues {
    /// The value bound to the argument displayed as `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bound(name).map(|bound| &bound.value)
    }

    /// Value and provenance of `name`.
    pub fn bound(&self, name: &str) -> Option<&BoundValue> {
        self.values.iter().find(|bound| bound.name == name)
    }

    pub fn by_id(&self, id: ArgumentId) -> Option<&BoundValue> {
        self.values.iter().find(|bound| bound.argument == id)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// `false` when absent.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bound(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Subset matching `keep`, order preserved.
    pub fn filter(&self, keep: impl Fn(&BoundValue) -> bool) -> BoundValues {
        BoundValues {
            values: self.values.iter().filter(|b| keep(b)).cloned().collect(),
        }
    }

    /// `{ name: value }` as JSON. When names repeat, the first binding wins,
    /// matching [`BoundValues::get`].
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for bound in &self.values {
            map.entry(bound.name.clone())
                .or_insert_with(|| bound.value.to_json());
        }
        map.into()
    }
}

impl<'a> IntoIterator for &'a BoundValues {
    type Item = &'a BoundValue;
    type IntoIter = std::slice::Iter<'a, BoundValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Binds values for one resolved command.
pub struct Binder<'a> {
    /// Tree the node belongs to.
    pub model: &'a CommandModel,
    /// Converters for declared value types.
    pub registry: &'a TypeRegistry,
    /// Environment variables and named settings.
    pub environment: &'a dyn Environment,
    /// Prompt target.
    pub console: &'a Arc<dyn Console>,
    /// Aborts binding, including a prompt waiting for input.
    pub cancellation: &'a CancellationToken,
    /// Culture for number parsing.
    pub culture: &'a Culture,
    /// Whether missing values may be prompted for at all.
    pub prompting: bool,
    /// Edit-distance threshold for option suggestions.
    pub threshold: usize,
}

impl Binder<'_> {
    /// Binds `tokens` (the arguments after the command path) for `node`.
    ///
    /// # Errors
    ///
    /// See [`Binder::bind_with_levels`].
    pub fn bind(&self, node: NodeId, tokens: &[Token]) -> Result<BoundValues> {
        self.bind_with_levels(node, &[], tokens)
    }

    /// Binds values for `node`, including options written inside the
    /// command path. Each entry of `levels` is matched against the options
    /// visible at its node; `tokens` are matched against everything visible
    /// at `node`.
    ///
    /// Options of ancestors that are not visible at `node` are bound as
    /// well, so interceptors see the values declared at their level.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Parsing`] with every matching and conversion issue,
    ///   plus every validation failure found in the same pass
    /// - [`PipelineError::Validation`] with every failed check, when parsing
    ///   succeeded
    /// - [`PipelineError::Cancelled`] if cancellation is seen around or
    ///   during a prompt
    /// - [`PipelineError::Io`] if reading a prompt answer fails
    pub fn bind_with_levels(
        &self,
        node: NodeId,
        levels: &[(NodeId, Vec<Token>)],
        tokens: &[Token],
    ) -> Result<BoundValues> {
        let visible = self.model.visible_arguments(node);
        let defs = self.with_hidden_ancestors(node, visible.clone());
        let mut report = ParseReport::default();
        let mut raw = vec![Vec::new(); defs.len()];

        for (level, level_tokens) in levels {
            let candidates: Vec<&ArgumentDefinition> = self
                .model
                .visible_arguments(*level)
                .into_iter()
                .filter(|def| !def.is_operand())
                .collect();
            let texts = collect_raw(&candidates, level_tokens, self.threshold, &mut report);
            merge_raw(&defs, &candidates, texts, &mut raw);
        }
        let texts = collect_raw(&visible, tokens, self.threshold, &mut report);
        merge_raw(&defs, &visible, texts, &mut raw);

        let mut values = Vec::new();
        let mut validation = ValidationReport::default();

        for (def, cli) in defs.iter().zip(raw) {
            let Some((texts, source)) = self.source_texts(def, cli)? else {
                if let Some(value) = zero_value(def) {
                    values.push(bound(def, value, ValueSource::ZeroValue));
                } else if def.arity == Arity::Single {
                    validation.failures.push(ValidationFailure {
                        argument: def.usage_name(),
                        message: "is required".to_string(),
                    });
                }
                continue;
            };

            if def.arity != Arity::List && texts.len() > 1 {
                report.issues.push(ParseIssue::TooManyValues {
                    argument: def.usage_name(),
                    count: texts.len(),
                });
                continue;
            }

            let Some(value) = self.convert(def, &texts, &mut report) else {
                continue;
            };
            validation
                .failures
                .extend(check_validators(def, &value)?);
            debug!(argument = %def.name, %source, "Bound argument");
            values.push(bound(def, value, source));
        }

        if !report.is_empty() {
            return Err(PipelineError::Parsing { report, validation });
        }
        if !validation.is_empty() {
            return Err(PipelineError::Validation(validation));
        }
        Ok(BoundValues { values })
    }

    /// Appends ancestor options that are not visible at `node`.
    fn with_hidden_ancestors<'m>(
        &'m self,
        node: NodeId,
        mut defs: Vec<&'m ArgumentDefinition>,
    ) -> Vec<&'m ArgumentDefinition> {
        for ancestor in self.model.lineage(node) {
            if ancestor == node {
                continue;
            }
            for arg in self.model.node(ancestor).arguments() {
                if !arg.is_operand() && !defs.iter().any(|def| def.id == arg.id) {
                    defs.push(arg);
                }
            }
        }
        defs
    }

    fn source_texts(
        &self,
        def: &ArgumentDefinition,
        cli: Vec<String>,
    ) -> Result<Option<(Vec<String>, ValueSource)>> {
        if !cli.is_empty() {
            let texts = match (def.arity, def.split) {
                (Arity::List, Some(delimiter)) => cli
                    .iter()
                    .flat_map(|text| split_list(text, delimiter))
                    .collect(),
                _ => cli,
            };
            return Ok(Some((texts, ValueSource::CommandLine)));
        }

        let external = [
            (
                def.env.as_deref().and_then(|var| self.environment.env_var(var)),
                ValueSource::Environment,
            ),
            (
                def.setting
                    .as_deref()
                    .and_then(|name| self.environment.setting(name)),
                ValueSource::Setting,
            ),
        ];
        for (text, source) in external {
            if let Some(text) = text {
                return Ok(Some((self.expand(def, &text), source)));
            }
        }

        if let Some(answer) = self.prompt(def)? {
            return Ok(Some((self.expand(def, &answer), ValueSource::Prompt)));
        }

        Ok(def
            .default
            .as_deref()
            .map(|text| (self.expand(def, text), ValueSource::Default)))
    }

    /// Splits list text from a non-command-line source.
    fn expand(&self, def: &ArgumentDefinition, text: &str) -> Vec<String> {
        if def.arity == Arity::List {
            split_list(text, def.split.unwrap_or(DEFAULT_LIST_DELIMITER))
        } else {
            vec![text.to_string()]
        }
    }

    fn prompt(&self, def: &ArgumentDefinition) -> Result<Option<String>> {
        let Some(prompt) = def.prompt.as_deref() else {
            return Ok(None);
        };
        if !self.prompting || !self.console.is_interactive() {
            return Ok(None);
        }
        if self.cancellation.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let answer = read_cancellable(self.console, prompt, def.secret, self.cancellation)?;
        Ok(answer.filter(|text| !text.is_empty()))
    }

    fn convert(
        &self,
        def: &ArgumentDefinition,
        texts: &[String],
        report: &mut ParseReport,
    ) -> Option<Value> {
        let mut items = Vec::with_capacity(texts.len());
        let mut failed = false;
        for text in texts {
            match self.registry.parse(&def.value_type, text, self.culture) {
                Ok(value) => items.push(value),
                Err(reason) => {
                    failed = true;
                    report
                        .issues
                        .push(ParseIssue::Conversion(ValueParsingError {
                            argument: def.usage_name(),
                            raw: text.clone(),
                            expected: self.registry.display_name(&def.value_type),
                            reason,
                        }));
                }
            }
        }
        if failed {
            return None;
        }
        match def.arity {
            Arity::List => Some(Value::List(items)),
            _ => items.into_iter().next(),
        }
    }
}

fn bound(def: &ArgumentDefinition, value: Value, source: ValueSource) -> BoundValue {
    BoundValue {
        argument: def.id,
        name: def.name.clone(),
        value,
        source,
    }
}

/// Adds texts collected against `candidates` to the slots of `defs`.
fn merge_raw(
    defs: &[&ArgumentDefinition],
    candidates: &[&ArgumentDefinition],
    texts: Vec<Vec<String>>,
    raw: &mut [Vec<String>],
) {
    for (candidate, collected) in candidates.iter().zip(texts) {
        if let Some(slot) = defs.iter().position(|def| def.id == candidate.id) {
            raw[slot].extend(collected);
        }
    }
}

fn split_list(text: &str, delimiter: char) -> Vec<String> {
    text.split(delimiter)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

fn zero_value(def: &ArgumentDefinition) -> Option<Value> {
    match def.arity {
        Arity::Single => None,
        Arity::List => Some(Value::List(Vec::new())),
        Arity::Optional => match def.value_type {
            ValueType::Bool => Some(Value::Bool(false)),
            ValueType::String => Some(Value::Text(String::new())),
            ValueType::Integer => Some(Value::Integer(0)),
            ValueType::Float => Some(Value::Float(0.0)),
            _ => None,
        },
    }
}

/// Assigns command-line texts to definitions, index-aligned with `defs`.
fn collect_raw(
    defs: &[&ArgumentDefinition],
    tokens: &[Token],
    threshold: usize,
    report: &mut ParseReport,
) -> Vec<Vec<String>> {
    let mut raw = vec![Vec::new(); defs.len()];
    let operand_slots: Vec<usize> = defs
        .iter()
        .enumerate()
        .filter(|(_, def)| def.is_operand())
        .map(|(i, _)| i)
        .collect();
    let mut operand_cursor = 0;
    let shorts: HashMap<char, usize> = defs
        .iter()
        .enumerate()
        .filter_map(|(i, def)| def.short.map(|c| (c, i)))
        .collect();

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        i += 1;
        match token.kind {
            TokenKind::Separator => {}
            TokenKind::Operand | TokenKind::Directive => {
                match operand_slots.get(operand_cursor) {
                    Some(&slot) => {
                        raw[slot].push(token.raw.clone());
                        if defs[slot].arity != Arity::List {
                            operand_cursor += 1;
                        }
                    }
                    None => report.issues.push(ParseIssue::UnexpectedOperand {
                        token: token.raw.clone(),
                    }),
                }
            }
            TokenKind::Option => {
                let next_value = tokens
                    .get(i)
                    .filter(|next| next.kind == TokenKind::Operand)
                    .map(|next| next.raw.clone());
                let used_next = if let Some(body) = token.raw.strip_prefix("--") {
                    bind_long(defs, body, next_value, threshold, &mut raw, report)
                } else {
                    bind_short(defs, &shorts, &token.raw[1..], next_value, &mut raw, report)
                };
                if used_next {
                    i += 1;
                }
            }
        }
    }

    raw
}

/// Returns `true` when the following token was taken as the value.
fn bind_long(
    defs: &[&ArgumentDefinition],
    body: &str,
    next_value: Option<String>,
    threshold: usize,
    raw: &mut [Vec<String>],
    report: &mut ParseReport,
) -> bool {
    let (name, inline) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (body, None),
    };
    let Some(index) = defs
        .iter()
        .rposition(|def| !def.is_operand() && def.matches_long(name))
    else {
        let candidates = defs
            .iter()
            .filter(|def| !def.is_operand())
            .map(|def| def.name.as_str());
        report.issues.push(ParseIssue::UnrecognizedOption {
            token: format!("--{name}"),
            suggestions: suggest(name, candidates, threshold),
        });
        return false;
    };

    if defs[index].is_flag() {
        raw[index].push(inline.unwrap_or("true").to_string());
        return false;
    }
    if let Some(value) = inline {
        raw[index].push(value.to_string());
        return false;
    }
    match next_value {
        Some(value) => {
            raw[index].push(value);
            true
        }
        None => {
            report.issues.push(ParseIssue::MissingValue {
                option: format!("--{name}"),
            });
            false
        }
    }
}

/// Handles `-v`, `-vx` clusters and `-n5` / `-n=5` / `-n 5` values.
fn bind_short(
    defs: &[&ArgumentDefinition],
    shorts: &HashMap<char, usize>,
    body: &str,
    next_value: Option<String>,
    raw: &mut [Vec<String>],
    report: &mut ParseReport,
) -> bool {
    for (offset, c) in body.char_indices() {
        let Some(&index) = shorts.get(&c) else {
            report.issues.push(ParseIssue::UnrecognizedOption {
                token: format!("-{c}"),
                suggestions: Vec::new(),
            });
            return false;
        };
        if defs[index].is_flag() {
            raw[index].push("true".to_string());
            continue;
        }

        let rest = &body[offset + c.len_utf8()..];
        if !rest.is_empty() {
            raw[index].push(rest.strip_prefix('=').unwrap_or(rest).to_string());
            return false;
        }
        return match next_value {
            Some(value) => {
                raw[index].push(value);
                true
            }
            None => {
                report.issues.push(ParseIssue::MissingValue {
                    option: format!("-{c}"),
                });
                false
            }
        };
    }
    false
}

fn check_validators(def: &ArgumentDefinition, value: &Value) -> Result<Vec<ValidationFailure>> {
    let items: Vec<&Value> = match value {
        Value::List(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut failures = Vec::new();
    for validator in &def.validators {
        for item in &items {
            if let Some(message) = check(validator, item)? {
                failures.push(ValidationFailure {
                    argument: def.usage_name(),
                    message,
                });
            }
        }
    }
    Ok(failures)
}

/// Runs one validator; `Some(message)` on failure.
fn check(validator: &Validator, value: &Value) -> Result<Option<String>> {
    let text = value.to_string();
    let message = match validator {
        Validator::Range { min, max } => match value.as_f64() {
            None => Some("is not numeric".to_string()),
            Some(n) => match (min, max) {
                (Some(lo), Some(hi)) if n < *lo || n > *hi => {
                    Some(format!("must be between {lo} and {hi}"))
                }
                (Some(lo), None) if n < *lo => Some(format!("must be at least {lo}")),
                (None, Some(hi)) if n > *hi => Some(format!("must be at most {hi}")),
                _ => None,
            },
        },
        Validator::MinLength(n) => (text.chars().count() < *n)
            .then(|| format!("must be at least {n} characters")),
        Validator::MaxLength(n) => (text.chars().count() > *n)
            .then(|| format!("must be at most {n} characters")),
        Validator::Pattern(pattern) => {
            let anchored = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
                PipelineError::Configuration(format!("invalid pattern '{pattern}': {err}"))
            })?;
            (!anchored.is_match(&text)).then(|| format!("must match pattern {pattern}"))
        }
        Validator::NonEmpty => text
            .trim()
            .is_empty()
            .then(|| "must not be empty".to_string()),
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use cmdpipe_core::{ArgumentDecl, CommandDecl, ModelOptions};

    use super::*;
    use crate::console::BufferConsole;
    use crate::environment::MapEnvironment;
    use crate::token::tokenize;

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn model() -> CommandModel {
        let decl = CommandDecl::new("app")
            .with_argument(ArgumentDecl::option("verbose", ValueType::Bool).with_short('v'))
            .with_argument(
                ArgumentDecl::option("count", ValueType::Integer)
                    .with_short('n')
                    .from_env("APP_COUNT")
                    .with_default("1"),
            )
            .with_argument(ArgumentDecl::option("tag", ValueType::String).with_arity(Arity::List))
            .with_argument(ArgumentDecl::operand("target", ValueType::String));
        CommandModel::build(&decl, &ModelOptions::default()).unwrap()
    }

    fn bind_on(
        model: &CommandModel,
        args: &[&str],
        environment: &dyn Environment,
        console: Arc<dyn Console>,
    ) -> Result<BoundValues> {
        let registry = TypeRegistry::new();
        let culture = Culture::default();
        let cancellation = CancellationToken::new();
        let binder = Binder {
            model,
            registry: &registry,
            environment,
            console: &console,
            cancellation: &cancellation,
            culture: &culture,
            prompting: true,
            threshold: 2,
        };
        let stream = tokenize(args, false);
        let resolution = model.resolve(&stream.argument_words()[..], 2)?;
        let levels: Vec<(NodeId, Vec<Token>)> = resolution
            .level_options
            .iter()
            .map(|option| (option.node, stream.arguments()[option.tokens.clone()].to_vec()))
            .collect();
        binder.bind_with_levels(
            resolution.node,
            &levels,
            &stream.arguments()[resolution.consumed..],
        )
    }

    fn bind_with(
        args: &[&str],
        environment: &dyn Environment,
        console: Arc<dyn Console>,
    ) -> Result<BoundValues> {
        bind_on(&model(), args, environment, console)
    }

    fn bind(args: &[&str]) -> Result<BoundValues> {
        bind_with(args, &MapEnvironment::new(), Arc::new(BufferConsole::new()))
    }

    fn nested_model() -> CommandModel {
        let decl = CommandDecl::new("app")
            .with_argument(
                ArgumentDecl::option("verbose", ValueType::Bool)
                    .with_short('v')
                    .with_alias("loud")
                    .inherited(),
            )
            .with_argument(ArgumentDecl::option("profile", ValueType::String))
            .with_subcommand(
                CommandDecl::new("deploy")
                    .with_argument(ArgumentDecl::option("loud", ValueType::Integer)),
            );
        CommandModel::build(&decl, &ModelOptions::default()).unwrap()
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[test]
    fn test_short_cluster_and_attached_value() {
        let values = bind(&["-vn5", "prod"]).unwrap();

        assert!(values.flag("verbose"));
        assert_eq!(values.get_i64("count"), Some(5));
        assert_eq!(values.bound("count").unwrap().source, ValueSource::CommandLine);
        assert_eq!(values.get_str("target"), Some("prod"));
    }

    #[test]
    fn test_negative_number_is_a_value() {
        let values = bind(&["--count", "-3", "prod"]).unwrap();
        assert_eq!(values.get_i64("count"), Some(-3));
    }

    #[test]
    fn test_environment_beats_default() {
        let env = MapEnvironment::new().with_var("APP_COUNT", "7");
        let values = bind_with(&["prod"], &env, Arc::new(BufferConsole::new())).unwrap();

        let count = values.bound("count").unwrap();
        assert_eq!(count.value, Value::Integer(7));
        assert_eq!(count.source, ValueSource::Environment);
    }

    #[test]
    fn test_zero_values_fill_optional_arguments() {
        let values = bind(&["prod"]).unwrap();

        assert_eq!(values.bound("verbose").unwrap().source, ValueSource::ZeroValue);
        assert_eq!(values.get("tag"), Some(&Value::List(Vec::new())));
        assert_eq!(values.bound("count").unwrap().source, ValueSource::Default);
    }

    #[test]
    fn test_missing_operand_is_required() {
        let err = bind(&["-v"]).unwrap_err();
        let PipelineError::Validation(report) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(report.to_string(), "'<target>' is required");
    }

    #[test]
    fn test_list_collects_repeated_options() {
        let values = bind(&["--tag", "a", "--tag=b", "prod"]).unwrap();
        assert_eq!(
            values.get("tag"),
            Some(&Value::List(vec![Value::Text("a".into()), Value::Text("b".into())]))
        );
    }

    #[test]
    fn test_unknown_option_is_suggested() {
        let err = bind(&["--cont", "2", "prod"]).unwrap_err();
        let PipelineError::Parsing { report, .. } = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert!(matches!(
            &report.issues[0],
            ParseIssue::UnrecognizedOption { suggestions, .. } if suggestions[0].name == "count"
        ));
    }

    #[test]
    fn test_parse_issues_keep_validation_failures() {
        let err = bind(&["--count", "x"]).unwrap_err();
        let PipelineError::Parsing { report, validation } = err else {
            panic!("expected parse error, got {err:?}");
        };

        assert_eq!(report.conversions().next().unwrap().raw, "x");
        assert_eq!(validation.to_string(), "'<target>' is required");
    }

    #[test]
    fn test_group_options_bind_at_their_level() {
        let model = nested_model();
        let values = bind_on(
            &model,
            &["--profile", "prod", "-v", "deploy"],
            &MapEnvironment::new(),
            Arc::new(BufferConsole::new()),
        )
        .unwrap();

        assert_eq!(values.get_str("profile"), Some("prod"));
        assert_eq!(values.bound("profile").unwrap().argument.node, NodeId::ROOT);
        assert!(values.flag("verbose"));
    }

    #[test]
    fn test_group_option_is_not_visible_below() {
        let model = nested_model();
        let err = bind_on(
            &model,
            &["deploy", "--profile", "prod"],
            &MapEnvironment::new(),
            Arc::new(BufferConsole::new()),
        )
        .unwrap_err();

        assert!(err.to_string().contains("unrecognized option '--profile'"));
    }

    #[test]
    fn test_own_option_wins_over_inherited_alias() {
        let model = nested_model();
        let values = bind_on(
            &model,
            &["deploy", "--loud", "3"],
            &MapEnvironment::new(),
            Arc::new(BufferConsole::new()),
        )
        .unwrap();

        assert_eq!(values.get_i64("loud"), Some(3));
        assert!(!values.flag("verbose"));
    }

    #[test]
    fn test_extra_operand_is_reported() {
        let err = bind(&["prod", "extra"]).unwrap_err();
        assert!(err.to_string().contains("unexpected operand 'extra'"));
    }

    #[test]
    fn test_prompt_fills_missing_operand() {
        let console = Arc::new(BufferConsole::interactive(["staging"]));
        let shared: Arc<dyn Console> = console.clone();
        let decl = CommandDecl::new("app").with_argument(
            ArgumentDecl::operand("target", ValueType::String).with_prompt("Target"),
        );
        let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();
        let registry = TypeRegistry::new();
        let environment = MapEnvironment::new();
        let cancellation = CancellationToken::new();
        let culture = Culture::default();
        let binder = Binder {
            model: &model,
            registry: &registry,
            environment: &environment,
            console: &shared,
            cancellation: &cancellation,
            culture: &culture,
            prompting: true,
            threshold: 2,
        };

        let values = binder.bind(NodeId::ROOT, &[]).unwrap();
        assert_eq!(values.get_str("target"), Some("staging"));
        assert_eq!(values.bound("target").unwrap().source, ValueSource::Prompt);
        assert_eq!(console.prompts(), vec![("Target".to_string(), false)]);
    }

    #[test]
    fn test_validators_check_each_list_item() {
        let def_decl = CommandDecl::new("app").with_argument(
            ArgumentDecl::option("port", ValueType::Integer)
                .with_arity(Arity::List)
                .with_validator(Validator::Range {
                    min: Some(1.0),
                    max: Some(65535.0),
                }),
        );
        let model = CommandModel::build(&def_decl, &ModelOptions::default()).unwrap();
        let def = &model.root().arguments()[0];

        let value = Value::List(vec![Value::Integer(80), Value::Integer(70000)]);
        let failures = check_validators(def, &value).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message, "must be between 1 and 65535");
    }

    #[test]
    fn test_pattern_matches_whole_text() {
        let pattern = Validator::Pattern("[a-z]+".into());
        assert_eq!(check(&pattern, &Value::Text("abc".into())).unwrap(), None);
        assert!(check(&pattern, &Value::Text("abc1".into())).unwrap().is_some());

        let broken = Validator::Pattern("(".into());
        assert!(matches!(
            check(&broken, &Value::Text("x".into())),
            Err(PipelineError::Configuration(_))
        ));
    }
}
