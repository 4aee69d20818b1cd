//! Usage text and completion candidates.

use cmdpipe_core::{
    ArgumentDefinition, Arity, CommandModel, HELP_NAME, HELP_SHORTS, NodeId, is_option_like,
};

use crate::descriptor::TypeRegistry;
use crate::localize::{Localizer, keys};
use crate::token::{SEPARATOR, Token, TokenKind};

/// `true` if a help option appears before any `--`.
pub fn help_requested(tokens: &[Token]) -> bool {
    tokens
        .iter()
        .take_while(|token| token.kind != TokenKind::Separator)
        .filter(|token| token.kind == TokenKind::Option)
        .any(|token| is_help_token(&token.raw))
}

fn is_help_token(raw: &str) -> bool {
    if let Some(long) = raw.strip_prefix("--") {
        return long == HELP_NAME;
    }
    let mut chars = raw.chars().skip(1);
    matches!((chars.next(), chars.next()), (Some(c), None) if HELP_SHORTS.contains(&c))
}

/// Renders usage for `node`.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::{ArgumentDecl, CommandDecl, CommandModel, ModelOptions, ValueType};
/// use cmdpipe_runtime::{DefaultLocalizer, TypeRegistry, render_usage};
///
/// let decl = CommandDecl::new("app")
///     .with_argument(ArgumentDecl::option("count", ValueType::Integer).with_short('n'))
///     .with_argument(ArgumentDecl::operand("target", ValueType::String));
/// let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();
///
/// let text = render_usage(&model, model.root().id, &TypeRegistry::new(), &DefaultLocalizer);
/// assert!(text.starts_with("Usage: app [options] <target>"));
/// assert!(text.contains("-n, --count <NUMBER>"));
/// ```
pub fn render_usage(
    model: &CommandModel,
    node_id: NodeId,
    registry: &TypeRegistry,
    localizer: &dyn Localizer,
) -> String {
    let node = model.node(node_id);
    let arguments = model.visible_arguments(node_id);
    let (operands, options): (Vec<&ArgumentDefinition>, Vec<&ArgumentDefinition>) =
        arguments.into_iter().partition(|arg| arg.is_operand());

    let mut synopsis = vec![model.root().name.clone()];
    synopsis.extend(node.path().iter().cloned());
    if !options.is_empty() {
        synopsis.push("[options]".to_string());
    }
    if !node.children().is_empty() {
        synopsis.push(if node.default_action {
            "[command]".to_string()
        } else {
            "<command>".to_string()
        });
    }
    for operand in &operands {
        synopsis.push(operand_synopsis(operand));
    }

    let mut out = localizer.get_string(keys::USAGE, &[&synopsis.join(" ")]);
    out.push('\n');
    if let Some(description) = &node.description {
        out.push('\n');
        out.push_str(description);
        out.push('\n');
    }

    if !node.children().is_empty() {
        let rows = node
            .children()
            .iter()
            .map(|id| {
                let child = model.node(*id);
                (child.name.clone(), child.description.clone().unwrap_or_default())
            })
            .collect();
        section(&mut out, &localizer.get_string(keys::COMMANDS, &[]), rows);
    }

    if !operands.is_empty() {
        let rows = operands
            .iter()
            .map(|arg| (arg.usage_name(), describe(arg)))
            .collect();
        section(&mut out, &localizer.get_string(keys::ARGUMENTS, &[]), rows);
    }

    let mut rows: Vec<(String, String)> = options
        .iter()
        .map(|arg| (option_synopsis(arg, registry), describe(arg)))
        .collect();
    rows.push(("-h, --help".to_string(), "Show help".to_string()));
    section(&mut out, &localizer.get_string(keys::OPTIONS, &[]), rows);

    out
}

fn operand_synopsis(arg: &ArgumentDefinition) -> String {
    match arg.arity {
        Arity::Single => arg.usage_name(),
        Arity::Optional => format!("[{}]", arg.usage_name()),
        Arity::List => format!("[{}...]", arg.usage_name()),
    }
}

fn option_synopsis(arg: &ArgumentDefinition, registry: &TypeRegistry) -> String {
    let mut text = match arg.short {
        Some(short) => format!("-{short}, --{}", arg.name),
        None => format!("    --{}", arg.name),
    };
    if !arg.is_flag() {
        text.push_str(&format!(" <{}>", registry.display_name(&arg.value_type)));
    }
    if arg.arity == Arity::List {
        text.push_str("...");
    }
    text
}

fn describe(arg: &ArgumentDefinition) -> String {
    let mut parts = Vec::new();
    if let Some(description) = &arg.description {
        parts.push(description.clone());
    }
    if let Some(default) = &arg.default {
        parts.push(format!("[default: {default}]"));
    }
    if let Some(var) = &arg.env {
        parts.push(format!("[env: {var}]"));
    }
    parts.join(" ")
}

fn section(out: &mut String, heading: &str, rows: Vec<(String, String)>) {
    let width = rows.iter().map(|(left, _)| left.len()).max().unwrap_or(0);
    out.push('\n');
    out.push_str(heading);
    out.push('\n');
    for (left, right) in rows {
        if right.is_empty() {
            out.push_str(&format!("  {left}\n"));
        } else {
            out.push_str(&format!("  {left:width$}  {right}\n"));
        }
    }
}

/// Subcommand names and option spellings starting with `prefix`, for the
/// command reached by following `words` as far as they name subcommands.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::{ArgumentDecl, CommandDecl, CommandModel, ModelOptions, ValueType};
/// use cmdpipe_runtime::suggest_completions;
///
/// let decl = CommandDecl::new("git")
///     .with_subcommand(CommandDecl::new("status"))
///     .with_subcommand(CommandDecl::new("stash"))
///     .with_subcommand(CommandDecl::new("commit"));
/// let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();
///
/// let words: [&str; 0] = [];
/// assert_eq!(suggest_completions(&model, &words[..], "st"), vec!["status", "stash"]);
/// ```
pub fn suggest_completions<S: AsRef<str>>(
    model: &CommandModel,
    words: &[S],
    prefix: &str,
) -> Vec<String> {
    let mut current = model.root();
    for word in words {
        let word = word.as_ref();
        if word == SEPARATOR || is_option_like(word) {
            break;
        }
        match current
            .children()
            .iter()
            .map(|id| model.node(*id))
            .find(|child| child.matches(word))
        {
            Some(child) => current = child,
            None => break,
        }
    }

    let subcommands = current
        .children()
        .iter()
        .map(|id| model.node(*id).name.clone());
    let options = model
        .visible_arguments(current.id)
        .into_iter()
        .filter(|arg| !arg.is_operand())
        .map(|arg| format!("--{}", arg.name));

    subcommands
        .chain(options)
        .filter(|candidate| candidate.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use cmdpipe_core::{ArgumentDecl, CommandDecl, ModelOptions, ValueType};

    use super::*;
    use crate::localize::DefaultLocalizer;
    use crate::token::tokenize;

    #[test]
    fn test_help_tokens() {
        assert!(help_requested(tokenize(["run", "-h"], false).arguments()));
        assert!(help_requested(tokenize(["--help"], false).arguments()));
        assert!(help_requested(tokenize(["-?"], false).arguments()));
        assert!(!help_requested(tokenize(["--", "--help"], false).arguments()));
        assert!(!help_requested(tokenize(["-hv"], false).arguments()));
    }

    #[test]
    fn test_usage_lists_subcommands() {
        let decl = CommandDecl::new("app")
            .with_subcommand(CommandDecl::new("db").with_description("Database tools"))
            .with_argument(ArgumentDecl::option("verbose", ValueType::Bool).inherited());
        let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();

        let text = render_usage(&model, NodeId::ROOT, &TypeRegistry::new(), &DefaultLocalizer);

        assert!(text.starts_with("Usage: app [options] <command>\n"));
        assert!(text.contains("Commands:\n  db  Database tools\n"));
        assert!(text.contains("--verbose"));
        assert!(!text.contains("--verbose <"));
    }

    #[test]
    fn test_completions_include_options() {
        let decl = CommandDecl::new("app").with_subcommand(
            CommandDecl::new("db")
                .with_argument(ArgumentDecl::option("dry-run", ValueType::Bool))
                .with_subcommand(CommandDecl::new("drop")),
        );
        let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();

        assert_eq!(suggest_completions(&model, &["db"][..], "d"), vec!["drop"]);
        assert_eq!(suggest_completions(&model, &["db"][..], "--"), vec!["--dry-run"]);
    }
}
