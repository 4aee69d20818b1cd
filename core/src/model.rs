//! The immutable command tree.
//!
//! [`CommandModel::build`] turns a [`CommandDecl`] into an arena of
//! [`CommandNode`]s. Names are transformed once, the result is validated, and
//! from then on the model is read-only. Nodes own their
//! [`ArgumentDefinition`]s; the parent link is an index used for navigation
//! only.
//!
//! # Example
//!
//! ```
//! use cmdpipe_core::*;
//!
//! let decl = CommandDecl::new("app")
//!     .with_argument(ArgumentDecl::option("verbose", ValueType::Bool).inherited())
//!     .with_subcommand(
//!         CommandDecl::new("remote")
//!             .with_subcommand(CommandDecl::new("add"))
//!             .with_subcommand(CommandDecl::new("remove")),
//!     );
//! let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();
//!
//! let resolved = model.resolve(&["remote", "add", "origin"], 2).unwrap();
//! let node = model.node(resolved.node);
//! assert_eq!(node.path_string(), "remote add");
//! assert_eq!(resolved.consumed, 2);
//! assert_eq!(model.visible_arguments(resolved.node)[0].name, "verbose");
//!
//! let err = model.resolve(&["remote", "ad"], 2).unwrap_err();
//! assert_eq!(err.suggestions[0].name, "add");
//! ```

use std::ops::Range;

use serde::Serialize;
use thiserror::Error;

use crate::naming::NameTransform;
use crate::suggest::{Suggestion, suggest};
use crate::types::{ArgumentDecl, ArgumentKind, Arity, CommandDecl, ValueType, Validator};
use crate::validate::{DeclarationError, validate_declaration};

/// Index of a node inside its [`CommandModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node of every model.
    pub const ROOT: NodeId = NodeId(0);

    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of an argument: the node that declares it and its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArgumentId {
    /// Declaring node.
    pub node: NodeId,
    /// Position among that node's arguments.
    pub index: usize,
}

/// Options controlling model building.
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    /// Transform applied to declared names.
    pub transform: NameTransform,
    /// Also apply the transform to explicit name overrides.
    pub transform_overrides: bool,
}

impl ModelOptions {
    fn display_name(&self, declared: &str, rename: Option<&str>) -> String {
        match rename {
            Some(name) if self.transform_overrides => self.transform.apply(name),
            Some(name) => name.to_string(),
            None => self.transform.apply(declared),
        }
    }
}

/// Errors raised while building a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The declaration failed structural validation.
    #[error("invalid command declaration: {}", join_errors(.0))]
    Invalid(Vec<DeclarationError>),
}

fn join_errors(errors: &[DeclarationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// No command node matches the given tokens.
///
/// Carries the node where resolution stopped, its available children and
/// ranked typo suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}", self.describe())]
pub struct CommandNotFound {
    /// Nearest node reached before the failure.
    pub at: NodeId,
    /// Display path of that node (empty for the root).
    pub path: String,
    /// Unmatched token, absent when a subcommand was required but missing.
    pub token: Option<String>,
    /// Child names available at `at`, in declaration order.
    pub available: Vec<String>,
    /// Children within the suggestion threshold, closest first.
    pub suggestions: Vec<Suggestion>,
}

impl CommandNotFound {
    fn describe(&self) -> String {
        let scope = if self.path.is_empty() {
            "the root command".to_string()
        } else {
            format!("'{}'", self.path)
        };
        match &self.token {
            Some(token) => format!("'{token}' is not a subcommand of {scope}"),
            None => format!("{scope} requires a subcommand"),
        }
    }
}

/// Outcome of path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Selected node.
    pub node: NodeId,
    /// Number of leading tokens consumed as the command path, including
    /// options written between command words.
    pub consumed: usize,
    /// Options written inside the command path, in input order.
    pub level_options: Vec<LevelOption>,
}

/// An option (and its value, if it took one) written at a group level
/// before the next command word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelOption {
    /// Node whose visible options matched the token.
    pub node: NodeId,
    /// Token positions covered: the option and its value.
    pub tokens: Range<usize>,
}

/// Resolved metadata for one option or operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentDefinition {
    /// Identity within the model.
    pub id: ArgumentId,
    /// Display name after the name transform.
    pub name: String,
    /// Name as declared.
    pub declared_name: String,
    /// Option or operand.
    pub kind: ArgumentKind,
    /// Short alias.
    pub short: Option<char>,
    /// Extra long names.
    pub aliases: Vec<String>,
    /// Declared value type.
    pub value_type: ValueType,
    /// Number of values accepted.
    pub arity: Arity,
    /// Visible to descendants.
    pub inherited: bool,
    /// Declared default.
    pub default: Option<String>,
    /// Environment variable mapping.
    pub env: Option<String>,
    /// Named setting mapping.
    pub setting: Option<String>,
    /// Prompt text.
    pub prompt: Option<String>,
    /// Mask prompted input.
    pub secret: bool,
    /// List delimiter for single tokens.
    pub split: Option<char>,
    /// Post-conversion checks.
    pub validators: Vec<Validator>,
    /// Usage description.
    pub description: Option<String>,
}

impl ArgumentDefinition {
    /// `true` for positional operands.
    pub fn is_operand(&self) -> bool {
        self.kind == ArgumentKind::Operand
    }

    /// `true` for boolean options.
    pub fn is_flag(&self) -> bool {
        self.kind == ArgumentKind::Option && self.value_type.is_flag()
    }

    /// Checks a long name (without the leading `--`).
    pub fn matches_long(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// How the argument is spelled in usage text: `--name` or `<name>`.
    pub fn usage_name(&self) -> String {
        match self.kind {
            ArgumentKind::Option => format!("--{}", self.name),
            ArgumentKind::Operand => format!("<{}>", self.name),
        }
    }
}

/// One command in the tree.
#[derive(Debug, Clone, Serialize)]
pub struct CommandNode {
    /// Identity within the model.
    pub id: NodeId,
    /// Display name after the name transform.
    pub name: String,
    /// Alternative names.
    pub aliases: Vec<String>,
    /// Short description.
    pub description: Option<String>,
    /// Runs without a subcommand token even though it has children.
    pub default_action: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    arguments: Vec<ArgumentDefinition>,
    path: Vec<String>,
}

impl CommandNode {
    /// Parent node, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in declaration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Arguments declared on this node.
    pub fn arguments(&self) -> &[ArgumentDefinition] {
        &self.arguments
    }

    /// Display names from the first subcommand down to this node.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Path joined with spaces; empty for the root.
    pub fn path_string(&self) -> String {
        self.path.join(" ")
    }

    /// Leaves always run; groups only with a default action.
    pub fn is_invocable(&self) -> bool {
        self.children.is_empty() || self.default_action
    }

    /// `true` if the node declares at least one operand.
    pub fn has_operands(&self) -> bool {
        self.arguments.iter().any(ArgumentDefinition::is_operand)
    }

    /// Checks a token against the name and aliases.
    pub fn matches(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }
}

/// Returns `true` for tokens shaped like options (`-x`, `--name`), excluding
/// negative numbers and the bare `-` / `--` tokens.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::is_option_like;
///
/// assert!(is_option_like("--verbose"));
/// assert!(is_option_like("-v"));
/// assert!(!is_option_like("-5"));
/// assert!(!is_option_like("-2.5"));
/// assert!(!is_option_like("--"));
/// assert!(!is_option_like("run"));
/// ```
pub fn is_option_like(token: &str) -> bool {
    if token == "-" || token == "--" || !token.starts_with('-') {
        return false;
    }
    let rest = &token[1..];
    let numeric = rest.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && rest.parse::<f64>().is_ok();
    !numeric
}

/// Immutable tree of commands.
#[derive(Debug, Clone, Serialize)]
pub struct CommandModel {
    nodes: Vec<CommandNode>,
}

impl CommandModel {
    /// Builds the model from a declaration.
    ///
    /// Names are transformed first, then the transformed declaration is
    /// validated so collisions introduced by casing are caught too.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Invalid`] listing every structural problem.
    pub fn build(decl: &CommandDecl, options: &ModelOptions) -> Result<Self, ModelError> {
        let named = apply_names(decl, options);
        let errors = validate_declaration(&named);
        if !errors.is_empty() {
            return Err(ModelError::Invalid(errors));
        }

        let mut model = Self { nodes: Vec::new() };
        model.insert(&named, decl, None, Vec::new());
        Ok(model)
    }

    fn insert(
        &mut self,
        named: &CommandDecl,
        original: &CommandDecl,
        parent: Option<NodeId>,
        path: Vec<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let arguments = named
            .arguments
            .iter()
            .zip(&original.arguments)
            .enumerate()
            .map(|(index, (arg, declared))| definition(arg, &declared.name, id, index))
            .collect();
        self.nodes.push(CommandNode {
            id,
            name: named.name.clone(),
            aliases: named.aliases.clone(),
            description: named.description.clone(),
            default_action: named.default_action,
            parent,
            children: Vec::new(),
            arguments,
            path: path.clone(),
        });

        for (sub, sub_original) in named.subcommands.iter().zip(&original.subcommands) {
            let mut child_path = path.clone();
            child_path.push(sub.name.clone());
            let child = self.insert(sub, sub_original, Some(id), child_path);
            self.nodes[id.0].children.push(child);
        }
        id
    }

    /// The root command.
    pub fn root(&self) -> &CommandNode {
        &self.nodes[NodeId::ROOT.0]
    }

    /// Looks up a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to a different model.
    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    /// All nodes, parents before children.
    pub fn nodes(&self) -> impl Iterator<Item = &CommandNode> {
        self.nodes.iter()
    }

    /// Finds a node by its space-separated display path (`""` is the root).
    ///
    /// # Examples
    ///
    /// ```
    /// use cmdpipe_core::*;
    ///
    /// let decl = CommandDecl::new("app")
    ///     .with_subcommand(CommandDecl::new("db").with_subcommand(CommandDecl::new("migrate")));
    /// let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();
    ///
    /// assert_eq!(model.find("db migrate").unwrap().name, "migrate");
    /// assert!(model.find("").is_some());
    /// assert!(model.find("db nope").is_none());
    /// ```
    pub fn find(&self, path: &str) -> Option<&CommandNode> {
        let mut current = self.root();
        for segment in path.split_whitespace() {
            current = current
                .children
                .iter()
                .map(|id| self.node(*id))
                .find(|child| child.name == segment)?;
        }
        Some(current)
    }

    /// Ids from the root down to `id`, inclusive.
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain.reverse();
        chain
    }

    /// Arguments bindable at `id`: inherited options of ancestors (root
    /// first) followed by the node's own arguments. An own argument shadows
    /// an inherited one with the same name, and a nearer ancestor shadows a
    /// farther one.
    pub fn visible_arguments(&self, id: NodeId) -> Vec<&ArgumentDefinition> {
        let lineage = self.lineage(id);
        let mut visible: Vec<&ArgumentDefinition> = Vec::new();
        for node_id in lineage {
            let own = node_id == id;
            for arg in &self.node(node_id).arguments {
                if !own && !arg.inherited {
                    continue;
                }
                visible.retain(|existing| existing.name != arg.name);
                visible.push(arg);
            }
        }
        visible
    }

    /// Looks up an argument by id.
    pub fn argument(&self, id: ArgumentId) -> &ArgumentDefinition {
        &self.node(id.node).arguments[id.index]
    }

    /// Resolves leading tokens to a node.
    ///
    /// Tokens are consumed while each names a child of the current node.
    /// At a group, options visible there are stepped over (with their value)
    /// and recorded in [`Resolution::level_options`]. Resolution stops at
    /// `--`, at an option the current group does not know, at a leaf, or at
    /// a default-action node that declares operands. Any other unmatched
    /// token fails with [`CommandNotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`CommandNotFound`] with suggestions within `threshold`.
    pub fn resolve<S: AsRef<str>>(
        &self,
        tokens: &[S],
        threshold: usize,
    ) -> Result<Resolution, CommandNotFound> {
        let mut current = self.root();
        let mut consumed = 0;
        let mut level_options = Vec::new();
        let mut index = 0;

        while index < tokens.len() {
            let token: &str = tokens[index].as_ref();
            if token == "--" {
                break;
            }
            if is_option_like(token) {
                if current.children.is_empty() {
                    break;
                }
                let Some(width) = self.option_width(current.id, tokens, index) else {
                    break;
                };
                level_options.push(LevelOption {
                    node: current.id,
                    tokens: index..index + width,
                });
                index += width;
                consumed = index;
                continue;
            }
            if let Some(child) = current
                .children
                .iter()
                .map(|id| self.node(*id))
                .find(|child| child.matches(token))
            {
                current = child;
                index += 1;
                consumed = index;
                continue;
            }
            if current.children.is_empty() || (current.default_action && current.has_operands()) {
                break;
            }
            return Err(self.not_found(current.id, Some(token), threshold));
        }

        Ok(Resolution {
            node: current.id,
            consumed,
            level_options,
        })
    }

    /// Number of tokens taken by the option at `tokens[index]` when it is
    /// visible at `at`: 2 when it consumes the following value, else 1.
    /// `None` if any option named by the token is unknown there.
    fn option_width<S: AsRef<str>>(&self, at: NodeId, tokens: &[S], index: usize) -> Option<usize> {
        let token: &str = tokens[index].as_ref();
        // Nearest declaration first, so own options win over inherited aliases.
        let options: Vec<&ArgumentDefinition> = self
            .visible_arguments(at)
            .into_iter()
            .filter(|arg| !arg.is_operand())
            .collect();

        let wants_value = if let Some(body) = token.strip_prefix("--") {
            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };
            let def = options.iter().rev().find(|arg| arg.matches_long(name))?;
            !def.is_flag() && inline.is_none()
        } else {
            let body = &token[1..];
            let mut wants = false;
            for (offset, c) in body.char_indices() {
                let def = options.iter().rev().find(|arg| arg.short == Some(c))?;
                if def.is_flag() {
                    continue;
                }
                wants = body[offset + c.len_utf8()..].is_empty();
                break;
            }
            wants
        };

        let value_follows = tokens.get(index + 1).is_some_and(|next| {
            let next: &str = next.as_ref();
            next != "--" && !is_option_like(next)
        });
        Some(if wants_value && value_follows { 2 } else { 1 })
    }

    /// Builds a [`CommandNotFound`] for `at`, ranking its children against
    /// `token`. Without a token every child is listed and none suggested.
    pub fn not_found(&self, at: NodeId, token: Option<&str>, threshold: usize) -> CommandNotFound {
        let node = self.node(at);
        let available: Vec<String> = node
            .children
            .iter()
            .map(|id| self.node(*id).name.clone())
            .collect();
        let suggestions = match token {
            Some(token) => suggest(token, available.iter().map(String::as_str), threshold),
            None => Vec::new(),
        };
        CommandNotFound {
            at,
            path: node.path_string(),
            token: token.map(String::from),
            available,
            suggestions,
        }
    }
}

fn apply_names(decl: &CommandDecl, options: &ModelOptions) -> CommandDecl {
    CommandDecl {
        name: options.display_name(&decl.name, decl.rename.as_deref()),
        rename: None,
        description: decl.description.clone(),
        aliases: decl.aliases.clone(),
        default_action: decl.default_action,
        arguments: decl
            .arguments
            .iter()
            .map(|arg| ArgumentDecl {
                name: options.display_name(&arg.name, arg.rename.as_deref()),
                rename: None,
                ..arg.clone()
            })
            .collect(),
        subcommands: decl
            .subcommands
            .iter()
            .map(|sub| apply_names(sub, options))
            .collect(),
    }
}

fn definition(arg: &ArgumentDecl, declared: &str, node: NodeId, index: usize) -> ArgumentDefinition {
    ArgumentDefinition {
        id: ArgumentId { node, index },
        name: arg.name.clone(),
        declared_name: declared.to_string(),
        kind: arg.kind,
        short: arg.short,
        aliases: arg.aliases.clone(),
        value_type: arg.value_type.clone(),
        arity: arg.arity,
        inherited: arg.inherited,
        default: arg.default.clone(),
        env: arg.env.clone(),
        setting: arg.setting.clone(),
        prompt: arg.prompt.clone(),
        secret: arg.secret,
        split: arg.split,
        validators: arg.validators.clone(),
        description: arg.description.clone(),
    }
}
