//! Declaration validation.
//!
//! Validates structural invariants of a command tree declaration, catching
//! errors such as duplicate names, malformed aliases and misplaced operands
//! before a model is built from it.
//!
//! # Examples
//!
//! ```
//! use cmdpipe_core::*;
//!
//! let decl = CommandDecl::new("app")
//!     .with_argument(ArgumentDecl::option("verbose", ValueType::Bool).with_short('v'));
//! assert!(validate_declaration(&decl).is_empty());
//!
//! // Invalid: two subcommands share a name
//! let bad = CommandDecl::new("app")
//!     .with_subcommand(CommandDecl::new("run"))
//!     .with_subcommand(CommandDecl::new("run"));
//! assert!(!validate_declaration(&bad).is_empty());
//! ```

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::types::{ArgumentDecl, ArgumentKind, Arity, CommandDecl};

/// Long option name reserved for help.
pub const HELP_NAME: &str = "help";

/// Short aliases reserved for help.
pub const HELP_SHORTS: [char; 2] = ['h', '?'];

/// Declaration validation errors.
///
/// Each variant names the command scope (space-separated path including the
/// root) where the problem was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// Command name is empty, contains whitespace or starts with `-`.
    #[error("invalid command name '{name}' in '{scope}'")]
    InvalidCommandName { scope: String, name: String },
    /// Argument name is empty, contains whitespace or starts with `-`.
    #[error("invalid argument name '{name}' in '{scope}'")]
    InvalidArgumentName { scope: String, name: String },
    /// Two subcommands in one scope share a name or alias.
    #[error("duplicate subcommand '{name}' in '{scope}'")]
    DuplicateSubcommand { scope: String, name: String },
    /// Two arguments in one scope share a long name or alias.
    #[error("duplicate argument '{name}' in '{scope}'")]
    DuplicateArgument { scope: String, name: String },
    /// A short alias is reused by a different visible argument.
    #[error("short alias '-{short}' of '{name}' collides with '{other}' in '{scope}'")]
    DuplicateShort {
        scope: String,
        name: String,
        other: String,
        short: char,
    },
    /// Short alias is not an ASCII letter or digit.
    #[error("invalid short alias '{short}' on '{name}' in '{scope}'")]
    InvalidShort {
        scope: String,
        name: String,
        short: char,
    },
    /// Long alias is empty, contains whitespace or starts with `-`.
    #[error("invalid alias '{alias}' on '{name}' in '{scope}'")]
    InvalidAlias {
        scope: String,
        name: String,
        alias: String,
    },
    /// Name or short alias reserved for help.
    #[error("'{name}' in '{scope}' uses a name reserved for help")]
    ReservedName { scope: String, name: String },
    /// Operands cannot be inherited.
    #[error("operand '{name}' in '{scope}' cannot be inherited")]
    InheritedOperand { scope: String, name: String },
    /// Operands cannot have option aliases.
    #[error("operand '{name}' in '{scope}' cannot have option aliases")]
    AliasOnOperand { scope: String, name: String },
    /// Operand declared after a list operand or a required operand after an
    /// optional one.
    #[error("operand '{name}' in '{scope}' is unreachable after '{previous}'")]
    OperandOrder {
        scope: String,
        name: String,
        previous: String,
    },
    /// Boolean options are always optional single flags.
    #[error("flag '{name}' in '{scope}' must have optional arity")]
    InvalidFlagArity { scope: String, name: String },
}

/// Validates a command tree declaration.
///
/// Checks command and argument names, aliases, duplicates within a scope,
/// short-alias collisions with inherited options and operand placement.
/// Every problem is reported, not only the first.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::*;
///
/// let decl = CommandDecl::new("app").with_subcommand(
///     CommandDecl::new("copy")
///         .with_argument(ArgumentDecl::operand("files", ValueType::Path).with_arity(Arity::List))
///         .with_argument(ArgumentDecl::operand("dest", ValueType::Path)),
/// );
/// let errors = validate_declaration(&decl);
/// assert!(matches!(errors[0], DeclarationError::OperandOrder { .. }));
/// ```
pub fn validate_declaration(decl: &CommandDecl) -> Vec<DeclarationError> {
    let mut errors = Vec::new();
    let mut path = vec![decl.name.clone()];

    if !is_valid_name(&decl.name) {
        errors.push(DeclarationError::InvalidCommandName {
            scope: decl.name.clone(),
            name: decl.name.clone(),
        });
    }

    let inherited = HashMap::new();
    validate_command(decl, &mut path, &inherited, &mut errors);
    errors
}

fn validate_command(
    decl: &CommandDecl,
    path: &mut Vec<String>,
    inherited_shorts: &HashMap<char, String>,
    errors: &mut Vec<DeclarationError>,
) {
    let scope = path.join(" ");
    let shorts = validate_arguments(&decl.arguments, &scope, inherited_shorts, errors);

    let mut seen: HashSet<&str> = HashSet::new();
    for sub in &decl.subcommands {
        if !is_valid_name(&sub.name) {
            errors.push(DeclarationError::InvalidCommandName {
                scope: scope.clone(),
                name: sub.name.clone(),
            });
        }
        for name in std::iter::once(&sub.name).chain(&sub.aliases) {
            if !seen.insert(name.as_str()) {
                errors.push(DeclarationError::DuplicateSubcommand {
                    scope: scope.clone(),
                    name: name.clone(),
                });
            }
        }

        path.push(sub.name.clone());
        validate_command(sub, path, &shorts, errors);
        path.pop();
    }
}

/// Validates one node's arguments and returns the short aliases visible to
/// its children.
fn validate_arguments(
    arguments: &[ArgumentDecl],
    scope: &str,
    inherited_shorts: &HashMap<char, String>,
    errors: &mut Vec<DeclarationError>,
) -> HashMap<char, String> {
    let mut seen_long: HashSet<&str> = HashSet::new();
    let mut own_shorts: HashMap<char, &str> = HashMap::new();
    let mut child_shorts = inherited_shorts.clone();
    let mut previous_operand: Option<&ArgumentDecl> = None;

    for arg in arguments {
        let name = arg.name.as_str();
        if !is_valid_name(name) {
            errors.push(DeclarationError::InvalidArgumentName {
                scope: scope.to_string(),
                name: name.to_string(),
            });
        }

        for long in std::iter::once(&arg.name).chain(&arg.aliases) {
            if !seen_long.insert(long.as_str()) {
                errors.push(DeclarationError::DuplicateArgument {
                    scope: scope.to_string(),
                    name: long.clone(),
                });
            }
        }

        if arg.kind == ArgumentKind::Operand {
            if arg.inherited {
                errors.push(DeclarationError::InheritedOperand {
                    scope: scope.to_string(),
                    name: name.to_string(),
                });
            }
            if arg.short.is_some() || !arg.aliases.is_empty() {
                errors.push(DeclarationError::AliasOnOperand {
                    scope: scope.to_string(),
                    name: name.to_string(),
                });
            }
            if let Some(previous) = previous_operand {
                let unreachable = previous.arity == Arity::List
                    || (previous.arity == Arity::Optional && arg.arity == Arity::Single);
                if unreachable {
                    errors.push(DeclarationError::OperandOrder {
                        scope: scope.to_string(),
                        name: name.to_string(),
                        previous: previous.name.clone(),
                    });
                }
            }
            previous_operand = Some(arg);
            continue;
        }

        if name == HELP_NAME || arg.aliases.iter().any(|a| a == HELP_NAME) {
            errors.push(DeclarationError::ReservedName {
                scope: scope.to_string(),
                name: name.to_string(),
            });
        }

        for alias in &arg.aliases {
            if !is_valid_name(alias) {
                errors.push(DeclarationError::InvalidAlias {
                    scope: scope.to_string(),
                    name: name.to_string(),
                    alias: alias.clone(),
                });
            }
        }

        if arg.value_type.is_flag() && arg.arity != Arity::Optional {
            errors.push(DeclarationError::InvalidFlagArity {
                scope: scope.to_string(),
                name: name.to_string(),
            });
        }

        if let Some(short) = arg.short {
            if HELP_SHORTS.contains(&short) {
                errors.push(DeclarationError::ReservedName {
                    scope: scope.to_string(),
                    name: format!("-{short}"),
                });
            } else if !short.is_ascii_alphanumeric() {
                errors.push(DeclarationError::InvalidShort {
                    scope: scope.to_string(),
                    name: name.to_string(),
                    short,
                });
            }

            let clash = own_shorts
                .get(&short)
                .map(|other| other.to_string())
                .or_else(|| {
                    inherited_shorts
                        .get(&short)
                        .filter(|other| other.as_str() != name)
                        .cloned()
                });
            if let Some(other) = clash {
                errors.push(DeclarationError::DuplicateShort {
                    scope: scope.to_string(),
                    name: name.to_string(),
                    other,
                    short,
                });
            }
            own_shorts.insert(short, name);
            if arg.inherited {
                child_shorts.insert(short, name.to_string());
            }
        }
    }

    child_shorts
}

fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.starts_with('-') && !name.chars().any(char::is_whitespace)
}
