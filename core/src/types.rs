//! Declaration types for command trees.
//!
//! A command tree is declared with plain data: a root [`CommandDecl`] that
//! owns its [`ArgumentDecl`]s and nested subcommand declarations. These types
//! are designed for serialization with [`serde`] so a tree can be authored in
//! code, JSON or YAML and handed to [`CommandModel::build`](crate::CommandModel::build).

use serde::{Deserialize, Serialize};

/// Default delimiter used to split list values read from the environment,
/// named settings and declared defaults.
pub const DEFAULT_LIST_DELIMITER: char = ',';

/// Value type of an argument.
///
/// Describes what kind of value an argument accepts. The runtime maps each
/// value type to a type descriptor that parses raw text into a value.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::ValueType;
///
/// let vt = ValueType::default();
/// assert_eq!(vt, ValueType::String);
///
/// let format = ValueType::Enum(vec!["json".into(), "yaml".into()]);
/// assert!(matches!(format, ValueType::Enum(_)));
/// assert!(ValueType::Bool.is_flag());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Boolean flag; takes no separate value on the command line.
    Bool,
    /// Free text (the default).
    #[default]
    String,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float, parsed with the active culture's decimal separator.
    Float,
    /// A single character.
    Char,
    /// Filesystem path.
    Path,
    /// Timestamp (RFC 3339 or `YYYY-MM-DD`).
    DateTime,
    /// One of a fixed set of names, matched case-insensitively.
    Enum(Vec<String>),
    /// A named type supplied by a custom or structural-fallback descriptor.
    Custom(String),
}

impl ValueType {
    /// Returns `true` for boolean flags, which never consume a following token.
    pub fn is_flag(&self) -> bool {
        matches!(self, ValueType::Bool)
    }
}

/// How many values an argument accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    /// Exactly one value. A missing value is a validation error.
    Single,
    /// Zero or one value (the default).
    #[default]
    Optional,
    /// Zero or more values, order preserved.
    List,
}

/// Whether an argument is a named option or a positional operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentKind {
    /// Named, e.g. `--count 3` or `-c 3` (the default).
    #[default]
    Option,
    /// Positional, e.g. `copy <SOURCE> <DEST>`.
    Operand,
}

/// Structural check applied after a value has been converted.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::Validator;
///
/// let port = Validator::Range { min: Some(1.0), max: Some(65535.0) };
/// assert_eq!(port.to_string(), "range 1..=65535");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// Numeric bounds, inclusive.
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Minimum text length in characters.
    MinLength(usize),
    /// Maximum text length in characters.
    MaxLength(usize),
    /// Regular expression the whole text must match.
    Pattern(String),
    /// Text must contain something other than whitespace.
    NonEmpty,
}

impl std::fmt::Display for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validator::Range { min, max } => {
                let lo = min.map(|v| v.to_string()).unwrap_or_default();
                let hi = max.map(|v| v.to_string()).unwrap_or_default();
                write!(f, "range {lo}..={hi}")
            }
            Validator::MinLength(n) => write!(f, "min length {n}"),
            Validator::MaxLength(n) => write!(f, "max length {n}"),
            Validator::Pattern(p) => write!(f, "pattern {p}"),
            Validator::NonEmpty => write!(f, "non-empty"),
        }
    }
}

/// Declaration of one option or operand.
///
/// Use [`option`](ArgumentDecl::option) or [`operand`](ArgumentDecl::operand)
/// and chain builder methods to describe the default-source chain.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::{ArgumentDecl, Arity, ValueType};
///
/// let token = ArgumentDecl::option("apiToken", ValueType::String)
///     .with_short('t')
///     .from_env("API_TOKEN")
///     .from_setting("api.token")
///     .with_prompt("API token")
///     .secret()
///     .inherited();
/// assert!(token.inherited);
/// assert_eq!(token.env.as_deref(), Some("API_TOKEN"));
///
/// let files = ArgumentDecl::operand("files", ValueType::Path).with_arity(Arity::List);
/// assert_eq!(files.arity, Arity::List);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDecl {
    /// Declared name; the name transform is applied to it.
    pub name: String,
    /// Explicit name override, used verbatim unless overrides are cased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Option or operand.
    #[serde(default)]
    pub kind: ArgumentKind,
    /// Short alias (`-c`), options only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    /// Additional long names, matched verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Declared value type.
    #[serde(default)]
    pub value_type: ValueType,
    /// Number of values accepted.
    #[serde(default)]
    pub arity: Arity,
    /// Visible to every descendant command without redeclaration.
    #[serde(default)]
    pub inherited: bool,
    /// Declared default, used when no other source yields a value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Environment variable consulted when the command line has no value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Named external setting consulted after the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,
    /// Prompt text shown in interactive sessions when nothing else applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Input is masked when prompting.
    #[serde(default)]
    pub secret: bool,
    /// Delimiter splitting one raw token into several list values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<char>,
    /// Post-conversion checks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    /// Description shown in usage text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArgumentDecl {
    fn new(name: &str, kind: ArgumentKind, value_type: ValueType, arity: Arity) -> Self {
        Self {
            name: name.to_string(),
            rename: None,
            kind,
            short: None,
            aliases: Vec::new(),
            value_type,
            arity,
            inherited: false,
            default: None,
            env: None,
            setting: None,
            prompt: None,
            secret: false,
            split: None,
            validators: Vec::new(),
            description: None,
        }
    }

    /// Creates an optional named option.
    ///
    /// # Examples
    ///
    /// ```
    /// use cmdpipe_core::{ArgumentDecl, ArgumentKind, Arity, ValueType};
    ///
    /// let verbose = ArgumentDecl::option("verbose", ValueType::Bool);
    /// assert_eq!(verbose.kind, ArgumentKind::Option);
    /// assert_eq!(verbose.arity, Arity::Optional);
    /// ```
    pub fn option(name: &str, value_type: ValueType) -> Self {
        Self::new(name, ArgumentKind::Option, value_type, Arity::Optional)
    }

    /// Creates a required positional operand.
    ///
    /// # Examples
    ///
    /// ```
    /// use cmdpipe_core::{ArgumentDecl, ArgumentKind, Arity, ValueType};
    ///
    /// let target = ArgumentDecl::operand("target", ValueType::String);
    /// assert_eq!(target.kind, ArgumentKind::Operand);
    /// assert_eq!(target.arity, Arity::Single);
    /// ```
    pub fn operand(name: &str, value_type: ValueType) -> Self {
        Self::new(name, ArgumentKind::Operand, value_type, Arity::Single)
    }

    /// Sets an explicit name override.
    pub fn renamed(mut self, name: &str) -> Self {
        self.rename = Some(name.to_string());
        self
    }

    /// Adds a short alias.
    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Adds an extra long name.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Sets the arity.
    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    /// Marks the argument as required (arity `single`).
    pub fn required(self) -> Self {
        self.with_arity(Arity::Single)
    }

    /// Makes the argument visible to all descendant commands.
    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    /// Sets the declared default.
    pub fn with_default(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    /// Maps the argument to an environment variable.
    pub fn from_env(mut self, var: &str) -> Self {
        self.env = Some(var.to_string());
        self
    }

    /// Maps the argument to a named external setting.
    pub fn from_setting(mut self, name: &str) -> Self {
        self.setting = Some(name.to_string());
        self
    }

    /// Enables interactive prompting with the given prompt text.
    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = Some(prompt.to_string());
        self
    }

    /// Masks input when prompting.
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Splits raw values on `delimiter` into list items.
    pub fn split_on(mut self, delimiter: char) -> Self {
        self.split = Some(delimiter);
        self
    }

    /// Adds a validator.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }
}

/// Declaration of a command or subcommand group.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::{ArgumentDecl, CommandDecl, ValueType};
///
/// let app = CommandDecl::new("app")
///     .with_argument(ArgumentDecl::option("verbose", ValueType::Bool).inherited())
///     .with_subcommand(
///         CommandDecl::new("remote")
///             .with_default_action()
///             .with_subcommand(CommandDecl::new("add")),
///     );
///
/// assert_eq!(app.subcommands.len(), 1);
/// assert!(app.subcommands[0].default_action);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandDecl {
    /// Declared name; the name transform is applied to it.
    pub name: String,
    /// Explicit name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Alternative names, matched verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// The command can run even though it has subcommands.
    #[serde(default)]
    pub default_action: bool,
    /// Options and operands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgumentDecl>,
    /// Nested subcommands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<CommandDecl>,
}

impl CommandDecl {
    /// Creates a command declaration with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Sets an explicit name override.
    pub fn renamed(mut self, name: &str) -> Self {
        self.rename = Some(name.to_string());
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Adds an alias.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Lets the command run without a subcommand token.
    pub fn with_default_action(mut self) -> Self {
        self.default_action = true;
        self
    }

    /// Adds an argument.
    pub fn with_argument(mut self, arg: ArgumentDecl) -> Self {
        self.arguments.push(arg);
        self
    }

    /// Adds a nested subcommand.
    pub fn with_subcommand(mut self, sub: CommandDecl) -> Self {
        self.subcommands.push(sub);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_defaults() {
        let opt = ArgumentDecl::option("count", ValueType::Integer);

        assert_eq!(opt.kind, ArgumentKind::Option);
        assert_eq!(opt.arity, Arity::Optional);
        assert!(!opt.inherited);
        assert!(opt.short.is_none());
    }

    #[test]
    fn test_required_sets_single_arity() {
        let opt = ArgumentDecl::option("name", ValueType::String).required();
        assert_eq!(opt.arity, Arity::Single);
    }

    #[test]
    fn test_command_decl_from_json() {
        let json = r#"{
            "name": "app",
            "arguments": [
                { "name": "verbose", "value_type": "bool", "inherited": true, "short": "v" },
                { "name": "format", "value_type": { "enum": ["json", "yaml"] } }
            ],
            "subcommands": [
                { "name": "run", "arguments": [ { "name": "script", "kind": "operand", "arity": "single" } ] }
            ]
        }"#;
        let decl: CommandDecl = serde_json::from_str(json).unwrap();

        assert_eq!(decl.arguments[0].short, Some('v'));
        assert_eq!(
            decl.arguments[1].value_type,
            ValueType::Enum(vec!["json".into(), "yaml".into()])
        );
        assert_eq!(decl.subcommands[0].arguments[0].kind, ArgumentKind::Operand);
        assert_eq!(decl.subcommands[0].arguments[0].value_type, ValueType::String);
    }

    #[test]
    fn test_command_decl_from_yaml() {
        let yaml = "
name: app
subcommands:
  - name: db
    default_action: true
    arguments:
      - name: url
        env: DATABASE_URL
        inherited: true
";
        let decl: CommandDecl = serde_yaml::from_str(yaml).unwrap();
        let db = &decl.subcommands[0];

        assert!(db.default_action);
        assert_eq!(db.arguments[0].env.as_deref(), Some("DATABASE_URL"));
    }
}
