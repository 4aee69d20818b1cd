//! Core command-tree types and pure resolution logic.
//!
//! This crate defines the foundational pieces of the cmdpipe runtime:
//!
//! - [`CommandDecl`] / [`ArgumentDecl`]: plain, serializable declarations of
//!   a command tree (commands, options, operands, default-source chain).
//! - [`CommandModel`]: the immutable tree built once from a declaration,
//!   with path resolution and inherited-option visibility.
//! - [`NameCase`] / [`NameTransform`]: the name transform applied at build
//!   time.
//! - [`suggest`] / [`edit_distance`]: typo suggestions for unmatched tokens.
//!
//! Validation ([`validate_declaration`]) catches structural errors such as
//! duplicate names, reserved help aliases and misplaced operands.
//!
//! # Example
//!
//! ```
//! use cmdpipe_core::*;
//!
//! let decl = CommandDecl::new("mycli")
//!     .with_argument(
//!         ArgumentDecl::option("verbose", ValueType::Bool)
//!             .with_short('v')
//!             .inherited(),
//!     )
//!     .with_subcommand(
//!         CommandDecl::new("run")
//!             .with_argument(ArgumentDecl::option("port", ValueType::Integer))
//!             .with_argument(ArgumentDecl::operand("script", ValueType::Path)),
//!     );
//!
//! assert!(validate_declaration(&decl).is_empty());
//!
//! let model = CommandModel::build(&decl, &ModelOptions::default()).unwrap();
//! let run = model.find("run").unwrap();
//! assert_eq!(model.visible_arguments(run.id).len(), 3);
//! ```

mod model;
mod naming;
mod suggest;
mod types;
mod validate;

pub use model::{
    ArgumentDefinition, ArgumentId, CommandModel, CommandNode, CommandNotFound, LevelOption,
    ModelError, ModelOptions, NodeId, Resolution, is_option_like,
};
pub use naming::{NameCase, NameTransform};
pub use suggest::{DEFAULT_SUGGESTION_THRESHOLD, Suggestion, edit_distance, suggest};
pub use types::*;
pub use validate::{DeclarationError, HELP_NAME, HELP_SHORTS, validate_declaration};
