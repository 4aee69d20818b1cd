//! Name casing applied once at model-build time.
//!
//! Every declared command and argument name passes through a
//! [`NameTransform`] before it is matched against tokens or shown to users.
//! The built-in [`NameCase`] families delegate to [`heck`]; any other pure
//! function can be injected with [`NameTransform::custom`].

use std::fmt;
use std::sync::Arc;

use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

/// Built-in case families.
///
/// Every family is idempotent: applying it twice equals applying it once.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::NameCase;
///
/// assert_eq!(NameCase::Kebab.apply("listItems"), "list-items");
/// assert_eq!(NameCase::Snake.apply("listItems"), "list_items");
/// assert_eq!(NameCase::Pascal.apply("list-items"), "ListItems");
/// assert_eq!(NameCase::Camel.apply("list_items"), "listItems");
/// assert_eq!(NameCase::Lower.apply("ListItems"), "listitems");
/// assert_eq!(NameCase::Unchanged.apply("listItems"), "listItems");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    /// Names are used as declared (the default).
    #[default]
    Unchanged,
    /// `lowerCamelCase`.
    Camel,
    /// `UpperCamelCase`.
    Pascal,
    /// `kebab-case`.
    Kebab,
    /// `alllowercase`.
    Lower,
    /// `snake_case`.
    Snake,
}

impl NameCase {
    /// All case families, in declaration order.
    pub const ALL: [NameCase; 6] = [
        NameCase::Unchanged,
        NameCase::Camel,
        NameCase::Pascal,
        NameCase::Kebab,
        NameCase::Lower,
        NameCase::Snake,
    ];

    /// Converts `name` into this case.
    pub fn apply(self, name: &str) -> String {
        match self {
            NameCase::Unchanged => name.to_string(),
            NameCase::Camel => name.to_lower_camel_case(),
            NameCase::Pascal => name.to_upper_camel_case(),
            NameCase::Kebab => name.to_kebab_case(),
            NameCase::Lower => name.to_lowercase(),
            NameCase::Snake => name.to_snake_case(),
        }
    }
}

/// Pure `(declared name) -> display name` function used by the model builder.
///
/// Cheap to clone; custom functions are shared behind an [`Arc`].
///
/// # Examples
///
/// ```
/// use cmdpipe_core::{NameCase, NameTransform};
///
/// let kebab = NameTransform::from(NameCase::Kebab);
/// assert_eq!(kebab.apply("dryRun"), "dry-run");
///
/// let shout = NameTransform::custom(|name| name.to_uppercase());
/// assert_eq!(shout.apply("run"), "RUN");
/// ```
#[derive(Clone)]
pub enum NameTransform {
    /// One of the built-in families.
    Case(NameCase),
    /// An injected function.
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl NameTransform {
    /// Wraps an arbitrary pure function.
    pub fn custom(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        NameTransform::Custom(Arc::new(f))
    }

    /// Applies the transform.
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameTransform::Case(case) => case.apply(name),
            NameTransform::Custom(f) => f(name),
        }
    }
}

impl Default for NameTransform {
    fn default() -> Self {
        NameTransform::Case(NameCase::Unchanged)
    }
}

impl From<NameCase> for NameTransform {
    fn from(case: NameCase) -> Self {
        NameTransform::Case(case)
    }
}

impl fmt::Debug for NameTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTransform::Case(case) => f.debug_tuple("Case").field(case).finish(),
            NameTransform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_from_mixed_inputs() {
        assert_eq!(NameCase::Kebab.apply("DryRun"), "dry-run");
        assert_eq!(NameCase::Kebab.apply("dry_run"), "dry-run");
        assert_eq!(NameCase::Kebab.apply("dry-run"), "dry-run");
    }

    #[test]
    fn test_idempotent_on_known_names() {
        let names = ["listItems", "ListItems", "list-items", "list_items", "URLPath", "a"];
        for case in NameCase::ALL {
            for name in names {
                let once = case.apply(name);
                assert_eq!(case.apply(&once), once, "{case:?} on {name}");
            }
        }
    }

    #[test]
    fn test_default_is_unchanged() {
        assert_eq!(NameTransform::default().apply("MixedCase"), "MixedCase");
    }
}
