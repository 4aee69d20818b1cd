//! Active culture: an explicit context value plus a guarded ambient copy.
//!
//! The pipeline threads the invocation's [`Culture`] through the command
//! context. Code that reads process-wide formatting state instead uses
//! [`current`], which the `[culture:..]` directive overrides for the length
//! of one invocation through a [`CultureGuard`].

use std::fmt;
use std::sync::{LazyLock, RwLock};

use regex::Regex;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("static regex must compile")
});

static AMBIENT: RwLock<Option<Culture>> = RwLock::new(None);

/// Languages formatting decimals with a comma.
const COMMA_DECIMAL_LANGUAGES: &[&str] = &[
    "cs", "da", "de", "es", "fi", "fr", "it", "nb", "nl", "pl", "pt", "ru", "sv", "tr", "uk",
];

/// A BCP 47 style culture tag such as `en-US` or `fr-FR`.
///
/// # Examples
///
/// ```
/// use cmdpipe_runtime::Culture;
///
/// let fr = Culture::parse("fr-FR").unwrap();
/// assert_eq!(fr.language(), "fr");
/// assert_eq!(fr.decimal_separator(), ',');
/// assert_eq!(Culture::default().decimal_separator(), '.');
/// assert!(Culture::parse("not a tag").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Culture(String);

impl Culture {
    /// Parses a culture tag, returning `None` when it is malformed.
    pub fn parse(tag: &str) -> Option<Self> {
        TAG_PATTERN.is_match(tag).then(|| Culture(tag.to_string()))
    }

    /// The full tag.
    pub fn tag(&self) -> &str {
        &self.0
    }

    /// Lower-cased language subtag.
    pub fn language(&self) -> String {
        self.0
            .split('-')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Decimal separator used when parsing floats.
    pub fn decimal_separator(&self) -> char {
        if COMMA_DECIMAL_LANGUAGES.contains(&self.language().as_str()) {
            ','
        } else {
            '.'
        }
    }
}

impl Default for Culture {
    fn default() -> Self {
        Culture("en-US".to_string())
    }
}

impl fmt::Display for Culture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ambient process culture.
pub fn current() -> Culture {
    AMBIENT
        .read()
        .map(|ambient| ambient.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
        .unwrap_or_default()
}

/// Replaces the ambient culture until the returned guard is dropped.
///
/// # Examples
///
/// ```
/// use cmdpipe_runtime::{Culture, culture};
///
/// let before = culture::current();
/// {
///     let _guard = culture::override_ambient(Culture::parse("de-DE").unwrap());
///     assert_eq!(culture::current().tag(), "de-DE");
/// }
/// assert_eq!(culture::current(), before);
/// ```
pub fn override_ambient(culture: Culture) -> CultureGuard {
    let previous = swap(Some(culture));
    CultureGuard { previous }
}

fn swap(next: Option<Culture>) -> Option<Culture> {
    let mut ambient = AMBIENT
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    std::mem::replace(&mut *ambient, next)
}

/// Restores the previous ambient culture on drop, including during unwinding.
#[must_use = "the ambient culture is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct CultureGuard {
    previous: Option<Culture>,
}

impl Drop for CultureGuard {
    fn drop(&mut self) {
        swap(self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_common_tags() {
        assert!(Culture::parse("en").is_some());
        assert!(Culture::parse("pt-BR").is_some());
        assert!(Culture::parse("zh-Hant-TW").is_some());
        assert!(Culture::parse("").is_none());
        assert!(Culture::parse("e").is_none());
    }

    #[test]
    fn test_language_is_lowercased() {
        assert_eq!(Culture::parse("DE-de").unwrap().language(), "de");
    }
}
