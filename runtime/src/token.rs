//! Token classification.
//!
//! The host shell has already split the command line into words; this module
//! only classifies them. Leading `[...]` words are directives (when directive
//! scanning is enabled), `--` separates options from trailing operands, and
//! every other word is either option-like or an operand.

use cmdpipe_core::is_option_like;
use serde::Serialize;

/// End-of-options marker.
pub const SEPARATOR: &str = "--";

/// What a word was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// `[name]` or `[name:value]` before the command path.
    Directive,
    /// `-x`, `-abc`, `--name`, `--name=value`.
    Option,
    /// Anything else, including every word after `--`.
    Operand,
    /// The `--` marker itself.
    Separator,
}

/// One classified word.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    /// The word as given.
    pub raw: String,
    /// Its classification.
    pub kind: TokenKind,
}

impl Token {
    /// A token with an explicit classification.
    pub fn new(raw: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            raw: raw.into(),
            kind,
        }
    }
}

/// Directive tokens followed by argument tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenStream {
    directives: Vec<Token>,
    arguments: Vec<Token>,
}

impl TokenStream {
    /// Leading directive tokens.
    pub fn directives(&self) -> &[Token] {
        &self.directives
    }

    /// Every token after the directives.
    pub fn arguments(&self) -> &[Token] {
        &self.arguments
    }

    /// Raw argument words, for path resolution.
    pub fn argument_words(&self) -> Vec<&str> {
        self.arguments.iter().map(|t| t.raw.as_str()).collect()
    }
}

/// Classifies `args`.
///
/// With `scan_directives` off, bracketed words are ordinary operands.
///
/// # Examples
///
/// ```
/// use cmdpipe_runtime::{TokenKind, tokenize};
///
/// let stream = tokenize(["[culture:fr-FR]", "run", "--fast", "-5", "--", "--literal"], true);
/// assert_eq!(stream.directives()[0].raw, "[culture:fr-FR]");
///
/// let kinds: Vec<_> = stream.arguments().iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![
///         TokenKind::Operand,
///         TokenKind::Option,
///         TokenKind::Operand,
///         TokenKind::Separator,
///         TokenKind::Operand,
///     ]
/// );
/// ```
pub fn tokenize<I, S>(args: I, scan_directives: bool) -> TokenStream
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut stream = TokenStream::default();
    let mut in_directives = scan_directives;
    let mut after_separator = false;

    for arg in args {
        let raw = arg.as_ref();
        if in_directives && raw.starts_with('[') {
            stream.directives.push(Token::new(raw, TokenKind::Directive));
            continue;
        }
        in_directives = false;

        let kind = if after_separator {
            TokenKind::Operand
        } else if raw == SEPARATOR {
            after_separator = true;
            TokenKind::Separator
        } else if is_option_like(raw) {
            TokenKind::Option
        } else {
            TokenKind::Operand
        };
        stream.arguments.push(Token::new(raw, kind));
    }

    stream
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_only_lead() {
        let stream = tokenize(["[parse]", "run", "[not-a-directive]"], true);

        assert_eq!(stream.directives().len(), 1);
        assert_eq!(stream.arguments()[1].raw, "[not-a-directive]");
        assert_eq!(stream.arguments()[1].kind, TokenKind::Operand);
    }

    #[test]
    fn test_scanning_disabled_keeps_brackets_as_operands() {
        let stream = tokenize(["[parse]", "run"], false);

        assert!(stream.directives().is_empty());
        assert_eq!(stream.argument_words(), vec!["[parse]", "run"]);
        assert_eq!(stream.arguments()[0].kind, TokenKind::Operand);
    }

    #[test]
    fn test_second_separator_is_an_operand() {
        let stream = tokenize(["--", "--"], true);
        assert_eq!(stream.arguments()[0].kind, TokenKind::Separator);
        assert_eq!(stream.arguments()[1].kind, TokenKind::Operand);
    }
}
