//! Localized strings for diagnostics and help headings.

/// String lookup boundary. `{0}`, `{1}`, ... in the template are replaced by
/// `args` in order.
pub trait Localizer: Send + Sync {
    fn get_string(&self, key: &str, args: &[&str]) -> String;
}

/// Keys used by the runtime.
pub mod keys {
    pub const USAGE: &str = "usage";
    pub const COMMANDS: &str = "commands";
    pub const OPTIONS: &str = "options";
    pub const ARGUMENTS: &str = "arguments";
    pub const ERROR: &str = "error";
    pub const DID_YOU_MEAN: &str = "did_you_mean";
    pub const AVAILABLE: &str = "available_commands";
    pub const INTERNAL: &str = "internal_error";
    pub const CANCELLED: &str = "cancelled";
    pub const PARSE_REPORT: &str = "parse_report";
}

/// English strings.
///
/// # Examples
///
/// ```
/// use cmdpipe_runtime::{DefaultLocalizer, Localizer};
///
/// let text = DefaultLocalizer.get_string("did_you_mean", &["status"]);
/// assert_eq!(text, "Did you mean 'status'?");
/// assert_eq!(DefaultLocalizer.get_string("no_such_key", &[]), "no_such_key");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLocalizer;

impl Localizer for DefaultLocalizer {
    fn get_string(&self, key: &str, args: &[&str]) -> String {
        let template = match key {
            keys::USAGE => "Usage: {0}",
            keys::COMMANDS => "Commands:",
            keys::OPTIONS => "Options:",
            keys::ARGUMENTS => "Arguments:",
            keys::ERROR => "error: {0}",
            keys::DID_YOU_MEAN => "Did you mean '{0}'?",
            keys::AVAILABLE => "Available commands: {0}",
            keys::INTERNAL => "internal error: {0}",
            keys::CANCELLED => "cancelled",
            keys::PARSE_REPORT => "command: {0}",
            other => other,
        };
        format_template(template, args)
    }
}

/// Substitutes positional `{n}` placeholders.
pub fn format_template(template: &str, args: &[&str]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |text, (i, arg)| {
            text.replace(&format!("{{{i}}}"), arg)
        })
}
