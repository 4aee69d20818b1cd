//! Error types for pipeline runs.
//!
//! Provides one error type covering every way an invocation can end early:
//! malformed directives, unknown commands, aggregated parsing and validation
//! reports, configuration mistakes, cancellation, and failures raised by
//! command bodies. Each category maps to a stable process exit code.

use std::fmt;

use cmdpipe_core::{CommandNotFound, ModelError, Suggestion};
use serde::Serialize;
use thiserror::Error;

/// Process exit code returned by the runner.
pub type ExitCode = i32;

/// Stable exit codes per outcome category.
pub mod exit_code {
    use super::ExitCode;

    /// The command ran and reported success.
    pub const SUCCESS: ExitCode = 0;
    /// The command body returned an error.
    pub const COMMAND_FAILED: ExitCode = 1;
    /// Input could not be parsed (including malformed directives).
    pub const PARSE_ERROR: ExitCode = 2;
    /// Converted values failed validation.
    pub const VALIDATION_ERROR: ExitCode = 3;
    /// No command matched the input.
    pub const COMMAND_NOT_FOUND: ExitCode = 4;
    /// Misconfigured runner, middleware or model; never user-recoverable.
    pub const INTERNAL_ERROR: ExitCode = 70;
    /// Cooperative cancellation.
    pub const CANCELLED: ExitCode = 130;
}

/// Raw text that could not be converted to the declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("'{raw}' is not a valid {expected} for '{argument}': {reason}")]
pub struct ValueParsingError {
    /// Display name of the argument.
    pub argument: String,
    /// The offending text.
    pub raw: String,
    /// Display name of the expected type.
    pub expected: String,
    /// Why the descriptor rejected it.
    pub reason: String,
}

/// One problem found while matching tokens and converting values.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseIssue {
    /// A value failed type conversion.
    #[error(transparent)]
    Conversion(ValueParsingError),
    /// An option-like token matched no visible option.
    #[error("unrecognized option '{token}'{}", did_you_mean(.suggestions))]
    UnrecognizedOption {
        /// The token as written, without any `=value`.
        token: String,
        /// Visible options within the suggestion threshold.
        suggestions: Vec<Suggestion>,
    },
    /// A value-taking option was last on the line.
    #[error("option '{option}' requires a value")]
    MissingValue {
        /// The option as written.
        option: String,
    },
    /// An operand token with no operand left to receive it.
    #[error("unexpected operand '{token}'")]
    UnexpectedOperand {
        /// The extra word.
        token: String,
    },
    /// A single-valued argument was given several times.
    #[error("'{argument}' accepts a single value but received {count}")]
    TooManyValues {
        /// Usage name of the argument.
        argument: String,
        /// Values received.
        count: usize,
    },
}

fn did_you_mean(suggestions: &[Suggestion]) -> String {
    match suggestions.first() {
        Some(best) => format!(" (did you mean '--{}'?)", best.name),
        None => String::new(),
    }
}

/// Every parsing problem of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    /// Issues in input order.
    pub issues: Vec<ParseIssue>,
}

impl ParseReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Just the conversion failures.
    pub fn conversions(&self) -> impl Iterator<Item = &ValueParsingError> {
        self.issues.iter().filter_map(|issue| match issue {
            ParseIssue::Conversion(err) => Some(err),
            _ => None,
        })
    }
}

impl fmt::Display for ParseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_lines(f, &self.issues)
    }
}

/// A converted value rejected by a structural check.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("'{argument}' {message}")]
pub struct ValidationFailure {
    /// Usage name of the argument (`--name` or `<name>`).
    pub argument: String,
    /// What the check requires.
    pub message: String,
}

/// Every validation failure of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Failures in argument order.
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_lines(f, &self.failures)
    }
}

fn parse_and_validation(report: &ParseReport, validation: &ValidationReport) -> String {
    if validation.is_empty() {
        report.to_string()
    } else {
        format!("{report}\n{validation}")
    }
}

fn write_lines<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or unknown directive syntax.
    #[error("malformed directive '{token}': {reason}")]
    MalformedDirective {
        /// The directive word.
        token: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No command matches; carries suggestions.
    #[error(transparent)]
    CommandNotFound(#[from] CommandNotFound),

    /// Aggregated parsing and conversion problems, together with the
    /// validation failures found in the same pass.
    #[error("{}", parse_and_validation(.report, .validation))]
    Parsing {
        /// Matching and conversion issues.
        report: ParseReport,
        /// Validation failures of the arguments that did convert.
        validation: ValidationReport,
    },

    /// Aggregated validation failures.
    #[error("{0}")]
    Validation(ValidationReport),

    /// Middleware, registry or model misconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The cancellation signal was observed.
    #[error("invocation cancelled")]
    Cancelled,

    /// A command body or interceptor failed.
    #[error("command failed: {0}")]
    CommandFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// I/O failure while talking to the console or a collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A settings file could not be read or written as YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PipelineError {
    /// Wraps any error raised by a command body.
    pub fn command_failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        PipelineError::CommandFailed(err.into())
    }

    /// Stable exit code for this category.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            PipelineError::MalformedDirective { .. } | PipelineError::Parsing { .. } => {
                exit_code::PARSE_ERROR
            }
            PipelineError::Validation(_) => exit_code::VALIDATION_ERROR,
            PipelineError::CommandNotFound(_) => exit_code::COMMAND_NOT_FOUND,
            PipelineError::Configuration(_) | PipelineError::Io(_) | PipelineError::Yaml(_) => {
                exit_code::INTERNAL_ERROR
            }
            PipelineError::Cancelled => exit_code::CANCELLED,
            PipelineError::CommandFailed(_) => exit_code::COMMAND_FAILED,
        }
    }

    /// `true` for errors caused by user input, which are shown with usage text.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Parsing { .. }
                | PipelineError::Validation(_)
                | PipelineError::CommandNotFound(_)
        )
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

/// Convenience alias for results with [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        let codes = [
            PipelineError::Parsing {
                report: ParseReport::default(),
                validation: ValidationReport::default(),
            }
            .exit_code(),
            PipelineError::Validation(ValidationReport::default()).exit_code(),
            PipelineError::Configuration("x".into()).exit_code(),
            PipelineError::Cancelled.exit_code(),
            PipelineError::command_failed("boom").exit_code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_parsing_error_lists_validation_failures_after_issues() {
        let err = PipelineError::Parsing {
            report: ParseReport {
                issues: vec![ParseIssue::UnexpectedOperand {
                    token: "extra".into(),
                }],
            },
            validation: ValidationReport {
                failures: vec![ValidationFailure {
                    argument: "<target>".into(),
                    message: "is required".into(),
                }],
            },
        };

        assert_eq!(err.exit_code(), exit_code::PARSE_ERROR);
        assert_eq!(
            err.to_string(),
            "unexpected operand 'extra'\n'<target>' is required"
        );
    }

    #[test]
    fn test_report_lists_every_issue() {
        let report = ParseReport {
            issues: vec![
                ParseIssue::MissingValue {
                    option: "--count".into(),
                },
                ParseIssue::UnrecognizedOption {
                    token: "--verbos".into(),
                    suggestions: vec![Suggestion {
                        name: "verbose".into(),
                        distance: 1,
                    }],
                },
            ],
        };

        assert_eq!(
            report.to_string(),
            "option '--count' requires a value\nunrecognized option '--verbos' (did you mean '--verbose'?)"
        );
    }
}
