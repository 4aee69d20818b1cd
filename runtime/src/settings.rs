//! Runner settings.
//!
//! # Example YAML
//!
//! ```yaml
//! enable_directives: true
//! name_case: kebab
//! case_overrides: false
//! suggestion_threshold: 2
//! prompting: false
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use cmdpipe_core::{DEFAULT_SUGGESTION_THRESHOLD, NameCase};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Behaviour switches for an [`InvocationRunner`](crate::InvocationRunner).
///
/// Every field has a default, so a settings file only names what it changes.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::NameCase;
/// use cmdpipe_runtime::RunnerSettings;
///
/// let settings: RunnerSettings = serde_yaml::from_str("name_case: kebab").unwrap();
/// assert_eq!(settings.name_case, NameCase::Kebab);
/// assert!(settings.enable_directives);
/// assert_eq!(settings.suggestion_threshold, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Recognise leading `[name]` tokens as directives.
    pub enable_directives: bool,
    /// Case applied to declared command and argument names.
    pub name_case: NameCase,
    /// Apply `name_case` to explicit name overrides as well.
    pub case_overrides: bool,
    /// Maximum edit distance for "did you mean" suggestions.
    pub suggestion_threshold: usize,
    /// Allow interactive prompts for missing values.
    pub prompting: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            enable_directives: true,
            name_case: NameCase::Unchanged,
            case_overrides: false,
            suggestion_threshold: DEFAULT_SUGGESTION_THRESHOLD,
            prompting: true,
        }
    }
}

impl RunnerSettings {
    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::PipelineError::Io) if the file cannot be read,
    /// or [`Yaml`](crate::PipelineError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let settings = serde_yaml::from_reader(reader)?;
        Ok(settings)
    }

    /// Saves the settings as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::PipelineError::Io) if the file cannot be
    /// written, or [`Yaml`](crate::PipelineError::Yaml) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.yml");
        let settings = RunnerSettings {
            name_case: NameCase::Snake,
            prompting: false,
            ..RunnerSettings::default()
        };

        settings.save(&path).unwrap();
        assert_eq!(RunnerSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_rejects_unknown_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.yml");
        std::fs::write(&path, "name_case: shouting\n").unwrap();

        let err = RunnerSettings::load(&path).unwrap_err();
        assert!(matches!(err, crate::PipelineError::Yaml(_)));
    }
}
