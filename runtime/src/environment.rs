//! Environment variables and named external settings.

use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Read-only source of environment variables and named settings.
pub trait Environment: Send + Sync {
    /// Value of an environment variable.
    fn env_var(&self, name: &str) -> Option<String>;

    /// Value of a named external setting.
    fn setting(&self, name: &str) -> Option<String>;
}

/// Reads the process environment; settings come from an in-memory map.
#[derive(Debug, Default, Clone)]
pub struct ProcessEnvironment {
    settings: HashMap<String, String>,
}

impl ProcessEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `settings` for named-setting lookups.
    pub fn with_settings(settings: HashMap<String, String>) -> Self {
        Self { settings }
    }

    /// Loads named settings from a flat YAML map of strings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read, or
    /// [`PipelineError::Configuration`] if it is not a flat string map.
    pub fn load_settings(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let settings: HashMap<String, String> =
            serde_yaml::from_reader(BufReader::new(file)).map_err(|err| {
                PipelineError::Configuration(format!("invalid settings file: {err}"))
            })?;
        Ok(Self { settings })
    }
}

impl Environment for ProcessEnvironment {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn setting(&self, name: &str) -> Option<String> {
        self.settings.get(name).cloned()
    }
}

/// Fully in-memory environment for tests and embedding.
///
/// # Examples
///
/// ```
/// use cmdpipe_runtime::{Environment, MapEnvironment};
///
/// let env = MapEnvironment::new()
///     .with_var("APP_PORT", "8080")
///     .with_setting("app.port", "9090");
/// assert_eq!(env.env_var("APP_PORT").as_deref(), Some("8080"));
/// assert_eq!(env.setting("app.port").as_deref(), Some("9090"));
/// assert!(env.env_var("HOME").is_none());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
    settings: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_setting(mut self, name: &str, value: &str) -> Self {
        self.settings.insert(name.to_string(), value.to_string());
        self
    }
}

impl Environment for MapEnvironment {
    fn env_var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn setting(&self, name: &str) -> Option<String> {
        self.settings.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_settings_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db.url: postgres://localhost\nretries: \"3\"").unwrap();

        let env = ProcessEnvironment::load_settings(file.path()).unwrap();
        assert_eq!(env.setting("db.url").as_deref(), Some("postgres://localhost"));
        assert_eq!(env.setting("retries").as_deref(), Some("3"));
        assert!(env.setting("missing").is_none());
    }

    #[test]
    fn test_load_settings_rejects_nested_maps() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db:\n  url: x").unwrap();

        let err = ProcessEnvironment::load_settings(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
