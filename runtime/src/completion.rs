//! Registration with an external shell-completion tool.
//!
//! The tool is invoked as
//! `<tool> register --command-path <path> --suggestion-command <name>`
//! and must exit successfully within the timeout. At completion time the
//! tool calls back into the application with the `[suggest]` directive.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Default time allowed for the registration tool.
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawns the completion tool's `register` subcommand.
#[derive(Debug, Clone)]
pub struct CompletionRegistrar {
    tool: PathBuf,
    timeout: Duration,
}

impl CompletionRegistrar {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            timeout: REGISTRATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments passed to the tool.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use cmdpipe_runtime::CompletionRegistrar;
    ///
    /// let args = CompletionRegistrar::registration_args(Path::new("/usr/bin/app"), "app");
    /// assert_eq!(
    ///     args,
    ///     vec!["register", "--command-path", "/usr/bin/app", "--suggestion-command", "app"]
    /// );
    /// ```
    pub fn registration_args(command_path: &Path, suggestion_command: &str) -> Vec<String> {
        vec![
            "register".to_string(),
            "--command-path".to_string(),
            command_path.display().to_string(),
            "--suggestion-command".to_string(),
            suggestion_command.to_string(),
        ]
    }

    /// Runs the registration. Returns `false` if the tool could not be
    /// started, exited unsuccessfully, or outlived the timeout.
    pub fn register(&self, command_path: &Path, suggestion_command: &str) -> bool {
        let args = Self::registration_args(command_path, suggestion_command);
        let mut child = match Command::new(&self.tool)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(tool = %self.tool.display(), error = %e, "Failed to start completion tool");
                return false;
            }
        };

        match child.wait_timeout(self.timeout) {
            Ok(Some(status)) if status.success() => {
                debug!(tool = %self.tool.display(), "Registered completions");
                true
            }
            Ok(Some(status)) => {
                warn!(tool = %self.tool.display(), code = ?status.code(), "Completion tool failed");
                false
            }
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(
                    tool = %self.tool.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Completion tool timed out"
                );
                false
            }
            Err(e) => {
                warn!(tool = %self.tool.display(), error = %e, "Failed waiting for completion tool");
                false
            }
        }
    }
}
