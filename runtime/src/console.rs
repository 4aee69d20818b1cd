//! Output sinks and interactive input.

use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Terminal boundary used by the pipeline.
///
/// `write` and `write_error` receive complete chunks of text; implementations
/// must not add separators.
pub trait Console: Send + Sync {
    /// Writes to the output sink.
    fn write(&self, text: &str);

    /// Writes to the error sink.
    fn write_error(&self, text: &str);

    /// Whether prompting is possible.
    fn is_interactive(&self) -> bool;

    /// Prompts and reads one line; `None` at end of input.
    fn read_line(&self, prompt: &str) -> io::Result<Option<String>>;

    /// Prompts and reads one line without echoing it.
    fn read_secret(&self, prompt: &str) -> io::Result<Option<String>>;
}

/// Prompts through `console` on a helper thread and waits for either the
/// answer or `cancellation`.
///
/// A blocking read cannot be interrupted, so on cancellation the helper
/// thread is left behind and its eventual answer is dropped.
pub(crate) fn read_cancellable(
    console: &Arc<dyn Console>,
    prompt: &str,
    secret: bool,
    cancellation: &CancellationToken,
) -> Result<Option<String>> {
    let (sender, receiver) = oneshot::channel();
    let reader = Arc::clone(console);
    let prompt = prompt.to_string();
    thread::Builder::new()
        .name("cmdpipe-prompt".to_string())
        .spawn(move || {
            let answer = if secret {
                reader.read_secret(&prompt)
            } else {
                reader.read_line(&prompt)
            };
            let _ = sender.send(answer);
        })?;

    // TODO: restore terminal echo when a masked prompt is abandoned here.
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    runtime.block_on(async {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                debug!("Prompt cancelled");
                Err(PipelineError::Cancelled)
            }
            answer = receiver => match answer {
                Ok(answer) => Ok(answer?),
                Err(_) => Err(PipelineError::Io(io::Error::other(
                    "prompt reader exited without an answer",
                ))),
            },
        }
    })
}

/// Console backed by the process's standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConsole;

impl Console for SystemConsole {
    fn write(&self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn write_error(&self, text: &str) {
        let mut err = io::stderr().lock();
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    }

    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal() && io::stderr().is_terminal()
    }

    fn read_line(&self, prompt: &str) -> io::Result<Option<String>> {
        self.write_error(&format!("{prompt}: "));
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn read_secret(&self, prompt: &str) -> io::Result<Option<String>> {
        rpassword::prompt_password(format!("{prompt}: ")).map(Some)
    }
}

/// In-memory console that captures output and replays scripted answers.
///
/// # Examples
///
/// ```
/// use cmdpipe_runtime::{BufferConsole, Console};
///
/// let console = BufferConsole::interactive(["alice"]);
/// console.write("hello\n");
/// assert_eq!(console.read_line("Name").unwrap().as_deref(), Some("alice"));
/// assert_eq!(console.output(), "hello\n");
/// assert_eq!(console.prompts(), vec![("Name".to_string(), false)]);
/// ```
#[derive(Debug, Default)]
pub struct BufferConsole {
    interactive: bool,
    output: Mutex<String>,
    errors: Mutex<String>,
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(String, bool)>>,
}

impl BufferConsole {
    /// A non-interactive console.
    pub fn new() -> Self {
        Self::default()
    }

    /// An interactive console answering prompts in order.
    pub fn interactive<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            interactive: true,
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Everything written to the output sink.
    pub fn output(&self) -> String {
        lock(&self.output).clone()
    }

    /// Everything written to the error sink.
    pub fn errors(&self) -> String {
        lock(&self.errors).clone()
    }

    /// Prompts shown so far, with whether input was masked.
    pub fn prompts(&self) -> Vec<(String, bool)> {
        lock(&self.prompts).clone()
    }

    fn answer(&self, prompt: &str, secret: bool) -> Option<String> {
        lock(&self.prompts).push((prompt.to_string(), secret));
        lock(&self.answers).pop_front()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Console for BufferConsole {
    fn write(&self, text: &str) {
        lock(&self.output).push_str(text);
    }

    fn write_error(&self, text: &str) {
        lock(&self.errors).push_str(text);
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn read_line(&self, prompt: &str) -> io::Result<Option<String>> {
        Ok(self.answer(prompt, false))
    }

    fn read_secret(&self, prompt: &str) -> io::Result<Option<String>> {
        Ok(self.answer(prompt, true))
    }
}
