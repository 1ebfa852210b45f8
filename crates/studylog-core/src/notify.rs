//! Best-effort completion cues.
//!
//! A notifier may fail for any reason (no audio device, command missing,
//! terminal closed). Callers log the failure and carry on.

use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification command is empty")]
    EmptyCommand,

    #[error("notification failed: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Notifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        (**self).notify(title, body)
    }
}

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _title: &str, _body: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct BellNotifier;

impl Notifier for BellNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let mut err = std::io::stderr().lock();
        writeln!(err, "\x07{title}: {body}")?;
        err.flush()?;
        Ok(())
    }
}

/// Runs a user-configured shell command, e.g. `paplay ~/ding.ogg`. The title
/// and body are passed in `STUDYLOG_TITLE` and `STUDYLOG_BODY`.
///
/// The command is spawned and left running; its exit status is only logged.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn shell(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };
        cmd.arg(&self.command);
        cmd
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if self.command.trim().is_empty() {
            return Err(NotifyError::EmptyCommand);
        }
        let mut child = self
            .shell()
            .env("STUDYLOG_TITLE", title)
            .env("STUDYLOG_BODY", body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        // Reap in the background so a slow player never holds up the caller.
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                tracing::debug!(%status, "notification command failed");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "notification command lost"),
        });
        Ok(())
    }
}

/// Tries each notifier in turn; succeeds if any one does.
pub struct ChainNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl ChainNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

impl Notifier for ChainNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let mut last_err = None;
        for notifier in &self.notifiers {
            match notifier.notify(title, body) {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        last_err.map_or(Ok(()), Err)
    }
}
