//! Spawns the user-supplied shell command and captures an exit disposition.

use std::path::Path;
use std::process::Command;

use tracing::{debug, instrument};

/// The sentinel exit code that means "please cancel this activity."
pub const CANCEL_EXIT_CODE: i32 = 255;

/// The outcome of running a user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The process exited with status 0.
    Success,
    /// The process exited with a non-zero, non-255 status code.
    Failed(i32),
    /// The process exited with status 255, or was terminated with
    /// equivalent semantics.
    Canceled,
    /// The process could not be launched.
    SpawnFailed(String),
}

/// Runs tokenized commands in a fixed working directory and reports their
/// real integer exit code as a [`Disposition`] — never a textual parse of an
/// exception message.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Tokenizes `command` by whitespace (first token is the executable, the
    /// rest are its arguments — no shell interpretation), spawns it with
    /// `working_dir` as its current directory and inherited standard
    /// streams/environment, and waits for it to exit.
    #[instrument(skip(self))]
    pub fn run(&self, command: &str, working_dir: &Path) -> Disposition {
        let mut tokens = command.split_whitespace();
        let Some(program) = tokens.next() else {
            return Disposition::SpawnFailed("empty command".to_string());
        };
        let args: Vec<&str> = tokens.collect();

        let mut cmd = Command::new(program);
        cmd.args(&args).current_dir(working_dir);

        match cmd.status() {
            Ok(status) => match status.code() {
                Some(0) => Disposition::Success,
                Some(CANCEL_EXIT_CODE) => Disposition::Canceled,
                Some(code) => Disposition::Failed(code),
                None => {
                    debug!(command, "process terminated by signal, treating as cancel");
                    Disposition::Canceled
                }
            },
            Err(err) => Disposition::SpawnFailed(err.to_string()),
        }
    }
}
