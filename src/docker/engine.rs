use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Per-invocation knobs for [`CommandRunner::run`].
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Log the command line at debug level before running it.
    pub logged: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { logged: true }
    }
}

impl RunOptions {
    pub fn quiet() -> Self {
        Self { logged: false }
    }
}

/// The one place external processes are spawned from.
///
/// Implementations block until the process exits and return its stdout.
/// A non-zero exit is an [`Error::ProcessFailed`].
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String], opts: RunOptions) -> Result<Vec<u8>>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String], opts: RunOptions) -> Result<Vec<u8>> {
        let command = command_line(program, args);
        if opts.logged {
            tracing::debug!(cmd = %command, "exec");
        }

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::ProcessFailed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// Shell-quoted rendering of a command, for logs and error messages.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut words = Vec::with_capacity(args.len() + 1);
    words.push(program);
    words.extend(args.iter().map(String::as_str));
    shell_words::join(words)
}

/// Verify that the container runtime is installed and its daemon reachable.
pub fn ensure_available<R: CommandRunner>(runner: &R, program: &str) -> anyhow::Result<()> {
    runner
        .run(program, &["version".to_string()], RunOptions::quiet())
        .map_err(|e| {
            anyhow::Error::new(e).context(format!(
                "`{program} version` failed; make sure {program} is running and that you can connect to it"
            ))
        })?;
    Ok(())
}
