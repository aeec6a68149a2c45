use std::io;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Launches the shell command bound to a key
pub trait CommandRunner {
    /// Start `command` without waiting for it
    fn launch(&self, command: &str) -> io::Result<()>;
}

/// Runs commands through the platform shell, fire-and-forget.
///
/// Children are not awaited; `main` ignores SIGCHLD so they are reaped by the
/// kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn launch(&self, command: &str) -> io::Result<()> {
        debug!("Running command: {}", command);
        let child = shell_command(command).stdin(Stdio::null()).spawn()?;
        debug!("Started process {:?}", child.id());
        Ok(())
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
