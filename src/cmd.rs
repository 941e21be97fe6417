use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::error::{DeployError, DeployResult};
use crate::log::Logger;
use crate::ssh::RemoteTarget;

/// Where a command runs.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Local,
    Remote(&'a RemoteTarget),
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote(remote) => f.write_str(&remote.host),
        }
    }
}

/// How a non-zero exit is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Non-zero exit aborts the stage.
    Required,
    /// Non-zero exit is expected (resource already absent or present)
    /// and swallowed.
    BestEffort,
    /// Non-zero exit is an answer, not a failure.
    Probe,
}

/// A single program invocation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    sudo: bool,
    stdin: Option<Vec<u8>>,
    cwd: Option<PathBuf>,
    display: Option<String>,
}

impl Cmd {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            sudo: false,
            stdin: None,
            cwd: None,
            display: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run with elevated privileges on a remote host whose user is
    /// not root. Ignored locally.
    #[must_use]
    pub const fn sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    #[must_use]
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Working directory for local execution.
    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Text shown in logs instead of the real arguments, for
    /// commands that carry a secret.
    #[must_use]
    pub fn redacted(mut self, display: &str) -> Self {
        self.display = Some(display.to_string());
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn get_stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    /// The shell line sent over ssh, every word quoted.
    #[must_use]
    pub fn render(&self, target: &Target<'_>) -> String {
        let mut words: Vec<&str> = Vec::with_capacity(self.args.len() + 3);
        if let Target::Remote(remote) = target {
            if self.sudo && remote.needs_sudo() {
                words.extend(["sudo", "-n"]);
            }
        }
        words.push(&self.program);
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }

    /// What the logs show for this command.
    #[must_use]
    pub fn display(&self, target: &Target<'_>) -> String {
        self.display
            .clone()
            .unwrap_or_else(|| self.render(target))
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs a command to completion and reports its exit status and
/// output. `Err` means the command could not be started at all.
pub trait Executor {
    fn execute(&self, target: &Target<'_>, cmd: &Cmd) -> DeployResult<CommandOutput>;
}

/// Executes commands as real processes: locally, or through `ssh`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, target: &Target<'_>, cmd: &Cmd) -> DeployResult<CommandOutput> {
        let (program, args) = match target {
            Target::Local => (cmd.program.clone(), cmd.args.clone()),
            Target::Remote(remote) => ("ssh".to_string(), remote.ssh_args(&cmd.render(target))),
        };

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let (Target::Local, Some(dir)) = (target, &cmd.cwd) {
            command.current_dir(dir);
        }

        let output = match &cmd.stdin {
            None => command
                .stdin(Stdio::null())
                .output()
                .map_err(|e| spawn_error(&program, e))?,
            Some(data) => run_with_stdin(&mut command, &program, data)?,
        };

        Ok(CommandOutput {
            // Killed by a signal: no code, report it as -1.
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn run_with_stdin(command: &mut Command, program: &str, data: &[u8]) -> DeployResult<Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    if let Some(stdin) = &mut child.stdin {
        stdin.write_all(data)?;
    }
    drop(child.stdin.take());

    Ok(child.wait_with_output()?)
}

fn spawn_error(program: &str, e: std::io::Error) -> DeployError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DeployError::CommandNotFound(program.to_string())
    } else {
        DeployError::Io(e)
    }
}

/// The executor paired with the log sink. Every invocation is
/// logged before it runs and its outcome after. Commands stay
/// argument vectors until the ssh boundary, where each argument is
/// quoted on its own.
#[derive(Clone, Copy)]
pub struct Shell<'a> {
    executor: &'a dyn Executor,
    log: &'a Logger,
}

impl<'a> Shell<'a> {
    #[must_use]
    pub fn new(executor: &'a dyn Executor, log: &'a Logger) -> Self {
        Self { executor, log }
    }

    #[must_use]
    pub const fn log(&self) -> &'a Logger {
        self.log
    }

    pub fn run(&self, target: Target<'_>, cmd: &Cmd, policy: Policy) -> DeployResult<CommandOutput> {
        let display = cmd.display(&target);
        self.log.info(format!("[{target}] $ {display}"));

        let output = self.executor.execute(&target, cmd)?;
        if output.success() {
            return Ok(output);
        }

        match policy {
            Policy::Required => {
                let stderr = tail(&output.stderr, 20);
                self.log.error(format!(
                    "[{target}] exit {}: {display}{}",
                    output.code,
                    if stderr.is_empty() {
                        String::new()
                    } else {
                        format!("\n{stderr}")
                    }
                ));
                Err(DeployError::CommandFailed {
                    command: display,
                    code: output.code,
                    stderr,
                })
            }
            Policy::BestEffort => {
                self.log
                    .info(format!("[{target}] exit {} ignored (best-effort)", output.code));
                Ok(output)
            }
            Policy::Probe => Ok(output),
        }
    }

    pub fn required(&self, target: Target<'_>, cmd: &Cmd) -> DeployResult<CommandOutput> {
        self.run(target, cmd, Policy::Required)
    }

    pub fn best_effort(&self, target: Target<'_>, cmd: &Cmd) -> DeployResult<CommandOutput> {
        self.run(target, cmd, Policy::BestEffort)
    }

    /// Run a check command; `true` when it exits zero.
    pub fn check(&self, target: Target<'_>, cmd: &Cmd) -> DeployResult<bool> {
        Ok(self.run(target, cmd, Policy::Probe)?.success())
    }
}

/// Last `n` lines of `text`.
#[must_use]
pub fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
