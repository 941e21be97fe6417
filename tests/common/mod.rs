//! Shared fixtures: a scripted executor standing in for the local
//! machine and the remote host, and a stub HTTP probe.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use dropship::cmd::{Cmd, CommandOutput, Executor, Target};
use dropship::config::{ConfigInputs, DeploymentConfig};
use dropship::error::DeployResult;
use dropship::health::HttpProbe;
use tempfile::TempDir;

pub const REPO: &str = "https://git.example.com/acme/widget.git";
pub const TOKEN: &str = "tok_5ecr3t_value";
pub const HOST: &str = "203.0.113.7";

pub const RUNNING: &str = r#"{"Status":"running","Running":true,"ExitCode":0}"#;
pub const EXITED: &str = r#"{"Status":"exited","Running":false,"ExitCode":1}"#;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    /// `local` or the host name.
    pub target: String,
    /// Program and arguments joined with spaces, unquoted.
    pub line: String,
    /// What would be sent over ssh, including any `sudo -n`.
    pub rendered: String,
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

/// Answers commands from substring rules and records every call.
/// Later rules take precedence; unmatched commands succeed with
/// empty output.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Vec<(String, CommandOutput)>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provisioned host where the container comes up and nginx
    /// answers on loopback.
    pub fn healthy_host() -> Self {
        Self::new()
            .on("docker inspect", CommandOutput::ok(RUNNING))
            .on("curl", CommandOutput::ok("200"))
            .on("id -nG", CommandOutput::ok("deploy sudo docker"))
    }

    #[must_use]
    pub fn on(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.rules.push((pattern.to_string(), output));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.line).collect()
    }

    /// Index of the first call containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.contains(needle))
    }

    /// Index of the first call containing `needle`, panicking when
    /// there is none.
    pub fn index_of(&self, needle: &str) -> usize {
        self.position(needle)
            .unwrap_or_else(|| panic!("no call containing {needle:?} in {:#?}", self.lines()))
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }

    pub fn find(&self, needle: &str) -> Call {
        let calls = self.calls();
        calls
            .iter()
            .find(|c| c.line.contains(needle))
            .cloned()
            .unwrap_or_else(|| panic!("no call containing {needle:?}"))
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, target: &Target<'_>, cmd: &Cmd) -> DeployResult<CommandOutput> {
        let mut words = vec![cmd.program().to_string()];
        words.extend(cmd.get_args().iter().cloned());
        let line = words.join(" ");

        self.calls.borrow_mut().push(Call {
            target: target.to_string(),
            line: line.clone(),
            rendered: cmd.render(target),
            program: cmd.program().to_string(),
            args: cmd.get_args().to_vec(),
            stdin: cmd
                .get_stdin()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
        });

        let output = self
            .rules
            .iter()
            .rev()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map_or_else(|| CommandOutput::ok(""), |(_, out)| out.clone());
        Ok(output)
    }
}

/// Returns a fixed answer and records the requested URLs.
pub struct StubProbe {
    answer: Result<u16, String>,
    pub urls: RefCell<Vec<String>>,
}

impl StubProbe {
    pub fn status(code: u16) -> Self {
        Self {
            answer: Ok(code),
            urls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            answer: Err(reason.to_string()),
            urls: RefCell::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }
}

impl HttpProbe for StubProbe {
    fn get(&self, url: &str, _timeout: Duration) -> Result<u16, String> {
        self.urls.borrow_mut().push(url.to_string());
        self.answer.clone()
    }
}

/// A temporary directory holding a key file and a work root with an
/// existing checkout of `widget` containing a Dockerfile.
pub struct Fixture {
    pub dir: TempDir,
    pub key: PathBuf,
    pub work_root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_ed25519");
        fs::write(&key, "not a real key\n").unwrap();

        let work_root = dir.path().join("work");
        fs::create_dir_all(work_root.join("widget")).unwrap();
        fs::write(work_root.join("widget/Dockerfile"), "FROM scratch\n").unwrap();

        Self {
            dir,
            key,
            work_root,
        }
    }

    /// A fixture without any local checkout.
    pub fn empty() -> Self {
        let fixture = Self::new();
        fs::remove_dir_all(fixture.checkout()).unwrap();
        fixture
    }

    pub fn checkout(&self) -> PathBuf {
        self.work_root.join("widget")
    }

    pub fn write(&self, name: &str, contents: &str) {
        fs::write(self.checkout().join(name), contents).unwrap();
    }

    pub fn inputs(&self, user: &str) -> ConfigInputs {
        let mut inputs = ConfigInputs::new(REPO, TOKEN, user, HOST, &self.key, 3000);
        inputs.work_root = self.work_root.clone();
        inputs.startup_grace = Some(Duration::ZERO);
        inputs.probe_timeout = Some(Duration::from_secs(2));
        inputs
    }

    pub fn config(&self, user: &str) -> DeploymentConfig {
        DeploymentConfig::resolve(self.inputs(user)).unwrap()
    }
}
