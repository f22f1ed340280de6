//! Process Execution
//!
//! Synchronous external tool invocation. Every call blocks until the child
//! exits; failures map onto the typed error kinds the pipelines report.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::environment::ToolEnv;
use crate::BuildError;

/// One external tool invocation: full argv plus the working directory
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub argv: Vec<OsString>,
    pub cwd: PathBuf,
}

impl ToolInvocation {
    /// Start an invocation from the binary path and working directory
    pub fn new(program: impl AsRef<OsStr>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            argv: vec![program.as_ref().to_os_string()],
            cwd: cwd.into(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.argv.push(arg.as_ref().to_os_string());
        self
    }

    /// Append a sequence of arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.argv.push(arg.as_ref().to_os_string());
        }
        self
    }

    /// Lossy display form used in logs and failure reports
    pub fn display(&self) -> String {
        self.argv_lossy().join(" ")
    }

    fn argv_lossy(&self) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

/// Runs external tools and reports their outcome
pub struct ProcessRunner;

impl ProcessRunner {
    /// Run a tool to completion
    ///
    /// The binary must exist on the filesystem before any spawn is
    /// attempted, so a bad tool path surfaces as a missing-tool failure
    /// rather than a raw launch error. A nonzero exit status is a failure.
    pub fn run(invocation: &ToolInvocation, env: &ToolEnv) -> Result<(), BuildError> {
        let program = invocation
            .argv
            .first()
            .ok_or_else(|| BuildError::Config("cannot run an empty argument list".to_string()))?;
        let program_path = Path::new(program);
        if !program_path.exists() {
            return Err(BuildError::ToolMissing {
                tool: tool_name(program_path),
                path: Some(program_path.to_path_buf()),
            });
        }

        debug!("running: {}", invocation.display());
        let status = Command::new(program)
            .args(&invocation.argv[1..])
            .current_dir(&invocation.cwd)
            .envs(env.iter())
            .status()?;
        let code = status.code().unwrap_or(-1);
        if !status.success() {
            warn!("subprocess returned {}", code);
            return Err(BuildError::Subprocess {
                program: program.to_string_lossy().into_owned(),
                argv: invocation.argv_lossy(),
                code,
            });
        }
        debug!("subprocess returned {}", code);
        Ok(())
    }

    /// Run a tool and collect its standard output
    ///
    /// Trailing newline characters are stripped. Launch failures and nonzero
    /// exits are not errors here: callers use this for optional auxiliary
    /// queries and treat "no answer" the same as an empty answer. Standard
    /// error passes through to the orchestrator's own.
    pub fn capture(invocation: &ToolInvocation, env: &ToolEnv) -> String {
        let Some(program) = invocation.argv.first() else {
            return String::new();
        };
        let output = Command::new(program)
            .args(&invocation.argv[1..])
            .current_dir(&invocation.cwd)
            .envs(env.iter())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output();
        match output {
            Ok(out) => String::from_utf8_lossy(&out.stdout)
                .trim_end_matches(|c| c == '\n' || c == '\r')
                .to_string(),
            Err(err) => {
                debug!("could not query {}: {}", invocation.display(), err);
                String::new()
            }
        }
    }
}

/// Ensure a configured tool path exists before it is handed to a pipeline
pub fn check_tool<'a>(name: &str, path: Option<&'a Path>) -> Result<&'a Path, BuildError> {
    match path {
        Some(p) if p.exists() => Ok(p),
        other => Err(BuildError::ToolMissing {
            tool: name.to_string(),
            path: other.map(Path::to_path_buf),
        }),
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}
