//! Command Runner
//!
//! Every external program (configure script, make, lipo) is described by a
//! [`CommandSpec`] carrying its own working directory and environment
//! overrides, so no stage ever changes the process-wide current directory or
//! environment.

use std::fmt;
use std::path::PathBuf;
use indexmap::IndexMap;
use tokio::process::Command;
use tracing::debug;

use crate::BuildError;

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory of the child
    pub cwd: PathBuf,
    /// Added to the inherited environment of the child
    pub env: IndexMap<String, String>,
}

impl CommandSpec {
    /// Create a command run in `cwd` with the inherited environment
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: IndexMap::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add environment overrides
    pub fn envs(mut self, vars: &IndexMap<String, String>) -> Self {
        self.env.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr
    pub combined: String,
}

/// Executes commands. Implementations must treat a non-zero exit as
/// [`BuildError::CommandFailed`] carrying the combined output.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, BuildError>;
}

/// Runs commands as child processes and waits for them to exit
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, BuildError> {
        debug!(cwd = ?spec.cwd, "Running: {}", spec);

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                command: spec.to_string(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(BuildError::CommandFailed {
                command: spec.to_string(),
                code: output.status.code(),
                output: combined,
            });
        }

        Ok(CommandOutput { combined })
    }
}
