// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Script application.
//!
//! Apply a compiled [`Script`] to the running system one block at a time.
//! Each block is materialized as its own executable script, run to
//! completion, and removed again.
//!
//! # Fail-Fast
//!
//! Application stops at the first block that fails. Blocks that were already
//! applied stay applied, because there is no rollback. The failure reports the
//! block name, the underlying error, and the exact commands that were
//! attempted, so an operator can pick up from there.
//!
//! # State Machine
//!
//! ```text
//! Pending -> Running(i) -> Applied(i) -> Running(i + 1) ...
//!                       \-> Failed(i) -> Halted(i)
//! Applied(last) -> Completed
//! ```

use crate::compile::{NamedCommandBlock, Script};

use std::{
    fs::{set_permissions, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::PathBuf,
    process::{Command, ExitStatus},
};
use tempfile::Builder;
use tracing::{debug, info, instrument, warn};

/// Run a standalone script.
pub trait ScriptRunner {
    /// Run script for named block to completion.
    fn run(&self, name: &str, script: &str) -> Result<(), RunError>;
}

/// Run scripts through a transient executable file.
#[derive(Debug, Default, Clone)]
pub struct BashRunner {
    scratch_dir: Option<PathBuf>,
}

impl BashRunner {
    /// Construct new runner using the system temporary directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize scripts in target directory instead.
    pub fn with_scratch_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(path.into());
        self
    }
}

impl ScriptRunner for BashRunner {
    /// Write script to a temporary file, mark it executable, and execute it.
    ///
    /// The temporary file is removed when this returns, no matter how.
    ///
    /// # Errors
    ///
    /// - Return [`RunError::Io`] if the script cannot be materialized or
    ///   spawned.
    /// - Return [`RunError::Status`] if the script exits unsuccessfully.
    #[instrument(skip(self, script), level = "debug")]
    fn run(&self, name: &str, script: &str) -> Result<(), RunError> {
        let mut builder = Builder::new();
        builder.prefix("imagecfg-").suffix(".sh");
        let mut file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(script.as_bytes())?;
        file.flush()?;

        // INVARIANT: Close write handle before executing, or exec sees a busy file.
        let path = file.into_temp_path();
        set_permissions(&path, Permissions::from_mode(0o755))?;
        debug!("materialized {name} block at {:?}", path.display());

        syscall_interactive(Command::new(path.as_os_str()))?;
        path.close()?;

        Ok(())
    }
}

fn syscall_interactive(mut cmd: Command) -> Result<(), RunError> {
    let status = cmd.spawn()?.wait()?;
    if !status.success() {
        return Err(RunError::Status(status));
    }

    Ok(())
}

/// Position of the applier in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    /// Nothing attempted yet.
    Pending,

    /// Block at index is being run.
    Running(usize),

    /// Block at index was applied.
    Applied(usize),

    /// Block at index failed.
    Failed(usize),

    /// Every block was applied.
    Completed,

    /// Stopped at the failed block at index.
    Halted(usize),
}

impl ApplyState {
    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Halted(_))
    }
}

/// Summary of a completed application.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Names of applied blocks in order.
    pub applied: Vec<String>,
}

impl ApplyReport {
    /// Check if there was nothing to apply.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Apply script blocks in order, stopping at the first failure.
#[derive(Debug)]
pub struct Applier<'script, R = BashRunner>
where
    R: ScriptRunner,
{
    script: &'script Script,
    runner: R,
    state: ApplyState,
    report: ApplyReport,
    failure: Option<ApplyError>,
}

impl<'script, R> Applier<'script, R>
where
    R: ScriptRunner,
{
    /// Construct new applier in pending state.
    pub fn new(script: &'script Script, runner: R) -> Self {
        Self {
            script,
            runner,
            state: ApplyState::Pending,
            report: ApplyReport::default(),
            failure: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ApplyState {
        self.state
    }

    /// Advance state machine by one transition.
    ///
    /// From `Pending` or `Applied(i)` the next block is run, ending up in
    /// either `Applied` or `Failed`. When no blocks remain the state becomes
    /// `Completed`. From `Failed(i)` the state becomes `Halted(i)`. Terminal
    /// states do not change.
    pub fn step(&mut self) -> ApplyState {
        self.state = match self.state {
            ApplyState::Pending => self.run_block(0),
            ApplyState::Applied(index) => self.run_block(index + 1),
            ApplyState::Failed(index) => ApplyState::Halted(index),
            state => state,
        };

        self.state
    }

    /// Step until a terminal state is reached.
    ///
    /// # Errors
    ///
    /// - Return [`ApplyError::Block`] for the first block that fails. No
    ///   further blocks are attempted.
    #[instrument(skip(self), level = "debug")]
    pub fn run(mut self) -> Result<ApplyReport, ApplyError> {
        if self.script.is_empty() {
            info!("nothing to apply");
        }

        while !self.step().is_terminal() {}

        match self.failure.take() {
            Some(failure) => Err(failure),
            None => Ok(self.report),
        }
    }

    fn run_block(&mut self, index: usize) -> ApplyState {
        let script = self.script;
        let Some(block) = script.blocks().get(index) else {
            return ApplyState::Completed;
        };

        self.state = ApplyState::Running(index);
        info!("apply {} block", block.name());

        let materialized = script.materialize(block);
        match self.runner.run(block.name(), &materialized) {
            Ok(()) => {
                debug!("applied {} block", block.name());
                self.report.applied.push(block.name().to_string());
                ApplyState::Applied(index)
            }
            Err(err) => {
                warn!("{} block failed, halting", block.name());
                self.failure = Some(ApplyError::block(index, block, err));
                ApplyState::Failed(index)
            }
        }
    }
}

/// Apply every block of script with the default runner.
///
/// # Errors
///
/// - Return [`ApplyError::Block`] for the first block that fails.
pub fn apply(script: &Script) -> Result<ApplyReport, ApplyError> {
    Applier::new(script, BashRunner::new()).run()
}

/// Script runner error types.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Script exited unsuccessfully.
    #[error("script exited unsuccessfully: {0}")]
    Status(ExitStatus),

    /// Script cannot be materialized or spawned.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Block failed to apply.
    #[error("failed to apply {name} block, attempted commands:\n{commands}")]
    Block {
        #[source]
        source: RunError,
        index: usize,
        name: String,
        commands: String,
    },
}

impl ApplyError {
    fn block(index: usize, block: &NamedCommandBlock, source: RunError) -> Self {
        Self::Block {
            source,
            index,
            name: block.name().to_string(),
            commands: block.commands().to_string(),
        }
    }
}
