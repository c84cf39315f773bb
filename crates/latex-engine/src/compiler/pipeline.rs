//! Toolchain pipeline
//!
//! Runs a fixed, ordered list of external commands inside a working
//! directory. Exit codes are recorded but never decide the outcome; only a
//! timeout or a failure to start a program stops the sequence.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::errors::EngineError;
use crate::config::ProjectLayout;

/// One external process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path
    pub program: String,
    /// Arguments passed verbatim
    pub args: Vec<String>,
    /// Wall-clock limit for this step
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Human-readable form used in logs and errors
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// What happened when a step ran to completion
#[derive(Debug, Clone)]
pub struct StepReport {
    pub program: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl StepReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Ordered sequence of toolchain steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<CommandSpec>,
}

impl Pipeline {
    pub fn new(steps: Vec<CommandSpec>) -> Self {
        Self { steps }
    }

    /// pdflatex, bibtex, then pdflatex twice more so citations and
    /// cross-references settle.
    pub fn latex(layout: &ProjectLayout, timeout: Duration) -> Self {
        let pdflatex = CommandSpec::new(
            "pdflatex",
            [
                "-interaction=nonstopmode",
                "-no-shell-escape",
                layout.entry_file.as_str(),
            ],
            timeout,
        );
        let bibtex = CommandSpec::new("bibtex", [layout.entry_stem()], timeout);

        Self::new(vec![pdflatex.clone(), bibtex, pdflatex.clone(), pdflatex])
    }

    pub fn steps(&self) -> &[CommandSpec] {
        &self.steps
    }

    /// Run every step in order inside `work_dir`
    ///
    /// Returns one report per step. A step that outlives its timeout is
    /// killed and the remaining steps are skipped.
    pub async fn run(&self, work_dir: &Path) -> Result<Vec<StepReport>, EngineError> {
        let mut reports = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            debug!(step = index + 1, command = %step.display(), "Running pipeline step");
            let report = run_step(step, work_dir).await?;

            if report.succeeded() {
                debug!(
                    step = index + 1,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Step finished"
                );
            } else {
                // Non-fatal: the toolchain often exits non-zero on warnings.
                warn!(
                    step = index + 1,
                    program = %report.program,
                    exit_code = ?report.exit_code,
                    "Step exited unsuccessfully, continuing"
                );
            }
            reports.push(report);
        }

        info!(steps = reports.len(), "Pipeline complete");
        Ok(reports)
    }
}

async fn run_step(step: &CommandSpec, work_dir: &Path) -> Result<StepReport, EngineError> {
    let mut cmd = Command::new(&step.program);
    cmd.args(&step.args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so helpers the tool forks can be killed with it.
    #[cfg(unix)]
    cmd.process_group(0);

    let started = Instant::now();
    let child = cmd.spawn().map_err(|source| EngineError::Spawn {
        program: step.program.clone(),
        source,
    })?;
    let mut group = GroupKill { pgid: child.id() };

    // Dropping the wait future on timeout kills the child (kill_on_drop),
    // and `group` takes the rest of its process group down with it.
    let output = match tokio::time::timeout(step.timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_elapsed) => {
            warn!(
                command = %step.display(),
                timeout_ms = step.timeout.as_millis() as u64,
                "Step timed out, aborting pipeline"
            );
            return Err(EngineError::Timeout {
                step: step.display(),
                limit: step.timeout,
            });
        }
    };

    group.disarm();

    Ok(StepReport {
        program: step.program.clone(),
        exit_code: output.status.code(),
        stdout: output.stdout,
        stderr: output.stderr,
        elapsed: started.elapsed(),
    })
}

/// Kills a step's process group unless the step finished on its own
struct GroupKill {
    pgid: Option<u32>,
}

impl GroupKill {
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let Ok(raw) = i32::try_from(pgid) else {
                return;
            };
            match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
                Ok(()) => debug!(pgid, "Killed step process group"),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!(pgid, "Failed to kill step process group: {}", e),
            }
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
}
