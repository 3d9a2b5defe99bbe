//! Pipeline Orchestrator
//!
//! Runs the pipeline stages strictly in order and stops at the first
//! failure. Stages communicate only through the staging workspace, so the
//! orchestrator knows nothing about what a stage does; it only sequences
//! them and records the outcome.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, debug, error};

use crate::error::{PjBuildError, Result};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Download the source archive
    Fetch,
    /// Unpack the archive into the source tree
    Extract,
    /// Write the platform header and reset the install prefix
    Configure,
    /// Build every device triple
    BuildDevice,
    /// Build every simulator triple
    BuildSimulator,
    /// Merge per-triple libraries into fat libraries
    Merge,
}

impl Stage {
    /// Every stage, in execution order
    pub const PIPELINE: [Stage; 6] = [
        Stage::Fetch,
        Stage::Extract,
        Stage::Configure,
        Stage::BuildDevice,
        Stage::BuildSimulator,
        Stage::Merge,
    ];

    /// Label used in stage boundary log lines
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Fetch => "DOWNLOAD",
            Stage::Extract => "EXTRACT",
            Stage::Configure => "CONFIGURE",
            Stage::BuildDevice => "BUILD ARM",
            Stage::BuildSimulator => "BUILD X86",
            Stage::Merge => "LIPO",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Orchestrator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Nothing ran yet
    Pending,
    /// A stage is executing
    Running(Stage),
    /// Every stage succeeded
    Completed,
    /// A stage failed; later stages were not run
    Failed(Stage),
}

/// A stage that finished successfully
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: Stage,
    pub duration: Duration,
}

/// The stage that stopped the pipeline and why
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: PjBuildError,
}

/// Outcome of one pipeline run
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Stages that succeeded, in order
    pub completed: Vec<StageRecord>,
    /// First failure, if any
    pub failure: Option<StageFailure>,
    /// Stages never started because of the failure
    pub not_run: Vec<Stage>,
}

impl PipelineReport {
    /// Whether every stage succeeded
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Total time spent in successful stages
    pub fn total_duration(&self) -> Duration {
        self.completed.iter().map(|r| r.duration).sum()
    }

    /// Convert into a `Result`, keeping the failed stage's error
    pub fn into_result(self) -> std::result::Result<Vec<StageRecord>, StageFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.completed),
        }
    }
}

/// Sequential stage driver
pub struct Orchestrator {
    stages: Vec<Stage>,
    state: RunState,
}

impl Orchestrator {
    /// Create an orchestrator for the given stages, run in the given order
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            state: RunState::Pending,
        }
    }

    /// Orchestrator for the whole pipeline
    pub fn full_pipeline() -> Self {
        Self::new(Stage::PIPELINE.to_vec())
    }

    /// Stages this orchestrator runs
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Current state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    fn set_state(&mut self, state: RunState) {
        debug!("State transition: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Run every stage through `execute`, stopping at the first error
    pub async fn run<F, Fut>(&mut self, mut execute: F) -> PipelineReport
    where
        F: FnMut(Stage) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut report = PipelineReport::default();
        let stages = self.stages.clone();

        for (index, stage) in stages.iter().copied().enumerate() {
            self.set_state(RunState::Running(stage));
            info!("-- {} STAGE --", stage);
            let start = Instant::now();

            let outcome = execute(stage).await;

            info!("-- {} STAGE END --", stage);

            match outcome {
                Ok(()) => report.completed.push(StageRecord {
                    stage,
                    duration: start.elapsed(),
                }),
                Err(err) => {
                    error!("{} stage failed: {}", stage, err);
                    report.not_run = stages[index + 1..].to_vec();
                    report.failure = Some(StageFailure { stage, error: err });
                    self.set_state(RunState::Failed(stage));
                    return report;
                }
            }
        }

        self.set_state(RunState::Completed);
        report
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::full_pipeline()
    }
}
