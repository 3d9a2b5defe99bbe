//! CLI commands for pjbuild
//!
//! Each command resolves the configuration and workspace, checks the
//! required programs and drives the pipeline.

use std::fmt::Write as _;
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use tracing::{info, error};

use pjbuild_core::{AppConfig, Stage, Workspace};
use pjbuild_toolchain::{EnvManager, ToolchainDetector, TripleSet};
use pjbuild_build_engine::{NativeBuildConfig, NativeStep, ProcessRunner};

use crate::pipeline::Pipeline;

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    /// Directory holding the staging area
    pub root: PathBuf,
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    /// Force strict merge completeness
    pub strict: bool,
}

impl CommonOptions {
    async fn resolve(&self) -> Result<(AppConfig, Workspace)> {
        let config = AppConfig::load(self.config.as_deref(), &self.root).await?;
        let workspace = Workspace::from_config(&self.root, &config)
            .with_context(|| format!("invalid root directory {:?}", self.root))?;
        Ok((config, workspace))
    }
}

/// Full pipeline: fetch, extract, configure, build, merge
pub struct RunCommand {
    pub options: CommonOptions,
}

impl RunCommand {
    pub async fn execute(&self) -> Result<()> {
        let (config, workspace) = self.options.resolve().await?;
        ToolchainDetector::require([config.platform.make.as_str(), config.merge.tool.as_str()])?;

        info!("Building pjsip in {:?}", workspace.build_dir());
        let pipeline = Pipeline::new(config, workspace, ProcessRunner).strict(self.options.strict);
        let report = pipeline.run(Stage::PIPELINE.to_vec()).await;

        match report.failure {
            None => {
                info!(
                    "pjsip built in {:.1}s: {:?}",
                    report.total_duration().as_secs_f64(),
                    pipeline.workspace().lib_dir()
                );
                Ok(())
            }
            Some(failure) => {
                if !report.not_run.is_empty() {
                    error!("not run: {:?}", report.not_run);
                }
                if failure.error.is_transient() {
                    info!("the failure may be temporary, running again may succeed");
                }
                bail!("{} stage failed: {}", failure.stage, failure.error.user_message())
            }
        }
    }
}

/// Merge stage only, over an existing install prefix
pub struct MergeCommand {
    pub options: CommonOptions,
}

impl MergeCommand {
    pub async fn execute(&self) -> Result<()> {
        let (config, workspace) = self.options.resolve().await?;
        ToolchainDetector::require([config.merge.tool.as_str()])?;

        let pipeline = Pipeline::new(config, workspace, ProcessRunner).strict(self.options.strict);
        let report = pipeline
            .merge()
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;

        info!(
            "{} merged, {} untouched, {} skipped",
            report.merged.len(),
            report.untouched.len(),
            report.skipped.len()
        );
        if !report.leftover.is_empty() {
            bail!("could not remove {} merged inputs: {:?}", report.leftover.len(), report.leftover);
        }
        Ok(())
    }
}

/// Print what a run would do without doing it
pub struct PlanCommand {
    pub options: CommonOptions,
    /// Print the resolved configuration as JSON instead
    pub json: bool,
}

impl PlanCommand {
    pub async fn execute(&self) -> Result<()> {
        let (config, workspace) = self.options.resolve().await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            print!("{}", render_plan(&config, &workspace));
        }
        Ok(())
    }
}

/// Layout, commands and per-triple environment of a run
pub fn render_plan(config: &AppConfig, workspace: &Workspace) -> String {
    let native = NativeBuildConfig::new(workspace, &config.platform);
    let mut out = String::new();

    let _ = writeln!(out, "source:  {}", config.source.url);
    let _ = writeln!(out, "archive: {}", workspace.archive_path().display());
    let _ = writeln!(out, "sources: {}", workspace.sources_dir().display());
    let _ = writeln!(out, "prefix:  {}", workspace.result_dir().display());
    let _ = writeln!(out);

    let _ = writeln!(out, "per-triple commands (in {}):", native.source_dir.display());
    for step in NativeStep::CYCLE {
        let _ = writeln!(out, "  {}", step.command(&native));
    }

    for set in [
        TripleSet::device(&config.targets, &config.platform),
        TripleSet::simulator(&config.targets, &config.platform),
    ] {
        for triple in &set.triples {
            let _ = writeln!(out);
            let _ = writeln!(out, "# {} ({})", triple.name, set.platform.as_str());
            out.push_str(&EnvManager::shell_exports(&triple.env));
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "merge: {} -create -output <lib>.a <lib>-<triple>.a... in {}",
        config.merge.tool,
        workspace.lib_dir().display()
    );
    out
}
