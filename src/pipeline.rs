//! Stage execution
//!
//! Binds each [`Stage`] to the component that implements it. Stages share
//! nothing but the staging area on disk and the list of triples built so far.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

use pjbuild_core::{AppConfig, Orchestrator, PipelineReport, PjBuildError, Result, Stage, Workspace};
use pjbuild_toolchain::{configure, extract_tar_bz2, FetchOutcome, ProgressCallback, SourceFetcher, TripleSet};
use pjbuild_build_engine::{
    ArchitectureBuilder, CommandRunner, LibraryMerger, MergePolicy, MergeReport, NativeBuildConfig,
    SuffixConvention,
};

/// Everything a run needs to execute its stages
pub struct Pipeline<R: CommandRunner> {
    config: AppConfig,
    workspace: Workspace,
    runner: R,
    strict: bool,
    built: Mutex<Vec<String>>,
}

impl<R: CommandRunner> Pipeline<R> {
    pub fn new(config: AppConfig, workspace: Workspace, runner: R) -> Self {
        Self {
            config,
            workspace,
            runner,
            strict: false,
            built: Mutex::new(Vec::new()),
        }
    }

    /// Require every merged library to contain every built triple
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Triples built so far, in build order
    pub fn built_triples(&self) -> Vec<String> {
        self.built.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Run `stages` in order, stopping at the first failure
    pub async fn run(&self, stages: Vec<Stage>) -> PipelineReport {
        let mut orchestrator = Orchestrator::new(stages);
        orchestrator.run(move |stage| self.execute(stage)).await
    }

    /// Execute a single stage
    pub async fn execute(&self, stage: Stage) -> Result<()> {
        match stage {
            Stage::Fetch => self.fetch().await,
            Stage::Extract => self.extract().await,
            Stage::Configure => self.configure().await,
            Stage::BuildDevice => {
                let set = TripleSet::device(&self.config.targets, &self.config.platform);
                self.build(&set).await
            }
            Stage::BuildSimulator => {
                let set = TripleSet::simulator(&self.config.targets, &self.config.platform);
                self.build(&set).await
            }
            Stage::Merge => self.merge().await.map(|_| ()),
        }
    }

    async fn fetch(&self) -> Result<()> {
        let fetcher = SourceFetcher::new(&self.config.source.url)
            .with_sha256(self.config.source.sha256.clone());

        match fetcher.fetch(self.workspace.archive_path(), Some(progress_logger())).await? {
            FetchOutcome::Cached => info!("using existing {:?}", self.workspace.archive_path()),
            FetchOutcome::Downloaded { bytes } => info!("downloaded {} bytes from {}", bytes, fetcher.url()),
        }
        Ok(())
    }

    async fn extract(&self) -> Result<()> {
        let archive = self.workspace.archive_path();
        if !archive.is_file() {
            return Err(PjBuildError::NotFound(archive.to_path_buf()));
        }

        extract_tar_bz2(archive, self.workspace.sources_dir()).await?;
        Ok(())
    }

    async fn configure(&self) -> Result<()> {
        configure::configure(
            &self.workspace.config_site_path(),
            &self.config.platform.config_site,
            self.workspace.result_dir(),
        )
        .await?;
        Ok(())
    }

    async fn build(&self, set: &TripleSet) -> Result<()> {
        let native = NativeBuildConfig::new(&self.workspace, &self.config.platform);
        let builder = ArchitectureBuilder::new(&self.runner, native);

        let names = builder.build_set(set).await?;
        if let Ok(mut built) = self.built.lock() {
            built.extend(names);
        }
        Ok(())
    }

    /// Merge the installed libraries.
    ///
    /// Completeness is checked against the triples built in this run, or
    /// against every configured triple when nothing was built (merge-only).
    pub async fn merge(&self) -> Result<MergeReport> {
        let merge = &self.config.merge;
        let mut expected = self.built_triples();
        if expected.is_empty() {
            expected = self.config.targets.all().map(String::from).collect();
        }

        let convention = SuffixConvention::new(self.config.targets.all(), merge.host_tails.clone());
        let policy = MergePolicy {
            expected,
            require_complete: self.strict || merge.require_complete,
        };

        let report = LibraryMerger::new(&self.runner, &merge.tool, convention)
            .with_prefix(&merge.library_prefix)
            .with_policy(policy)
            .merge_dir(&self.workspace.lib_dir())
            .await?;

        for artifact in &report.merged {
            info!("{:?}: {}", artifact.path, artifact.triples.join(", "));
        }
        if !report.leftover.is_empty() {
            info!("{} merged inputs could not be removed", report.leftover.len());
        }
        Ok(report)
    }
}

/// Logs download progress in steps of ten percent
fn progress_logger() -> ProgressCallback {
    let reported = AtomicU64::new(0);
    Box::new(move |done, total| {
        if let Some(step) = progress_step(done, total) {
            if step > reported.fetch_max(step, Ordering::Relaxed) {
                info!("downloaded {}%", step);
            }
        }
    })
}

/// Completed ten-percent step, unknown without a content length
fn progress_step(done: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    Some((done.min(total) * 10 / total) * 10)
}
