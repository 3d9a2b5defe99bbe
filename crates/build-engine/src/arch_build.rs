//! Per-Architecture Build
//!
//! Runs pjproject's configure/dep/build/install/clean cycle once per target
//! triple. Triples share one source tree, so they are built strictly one
//! after another.

use std::time::Instant;
use tracing::{info, error};
use pjbuild_toolchain::{TargetTriple, TripleSet};

use crate::config::{NativeBuildConfig, NativeStep};
use crate::runner::{CommandRunner, CommandSpec};
use crate::BuildError;

/// Builds triple sets against a shared source tree and install prefix
pub struct ArchitectureBuilder<'a, R: CommandRunner> {
    runner: &'a R,
    config: NativeBuildConfig,
}

impl<'a, R: CommandRunner> ArchitectureBuilder<'a, R> {
    /// Create a new architecture builder
    pub fn new(runner: &'a R, config: NativeBuildConfig) -> Self {
        Self { runner, config }
    }

    /// Commands of one build cycle for `triple`, with its overrides applied
    pub fn commands_for(&self, triple: &TargetTriple) -> Vec<CommandSpec> {
        NativeStep::CYCLE
            .iter()
            .map(|step| step.command(&self.config).envs(&triple.env))
            .collect()
    }

    /// Build one triple, stopping at the first failing command
    pub async fn build_triple(&self, triple: &TargetTriple) -> Result<(), BuildError> {
        info!("building for {}", triple.name);
        let start = Instant::now();

        for spec in self.commands_for(triple) {
            info!("{}", spec);
            if let Err(err) = self.runner.run(&spec).await {
                error!("{} failed for {}: {}", spec, triple.name, err);
                return Err(err);
            }
        }

        info!("built {} in {:.2}s", triple.name, start.elapsed().as_secs_f64());
        Ok(())
    }

    /// Build every triple of the set in order. Returns the names built.
    pub async fn build_set(&self, set: &TripleSet) -> Result<Vec<String>, BuildError> {
        if set.is_empty() {
            info!("no {} triples configured", set.platform.as_str());
            return Ok(Vec::new());
        }

        let mut built = Vec::with_capacity(set.triples.len());
        for triple in &set.triples {
            self.build_triple(triple).await?;
            built.push(triple.name.clone());
        }
        Ok(built)
    }
}
