//! Fat Library Merging
//!
//! `make install` leaves one static library per triple in the shared
//! `lib/` directory, named `<logical>-<triple>[-<host tail>].a`. This module
//! groups them by logical name, merges each group into `<logical>.a` with
//! lipo and removes the per-triple inputs.
//!
//! The run goes `Scanning -> Grouping -> (Merging -> CleaningInputs)* -> Done`
//! with no retries. A merge failure stops the whole run before any of the
//! failing group's inputs are deleted.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use indexmap::IndexMap;
use tracing::{info, debug, warn, error};

use crate::runner::{CommandRunner, CommandSpec};
use crate::BuildError;

/// Recognized architecture suffixes of per-triple library names.
///
/// A file stem matches when it ends with exactly `-<token>` or
/// `-<token>-<tail>` and something is left in front of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixConvention {
    tokens: Vec<String>,
    host_tails: Vec<String>,
}

impl SuffixConvention {
    pub fn new<T, S>(tokens: T, host_tails: Vec<String>) -> Self
    where
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            host_tails,
        }
    }

    /// Split a file stem into `(logical name, triple)`.
    ///
    /// When several suffixes match, the longest one wins.
    pub fn split<'a>(&self, stem: &'a str) -> Option<(&'a str, &str)> {
        let mut best: Option<(usize, &str)> = None;

        for token in &self.tokens {
            let mut candidates = vec![format!("-{}", token)];
            candidates.extend(self.host_tails.iter().map(|tail| format!("-{}-{}", token, tail)));

            for suffix in candidates {
                if stem.len() > suffix.len() && stem.ends_with(&suffix) {
                    let logical_len = stem.len() - suffix.len();
                    if best.map_or(true, |(len, _)| logical_len < len) {
                        best = Some((logical_len, token.as_str()));
                    }
                }
            }
        }

        best.map(|(len, token)| (&stem[..len], token))
    }
}

/// One per-triple input of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub path: PathBuf,
    pub triple: String,
}

/// Per-triple libraries sharing a logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryGroup {
    /// Logical name, e.g. `libpjsua`
    pub name: String,
    /// File name of the merged output, e.g. `libpjsua.a`
    pub file_name: String,
    /// Inputs in discovery order
    pub members: Vec<GroupMember>,
}

impl LibraryGroup {
    /// Member paths, in merge order
    pub fn paths(&self) -> Vec<&Path> {
        self.members.iter().map(|m| m.path.as_path()).collect()
    }

    /// Triples of the members
    pub fn triples(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.triple.as_str()).collect()
    }

    /// Expected triples without a member
    pub fn missing<'e>(&self, expected: &'e [String]) -> Vec<&'e str> {
        expected
            .iter()
            .filter(|t| !self.members.iter().any(|m| &m.triple == *t))
            .map(String::as_str)
            .collect()
    }

    /// Triples with more than one member
    pub fn duplicated(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut dups = BTreeSet::new();
        for triple in self.triples() {
            if !seen.insert(triple) {
                dups.insert(triple);
            }
        }
        dups.into_iter().collect()
    }
}

/// Result of scanning the library directory
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LibraryScan {
    /// Groups keyed by merged file name, in discovery order
    pub groups: IndexMap<String, LibraryGroup>,
    /// Libraries without an architecture suffix that no group will overwrite
    pub standalone: Vec<PathBuf>,
    /// Files not following the library naming convention
    pub skipped: Vec<PathBuf>,
}

impl LibraryScan {
    /// Group already-listed file names of `dir`, in the order given
    pub fn from_names<I>(dir: &Path, names: I, convention: &SuffixConvention, prefix: &str) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut scan = LibraryScan::default();
        let mut unsuffixed = Vec::new();

        for name in names {
            let path = dir.join(&name);

            if !name.starts_with(prefix) {
                warn!("skip {}: not a {}* library", name, prefix);
                scan.skipped.push(path);
                continue;
            }

            let (stem, extension) = split_extension(&name);
            match convention.split(stem) {
                Some((logical, triple)) => {
                    let file_name = match extension {
                        Some(ext) => format!("{}.{}", logical, ext),
                        None => logical.to_string(),
                    };
                    scan.groups
                        .entry(file_name.clone())
                        .or_insert_with(|| LibraryGroup {
                            name: logical.to_string(),
                            file_name,
                            members: Vec::new(),
                        })
                        .members
                        .push(GroupMember {
                            path,
                            triple: triple.to_string(),
                        });
                }
                None => unsuffixed.push((name, path)),
            }
        }

        for (name, path) in unsuffixed {
            if scan.groups.contains_key(&name) {
                debug!("{} will be replaced by this run's merge", name);
            } else {
                debug!("{} has no architecture suffix, leaving it untouched", name);
                scan.standalone.push(path);
            }
        }

        scan
    }

    /// List regular files directly inside `dir`, sorted by name, and group them
    pub async fn scan(dir: &Path, convention: &SuffixConvention, prefix: &str) -> Result<Self, BuildError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                debug!("ignoring non-file entry {:?}", entry.path());
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("skip {:?}: file name is not valid UTF-8", name),
            }
        }

        names.sort();
        Ok(Self::from_names(dir, names, convention, prefix))
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Merge behavior
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePolicy {
    /// Triples built in this run, in build order
    pub expected: Vec<String>,
    /// Refuse to merge when any group lacks (or repeats) an expected triple
    pub require_complete: bool,
}

/// A merged fat library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedArtifact {
    pub path: PathBuf,
    pub triples: Vec<String>,
}

/// Outcome of a successful merge run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub merged: Vec<MergedArtifact>,
    /// Architecture-independent libraries left as they were
    pub untouched: Vec<PathBuf>,
    /// Files skipped because they are not libraries
    pub skipped: Vec<PathBuf>,
    /// Merged inputs that could not be deleted
    pub leftover: Vec<PathBuf>,
}

/// Merges per-triple static libraries into fat libraries
pub struct LibraryMerger<'a, R: CommandRunner> {
    runner: &'a R,
    tool: String,
    library_prefix: String,
    convention: SuffixConvention,
    policy: MergePolicy,
}

impl<'a, R: CommandRunner> LibraryMerger<'a, R> {
    /// Create a merger invoking `tool` (lipo)
    pub fn new(runner: &'a R, tool: impl Into<String>, convention: SuffixConvention) -> Self {
        Self {
            runner,
            tool: tool.into(),
            library_prefix: "lib".to_string(),
            convention,
            policy: MergePolicy::default(),
        }
    }

    /// Set the static library name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.library_prefix = prefix.into();
        self
    }

    /// Set the completeness policy
    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Merge every group found in `lib_dir`
    pub async fn merge_dir(&self, lib_dir: &Path) -> Result<MergeReport, BuildError> {
        debug!("Scanning {:?}", lib_dir);
        let scan = LibraryScan::scan(lib_dir, &self.convention, &self.library_prefix).await?;

        debug!("Grouping {} libraries", scan.groups.len());
        self.check_completeness(&scan)?;

        let mut report = MergeReport {
            untouched: scan.standalone,
            skipped: scan.skipped,
            ..Default::default()
        };

        if scan.groups.is_empty() {
            warn!("no per-architecture libraries found in {:?}", lib_dir);
            return Ok(report);
        }

        for group in scan.groups.values() {
            let artifact = self.merge_group(lib_dir, group).await?;
            report.leftover.extend(self.remove_inputs(group).await);
            report.merged.push(artifact);
        }

        info!("merged {} libraries in {:?}", report.merged.len(), lib_dir);
        Ok(report)
    }

    fn check_completeness(&self, scan: &LibraryScan) -> Result<(), BuildError> {
        if self.policy.expected.is_empty() {
            return Ok(());
        }

        for group in scan.groups.values() {
            let missing = group.missing(&self.policy.expected);
            let duplicated = group.duplicated();
            if missing.is_empty() && duplicated.is_empty() {
                continue;
            }

            if self.policy.require_complete {
                error!(
                    "{} is incomplete: missing {:?}, duplicated {:?}",
                    group.file_name, missing, duplicated
                );
                return Err(BuildError::IncompleteGroup {
                    library: group.file_name.clone(),
                    missing: missing.into_iter().map(String::from).collect(),
                    duplicated: duplicated.into_iter().map(String::from).collect(),
                });
            }

            warn!(
                "{} will be merged without {:?} (duplicated {:?})",
                group.file_name, missing, duplicated
            );
        }
        Ok(())
    }

    /// Replace `<lib_dir>/<file_name>` with the merge of the group's members
    async fn merge_group(&self, lib_dir: &Path, group: &LibraryGroup) -> Result<MergedArtifact, BuildError> {
        let dest = lib_dir.join(&group.file_name);

        match tokio::fs::remove_file(&dest).await {
            Ok(()) => debug!("removed previous {:?}", dest),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let spec = CommandSpec::new(&self.tool, lib_dir)
            .args(["-create", "-output"])
            .arg(dest.to_string_lossy())
            .args(group.members.iter().map(|m| m.path.to_string_lossy().into_owned()));

        info!("{} <- {}", group.file_name, group.triples().join(", "));

        match self.runner.run(&spec).await {
            Ok(_) => Ok(MergedArtifact {
                path: dest,
                triples: group.triples().into_iter().map(String::from).collect(),
            }),
            Err(BuildError::CommandFailed { code, output, .. }) => {
                error!("{} exited with {:?}: {}", self.tool, code, output);
                Err(BuildError::MergeFailed {
                    library: group.file_name.clone(),
                    reason: format!("{} exited with {:?}: {}", self.tool, code, output.trim_end()),
                })
            }
            Err(err) => {
                error!("{}", err);
                Err(BuildError::MergeFailed {
                    library: group.file_name.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Delete merged inputs; returns the ones that could not be deleted
    async fn remove_inputs(&self, group: &LibraryGroup) -> Vec<PathBuf> {
        let mut leftover = Vec::new();
        for member in &group.members {
            if let Err(e) = tokio::fs::remove_file(&member.path).await {
                warn!("could not remove {:?}: {}", member.path, e);
                leftover.push(member.path.clone());
            }
        }
        leftover
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::runner::testing::FakeRunner;
    use crate::runner::CommandOutput;

    /// Records whether the destination still existed when invoked, writes it,
    /// and turns `steal` into a directory so that removing that input fails.
    struct StealingRunner {
        steal: PathBuf,
        saw_existing_dest: Mutex<bool>,
    }

    impl CommandRunner for StealingRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, BuildError> {
            let dest = spec.cwd.join(&spec.args[2]);
            if dest.exists() {
                *self.saw_existing_dest.lock().unwrap() = true;
            }
            std::fs::write(&dest, "fat")?;
            std::fs::remove_file(&self.steal)?;
            std::fs::create_dir(&self.steal)?;
            Ok(CommandOutput::default())
        }
    }

    const TRIPLES: [&str; 5] = ["armv7", "armv7s", "arm64", "i386", "x86_64"];

    fn convention() -> SuffixConvention {
        SuffixConvention::new(TRIPLES, vec!["apple-darwin_ios".to_string()])
    }

    fn touch(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_split_suffix() {
        let c = convention();
        assert_eq!(c.split("libfoo-armv7"), Some(("libfoo", "armv7")));
        assert_eq!(c.split("libfoo-armv7s"), Some(("libfoo", "armv7s")));
        assert_eq!(c.split("libpjlib-util-x86_64-apple-darwin_ios"), Some(("libpjlib-util", "x86_64")));
        assert_eq!(c.split("libfoo"), None);
        assert_eq!(c.split("-arm64"), None);
    }

    #[test]
    fn test_split_requires_exact_suffix() {
        let c = convention();
        // a triple in the middle of the name is part of the logical name
        assert_eq!(c.split("libi386emu-arm64"), Some(("libi386emu", "arm64")));
        assert_eq!(c.split("libarm64tools"), None);
        assert_eq!(c.split("libfoo-arm64-extra"), None);
    }

    #[test]
    fn test_grouping() {
        let names = ["libbar-armv7.a", "libfoo-arm64.a", "libfoo-armv7.a", "libfoo-i386.a"];
        let scan = LibraryScan::from_names(
            Path::new("/lib"),
            names.iter().map(|n| n.to_string()),
            &convention(),
            "lib",
        );

        assert_eq!(scan.groups.len(), 2);
        let keys: Vec<&str> = scan.groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["libbar.a", "libfoo.a"]);

        let foo = &scan.groups["libfoo.a"];
        assert_eq!(foo.name, "libfoo");
        assert_eq!(
            foo.paths(),
            vec![
                Path::new("/lib/libfoo-arm64.a"),
                Path::new("/lib/libfoo-armv7.a"),
                Path::new("/lib/libfoo-i386.a"),
            ]
        );
        assert_eq!(scan.groups["libbar.a"].triples(), vec!["armv7"]);
        assert!(scan.standalone.is_empty());
        assert!(scan.skipped.is_empty());
    }

    #[test]
    fn test_non_library_skipped() {
        let names = ["README.txt", "libfoo-armv7.a"];
        let scan = LibraryScan::from_names(
            Path::new("/lib"),
            names.iter().map(|n| n.to_string()),
            &convention(),
            "lib",
        );

        assert_eq!(scan.skipped, vec![PathBuf::from("/lib/README.txt")]);
        assert_eq!(scan.groups.len(), 1);
    }

    #[test]
    fn test_unsuffixed_library() {
        let names = ["libfoo-armv7.a", "libfoo.a", "libuniversal.a"];
        let scan = LibraryScan::from_names(
            Path::new("/lib"),
            names.iter().map(|n| n.to_string()),
            &convention(),
            "lib",
        );

        // libfoo.a is the output of a previous run and gets overwritten
        assert_eq!(scan.standalone, vec![PathBuf::from("/lib/libuniversal.a")]);
        assert_eq!(scan.groups["libfoo.a"].members.len(), 1);
    }

    #[test]
    fn test_missing_and_duplicated() {
        let group = LibraryGroup {
            name: "libfoo".into(),
            file_name: "libfoo.a".into(),
            members: vec![
                GroupMember { path: "/lib/libfoo-arm64.a".into(), triple: "arm64".into() },
                GroupMember { path: "/lib/libfoo-arm64-apple-darwin_ios.a".into(), triple: "arm64".into() },
            ],
        };
        let expected = vec!["armv7".to_string(), "arm64".to_string()];
        assert_eq!(group.missing(&expected), vec!["armv7"]);
        assert_eq!(group.duplicated(), vec!["arm64"]);
    }

    #[tokio::test]
    async fn test_merge_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path();
        touch(lib, "libfoo-armv7.a", "A");
        touch(lib, "libfoo-arm64.a", "B");
        touch(lib, "libfoo-i386.a", "C");
        touch(lib, "libbar-armv7.a", "D");
        touch(lib, "README.txt", "docs");

        let runner = FakeRunner::default();
        let merger = LibraryMerger::new(&runner, "lipo", convention());
        let report = merger.merge_dir(lib).await.unwrap();

        assert_eq!(file_names(lib), vec!["README.txt", "libbar.a", "libfoo.a"]);
        assert_eq!(std::fs::read_to_string(lib.join("libfoo.a")).unwrap(), "BAC");
        assert_eq!(report.merged.len(), 2);
        assert_eq!(report.merged[1].triples, vec!["arm64", "armv7", "i386"]);
        assert_eq!(report.skipped, vec![lib.join("README.txt")]);
        assert!(report.leftover.is_empty());

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].program, "lipo");
        assert_eq!(calls[0].args[..3], ["-create", "-output", lib.join("libbar.a").to_str().unwrap()]);
        assert_eq!(calls[0].cwd, lib);
    }

    #[tokio::test]
    async fn test_existing_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path();
        touch(lib, "libfoo.a", "stale fat library");
        touch(lib, "libfoo-armv7.a", "A");
        touch(lib, "libfoo-arm64.a", "B");

        let runner = FakeRunner::default();
        LibraryMerger::new(&runner, "lipo", convention())
            .merge_dir(lib)
            .await
            .unwrap();

        assert_eq!(file_names(lib), vec!["libfoo.a"]);
        assert_eq!(std::fs::read_to_string(lib.join("libfoo.a")).unwrap(), "BA");
    }

    #[tokio::test]
    async fn test_old_output_removed_before_merge_and_cleanup_failure_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path();
        touch(lib, "libfoo.a", "stale fat library");
        touch(lib, "libfoo-armv7.a", "A");
        touch(lib, "libfoo-arm64.a", "B");
        touch(lib, "libfoo-i386.a", "C");

        let runner = StealingRunner {
            steal: lib.join("libfoo-arm64.a"),
            saw_existing_dest: Mutex::new(false),
        };
        let report = LibraryMerger::new(&runner, "lipo", convention())
            .merge_dir(lib)
            .await
            .unwrap();

        assert!(!*runner.saw_existing_dest.lock().unwrap());
        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.leftover, vec![lib.join("libfoo-arm64.a")]);
        // the other inputs are still removed
        assert_eq!(file_names(lib), vec!["libfoo-arm64.a", "libfoo.a"]);
        assert!(lib.join("libfoo-arm64.a").is_dir());
        assert_eq!(std::fs::read_to_string(lib.join("libfoo.a")).unwrap(), "fat");
    }

    #[tokio::test]
    async fn test_failure_keeps_inputs_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path();
        touch(lib, "libbar-armv7.a", "D");
        touch(lib, "libfoo-armv7.a", "A");
        touch(lib, "libfoo-arm64.a", "B");
        touch(lib, "libzed-armv7.a", "Z");

        let runner = FakeRunner::failing_on("libfoo.a");
        let err = LibraryMerger::new(&runner, "lipo", convention())
            .merge_dir(lib)
            .await
            .unwrap_err();

        match err {
            BuildError::MergeFailed { library, reason } => {
                assert_eq!(library, "libfoo.a");
                assert!(reason.contains("simulated failure"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // libbar was merged before the failure; libfoo inputs stay; libzed never ran
        assert_eq!(
            file_names(lib),
            vec!["libbar.a", "libfoo-arm64.a", "libfoo-armv7.a", "libzed-armv7.a"]
        );
        assert_eq!(runner.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_group_merges_when_lenient() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path();
        touch(lib, "libfoo-armv7.a", "A");
        touch(lib, "libfoo-arm64.a", "B");

        let runner = FakeRunner::default();
        let policy = MergePolicy {
            expected: vec!["armv7".into(), "armv7s".into(), "arm64".into()],
            require_complete: false,
        };
        let report = LibraryMerger::new(&runner, "lipo", convention())
            .with_policy(policy)
            .merge_dir(lib)
            .await
            .unwrap();

        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.merged[0].triples, vec!["arm64", "armv7"]);
        assert_eq!(file_names(lib), vec!["libfoo.a"]);
    }

    #[tokio::test]
    async fn test_partial_group_rejected_when_strict() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path();
        touch(lib, "libbar-armv7.a", "A");
        touch(lib, "libbar-armv7s.a", "B");
        touch(lib, "libfoo-armv7.a", "A");
        touch(lib, "libfoo-arm64.a", "B");

        let runner = FakeRunner::default();
        let policy = MergePolicy {
            expected: vec!["armv7".into(), "armv7s".into()],
            require_complete: true,
        };
        let err = LibraryMerger::new(&runner, "lipo", convention())
            .with_policy(policy)
            .merge_dir(lib)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::IncompleteGroup { ref library, ref missing, .. }
                if library == "libfoo.a" && missing == &vec!["armv7s".to_string()]
        ));
        // nothing merged, nothing deleted
        assert!(runner.lines().is_empty());
        assert_eq!(file_names(lib).len(), 4);
    }

    #[tokio::test]
    async fn test_standalone_and_directories_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path();
        touch(lib, "libuniversal.a", "U");
        std::fs::create_dir(lib.join("libcache-armv7.a")).unwrap();

        let runner = FakeRunner::default();
        let report = LibraryMerger::new(&runner, "lipo", convention())
            .merge_dir(lib)
            .await
            .unwrap();

        assert!(report.merged.is_empty());
        assert_eq!(report.untouched, vec![lib.join("libuniversal.a")]);
        assert!(lib.join("libcache-armv7.a").is_dir());
        assert!(runner.lines().is_empty());
    }

    #[tokio::test]
    async fn test_missing_lib_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default();
        let result = LibraryMerger::new(&runner, "lipo", convention())
            .merge_dir(&dir.path().join("lib"))
            .await;
        assert!(matches!(result, Err(BuildError::Io(_))));
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("libfoo-armv7.a"), ("libfoo-armv7", Some("a")));
        assert_eq!(split_extension("libfoo"), ("libfoo", None));
    }
}
