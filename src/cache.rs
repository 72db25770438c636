//! Stage cache: decides whether a stage has to invoke its external tool.
//!
//! The policy is deliberately simple: `force` always runs, otherwise a stage
//! runs only when its target is not already a regular file. The content of a
//! cached file is never inspected. There is no locking; one writer per output
//! directory is assumed.

use std::path::Path;

use crate::error::PackResult;

/// Existence predicate used by [`StageCache`].
pub trait ArtifactProbe {
    fn is_file(&self, path: &Path) -> bool;
}

/// Looks at the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl ArtifactProbe for FsProbe {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

impl<F> ArtifactProbe for F
where
    F: Fn(&Path) -> bool,
{
    fn is_file(&self, path: &Path) -> bool {
        self(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    Run,
    Reuse,
}

impl CacheDecision {
    #[must_use]
    pub const fn should_run(self) -> bool {
        matches!(self, Self::Run)
    }

    #[must_use]
    pub const fn is_cached(self) -> bool {
        matches!(self, Self::Reuse)
    }
}

#[derive(Debug, Clone)]
pub struct StageCache<P = FsProbe> {
    force: bool,
    probe: P,
}

impl StageCache<FsProbe> {
    #[must_use]
    pub fn new(force: bool) -> Self {
        Self {
            force,
            probe: FsProbe,
        }
    }
}

impl<P: ArtifactProbe> StageCache<P> {
    pub fn with_probe(force: bool, probe: P) -> Self {
        Self { force, probe }
    }

    #[must_use]
    pub fn force(&self) -> bool {
        self.force
    }

    pub fn decide(&self, target: &Path) -> CacheDecision {
        if self.force || !self.probe.is_file(target) {
            CacheDecision::Run
        } else {
            CacheDecision::Reuse
        }
    }
}

/// Delete a previous output before its tool runs again, so the post-run
/// existence check only ever sees what this invocation wrote.
pub(crate) fn remove_stale(path: &Path) -> PackResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}
