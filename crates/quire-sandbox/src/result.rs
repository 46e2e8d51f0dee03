//! Outcome of a single build.

use std::time::Duration;

/// How a build ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// The compiler exited and left an artifact.
    Produced,
    /// The compiler exited without leaving an artifact.
    NoArtifact,
    /// The deadline passed and the container was killed.
    TimedOut,
}

impl BuildStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Produced => "produced",
            Self::NoArtifact => "no_artifact",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Artifact and captured output of a build.
///
/// A missing artifact is a valid outcome. Captured text does not distinguish
/// a compiler that printed nothing from one that was never reached; use
/// [`BuildResult::status`] for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Name of the container the build ran in.
    pub container_name: String,
    /// How the build ended.
    pub status: BuildStatus,
    /// Exit code of the runtime client when it exited on its own.
    pub exit_code: Option<i32>,
    /// Contents of `out.pdf` when present.
    pub artifact: Option<Vec<u8>>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock time spent supervising the container.
    pub elapsed: Duration,
}

impl BuildResult {
    /// Returns true when the build timed out.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.status == BuildStatus::TimedOut
    }
}
