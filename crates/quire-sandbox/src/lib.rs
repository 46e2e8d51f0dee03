//! Sandboxed document builds for the Quire service.
//!
//! A build never touches the live project. The [`Isolator`] snapshots the
//! project into a private directory under the build root, starts exactly one
//! container over that directory through the [`Supervisor`], collects
//! `out.pdf` together with the captured output, and removes the directory on
//! every path out.
//!
//! The [`Supervisor`] owns the wall-clock budget. When the deadline passes it
//! kills the container by name through the runtime client, waits at most the
//! kill grace for things to settle, and then kills the local client process
//! itself. A compile call therefore returns within deadline plus grace no
//! matter how the document compiler behaves.

mod error;
mod isolator;
mod result;
mod runtime;
mod supervisor;

#[cfg(test)]
mod tests;

pub use self::error::{BuildError, SupervisorError};
pub use self::isolator::{BUILD_DIR_PREFIX, BuildSettings, Isolator};
pub use self::result::{BuildResult, BuildStatus};
pub use self::runtime::{
    ARTIFACT_NAME, COMPILER, CONTAINER_PREFIX, ContainerRuntime, MOUNT_POINT, RunInvocation,
    generate_container_name,
};
pub use self::supervisor::{
    MAX_KILL_GRACE, RunOutcome, SupervisedRun, Supervisor, SupervisorState,
};
