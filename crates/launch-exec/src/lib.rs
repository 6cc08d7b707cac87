//! Local backends: child processes, docker containers, source "builds" and
//! on-disk status trackers.

mod error;
pub use error::{ExecError, ExecResult};

mod util;

#[cfg(feature = "process")]
pub mod process;
#[cfg(feature = "process")]
pub use process::{ProcConfig, ProcessHandle, ProcessRunner};

#[cfg(feature = "container")]
pub mod container;
#[cfg(feature = "container")]
pub use container::ContainerRunner;

pub mod builder;
pub use builder::SourceBuilder;

pub mod tracker;
pub use tracker::{DirTracker, DirTrackerFactory};

pub mod prelude {
    pub use crate::builder::SourceBuilder;
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::tracker::DirTrackerFactory;

    #[cfg(feature = "container")]
    pub use crate::container::ContainerRunner;
    #[cfg(feature = "process")]
    pub use crate::process::ProcessRunner;
}
