//! Host-side supervision of the sandbox child.

pub mod launch;
pub mod process;

pub use launch::LaunchConfig;
pub use process::ProcessHandle;
