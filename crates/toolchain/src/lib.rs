//! Turnkey Toolchain
//!
//! Locates the external binaries the build orchestrator drives (cmake, make,
//! git, ant, ndk-build, swig) and reports basic facts about the host machine.

pub mod host;
pub mod resolver;

pub use host::{cpu_count, HostInfo};
pub use resolver::ToolResolver;
