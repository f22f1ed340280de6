//! Turnkey Build Environment
//!
//! The configuration-resolution and packaging layer behind the turnkey CLI:
//! a resolved build environment, synchronous tool invocation, zip archiving
//! with atomic replace, and extension-filtered artifact collection.

pub mod android;
pub mod archive;
pub mod artifacts;
pub mod desktop;
pub mod environment;
pub mod process;
pub mod settings;

pub use android::{AndroidEnv, AndroidPatch, AndroidSettings};
pub use archive::{ArchiveSpec, ArchiveWriter};
pub use artifacts::ArtifactCopier;
pub use desktop::DesktopEnv;
pub use environment::{BuildEnvironment, ToolEnv, DEFAULT_CMAKE_GENERATOR};
pub use process::{check_tool, ProcessRunner, ToolInvocation};
pub use settings::{BuildSettings, ConfigFile, SettingsPatch};

use std::io;
use std::path::{Path, PathBuf};

/// Build orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A required external binary is absent or its configured path is wrong
    #[error("{} not found{}", tool, display_tool_path(path))]
    ToolMissing { tool: String, path: Option<PathBuf> },

    /// An invoked tool ran and exited nonzero
    #[error("error {code} running {program}: {argv:?}")]
    Subprocess {
        program: String,
        argv: Vec<String>,
        code: i32,
    },

    /// A filesystem operation failed on a known path
    #[error("cannot access {}: {source}", path.display())]
    Filesystem { path: PathBuf, source: io::Error },

    /// Bad settings input, such as a malformed flag string
    #[error("configuration error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl BuildError {
    /// Process exit status reported for this failure kind
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::ToolMissing { .. } => 1,
            BuildError::Subprocess { .. } => 2,
            _ => -1,
        }
    }

    pub(crate) fn filesystem(path: &Path, source: io::Error) -> Self {
        BuildError::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn display_tool_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" at path {}", path.display()),
        None => String::new(),
    }
}
