//! Desktop Pipeline
//!
//! The cmake/make pipeline for desktop hosts.

use std::path::PathBuf;

use crate::archive::ArchiveSpec;
use crate::environment::BuildEnvironment;
use crate::BuildError;

/// Directories archived after a desktop build
const DESKTOP_ARCHIVE_DIRS: &[&str] = &["bin", "lib", "include"];

/// Shared build environment plus the desktop packaging extras
#[derive(Debug, Clone)]
pub struct DesktopEnv {
    pub env: BuildEnvironment,
    pub generator: Option<String>,
    pub output_archive: Option<PathBuf>,
    pub archive_copy_to: Option<PathBuf>,
}

impl DesktopEnv {
    pub fn new(env: BuildEnvironment) -> Self {
        Self {
            env,
            generator: None,
            output_archive: None,
            archive_copy_to: None,
        }
    }

    /// Select a cmake generator other than the default
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = Some(generator.into());
        self
    }

    /// Archive build outputs to this path after a successful build
    pub fn with_output_archive(mut self, archive_path: impl Into<PathBuf>) -> Self {
        self.output_archive = Some(archive_path.into());
        self
    }

    /// Copy the finished archive to this location
    pub fn with_archive_copy_to(mut self, dest: impl Into<PathBuf>) -> Self {
        self.archive_copy_to = Some(dest.into());
        self
    }

    /// The desktop pipeline
    ///
    /// Clean (when enabled), configure with cmake, compile with make, then
    /// archive the build outputs when a destination is configured. The
    /// first failure aborts the remaining steps.
    pub fn build(&self) -> Result<(), BuildError> {
        self.env.git_clean()?;
        self.env.run_cmake(self.generator.as_deref())?;
        self.env.run_make()?;
        if let Some(archive_path) = &self.output_archive {
            let mut spec =
                ArchiveSpec::new(DESKTOP_ARCHIVE_DIRS.iter().copied(), archive_path.clone());
            if let Some(copy_to) = &self.archive_copy_to {
                spec = spec.with_copy_to(copy_to.clone());
            }
            self.env.make_archive(&spec)?;
        }
        Ok(())
    }
}
