//! Build Environment
//!
//! The resolved record every pipeline runs against, plus the shared tool
//! operations (cmake, make, git clean, ndk-build) built on top of it.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::{ArchiveSpec, ArchiveWriter};
use crate::artifacts::ArtifactCopier;
use crate::process::{check_tool, ProcessRunner, ToolInvocation};
use crate::settings::{BuildSettings, ANDROID_SDK_HOME_VAR, NDK_HOME_VAR};
use crate::BuildError;

/// Generator handed to cmake when none is configured
pub const DEFAULT_CMAKE_GENERATOR: &str = "Unix Makefiles";

/// Extra environment variables handed to child tool invocations
///
/// Carries resolved values (SDK and NDK homes, swig locations) to the tools
/// that read them, without mutating the orchestrator's own environment. The
/// map is overlaid on the inherited environment at spawn time; iteration
/// order is stable so logs and tests see a deterministic view.
#[derive(Debug, Clone, Default)]
pub struct ToolEnv {
    vars: BTreeMap<String, OsString>,
}

impl ToolEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable; empty values are dropped rather than exported
    pub fn set(&mut self, key: impl Into<String>, value: impl AsRef<OsStr>) {
        let value = value.as_ref();
        if !value.is_empty() {
            self.vars.insert(key.into(), value.to_os_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(key).map(OsString::as_os_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OsString)> {
        self.vars.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Resolved build settings plus the tool operations that consume them
///
/// Fields are plain and public: the record is assembled once from
/// [`BuildSettings`] and may be adjusted by the caller before any build
/// action runs, but nothing re-resolves it afterwards.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    pub project_dir: PathBuf,
    pub jobs: u32,
    pub verbose: bool,
    pub enable_git_clean: bool,
    pub cmake_path: Option<PathBuf>,
    pub make_path: Option<PathBuf>,
    pub git_path: Option<PathBuf>,
    pub ant_path: Option<PathBuf>,
    pub cmake_flags: Option<String>,
    pub make_flags: Option<String>,
    pub sdk_home: Option<PathBuf>,
    pub ndk_home: Option<PathBuf>,
    pub host_os: String,
    pub host_arch: String,
    pub tool_env: ToolEnv,
}

impl BuildEnvironment {
    /// Build the environment record from merged settings
    ///
    /// Settings carry over verbatim (resolution already happened upstream).
    /// The SDK and NDK homes are exported into the tool environment so
    /// child builds can read them under their usual variable names.
    pub fn new(settings: BuildSettings) -> Self {
        let mut tool_env = ToolEnv::new();
        if let Some(sdk) = &settings.sdk_home {
            tool_env.set(ANDROID_SDK_HOME_VAR, sdk);
        }
        if let Some(ndk) = &settings.ndk_home {
            tool_env.set(NDK_HOME_VAR, ndk);
        }
        debug!(
            "build environment set up for {}",
            settings.project_dir.display()
        );
        Self {
            project_dir: settings.project_dir,
            jobs: settings.jobs,
            verbose: settings.verbose,
            enable_git_clean: settings.git_clean,
            cmake_path: settings.cmake_path,
            make_path: settings.make_path,
            git_path: settings.git_path,
            ant_path: settings.ant_path,
            cmake_flags: settings.cmake_flags,
            make_flags: settings.make_flags,
            sdk_home: settings.sdk_home,
            ndk_home: settings.ndk_home,
            host_os: settings.host_os,
            host_arch: settings.host_arch,
            tool_env,
        }
    }

    /// Configure the project with cmake
    pub fn run_cmake(&self, generator: Option<&str>) -> Result<(), BuildError> {
        info!("running cmake in {}", self.project_dir.display());
        let invocation = self.cmake_invocation(generator)?;
        ProcessRunner::run(&invocation, &self.tool_env)
    }

    fn cmake_invocation(&self, generator: Option<&str>) -> Result<ToolInvocation, BuildError> {
        let cmake = check_tool("cmake", self.cmake_path.as_deref())?;
        let invocation = ToolInvocation::new(cmake, &self.project_dir)
            .arg("-G")
            .arg(generator.unwrap_or(DEFAULT_CMAKE_GENERATOR))
            .args(split_flags(self.cmake_flags.as_deref())?);
        Ok(invocation.arg(&self.project_dir))
    }

    /// Compile the project with make
    pub fn run_make(&self) -> Result<(), BuildError> {
        info!("running make in {}", self.project_dir.display());
        let invocation = self.make_invocation()?;
        ProcessRunner::run(&invocation, &self.tool_env)
    }

    fn make_invocation(&self) -> Result<ToolInvocation, BuildError> {
        let make = check_tool("make", self.make_path.as_deref())?;
        let invocation = ToolInvocation::new(make, &self.project_dir)
            .arg("-j")
            .arg(self.jobs.to_string())
            .arg("-C")
            .arg(&self.project_dir);
        Ok(invocation.args(split_flags(self.make_flags.as_deref())?))
    }

    /// Reset the work tree to its last committed state
    ///
    /// A no-op when cleaning is disabled or the project root is not a
    /// repository base, so pipelines can call it unconditionally.
    pub fn git_clean(&self) -> Result<(), BuildError> {
        if !self.enable_git_clean {
            return Ok(());
        }
        if !self.project_dir.join(".git").exists() {
            debug!(
                "not cleaning: {} is not a repository base",
                self.project_dir.display()
            );
            return Ok(());
        }
        info!("cleaning work tree in {}", self.project_dir.display());
        let git = check_tool("git", self.git_path.as_deref())?;
        let clean = ToolInvocation::new(git, &self.project_dir)
            .arg("-C")
            .arg(&self.project_dir)
            .args(["clean", "-d", "-f"]);
        ProcessRunner::run(&clean, &self.tool_env)?;
        let reset = ToolInvocation::new(git, &self.project_dir)
            .arg("-C")
            .arg(&self.project_dir)
            .args(["reset", "--hard"]);
        ProcessRunner::run(&reset, &self.tool_env)
    }

    /// Build native libraries with ndk-build
    ///
    /// Each subproject path is taken relative to the project root and built
    /// with a full rebuild. `output` redirects intermediates via `NDK_OUT`.
    pub fn build_ndk_projects(
        &self,
        subprojects: &[PathBuf],
        output: Option<&Path>,
    ) -> Result<(), BuildError> {
        info!(
            "building {} native subproject(s) in {}",
            subprojects.len(),
            self.project_dir.display()
        );
        for invocation in self.ndk_invocations(subprojects, output)? {
            ProcessRunner::run(&invocation, &self.tool_env)?;
        }
        Ok(())
    }

    fn ndk_invocations(
        &self,
        subprojects: &[PathBuf],
        output: Option<&Path>,
    ) -> Result<Vec<ToolInvocation>, BuildError> {
        let ndk_build = self.ndk_home.as_ref().map(|home| home.join("ndk-build"));
        let ndk_build = check_tool("ndk-build", ndk_build.as_deref())?;
        let flags = split_flags(self.make_flags.as_deref())?;
        let mut invocations = Vec::with_capacity(subprojects.len());
        for subproject in subprojects {
            let dir = self.project_dir.join(subproject);
            let mut invocation = ToolInvocation::new(ndk_build, &self.project_dir)
                .arg("-B")
                .arg("-j")
                .arg(self.jobs.to_string())
                .arg("-C")
                .arg(&dir);
            if self.verbose {
                invocation = invocation.arg("-V=1");
            }
            if let Some(out) = output {
                let mut value = OsString::from("NDK_OUT=");
                value.push(self.project_dir.join(out).as_os_str());
                invocation = invocation.arg(value);
            }
            invocations.push(invocation.args(&flags));
        }
        Ok(invocations)
    }

    /// Archive project subdirectories into a zip
    pub fn make_archive(&self, spec: &ArchiveSpec) -> Result<PathBuf, BuildError> {
        ArchiveWriter::new(&self.project_dir).make_archive(spec)
    }

    /// Collect files matching an extension filter into an output directory
    pub fn copy_artifacts(
        &self,
        directories: &[PathBuf],
        extension: &str,
        output_path: &Path,
        flatten: bool,
        exclude: &[String],
    ) -> Result<(), BuildError> {
        ArtifactCopier::new(&self.project_dir).copy_by_extension(
            directories,
            extension,
            output_path,
            flatten,
            exclude,
        )
    }
}

/// Split a free-form flag string into argv fragments
///
/// POSIX shell quoting applies, so a quoted value with spaces survives as a
/// single argument.
pub(crate) fn split_flags(flags: Option<&str>) -> Result<Vec<String>, BuildError> {
    match flags {
        Some(raw) => shell_words::split(raw)
            .map_err(|err| BuildError::Config(format!("malformed flag string {raw:?}: {err}"))),
        None => Ok(Vec::new()),
    }
}
