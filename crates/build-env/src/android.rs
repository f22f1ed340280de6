//! Android Pipeline
//!
//! The ant/ndk-build pipeline and the android-specific settings layered
//! over the shared build environment.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;
use turnkey_toolchain::ToolResolver;

use crate::archive::ArchiveSpec;
use crate::environment::{split_flags, BuildEnvironment};
use crate::process::{check_tool, ProcessRunner, ToolInvocation};
use crate::settings::{non_empty_path, non_empty_string, non_empty_var, path_var};
use crate::BuildError;

/// Environment override for the ant flag string
pub const ANT_FLAGS_VAR: &str = "ANT_FLAGS";
/// Environment override for the swig binary path
pub const SWIG_BIN_VAR: &str = "SWIG_BIN";
/// Environment override for the swig support-library directory
pub const SWIG_LIB_VAR: &str = "SWIG_LIB";
/// Environment override for the native source tree handed to sub-builds
pub const NATIVE_SRC_PATH_VAR: &str = "NATIVE_SRC_PATH";

/// Ant target used when nothing else is configured
pub const DEFAULT_ANT_FLAGS: &str = "release";

/// Directories archived after an android build
const ANDROID_ARCHIVE_DIRS: &[&str] = &["bin", "libs", "gen", "obj"];
/// Subtrees skipped when collecting built APKs
const APK_EXCLUDE_DIRS: &[&str] = &["latest"];

/// Android-specific settings layered over [`crate::BuildSettings`]
#[derive(Debug, Clone)]
pub struct AndroidSettings {
    pub ant_flags: String,
    pub swig_bin: Option<PathBuf>,
    pub swig_lib: Option<PathBuf>,
    pub native_src_path: Option<PathBuf>,
    pub output_archive: Option<PathBuf>,
    pub output_apk_dir: Option<PathBuf>,
}

impl Default for AndroidSettings {
    fn default() -> Self {
        Self {
            ant_flags: DEFAULT_ANT_FLAGS.to_string(),
            swig_bin: None,
            swig_lib: None,
            native_src_path: None,
            output_archive: None,
            output_apk_dir: None,
        }
    }
}

impl AndroidSettings {
    /// Defaults from environment variables and search-path discovery
    pub fn defaults(resolver: &ToolResolver) -> Self {
        Self {
            ant_flags: non_empty_var(ANT_FLAGS_VAR)
                .unwrap_or_else(|| DEFAULT_ANT_FLAGS.to_string()),
            swig_bin: resolver.resolve("swig", None, SWIG_BIN_VAR),
            swig_lib: path_var(SWIG_LIB_VAR),
            native_src_path: path_var(NATIVE_SRC_PATH_VAR),
            ..Self::default()
        }
    }

    /// Apply one layer of overrides; empty values count as absent
    pub fn apply(&mut self, patch: AndroidPatch) {
        if let Some(flags) = non_empty_string(patch.ant_flags) {
            self.ant_flags = flags;
        }
        if let Some(path) = non_empty_path(patch.swig_bin) {
            self.swig_bin = Some(path);
        }
        if let Some(path) = non_empty_path(patch.swig_lib) {
            self.swig_lib = Some(path);
        }
        if let Some(path) = non_empty_path(patch.native_src_path) {
            self.native_src_path = Some(path);
        }
        if let Some(path) = non_empty_path(patch.output_archive) {
            self.output_archive = Some(path);
        }
        if let Some(path) = non_empty_path(patch.output_apk_dir) {
            self.output_apk_dir = Some(path);
        }
    }
}

/// Optional android overrides (the `[android]` table of `turnkey.toml`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AndroidPatch {
    pub ant_flags: Option<String>,
    pub swig_bin: Option<PathBuf>,
    pub swig_lib: Option<PathBuf>,
    pub native_src_path: Option<PathBuf>,
    pub output_archive: Option<PathBuf>,
    pub output_apk_dir: Option<PathBuf>,
}

/// Shared build environment plus the android packaging extras
#[derive(Debug, Clone)]
pub struct AndroidEnv {
    pub env: BuildEnvironment,
    pub ant_flags: String,
    pub output_archive: Option<PathBuf>,
    pub output_apk_dir: Option<PathBuf>,
}

impl AndroidEnv {
    /// Combine the shared environment with the android extension
    ///
    /// Swig values land in the tool environment here, before any pipeline
    /// step runs, because packaging sub-builds read them. When a swig
    /// binary is known but its support library is not, the binary itself is
    /// asked (`swig -swiglib`); no answer leaves the variable unset.
    pub fn new(mut env: BuildEnvironment, android: AndroidSettings) -> Self {
        if let Some(native_src) = &android.native_src_path {
            env.tool_env.set(NATIVE_SRC_PATH_VAR, native_src);
        }
        if let Some(swig_bin) = &android.swig_bin {
            env.tool_env.set(SWIG_BIN_VAR, swig_bin);
            let swig_lib = android.swig_lib.clone().or_else(|| {
                let query = ToolInvocation::new(swig_bin, &env.project_dir).arg("-swiglib");
                let answer = ProcessRunner::capture(&query, &env.tool_env);
                if answer.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(answer))
                }
            });
            if let Some(swig_lib) = swig_lib {
                env.tool_env.set(SWIG_LIB_VAR, swig_lib);
            }
        } else if let Some(swig_lib) = &android.swig_lib {
            env.tool_env.set(SWIG_LIB_VAR, swig_lib);
        }
        Self {
            env,
            ant_flags: android.ant_flags,
            output_archive: android.output_archive,
            output_apk_dir: android.output_apk_dir,
        }
    }

    /// Package the application with ant
    pub fn run_ant(&self) -> Result<(), BuildError> {
        info!("running ant in {}", self.env.project_dir.display());
        let invocation = self.ant_invocation()?;
        ProcessRunner::run(&invocation, &self.env.tool_env)
    }

    fn ant_invocation(&self) -> Result<ToolInvocation, BuildError> {
        let ant = check_tool("ant", self.env.ant_path.as_deref())?;
        let invocation = ToolInvocation::new(ant, &self.env.project_dir);
        Ok(invocation.args(split_flags(Some(&self.ant_flags))?))
    }

    /// The android pipeline
    ///
    /// Clean (when enabled), build the native libraries, package with ant,
    /// then archive the build outputs and collect APKs when destinations
    /// are configured. The first failure aborts the remaining steps.
    pub fn build(&self) -> Result<(), BuildError> {
        self.env.git_clean()?;
        self.env.build_ndk_projects(&[PathBuf::from(".")], None)?;
        self.run_ant()?;
        if let Some(archive_path) = &self.output_archive {
            let spec = ArchiveSpec::new(ANDROID_ARCHIVE_DIRS.iter().copied(), archive_path.clone());
            self.env.make_archive(&spec)?;
        }
        if let Some(apk_dir) = &self.output_apk_dir {
            let exclude: Vec<String> = APK_EXCLUDE_DIRS.iter().map(|dir| dir.to_string()).collect();
            self.env
                .copy_artifacts(&[PathBuf::from("bin")], ".apk", apk_dir, true, &exclude)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::ffi::OsStr;
    use std::path::Path;

    use crate::settings::BuildSettings;

    fn env_for(project_dir: &Path) -> BuildEnvironment {
        BuildEnvironment::new(BuildSettings {
            project_dir: project_dir.to_path_buf(),
            jobs: 2,
            ..BuildSettings::default()
        })
    }

    #[test]
    #[serial]
    fn test_defaults_read_ant_flags_env() {
        temp_env::with_vars(
            [
                (ANT_FLAGS_VAR, Some("clean debug")),
                (SWIG_BIN_VAR, None),
                (SWIG_LIB_VAR, None),
                (NATIVE_SRC_PATH_VAR, None),
            ],
            || {
                let dir = tempfile::tempdir().unwrap();
                let resolver = ToolResolver::with_search_path(dir.path());
                let android = AndroidSettings::defaults(&resolver);
                assert_eq!(android.ant_flags, "clean debug");
                assert_eq!(android.swig_bin, None);
            },
        );
    }

    #[test]
    #[serial]
    fn test_defaults_fall_back_to_release() {
        temp_env::with_vars(
            [
                (ANT_FLAGS_VAR, None::<&str>),
                (SWIG_BIN_VAR, None),
                (SWIG_LIB_VAR, None),
                (NATIVE_SRC_PATH_VAR, None),
            ],
            || {
                let dir = tempfile::tempdir().unwrap();
                let resolver = ToolResolver::with_search_path(dir.path());
                let android = AndroidSettings::defaults(&resolver);
                assert_eq!(android.ant_flags, DEFAULT_ANT_FLAGS);
            },
        );
    }

    #[test]
    fn test_apply_overrides_and_ignores_empties() {
        let mut android = AndroidSettings::default();
        android.apply(AndroidPatch {
            ant_flags: Some("clean release".to_string()),
            swig_bin: Some(PathBuf::from("/opt/swig")),
            output_apk_dir: Some(PathBuf::new()),
            ..AndroidPatch::default()
        });
        assert_eq!(android.ant_flags, "clean release");
        assert_eq!(android.swig_bin, Some(PathBuf::from("/opt/swig")));
        assert_eq!(android.output_apk_dir, None);

        android.apply(AndroidPatch {
            ant_flags: Some(String::new()),
            ..AndroidPatch::default()
        });
        assert_eq!(android.ant_flags, "clean release");
    }

    #[test]
    fn test_new_exports_swig_and_native_src() {
        let dir = tempfile::tempdir().unwrap();
        let android = AndroidSettings {
            swig_bin: Some(PathBuf::from("/opt/swig/bin/swig")),
            swig_lib: Some(PathBuf::from("/opt/swig/share")),
            native_src_path: Some(PathBuf::from("/src/native")),
            ..AndroidSettings::default()
        };
        let android_env = AndroidEnv::new(env_for(dir.path()), android);
        let tool_env = &android_env.env.tool_env;
        assert_eq!(tool_env.get(SWIG_BIN_VAR), Some(OsStr::new("/opt/swig/bin/swig")));
        assert_eq!(tool_env.get(SWIG_LIB_VAR), Some(OsStr::new("/opt/swig/share")));
        assert_eq!(tool_env.get(NATIVE_SRC_PATH_VAR), Some(OsStr::new("/src/native")));
    }

    #[cfg(unix)]
    #[test]
    fn test_new_queries_swig_for_missing_lib() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let swig = dir.path().join("swig");
        std::fs::write(&swig, "#!/bin/sh\nprintf '/opt/swig/lib\\n'\n").unwrap();
        let mut perms = std::fs::metadata(&swig).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&swig, perms).unwrap();

        let android = AndroidSettings {
            swig_bin: Some(swig),
            ..AndroidSettings::default()
        };
        let android_env = AndroidEnv::new(env_for(dir.path()), android);
        assert_eq!(
            android_env.env.tool_env.get(SWIG_LIB_VAR),
            Some(OsStr::new("/opt/swig/lib"))
        );
    }

    #[test]
    fn test_new_leaves_swig_lib_unset_when_query_fails() {
        let dir = tempfile::tempdir().unwrap();
        let android = AndroidSettings {
            swig_bin: Some(PathBuf::from("/no/such/swig")),
            ..AndroidSettings::default()
        };
        let android_env = AndroidEnv::new(env_for(dir.path()), android);
        assert_eq!(android_env.env.tool_env.get(SWIG_LIB_VAR), None);
        assert!(android_env.env.tool_env.get(SWIG_BIN_VAR).is_some());
    }

    #[test]
    fn test_ant_invocation_splits_flag_string() {
        let dir = tempfile::tempdir().unwrap();
        let ant = dir.path().join("ant");
        std::fs::write(&ant, "").unwrap();
        let mut env = env_for(dir.path());
        env.ant_path = Some(ant.clone());
        let android_env = AndroidEnv::new(
            env,
            AndroidSettings {
                ant_flags: "clean release".to_string(),
                ..AndroidSettings::default()
            },
        );
        let invocation = android_env.ant_invocation().unwrap();
        let argv: Vec<String> = invocation
            .argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            argv,
            vec![
                ant.to_string_lossy().into_owned(),
                "clean".to_string(),
                "release".to_string(),
            ]
        );
    }

    #[test]
    fn test_ant_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let android_env = AndroidEnv::new(env_for(dir.path()), AndroidSettings::default());
        let err = android_env.run_ant().unwrap_err();
        match err {
            BuildError::ToolMissing { tool, .. } => assert_eq!(tool, "ant"),
            other => panic!("expected ToolMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_build_fails_on_native_step_first() {
        let dir = tempfile::tempdir().unwrap();
        let android_env = AndroidEnv::new(env_for(dir.path()), AndroidSettings::default());
        let err = android_env.build().unwrap_err();
        match err {
            BuildError::ToolMissing { tool, .. } => assert_eq!(tool, "ndk-build"),
            other => panic!("expected ToolMissing, got {other:?}"),
        }
    }
}
