//! Build Settings
//!
//! The canonical settings record and the single boundary where defaults,
//! the optional project config file, and CLI overrides are merged.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use turnkey_toolchain::{cpu_count, HostInfo, ToolResolver};

use crate::android::AndroidPatch;
use crate::BuildError;

/// Environment override for the cmake binary path
pub const CMAKE_PATH_VAR: &str = "CMAKE_PATH";
/// Environment override for the make binary path
pub const MAKE_PATH_VAR: &str = "MAKE_PATH";
/// Environment override for the git binary path
pub const GIT_PATH_VAR: &str = "GIT_PATH";
/// Environment override for the ant binary path
pub const ANT_PATH_VAR: &str = "ANT_PATH";
/// Environment override for extra cmake flags
pub const CMAKE_FLAGS_VAR: &str = "CMAKE_FLAGS";
/// Environment override for extra make flags
pub const MAKE_FLAGS_VAR: &str = "MAKE_FLAGS";
/// Environment override for the Android SDK root
pub const ANDROID_SDK_HOME_VAR: &str = "ANDROID_SDK_HOME";
/// Environment override for the Android NDK root
pub const NDK_HOME_VAR: &str = "NDK_HOME";

/// Name of the optional per-project configuration file
pub const CONFIG_FILE_NAME: &str = "turnkey.toml";

/// Merged build settings: every input source converges on this one record
///
/// Fields are plain and public. The record is assembled once, before any
/// pipeline step runs, and nothing re-resolves it afterwards.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub project_dir: PathBuf,
    pub jobs: u32,
    pub verbose: bool,
    pub git_clean: bool,
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
}

impl Default for BuildSettings {
    fn default() -> Self {
        let host = HostInfo::detect();
        Self {
            project_dir: PathBuf::from("."),
            jobs: 1,
            verbose: false,
            git_clean: false,
            cmake_path: None,
            make_path: None,
            git_path: None,
            ant_path: None,
            cmake_flags: None,
            make_flags: None,
            sdk_home: None,
            ndk_home: None,
            host_os: host.os,
            host_arch: host.arch,
        }
    }
}

impl BuildSettings {
    /// Defaults: environment variables first, then search-path discovery
    ///
    /// The current directory becomes the project root and the host core
    /// count the concurrency level. SDK and NDK homes fall back to walking
    /// up from the `android` and `ndk-build` binaries when their variables
    /// are unset.
    pub fn defaults(resolver: &ToolResolver) -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            jobs: cpu_count(),
            cmake_path: resolver.resolve("cmake", None, CMAKE_PATH_VAR),
            make_path: resolver.resolve("make", None, MAKE_PATH_VAR),
            git_path: resolver.resolve("git", None, GIT_PATH_VAR),
            ant_path: resolver.resolve("ant", None, ANT_PATH_VAR),
            cmake_flags: non_empty_var(CMAKE_FLAGS_VAR),
            make_flags: non_empty_var(MAKE_FLAGS_VAR),
            sdk_home: path_var(ANDROID_SDK_HOME_VAR)
                .or_else(|| resolver.find_parent_of_binary("android", 2)),
            ndk_home: path_var(NDK_HOME_VAR)
                .or_else(|| resolver.find_parent_of_binary("ndk-build", 1)),
            ..Self::default()
        }
    }

    /// Apply one layer of overrides
    ///
    /// Empty values in the patch count as absent and leave the current
    /// value in place. A relative project root is anchored to the current
    /// directory so later path math starts from an absolute base.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(dir) = non_empty_path(patch.project_dir) {
            self.project_dir = absolutize(dir);
        }
        if let Some(jobs) = patch.jobs.filter(|jobs| *jobs > 0) {
            self.jobs = jobs;
        }
        if let Some(verbose) = patch.verbose {
            self.verbose = verbose;
        }
        if let Some(git_clean) = patch.git_clean {
            self.git_clean = git_clean;
        }
        if let Some(path) = non_empty_path(patch.cmake_path) {
            self.cmake_path = Some(path);
        }
        if let Some(path) = non_empty_path(patch.make_path) {
            self.make_path = Some(path);
        }
        if let Some(path) = non_empty_path(patch.git_path) {
            self.git_path = Some(path);
        }
        if let Some(path) = non_empty_path(patch.ant_path) {
            self.ant_path = Some(path);
        }
        if let Some(flags) = non_empty_string(patch.cmake_flags) {
            self.cmake_flags = Some(flags);
        }
        if let Some(flags) = non_empty_string(patch.make_flags) {
            self.make_flags = Some(flags);
        }
        if let Some(path) = non_empty_path(patch.sdk_home) {
            self.sdk_home = Some(path);
        }
        if let Some(path) = non_empty_path(patch.ndk_home) {
            self.ndk_home = Some(path);
        }
    }
}

/// One layer of optional overrides for [`BuildSettings`]
///
/// Deserializes straight from the `[build]` table of the project config
/// file; the CLI produces the same shape from its flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub project_dir: Option<PathBuf>,
    pub jobs: Option<u32>,
    pub verbose: Option<bool>,
    pub git_clean: Option<bool>,
    pub cmake_path: Option<PathBuf>,
    pub make_path: Option<PathBuf>,
    pub git_path: Option<PathBuf>,
    pub ant_path: Option<PathBuf>,
    pub cmake_flags: Option<String>,
    pub make_flags: Option<String>,
    pub sdk_home: Option<PathBuf>,
    pub ndk_home: Option<PathBuf>,
}

/// Optional per-project configuration file (`turnkey.toml`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub build: SettingsPatch,
    #[serde(default)]
    pub android: AndroidPatch,
}

impl ConfigFile {
    /// Load `turnkey.toml` from the project root, if present
    pub fn load(project_dir: &Path) -> Result<Self, BuildError> {
        let path = project_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        debug!("loading project config from {}", path.display());
        let content = std::fs::read_to_string(&path)
            .map_err(|source| BuildError::filesystem(&path, source))?;
        Ok(toml::from_str(&content)?)
    }
}

pub(crate) fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

pub(crate) fn path_var(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

pub(crate) fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|path| !path.as_os_str().is_empty())
}

pub(crate) fn non_empty_string(value: Option<String>) -> Option<String> {
    value.filter(|string| !string.is_empty())
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        env::current_dir().map(|cwd| cwd.join(&path)).unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        CMAKE_PATH_VAR,
        MAKE_PATH_VAR,
        GIT_PATH_VAR,
        ANT_PATH_VAR,
        CMAKE_FLAGS_VAR,
        MAKE_FLAGS_VAR,
        ANDROID_SDK_HOME_VAR,
        NDK_HOME_VAR,
    ];

    fn cleared_vars() -> Vec<(&'static str, Option<&'static str>)> {
        vars_with(&[])
    }

    /// Every settings variable cleared except the listed overrides
    fn vars_with(
        overrides: &[(&'static str, &'static str)],
    ) -> Vec<(&'static str, Option<&'static str>)> {
        ALL_VARS
            .iter()
            .map(|var| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == var)
                    .map(|(_, value)| *value);
                (*var, value)
            })
            .collect()
    }

    #[test]
    #[serial]
    fn test_defaults_with_nothing_found() {
        temp_env::with_vars(cleared_vars(), || {
            let dir = tempfile::tempdir().unwrap();
            let resolver = ToolResolver::with_search_path(dir.path());
            let settings = BuildSettings::defaults(&resolver);
            assert_eq!(settings.cmake_path, None);
            assert_eq!(settings.make_path, None);
            assert_eq!(settings.git_path, None);
            assert_eq!(settings.ant_path, None);
            assert_eq!(settings.sdk_home, None);
            assert_eq!(settings.ndk_home, None);
            assert_eq!(settings.cmake_flags, None);
            assert!(settings.jobs >= 1);
            assert!(!settings.verbose);
            assert!(!settings.git_clean);
            assert_eq!(settings.project_dir, env::current_dir().unwrap());
            assert!(!settings.host_os.is_empty());
            assert!(!settings.host_arch.is_empty());
        });
    }

    #[test]
    #[serial]
    fn test_defaults_read_env_vars() {
        let vars = vars_with(&[
            (CMAKE_PATH_VAR, "/env/cmake"),
            (MAKE_FLAGS_VAR, "-k"),
            (NDK_HOME_VAR, "/env/ndk"),
        ]);
        temp_env::with_vars(vars, || {
            let dir = tempfile::tempdir().unwrap();
            let resolver = ToolResolver::with_search_path(dir.path());
            let settings = BuildSettings::defaults(&resolver);
            assert_eq!(settings.cmake_path, Some(PathBuf::from("/env/cmake")));
            assert_eq!(settings.make_flags, Some("-k".to_string()));
            assert_eq!(settings.ndk_home, Some(PathBuf::from("/env/ndk")));
            assert_eq!(settings.make_path, None);
        });
    }

    #[test]
    #[serial]
    fn test_defaults_treat_empty_env_as_absent() {
        let vars = vars_with(&[(CMAKE_FLAGS_VAR, ""), (ANDROID_SDK_HOME_VAR, "")]);
        temp_env::with_vars(vars, || {
            let dir = tempfile::tempdir().unwrap();
            let resolver = ToolResolver::with_search_path(dir.path());
            let settings = BuildSettings::defaults(&resolver);
            assert_eq!(settings.cmake_flags, None);
            assert_eq!(settings.sdk_home, None);
        });
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_defaults_derive_homes_from_discovered_binaries() {
        use std::os::unix::fs::PermissionsExt;

        fn fake_binary(path: &Path) {
            std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
            let mut perms = std::fs::metadata(path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(path, perms).unwrap();
        }

        temp_env::with_vars(cleared_vars(), || {
            let dir = tempfile::tempdir().unwrap();
            let tools_dir = dir.path().join("sdk").join("tools");
            let ndk_dir = dir.path().join("ndk");
            std::fs::create_dir_all(&tools_dir).unwrap();
            std::fs::create_dir_all(&ndk_dir).unwrap();
            fake_binary(&tools_dir.join("android"));
            fake_binary(&ndk_dir.join("ndk-build"));

            let search = env::join_paths([&tools_dir, &ndk_dir]).unwrap();
            let resolver = ToolResolver::with_search_path(search);
            let settings = BuildSettings::defaults(&resolver);
            assert_eq!(settings.sdk_home, Some(dir.path().join("sdk")));
            assert_eq!(settings.ndk_home, Some(ndk_dir));
        });
    }

    #[test]
    fn test_apply_overrides_take_effect() {
        let mut settings = BuildSettings::default();
        settings.make_path = Some(PathBuf::from("/old/make"));
        settings.apply(SettingsPatch {
            cmake_path: Some(PathBuf::from("/cli/cmake")),
            jobs: Some(2),
            git_clean: Some(true),
            ..SettingsPatch::default()
        });
        assert_eq!(settings.cmake_path, Some(PathBuf::from("/cli/cmake")));
        assert_eq!(settings.make_path, Some(PathBuf::from("/old/make")));
        assert_eq!(settings.jobs, 2);
        assert!(settings.git_clean);
    }

    #[test]
    fn test_apply_ignores_empty_values() {
        let mut settings = BuildSettings::default();
        settings.cmake_path = Some(PathBuf::from("/keep/cmake"));
        settings.cmake_flags = Some("-DKEEP=1".to_string());
        settings.apply(SettingsPatch {
            cmake_path: Some(PathBuf::new()),
            cmake_flags: Some(String::new()),
            jobs: Some(0),
            ..SettingsPatch::default()
        });
        assert_eq!(settings.cmake_path, Some(PathBuf::from("/keep/cmake")));
        assert_eq!(settings.cmake_flags, Some("-DKEEP=1".to_string()));
        assert_eq!(settings.jobs, 1);
    }

    #[test]
    fn test_apply_anchors_relative_project_dir() {
        let mut settings = BuildSettings::default();
        settings.apply(SettingsPatch {
            project_dir: Some(PathBuf::from("subproj")),
            ..SettingsPatch::default()
        });
        assert!(settings.project_dir.is_absolute());
        assert_eq!(
            settings.project_dir,
            env::current_dir().unwrap().join("subproj")
        );
    }

    #[test]
    fn test_config_file_missing_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load(dir.path()).unwrap();
        assert_eq!(config.build.cmake_path, None);
        assert_eq!(config.build.jobs, None);
        assert_eq!(config.android.ant_flags, None);
    }

    #[test]
    fn test_config_file_parses_build_and_android_tables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[build]\ncmake_path = \"/pin/cmake\"\njobs = 3\n\n[android]\nant_flags = \"clean release\"\n",
        )
        .unwrap();
        let config = ConfigFile::load(dir.path()).unwrap();
        assert_eq!(config.build.cmake_path, Some(PathBuf::from("/pin/cmake")));
        assert_eq!(config.build.jobs, Some(3));
        assert_eq!(config.android.ant_flags, Some("clean release".to_string()));
    }

    #[test]
    fn test_config_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "not [ valid toml").unwrap();
        let err = ConfigFile::load(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), -1);
        assert!(matches!(err, BuildError::ConfigParse(_)));
    }
}
