//! Platform Commands
//!
//! Maps CLI flags onto the settings merge boundary and runs the selected
//! platform pipeline.

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use turnkey_build_env::{
    AndroidEnv, AndroidPatch, AndroidSettings, BuildEnvironment, BuildError, BuildSettings,
    ConfigFile, DesktopEnv, SettingsPatch,
};
use turnkey_toolchain::ToolResolver;

/// Flags shared by every platform pipeline
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Project root directory (defaults to the current directory)
    #[arg(short = 'C', long)]
    pub project_dir: Option<PathBuf>,

    /// Number of parallel jobs handed to the build tools
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: Option<u32>,

    /// Path to the cmake binary
    #[arg(short = 'c', long)]
    pub cmake_path: Option<PathBuf>,

    /// Path to the make binary
    #[arg(short = 'm', long)]
    pub make_path: Option<PathBuf>,

    /// Path to the git binary
    #[arg(short = 'g', long)]
    pub git_path: Option<PathBuf>,

    /// Path to the ant binary
    #[arg(short = 'a', long)]
    pub ant_path: Option<PathBuf>,

    /// Extra cmake flags (shell quoting applies)
    #[arg(short = 'F', long)]
    pub cmake_flags: Option<String>,

    /// Extra make flags (shell quoting applies)
    #[arg(short = 'f', long)]
    pub make_flags: Option<String>,

    /// Android NDK root directory
    #[arg(short = 'n', long)]
    pub ndk_home: Option<PathBuf>,

    /// Android SDK root directory
    #[arg(short = 's', long)]
    pub sdk_home: Option<PathBuf>,

    /// Reset the work tree to its last committed state before building
    #[arg(short = 'w', long)]
    pub git_clean: bool,

    /// Verbose tool output and debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// The override layer these flags describe
    ///
    /// Boolean flags only override when actually given, so a config file
    /// setting them stays in effect otherwise.
    fn patch(&self) -> SettingsPatch {
        SettingsPatch {
            project_dir: self.project_dir.clone(),
            jobs: self.jobs,
            verbose: self.verbose.then_some(true),
            git_clean: self.git_clean.then_some(true),
            cmake_path: self.cmake_path.clone(),
            make_path: self.make_path.clone(),
            git_path: self.git_path.clone(),
            ant_path: self.ant_path.clone(),
            cmake_flags: self.cmake_flags.clone(),
            make_flags: self.make_flags.clone(),
            sdk_home: self.sdk_home.clone(),
            ndk_home: self.ndk_home.clone(),
        }
    }
}

/// `turnkey android` flags
#[derive(Debug, Args)]
pub struct AndroidArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Ant flags selecting the build flavor (default: release)
    #[arg(short = 'A', long)]
    pub ant_flags: Option<String>,

    /// Path to the swig binary
    #[arg(long)]
    pub swig_bin: Option<PathBuf>,

    /// Swig support-library directory
    #[arg(long)]
    pub swig_lib: Option<PathBuf>,

    /// Native source tree exported to sub-builds
    #[arg(long)]
    pub native_src_path: Option<PathBuf>,

    /// Archive build outputs to this zip (relative to the project root)
    #[arg(short = 'z', long)]
    pub output_zip: Option<PathBuf>,

    /// Collect built APKs into this directory
    #[arg(short = 'o', long)]
    pub output_apk_dir: Option<PathBuf>,
}

/// `turnkey desktop` flags
#[derive(Debug, Args)]
pub struct DesktopArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// CMake generator (default: Unix Makefiles)
    #[arg(short = 'G', long)]
    pub generator: Option<String>,

    /// Archive build outputs to this zip (relative to the project root)
    #[arg(short = 'z', long)]
    pub output_zip: Option<PathBuf>,

    /// Copy the finished archive to this location
    #[arg(long)]
    pub copy_to: Option<PathBuf>,
}

/// Merge settings layers: defaults, then the project file, then CLI flags
///
/// The project directory must settle first since the config file is looked
/// up inside it.
fn merged_settings(
    common: &CommonArgs,
    resolver: &ToolResolver,
) -> Result<(BuildSettings, ConfigFile), BuildError> {
    let mut settings = BuildSettings::defaults(resolver);
    settings.apply(SettingsPatch {
        project_dir: common.project_dir.clone(),
        ..SettingsPatch::default()
    });
    let config = ConfigFile::load(&settings.project_dir)?;
    settings.apply(config.build.clone());
    settings.apply(common.patch());
    Ok((settings, config))
}

/// Run the android pipeline
pub fn run_android(args: AndroidArgs) -> Result<(), BuildError> {
    let resolver = ToolResolver::new();
    let (settings, config) = merged_settings(&args.common, &resolver)?;

    let mut android = AndroidSettings::defaults(&resolver);
    android.apply(config.android);
    android.apply(AndroidPatch {
        ant_flags: args.ant_flags,
        swig_bin: args.swig_bin,
        swig_lib: args.swig_lib,
        native_src_path: args.native_src_path,
        output_archive: args.output_zip,
        output_apk_dir: args.output_apk_dir,
    });

    let env = BuildEnvironment::new(settings);
    AndroidEnv::new(env, android).build()?;
    info!("android build complete");
    Ok(())
}

/// Run the desktop pipeline
pub fn run_desktop(args: DesktopArgs) -> Result<(), BuildError> {
    let resolver = ToolResolver::new();
    let (settings, _config) = merged_settings(&args.common, &resolver)?;

    let env = BuildEnvironment::new(settings);
    let mut desktop = DesktopEnv::new(env);
    if let Some(generator) = args.generator {
        desktop = desktop.with_generator(generator);
    }
    if let Some(archive_path) = args.output_zip {
        desktop = desktop.with_output_archive(archive_path);
    }
    if let Some(copy_to) = args.copy_to {
        desktop = desktop.with_archive_copy_to(copy_to);
    }
    desktop.build()?;
    info!("desktop build complete");
    Ok(())
}
