//! Tool Resolution
//!
//! Finds the external binaries the orchestrator drives. Precedence for every
//! tool: an explicit caller-supplied path wins, then the tool's environment
//! variable, then a search of the executable search path.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Resolves external tool locations
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    search_path: Option<OsString>,
}

impl ToolResolver {
    /// Resolver backed by the ambient executable search path
    pub fn new() -> Self {
        Self { search_path: None }
    }

    /// Resolver backed by a fixed search path instead of the ambient one
    pub fn with_search_path(paths: impl AsRef<OsStr>) -> Self {
        Self {
            search_path: Some(paths.as_ref().to_os_string()),
        }
    }

    /// Resolve a tool path from the highest-precedence source that has one
    ///
    /// Empty explicit values and empty environment variables are treated as
    /// absent and fall through to the next source. Explicit and environment
    /// values are taken verbatim; only the search-path fallback proves the
    /// binary actually exists.
    pub fn resolve(&self, name: &str, explicit: Option<&Path>, env_var: &str) -> Option<PathBuf> {
        if let Some(path) = explicit {
            if !path.as_os_str().is_empty() {
                return Some(path.to_path_buf());
            }
        }
        if let Some(value) = env::var_os(env_var) {
            if !value.is_empty() {
                debug!("{} taken from ${}", name, env_var);
                return Some(PathBuf::from(value));
            }
        }
        self.find_in_path(name)
    }

    /// Search the executable search path for a binary
    pub fn find_in_path(&self, name: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(name, Some(paths), cwd).ok()
            }
            None => which::which(name).ok(),
        };
        if let Some(path) = &found {
            debug!("{} found on the search path at {}", name, path.display());
        }
        found
    }

    /// Locate a binary on the search path and walk up from it
    ///
    /// Splits the binary's path into components and drops the trailing
    /// `levels` components, the binary's own file name included. Returns
    /// `None` if the binary is not found or `levels` covers the whole path.
    /// Used to derive an SDK root from the `android` tool (two levels up)
    /// and an NDK root from `ndk-build` (one level up).
    pub fn find_parent_of_binary(&self, name: &str, levels: usize) -> Option<PathBuf> {
        let path = self.find_in_path(name)?;
        let components: Vec<_> = path.components().collect();
        if levels >= components.len() {
            return None;
        }
        let keep = components.len() - levels;
        Some(components.into_iter().take(keep).collect())
    }
}
