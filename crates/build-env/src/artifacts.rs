//! Artifact Copying
//!
//! Collects build outputs matching an extension filter into an output
//! directory, optionally flattening the source layout.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::archive::{copy_file, keep_entry, resolves_to_file};
use crate::BuildError;

/// Copies extension-matched files out of the project tree
pub struct ArtifactCopier<'a> {
    project_dir: &'a Path,
}

impl<'a> ArtifactCopier<'a> {
    pub fn new(project_dir: &'a Path) -> Self {
        Self { project_dir }
    }

    /// Copy every file under `directories` whose name ends with `extension`
    ///
    /// Matching is a literal case-sensitive suffix test. With `flatten` all
    /// matches land directly in `output_path` (resolved against the project
    /// root) and later matches overwrite earlier ones on a name collision;
    /// otherwise the layout relative to the project root is recreated
    /// underneath it. Missing output directories are created on demand and
    /// each copy keeps the source file's modification time.
    pub fn copy_by_extension(
        &self,
        directories: &[PathBuf],
        extension: &str,
        output_path: &Path,
        flatten: bool,
        exclude: &[String],
    ) -> Result<(), BuildError> {
        let output_abs = self.project_dir.join(output_path);
        info!(
            "collecting {} files into {}",
            extension,
            output_abs.display()
        );
        for directory in directories {
            let dir = self.project_dir.join(directory);
            let walker = WalkDir::new(&dir)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| keep_entry(entry, exclude));
            for entry in walker {
                let entry = entry?;
                if !resolves_to_file(&entry) {
                    continue;
                }
                if !entry.file_name().to_string_lossy().ends_with(extension) {
                    continue;
                }
                let source = entry.path();
                let dest_dir = if flatten {
                    output_abs.clone()
                } else {
                    let parent = source.parent().unwrap_or(&dir);
                    let rel = parent.strip_prefix(self.project_dir).map_err(|_| {
                        BuildError::Config(format!(
                            "{} is outside the project root",
                            source.display()
                        ))
                    })?;
                    output_abs.join(rel)
                };
                if !dest_dir.exists() {
                    fs::create_dir_all(&dest_dir)
                        .map_err(|err| BuildError::filesystem(&dest_dir, err))?;
                }
                let dest = dest_dir.join(entry.file_name());
                debug!("copying {} to {}", source.display(), dest.display());
                copy_file(source, &dest)?;
            }
        }
        Ok(())
    }
}
