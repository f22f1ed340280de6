//! Archive Writing
//!
//! Packages selected project subdirectories into a zip whose entries are
//! rooted at the project directory's own name, writing through a temporary
//! path so the destination never holds a half-written archive.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::BuildError;

/// What to archive and where to put it
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
    /// Source directories, relative to the project root
    pub directories: Vec<PathBuf>,
    /// Destination archive, relative to the project root
    pub archive_path: PathBuf,
    /// Optional location the finished archive is copied to
    pub copy_to: Option<PathBuf>,
    /// Directory names pruned from the walk
    pub exclude: Vec<String>,
}

impl ArchiveSpec {
    pub fn new(
        directories: impl IntoIterator<Item = impl Into<PathBuf>>,
        archive_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
            archive_path: archive_path.into(),
            copy_to: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_copy_to(mut self, dest: impl Into<PathBuf>) -> Self {
        self.copy_to = Some(dest.into());
        self
    }

    pub fn with_exclude(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Writes project archives
pub struct ArchiveWriter<'a> {
    project_dir: &'a Path,
}

impl<'a> ArchiveWriter<'a> {
    pub fn new(project_dir: &'a Path) -> Self {
        Self { project_dir }
    }

    /// Create the archive described by `spec` and return its final path
    ///
    /// A pre-existing archive at the destination is removed first. The zip
    /// is written to a unique sibling path and renamed into place once
    /// complete, so a failed run leaves no final archive behind.
    pub fn make_archive(&self, spec: &ArchiveSpec) -> Result<PathBuf, BuildError> {
        let final_path = self.project_dir.join(&spec.archive_path);
        if final_path.exists() {
            fs::remove_file(&final_path)
                .map_err(|err| BuildError::filesystem(&final_path, err))?;
        }
        info!("creating archive at {}", final_path.display());
        let temp_path = temp_archive_path(&final_path);
        self.write_entries(&temp_path, spec)?;
        fs::rename(&temp_path, &final_path)
            .map_err(|err| BuildError::filesystem(&final_path, err))?;
        debug!("archive complete at {}", final_path.display());

        if let Some(copy_to) = &spec.copy_to {
            let dest = copy_destination(self.project_dir, copy_to, &final_path);
            debug!("copying archive to {}", dest.display());
            copy_file(&final_path, &dest)?;
        }
        Ok(final_path)
    }

    fn write_entries(&self, temp_path: &Path, spec: &ArchiveSpec) -> Result<(), BuildError> {
        // Entries are rooted one level above the project directory so the
        // archive unpacks into a single folder named after the project.
        let base = self.project_dir.parent().unwrap_or(self.project_dir);
        let file = File::create(temp_path).map_err(|err| BuildError::filesystem(temp_path, err))?;
        let mut writer = ZipWriter::new(file);
        let options = FileOptions::default();
        for directory in &spec.directories {
            let dir = self.project_dir.join(directory);
            debug!("archiving {}", dir.display());
            let walker = WalkDir::new(&dir)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| keep_entry(entry, &spec.exclude));
            for entry in walker {
                let entry = entry?;
                if !resolves_to_file(&entry) {
                    continue;
                }
                let path = entry.path();
                let rel = path.strip_prefix(base).map_err(|_| {
                    BuildError::Config(format!("{} is outside the project root", path.display()))
                })?;
                writer.start_file(entry_name(rel), options)?;
                let mut source = File::open(path).map_err(|err| BuildError::filesystem(path, err))?;
                io::copy(&mut source, &mut writer)
                    .map_err(|err| BuildError::filesystem(path, err))?;
            }
        }
        writer.finish()?;
        Ok(())
    }
}

/// Walk filter: prune directories whose name is excluded
///
/// The walk root itself is never pruned, so an excluded name only applies
/// to subtrees inside the requested directories.
pub(crate) fn keep_entry(entry: &DirEntry, exclude: &[String]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    !exclude.iter().any(|name| entry.file_name() == name.as_str())
}

/// Walk entries worth writing: anything that does not resolve to a
/// directory. Symlinked directories are skipped; symlinked files are read
/// through their target.
pub(crate) fn resolves_to_file(entry: &DirEntry) -> bool {
    if entry.file_type().is_dir() {
        return false;
    }
    !(entry.path_is_symlink() && entry.path().is_dir())
}

/// Copy `source` to `dest`, carrying the source's modification time over
/// to the copy. A destination that already names the source file is
/// skipped, so a copy onto itself cannot truncate the file.
pub(crate) fn copy_file(source: &Path, dest: &Path) -> Result<(), BuildError> {
    if source == dest || points_at_same_file(source, dest) {
        debug!("skipping copy of {} onto itself", source.display());
        return Ok(());
    }
    fs::copy(source, dest).map_err(|err| BuildError::filesystem(source, err))?;
    let modified = fs::metadata(source)
        .and_then(|meta| meta.modified())
        .map_err(|err| BuildError::filesystem(source, err))?;
    File::options()
        .write(true)
        .open(dest)
        .and_then(|copy| copy.set_modified(modified))
        .map_err(|err| BuildError::filesystem(dest, err))?;
    Ok(())
}

fn points_at_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Forward-slash entry name for a relative path
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Unique sibling of the final archive: pid plus sub-second timestamp
fn temp_archive_path(final_path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y_%m_%d_%H%M.%S.%f");
    let mut name = final_path.as_os_str().to_os_string();
    name.push(format!(".{}.{}", std::process::id(), stamp));
    PathBuf::from(name)
}

/// Resolve the post-write copy target; an existing directory receives the
/// archive under its own file name
fn copy_destination(project_dir: &Path, copy_to: &Path, final_path: &Path) -> PathBuf {
    let dest = project_dir.join(copy_to);
    if dest.is_dir() {
        match final_path.file_name() {
            Some(name) => dest.join(name),
            None => dest,
        }
    } else {
        dest
    }
}
