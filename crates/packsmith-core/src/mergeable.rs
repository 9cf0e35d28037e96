//! Contributions to the assembled artifact.
//!
//! A [`Mergeable`] copies the content behind one [`ResolvedLocation`] into a
//! target directory. Without a destination the content keeps its logical
//! layout (`pkg/res.txt` lands at `target/pkg/res.txt`). A destination ending
//! in `/` is a directory prefix; any other destination names the exact path
//! the location's root is copied to.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{deposit_io, DepositError};
use crate::location::{natural_path, safe_relative, Backing, ResolvedLocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mergeable {
    location: ResolvedLocation,
    destination: Option<String>,
}

impl Mergeable {
    pub fn location(&self) -> &ResolvedLocation {
        &self.location
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Copy the content below `target`. Returns the written files in copy
    /// order.
    pub fn deposit(&self, target: &Path) -> Result<Vec<PathBuf>, DepositError> {
        let written = match self.location.backing() {
            Backing::File(path) if path.is_dir() => self.deposit_directory(path, target)?,
            Backing::File(path) => {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let out = self.single_target(target, &file_name);
                create_parent(&out)?;
                std::fs::copy(path, &out).map_err(deposit_io(path))?;
                vec![out]
            }
            Backing::ArchiveEntry { archive, entry } => {
                self.deposit_archive(archive, entry, target)?
            }
        };
        tracing::info!(
            location = %self.location,
            into = %target.display(),
            files = written.len(),
            "deposited contribution"
        );
        Ok(written)
    }

    /// Where the root of a directory-like location lands.
    fn tree_root(&self, target: &Path) -> PathBuf {
        match self.destination.as_deref() {
            Some(destination) => below(target, destination),
            None => below(target, self.location.logical_path()),
        }
    }

    /// Where a single-resource location lands.
    fn single_target(&self, target: &Path, file_name: &str) -> PathBuf {
        match self.destination.as_deref() {
            Some(destination) if destination.ends_with('/') => {
                below(target, destination).join(file_name)
            }
            Some(destination) => below(target, destination),
            None if self.location.logical_path().is_empty() => target.join(file_name),
            None => below(target, self.location.logical_path()),
        }
    }

    fn deposit_directory(&self, source: &Path, target: &Path) -> Result<Vec<PathBuf>, DepositError> {
        let root = self.tree_root(target);
        let mut written = Vec::new();
        for item in WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let item = item.map_err(|err| {
                let path = err.path().unwrap_or(source).to_path_buf();
                DepositError::Io {
                    path,
                    source: err.into(),
                }
            })?;
            if !item.file_type().is_file() {
                continue;
            }
            let relative = item.path().strip_prefix(source).unwrap_or(item.path());
            let out = root.join(relative);
            create_parent(&out)?;
            std::fs::copy(item.path(), &out).map_err(deposit_io(item.path()))?;
            written.push(out);
        }
        Ok(written)
    }

    fn deposit_archive(
        &self,
        archive_path: &Path,
        entry: &str,
        target: &Path,
    ) -> Result<Vec<PathBuf>, DepositError> {
        let archive_error = |source| DepositError::Archive {
            path: archive_path.to_path_buf(),
            source,
        };
        let file = File::open(archive_path).map_err(deposit_io(archive_path))?;
        let mut archive = ZipArchive::new(file).map_err(archive_error)?;

        let single = !entry.is_empty() && !entry.ends_with('/');
        let root = self.tree_root(target);
        let mut written = Vec::new();

        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(archive_error)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();

            let out = if single {
                if name != entry {
                    continue;
                }
                let file_name = name.rsplit('/').next().unwrap_or(&name);
                self.single_target(target, file_name)
            } else {
                let Some(relative) = name.strip_prefix(entry) else {
                    continue;
                };
                match safe_relative(relative) {
                    Some(relative) => root.join(relative),
                    None => {
                        tracing::warn!(
                            archive = %archive_path.display(),
                            entry = %name,
                            "skipping archive entry that escapes the target"
                        );
                        continue;
                    }
                }
            };

            create_parent(&out)?;
            let mut output = File::create(&out).map_err(deposit_io(&out))?;
            io::copy(&mut file, &mut output).map_err(deposit_io(&out))?;
            written.push(out);
        }
        Ok(written)
    }
}

/// Wraps resolved locations into [`Mergeable`]s. No resolution happens here.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeableFactory;

impl MergeableFactory {
    pub fn from_location(&self, location: ResolvedLocation, destination: Option<&str>) -> Mergeable {
        Mergeable {
            location,
            destination: destination.map(str::to_owned),
        }
    }
}

/// `relative` below `base`, with `..`, `.` and leading separators dropped.
fn below(base: &Path, relative: &str) -> PathBuf {
    let clean = natural_path(Path::new(relative));
    if clean.is_empty() {
        base.to_path_buf()
    } else {
        base.join(clean)
    }
}

fn create_parent(path: &Path) -> Result<(), DepositError> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent).map_err(deposit_io(parent)),
        None => Ok(()),
    }
}
