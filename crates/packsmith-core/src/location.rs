use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// Where the bytes of a resolved resource live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backing {
    /// A file or directory on disk.
    File(PathBuf),
    /// An entry inside a zip or jar archive. A name ending in `/` denotes a
    /// directory prefix; an empty name denotes the whole archive.
    ArchiveEntry { archive: PathBuf, entry: String },
}

/// A concrete location found for a logical path.
///
/// Two locations are equal when their backings are equal; the logical path
/// (the layout the resource has relative to its classpath root) is carried
/// along for deposit but never compared.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    backing: Backing,
    logical: String,
}

impl ResolvedLocation {
    pub fn file(path: impl Into<PathBuf>, logical: impl Into<String>) -> Self {
        Self {
            backing: Backing::File(path.into()),
            logical: logical.into(),
        }
    }

    pub fn archive_entry(
        archive: impl Into<PathBuf>,
        entry: impl Into<String>,
        logical: impl Into<String>,
    ) -> Self {
        Self {
            backing: Backing::ArchiveEntry {
                archive: archive.into(),
                entry: entry.into(),
            },
            logical: logical.into(),
        }
    }

    /// The whole archive, deposited at the target root.
    pub fn archive(archive: impl Into<PathBuf>) -> Self {
        Self::archive_entry(archive, "", "")
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// Slash-separated path relative to the classpath root, without a
    /// trailing separator.
    pub fn logical_path(&self) -> &str {
        &self.logical
    }

    /// `true` when the location stands for a tree of resources rather than a
    /// single one.
    pub fn is_directory(&self) -> bool {
        match &self.backing {
            Backing::File(path) => path.is_dir(),
            Backing::ArchiveEntry { entry, .. } => entry.is_empty() || entry.ends_with('/'),
        }
    }

    pub fn url(&self) -> String {
        match &self.backing {
            Backing::File(path) => format!("file:{}", path.display()),
            Backing::ArchiveEntry { archive, entry } => {
                format!("jar:file:{}!/{}", archive.display(), entry)
            }
        }
    }

    /// The backing with canonical paths, for deduplication.
    fn identity(&self) -> Backing {
        match &self.backing {
            Backing::File(path) => Backing::File(canonical(path)),
            Backing::ArchiveEntry { archive, entry } => Backing::ArchiveEntry {
                archive: canonical(archive),
                entry: entry.clone(),
            },
        }
    }
}

impl PartialEq for ResolvedLocation {
    fn eq(&self, other: &Self) -> bool {
        self.backing == other.backing
    }
}

impl Eq for ResolvedLocation {}

impl Hash for ResolvedLocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.backing.hash(state);
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Append `found` to `into`, skipping locations already present. Keeps
/// discovery order.
///
/// Paths are compared in canonical form, so `./pkg/a.txt`, `pkg/a.txt` and
/// `lib/../pkg/a.txt` count as one location when they name the same file.
pub(crate) fn extend_unique(into: &mut Vec<ResolvedLocation>, found: Vec<ResolvedLocation>) {
    let mut seen: HashSet<Backing> = into.iter().map(ResolvedLocation::identity).collect();
    for location in found {
        if seen.insert(location.identity()) {
            into.push(location);
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Normal components of `path` joined with `/`. Root, prefix, `.` and `..`
/// components are dropped.
pub(crate) fn natural_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `relative` as a path below some root, or `None` if it could escape it.
pub(crate) fn safe_relative(relative: &str) -> Option<PathBuf> {
    let path = Path::new(relative);
    let safe = path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    safe.then(|| path.to_path_buf())
}
