//! Classpath resource lookup.
//!
//! A classpath is an ordered list of directories and zip/jar archives. A
//! logical path such as `com/acme/panels/` or `install.xml` is looked up in
//! three steps: as a plain filesystem path, through the exact-match
//! [`ResourceIndex`], and finally by crawling every classpath entry for names
//! that start with the query. Nothing is cached; every call opens and closes
//! its own archive handles.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::config::ClasspathSettings;
use crate::error::{resolution_io, ResolutionError};
use crate::location::{extend_unique, natural_path, ResolvedLocation};

/// Exact-name resource lookup over the classpath.
pub trait ResourceIndex: Send + Sync {
    /// Every location whose name is exactly `path`, in classpath order.
    fn find_resources(&self, path: &str) -> Result<Vec<ResolvedLocation>, ResolutionError>;
}

/// Default [`ResourceIndex`]: checks each classpath entry directly.
#[derive(Debug, Clone, Default)]
pub struct ClasspathIndex {
    entries: Vec<PathBuf>,
}

impl ClasspathIndex {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self { entries }
    }
}

impl ResourceIndex for ClasspathIndex {
    fn find_resources(&self, path: &str) -> Result<Vec<ResolvedLocation>, ResolutionError> {
        let name = path.trim_matches('/');
        let mut found = Vec::new();
        if name.is_empty() {
            return Ok(found);
        }

        for entry in &self.entries {
            if entry.is_dir() {
                let candidate = entry.join(name);
                if candidate.exists() {
                    found.push(ResolvedLocation::file(candidate, name));
                }
            } else if is_archive(entry) {
                let archive = open_archive(entry)?;
                let directory = format!("{name}/");
                if archive.index_for_name(name).is_some() {
                    found.push(ResolvedLocation::archive_entry(entry, name, name));
                } else if archive.index_for_name(&directory).is_some() {
                    found.push(ResolvedLocation::archive_entry(entry, directory, name));
                }
            }
        }
        Ok(found)
    }
}

/// A class found on the classpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClass {
    name: String,
    location: ResolvedLocation,
}

impl ResolvedClass {
    /// Fully qualified, dot-separated name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Empty for classes in the default package.
    pub fn package_name(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(package, _)| package)
            .unwrap_or("")
    }

    pub fn location(&self) -> &ResolvedLocation {
        &self.location
    }
}

/// Resolves logical paths, packages, and classes against a classpath.
#[derive(Clone)]
pub struct ClasspathResourceResolver {
    classpath: Vec<PathBuf>,
    index: Arc<dyn ResourceIndex>,
}

impl fmt::Debug for ClasspathResourceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClasspathResourceResolver")
            .field("classpath", &self.classpath)
            .finish_non_exhaustive()
    }
}

impl ClasspathResourceResolver {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self::with_exclusions(entries, &[])
    }

    /// Drop every entry whose path contains one of the `exclude` fragments.
    pub fn with_exclusions(entries: Vec<PathBuf>, exclude: &[String]) -> Self {
        let classpath: Vec<PathBuf> = entries
            .into_iter()
            .filter(|entry| {
                let text = entry.to_string_lossy();
                match exclude.iter().find(|fragment| text.contains(fragment.as_str())) {
                    Some(fragment) => {
                        tracing::debug!(entry = %entry.display(), fragment = %fragment, "skipping excluded classpath entry");
                        false
                    }
                    None => true,
                }
            })
            .collect();
        let index = Arc::new(ClasspathIndex::new(classpath.clone()));
        Self { classpath, index }
    }

    pub fn from_settings(settings: &ClasspathSettings) -> Self {
        Self::with_exclusions(settings.entries.clone(), &settings.exclude)
    }

    /// Replace the exact-match lookup used before crawling.
    pub fn with_index(mut self, index: Arc<dyn ResourceIndex>) -> Self {
        self.index = index;
        self
    }

    /// The effective classpath, after exclusions.
    pub fn search_path(&self) -> &[PathBuf] {
        &self.classpath
    }

    /// Every location backing `path`, deduplicated, in discovery order.
    /// Fails with [`ResolutionError::NotFound`] rather than returning an
    /// empty list.
    pub fn resolve(&self, path: &str) -> Result<Vec<ResolvedLocation>, ResolutionError> {
        let mut found = Vec::new();

        let direct = Path::new(path);
        if direct.exists() {
            let logical = if direct.is_absolute() {
                direct
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                natural_path(direct)
            };
            found.push(ResolvedLocation::file(direct, logical));
        }

        extend_unique(&mut found, self.index.find_resources(path)?);

        if found.is_empty() {
            tracing::debug!(path, "no exact match, crawling classpath");
            extend_unique(&mut found, self.crawl(path)?);
        }

        if found.is_empty() {
            return Err(ResolutionError::NotFound {
                query: path.to_string(),
                search_path: self.classpath.clone(),
            });
        }
        tracing::debug!(path, count = found.len(), "resolved path");
        Ok(found)
    }

    /// Look a class up by fully qualified name (`a.b.C`, found as
    /// `a/b/C.class`) or by simple name (`C`, first `C.class` anywhere on the
    /// classpath).
    pub fn find_class(&self, name: &str) -> Result<ResolvedClass, ResolutionError> {
        let found = if name.contains('.') {
            let resource = format!("{}.class", name.replace('.', "/"));
            self.index
                .find_resources(&resource)?
                .into_iter()
                .next()
                .map(|location| ResolvedClass {
                    name: name.to_string(),
                    location,
                })
        } else {
            self.find_simple_class(name)?
        };

        found.ok_or_else(|| ResolutionError::ClassNotFound {
            class_name: name.to_string(),
            search_path: self.classpath.clone(),
        })
    }

    /// Whole-archive locations of every classpath archive with at least one
    /// entry in `package`.
    pub fn archives_for_package(
        &self,
        package: &str,
    ) -> Result<Vec<ResolvedLocation>, ResolutionError> {
        let prefix = package_prefix(package);
        let mut found = Vec::new();
        for entry in self.classpath.iter().filter(|entry| is_archive(entry)) {
            let archive = open_archive(entry)?;
            if archive.file_names().any(|name| name.starts_with(&prefix)) {
                found.push(ResolvedLocation::archive(entry));
            }
        }
        Ok(found)
    }

    fn crawl(&self, path: &str) -> Result<Vec<ResolvedLocation>, ResolutionError> {
        let prefix = path.trim_start_matches('/');
        let mut found = Vec::new();
        if prefix.is_empty() {
            return Ok(found);
        }
        for entry in &self.classpath {
            if entry.is_dir() {
                found.extend(crawl_directory(entry, prefix)?);
            } else if is_archive(entry) {
                found.extend(crawl_archive(entry, prefix)?);
            }
        }
        Ok(found)
    }

    fn find_simple_class(&self, simple_name: &str) -> Result<Option<ResolvedClass>, ResolutionError> {
        let file_name = format!("{simple_name}.class");
        for entry in &self.classpath {
            let hit = if entry.is_dir() {
                find_in_directory(entry, &file_name)?
            } else if is_archive(entry) {
                find_in_archive(entry, &file_name)?
            } else {
                None
            };
            if let Some(location) = hit {
                let name = location
                    .logical_path()
                    .trim_end_matches(".class")
                    .replace('/', ".");
                return Ok(Some(ResolvedClass { name, location }));
            }
        }
        Ok(None)
    }
}

/// `com.acme.panels` as the archive prefix `com/acme/panels/`.
pub fn package_prefix(package: &str) -> String {
    format!("{}/", package.replace('.', "/"))
}

fn is_archive(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, ResolutionError> {
    let file = File::open(path).map_err(resolution_io(path))?;
    ZipArchive::new(file).map_err(|source| ResolutionError::Archive {
        path: path.to_path_buf(),
        source,
    })
}

fn walk_error(root: &Path, err: walkdir::Error) -> ResolutionError {
    let path = err.path().unwrap_or(root).to_path_buf();
    ResolutionError::Io {
        path,
        source: err.into(),
    }
}

/// Walk `root` collecting the topmost entries whose relative path starts
/// with `prefix`. A matching directory is collected whole and not descended
/// into; directories that cannot contain a match are pruned.
fn crawl_directory(root: &Path, prefix: &str) -> Result<Vec<ResolvedLocation>, ResolutionError> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
    while let Some(item) = walker.next() {
        let item = item.map_err(|err| walk_error(root, err))?;
        let relative = natural_path(item.path().strip_prefix(root).unwrap_or(item.path()));
        let is_dir = item.file_type().is_dir();
        let key = if is_dir {
            format!("{relative}/")
        } else {
            relative.clone()
        };

        if key.starts_with(prefix) {
            found.push(ResolvedLocation::file(item.path(), relative));
            if is_dir {
                walker.skip_current_dir();
            }
        } else if is_dir && !prefix.starts_with(&key) {
            walker.skip_current_dir();
        }
    }
    Ok(found)
}

fn crawl_archive(path: &Path, prefix: &str) -> Result<Vec<ResolvedLocation>, ResolutionError> {
    let archive = open_archive(path)?;
    let matches: BTreeSet<&str> = archive
        .file_names()
        .filter(|name| name.starts_with(prefix))
        .map(|name| topmost_match(prefix, name))
        .collect();
    Ok(matches
        .into_iter()
        .map(|entry| ResolvedLocation::archive_entry(path, entry, entry.trim_end_matches('/')))
        .collect())
}

/// The highest archive entry covering `name` that still matches `prefix`:
/// the prefix directory itself, the first directory below the prefix, or the
/// file.
fn topmost_match<'n>(prefix: &str, name: &'n str) -> &'n str {
    if prefix.ends_with('/') {
        return &name[..prefix.len()];
    }
    match name[prefix.len()..].find('/') {
        Some(offset) => &name[..prefix.len() + offset + 1],
        None => name,
    }
}

fn find_in_directory(root: &Path, file_name: &str) -> Result<Option<ResolvedLocation>, ResolutionError> {
    for item in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let item = item.map_err(|err| walk_error(root, err))?;
        if item.file_type().is_file() && item.file_name().to_string_lossy() == file_name {
            let relative = natural_path(item.path().strip_prefix(root).unwrap_or(item.path()));
            return Ok(Some(ResolvedLocation::file(item.path(), relative)));
        }
    }
    Ok(None)
}

fn find_in_archive(path: &Path, file_name: &str) -> Result<Option<ResolvedLocation>, ResolutionError> {
    let archive = open_archive(path)?;
    let suffix = format!("/{file_name}");
    let hit = archive
        .file_names()
        .filter(|name| *name == file_name || name.ends_with(&suffix))
        .min()
        .map(|name| ResolvedLocation::archive_entry(path, name, name));
    Ok(hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Backing;
    use crate::test_support::{write_file, write_jar};

    #[test]
    fn test_resolve_single_directory_resource() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("classes/pkg/res.txt"), "hello");

        let resolver = ClasspathResourceResolver::new(vec![dir.path().join("classes")]);
        let found = resolver.resolve("pkg/res.txt").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].logical_path(), "pkg/res.txt");
        assert_eq!(
            found[0].backing(),
            &Backing::File(dir.path().join("classes/pkg/res.txt"))
        );
    }

    #[test]
    fn test_resolve_absent_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();

        let resolver = ClasspathResourceResolver::new(vec![classes.clone()]);
        match resolver.resolve("pkg/missing.txt").unwrap_err() {
            ResolutionError::NotFound { query, search_path } => {
                assert_eq!(query, "pkg/missing.txt");
                assert_eq!(search_path, vec![classes]);
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_across_directory_and_archive() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("classes/pkg/res.txt"), "dir");
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &[("pkg/res.txt", "jar"), ("pkg/other.txt", "x")]);

        let resolver =
            ClasspathResourceResolver::new(vec![dir.path().join("classes"), jar.clone()]);
        let found = resolver.resolve("pkg/res.txt").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(
            found[1].backing(),
            &Backing::ArchiveEntry {
                archive: jar,
                entry: "pkg/res.txt".into()
            }
        );
    }

    #[test]
    fn test_aliased_classpath_entries_resolve_once() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        write_file(&classes.join("pkg/res.txt"), "dir");
        std::fs::create_dir_all(classes.join("sub")).unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &[("pkg/res.txt", "jar")]);
        std::fs::create_dir_all(dir.path().join("libs")).unwrap();

        let resolver = ClasspathResourceResolver::new(vec![
            classes.clone(),
            classes.join("sub/.."),
            jar.clone(),
            dir.path().join("libs/../lib.jar"),
        ]);
        let found = resolver.resolve("pkg/res.txt").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].backing(), &Backing::File(classes.join("pkg/res.txt")));
        assert_eq!(found[1].url(), format!("jar:file:{}!/pkg/res.txt", jar.display()));
    }

    #[test]
    fn test_index_finds_archive_directory_entry() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &[("pkg/", ""), ("pkg/a.txt", "a")]);

        let resolver = ClasspathResourceResolver::new(vec![jar]);
        let found = resolver.resolve("pkg").unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_directory());
        assert_eq!(found[0].logical_path(), "pkg");
    }

    #[test]
    fn test_crawl_collects_topmost_matches() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        write_file(&classes.join("pkg/res.txt"), "r");
        write_file(&classes.join("pkg/rest/deep/a.txt"), "a");
        write_file(&classes.join("pkg/other.txt"), "o");
        let jar = dir.path().join("lib.jar");
        write_jar(
            &jar,
            &[("pkg/resources/x.xml", "x"), ("pkg/resources/y.xml", "y"), ("pkg/z.txt", "z")],
        );

        let resolver = ClasspathResourceResolver::new(vec![classes.clone(), jar.clone()]);
        let found = resolver.resolve("pkg/res").unwrap();
        let urls: Vec<String> = found.iter().map(|loc| loc.url()).collect();
        assert_eq!(
            urls,
            vec![
                format!("file:{}", classes.join("pkg/res.txt").display()),
                format!("file:{}", classes.join("pkg/rest").display()),
                format!("jar:file:{}!/pkg/resources/", jar.display()),
            ]
        );
        assert_eq!(found[2].logical_path(), "pkg/resources");
    }

    #[test]
    fn test_package_prefix_without_directory_entries() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &[("com/acme/a.xml", "a"), ("com/acme/sub/b.xml", "b")]);

        let resolver = ClasspathResourceResolver::new(vec![jar]);
        let found = resolver.resolve("com/acme/").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url().rsplit("!/").next(), Some("com/acme/"));
    }

    #[test]
    fn test_empty_query_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("classes/a.txt"), "a");
        let resolver = ClasspathResourceResolver::new(vec![dir.path().join("classes")]);
        assert!(matches!(
            resolver.resolve(""),
            Err(ResolutionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_excluded_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("test-classes/pkg/res.txt"), "t");
        write_file(&dir.path().join("classes/pkg/keep.txt"), "k");

        let resolver = ClasspathResourceResolver::with_exclusions(
            vec![dir.path().join("test-classes"), dir.path().join("classes")],
            &["test-classes".to_string()],
        );
        assert_eq!(resolver.search_path(), &[dir.path().join("classes")]);
        assert!(resolver.resolve("pkg/res.txt").is_err());
    }

    #[test]
    fn test_find_class_by_qualified_and_simple_name() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("classes/com/acme/HelloPanel.class"), "");
        let jar = dir.path().join("panels.jar");
        write_jar(&jar, &[("org/izpack/panels/TargetPanel.class", "")]);

        let resolver =
            ClasspathResourceResolver::new(vec![dir.path().join("classes"), jar]);

        let hello = resolver.find_class("com.acme.HelloPanel").unwrap();
        assert_eq!(hello.simple_name(), "HelloPanel");
        assert_eq!(hello.package_name(), "com.acme");

        let target = resolver.find_class("TargetPanel").unwrap();
        assert_eq!(target.name(), "org.izpack.panels.TargetPanel");
        assert_eq!(target.package_name(), "org.izpack.panels");

        match resolver.find_class("MissingPanel").unwrap_err() {
            ResolutionError::ClassNotFound { class_name, .. } => {
                assert_eq!(class_name, "MissingPanel")
            }
            other => panic!("expected class not found, got {other:?}"),
        }
    }

    #[test]
    fn test_archives_for_package() {
        let dir = tempfile::tempdir().unwrap();
        let with = dir.path().join("with.jar");
        let without = dir.path().join("without.jar");
        write_jar(&with, &[("com/acme/a.xml", "a")]);
        write_jar(&without, &[("org/other/b.xml", "b")]);

        let resolver = ClasspathResourceResolver::new(vec![with.clone(), without]);
        let found = resolver.archives_for_package("com.acme").unwrap();
        assert_eq!(found, vec![ResolvedLocation::archive(with)]);
        assert!(resolver.archives_for_package("net.none").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_archive_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        write_file(&jar, "not a zip");

        let resolver = ClasspathResourceResolver::new(vec![jar]);
        assert!(matches!(
            resolver.resolve("pkg/res.txt"),
            Err(ResolutionError::Archive { .. })
        ));
    }

    struct FixedIndex(Vec<ResolvedLocation>);

    impl ResourceIndex for FixedIndex {
        fn find_resources(&self, _path: &str) -> Result<Vec<ResolvedLocation>, ResolutionError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_custom_index_skips_crawl() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("classes/pkg/res.txt"), "r");
        let indexed = ResolvedLocation::file("/indexed/pkg/res.txt", "pkg/res.txt");

        let resolver = ClasspathResourceResolver::new(vec![dir.path().join("classes")])
            .with_index(Arc::new(FixedIndex(vec![indexed.clone(), indexed.clone()])));
        assert_eq!(resolver.resolve("pkg/res").unwrap(), vec![indexed]);
    }
}
