//! Logical paths, packages, and extension points to lists of mergeables.

use std::collections::BTreeMap;

use crate::classpath::{package_prefix, ClasspathResourceResolver, ResolvedClass};
use crate::config::Settings;
use crate::error::ResolutionError;
use crate::location::ResolvedLocation;
use crate::mergeable::{Mergeable, MergeableFactory};

/// An extension-point class together with every contribution it brings into
/// the artifact.
#[derive(Debug, Clone)]
pub struct ExtensionPointMerge {
    pub class: ResolvedClass,
    pub mergeables: Vec<Mergeable>,
}

/// Turns lookups into [`Mergeable`] lists.
///
/// Path and package lookups treat "nothing on the classpath" as an empty
/// result; I/O and archive failures still propagate. [`resolve_path`] and
/// extension-point class lookups fail loudly instead.
///
/// [`resolve_path`]: PathResolver::resolve_path
#[derive(Debug, Clone)]
pub struct PathResolver {
    resolver: ClasspathResourceResolver,
    factory: MergeableFactory,
    dependencies: BTreeMap<String, String>,
}

impl PathResolver {
    /// `dependencies` maps an extension point's simple class name to an extra
    /// package whose resources it needs. It is never modified afterwards.
    pub fn new(resolver: ClasspathResourceResolver, dependencies: BTreeMap<String, String>) -> Self {
        Self {
            resolver,
            factory: MergeableFactory,
            dependencies,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ClasspathResourceResolver::from_settings(&settings.classpath),
            settings.dependencies.clone(),
        )
    }

    pub fn resolver(&self) -> &ClasspathResourceResolver {
        &self.resolver
    }

    pub fn resolve_path(&self, path: &str) -> Result<Vec<ResolvedLocation>, ResolutionError> {
        self.resolver.resolve(path)
    }

    pub fn mergeables_for_path(&self, path: &str) -> Result<Vec<Mergeable>, ResolutionError> {
        self.collect(path, None)
    }

    /// Like [`mergeables_for_path`](Self::mergeables_for_path), with every
    /// contribution remapped under `destination`.
    pub fn mergeables_for_path_with_destination(
        &self,
        path: &str,
        destination: &str,
    ) -> Result<Vec<Mergeable>, ResolutionError> {
        self.collect(path, Some(destination))
    }

    /// Contributions of a dotted package name, e.g. `com.acme.panels`.
    pub fn mergeables_for_package(&self, package: &str) -> Result<Vec<Mergeable>, ResolutionError> {
        self.mergeables_for_path(&package_prefix(package))
    }

    /// Every classpath archive containing `package`, each as a whole.
    pub fn archive_mergeables_for_package(
        &self,
        package: &str,
    ) -> Result<Vec<Mergeable>, ResolutionError> {
        Ok(self
            .resolver
            .archives_for_package(package)?
            .into_iter()
            .map(|location| self.factory.from_location(location, None))
            .collect())
    }

    /// Find `class_name` on the classpath, collect its package, and append
    /// the declared dependency package if one is configured for it.
    pub fn mergeables_for_extension_point(
        &self,
        class_name: &str,
    ) -> Result<ExtensionPointMerge, ResolutionError> {
        let class = self.resolver.find_class(class_name)?;

        let mut mergeables = if class.package_name().is_empty() {
            Vec::new()
        } else {
            let prefix = package_prefix(class.package_name());
            self.mergeables_for_path_with_destination(&prefix, &prefix)?
        };

        if let Some(dependency) = self.dependencies.get(class.simple_name()) {
            tracing::debug!(
                class = class.name(),
                dependency = %dependency,
                "adding declared dependency package"
            );
            mergeables.extend(self.mergeables_for_package(dependency)?);
        }

        tracing::info!(
            class = class.name(),
            mergeables = mergeables.len(),
            "collected extension point"
        );
        Ok(ExtensionPointMerge { class, mergeables })
    }

    fn collect(
        &self,
        path: &str,
        destination: Option<&str>,
    ) -> Result<Vec<Mergeable>, ResolutionError> {
        let locations = match self.resolver.resolve(path) {
            Ok(locations) => locations,
            Err(ResolutionError::NotFound { query, .. }) => {
                tracing::debug!(query = %query, "nothing on the classpath");
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        Ok(locations
            .into_iter()
            .map(|location| self.factory.from_location(location, destination))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_file, write_jar};
    use std::path::Path;

    fn resolver(entries: &[&Path], dependencies: &[(&str, &str)]) -> PathResolver {
        PathResolver::new(
            ClasspathResourceResolver::new(entries.iter().map(|p| p.to_path_buf()).collect()),
            dependencies
                .iter()
                .map(|(class, package)| (class.to_string(), package.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_mergeables_for_path() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        write_file(&classes.join("pkg/res.txt"), "r");

        let paths = resolver(&[classes.as_path()], &[]);
        let plain = paths.mergeables_for_path("pkg/res.txt").unwrap();
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].destination(), None);

        let remapped = paths
            .mergeables_for_path_with_destination("pkg/res.txt", "conf/")
            .unwrap();
        assert_eq!(remapped[0].destination(), Some("conf/"));
        assert_eq!(remapped[0].location(), plain[0].location());
    }

    #[test]
    fn test_missing_path_is_empty_but_resolve_fails() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();

        let paths = resolver(&[classes.as_path()], &[]);
        assert!(paths.mergeables_for_path("absent.txt").unwrap().is_empty());
        assert!(paths.mergeables_for_package("com.absent").unwrap().is_empty());
        assert!(matches!(
            paths.resolve_path("absent.txt"),
            Err(ResolutionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_archive_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        write_file(&jar, "garbage");

        let paths = resolver(&[jar.as_path()], &[]);
        assert!(matches!(
            paths.mergeables_for_path("pkg/res.txt"),
            Err(ResolutionError::Archive { .. })
        ));
    }

    #[test]
    fn test_package_lookup_uses_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &[("com/acme/a.xml", "a"), ("com/acme/b.xml", "b")]);

        let paths = resolver(&[jar.as_path()], &[]);
        let found = paths.mergeables_for_package("com.acme").unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].location().is_directory());

        let archives = paths.archive_mergeables_for_package("com.acme").unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].location(), &ResolvedLocation::archive(&jar));
    }

    #[test]
    fn test_extension_point_with_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        write_file(&classes.join("com/acme/HelloPanel.class"), "");
        write_file(&classes.join("com/acme/hello.xml"), "<panel/>");
        let jar = dir.path().join("shared.jar");
        write_jar(&jar, &[("com/shared/icons.xml", "<icons/>")]);

        let paths = resolver(&[classes.as_path(), jar.as_path()], &[("HelloPanel", "com.shared")]);
        let merge = paths.mergeables_for_extension_point("HelloPanel").unwrap();
        assert_eq!(merge.class.name(), "com.acme.HelloPanel");
        assert_eq!(merge.mergeables.len(), 2);
        assert_eq!(merge.mergeables[0].destination(), Some("com/acme/"));

        let target = dir.path().join("out");
        for mergeable in &merge.mergeables {
            mergeable.deposit(&target).unwrap();
        }
        assert!(target.join("com/acme/HelloPanel.class").exists());
        assert!(target.join("com/acme/hello.xml").exists());
        assert!(target.join("com/shared/icons.xml").exists());
    }

    #[test]
    fn test_extension_point_without_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        write_file(&classes.join("com/acme/TargetPanel.class"), "");

        let paths = resolver(&[classes.as_path()], &[("HelloPanel", "com.shared")]);
        let merge = paths
            .mergeables_for_extension_point("com.acme.TargetPanel")
            .unwrap();
        assert_eq!(merge.mergeables.len(), 1);
    }

    #[test]
    fn test_extension_point_missing_class() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();

        let paths = resolver(&[classes.as_path()], &[]);
        assert!(matches!(
            paths.mergeables_for_extension_point("NoSuchPanel"),
            Err(ResolutionError::ClassNotFound { .. })
        ));
    }
}
