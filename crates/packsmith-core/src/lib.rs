pub mod classpath;
pub mod config;
pub mod error;
pub mod location;
pub mod logging;
pub mod mergeable;
pub mod path_resolver;

#[cfg(test)]
mod test_support;

pub use classpath::{ClasspathIndex, ClasspathResourceResolver, ResolvedClass, ResourceIndex};
pub use config::Settings;
pub use error::{ConfigError, DepositError, ResolutionError};
pub use location::{Backing, ResolvedLocation};
pub use mergeable::{Mergeable, MergeableFactory};
pub use path_resolver::{ExtensionPointMerge, PathResolver};
