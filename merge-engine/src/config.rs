use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::strategy::ElementRule;
use crate::writer::DEFAULT_INDENT;

/// Serializable merge configuration: default strategies, root strategies,
/// per-tag rules, and output indentation.
///
/// ```json
/// {
///   "default": { "action": "full_merge" },
///   "root": { "matcher": { "kind": "tag" } },
///   "rules": {
///     "panel": { "matcher": { "kind": "id", "attribute": "id" }, "action": "replace" },
///     "obsolete": { "action": "delete" }
///   },
///   "indent": 4
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub default: ElementRule,
    /// Only `matcher` and `action` are used for the root pair.
    #[serde(default)]
    pub root: ElementRule,
    #[serde(default)]
    pub rules: BTreeMap<String, ElementRule>,
    #[serde(default = "default_indent")]
    pub indent: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            default: ElementRule::default(),
            root: ElementRule::default(),
            rules: BTreeMap::new(),
            indent: default_indent(),
        }
    }
}

fn default_indent() -> usize {
    DEFAULT_INDENT
}
