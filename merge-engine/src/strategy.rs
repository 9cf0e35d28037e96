//! Per-element merge strategies and the registry that resolves them.
//!
//! Each element tag can carry its own [`Matcher`] (does an incoming element
//! correspond to an original one?), [`Mapper`] (rename the incoming element
//! before matching), and [`MergeAction`] (how the pair, or a one-sided
//! element, reaches the output). Lookup is two-stage: the tag-keyed rule
//! table first, then the defaults the registry was built with. Strategies are
//! plain enums; the registry is immutable once built and can be shared
//! between threads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::MergeConfig;
use crate::types::NodeRef;

/// An incoming element as seen after its [`Mapper`] ran.
#[derive(Debug, Clone, Copy)]
pub struct MappedNode<'a> {
    pub node: NodeRef<'a>,
    /// Effective tag; differs from `node.tag()` when the mapper renamed it.
    pub tag: &'a str,
}

impl<'a> MappedNode<'a> {
    /// The node under its own tag.
    pub fn identity(node: NodeRef<'a>) -> Self {
        Self {
            node,
            tag: node.tag(),
        }
    }
}

/// Decides whether an original and an incoming element are the same logical
/// element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Matcher {
    /// Same tag, and every attribute present on both sides has the same
    /// value. Attributes present on one side only are ignored.
    #[default]
    Attribute,
    /// Same tag.
    Tag,
    /// Same tag and same value of one identifying attribute (or the
    /// attribute is absent on both).
    Id {
        #[serde(default = "default_id_attribute")]
        attribute: String,
    },
    /// Never matches; every incoming element is appended as new content.
    Skip,
}

impl Matcher {
    pub fn matches(&self, original: NodeRef<'_>, incoming: &MappedNode<'_>) -> bool {
        match self {
            Matcher::Attribute => {
                original.tag() == incoming.tag
                    && original.attributes().all(|(name, value)| {
                        incoming
                            .node
                            .attribute(name)
                            .is_none_or(|other| other == value)
                    })
            }
            Matcher::Tag => original.tag() == incoming.tag,
            Matcher::Id { attribute } => {
                original.tag() == incoming.tag
                    && original.attribute(attribute) == incoming.node.attribute(attribute)
            }
            Matcher::Skip => false,
        }
    }
}

fn default_id_attribute() -> String {
    "id".into()
}

/// Rewrites an incoming element before it is matched and emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mapper {
    #[default]
    Identity,
    /// Give the incoming element a different tag.
    Rename { tag: String },
}

impl Mapper {
    pub fn map<'a>(&'a self, node: NodeRef<'a>) -> MappedNode<'a> {
        match self {
            Mapper::Identity => MappedNode::identity(node),
            Mapper::Rename { tag } => MappedNode {
                node,
                tag: tag.as_str(),
            },
        }
    }
}

/// How an element reaches the output. Each action handles three shapes of
/// input: a matched pair, an original-only element, and an incoming-only
/// element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    /// Merge attributes, text, and children recursively. One-sided elements
    /// are copied unchanged.
    #[default]
    FullMerge,
    /// Incoming wins wholesale; one-sided elements are copied.
    Replace,
    /// Incoming replaces an existing original; incoming-only elements are
    /// dropped.
    Override,
    /// Original wins; incoming-only elements are added.
    Complete,
    /// Original is kept; incoming is ignored.
    Preserve,
    /// The element is removed from the output.
    Delete,
    /// Both sides are copied next to each other, unmerged.
    Insert,
}

/// Per-tag override. Unset parts fall back to the registry defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<Matcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapper: Option<Mapper>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<MergeAction>,
}

impl ElementRule {
    pub fn matcher(matcher: Matcher) -> Self {
        Self {
            matcher: Some(matcher),
            ..Default::default()
        }
    }

    pub fn action(action: MergeAction) -> Self {
        Self {
            action: Some(action),
            ..Default::default()
        }
    }

    pub fn mapper(mapper: Mapper) -> Self {
        Self {
            mapper: Some(mapper),
            ..Default::default()
        }
    }
}

/// The strategies in effect for one tag.
#[derive(Debug, Clone, Copy)]
pub struct Strategy<'r> {
    pub matcher: &'r Matcher,
    pub mapper: &'r Mapper,
    pub action: MergeAction,
}

/// Tag-keyed strategy table with default fallbacks.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    default_matcher: Matcher,
    default_mapper: Mapper,
    default_action: MergeAction,
    root_matcher: Matcher,
    root_action: MergeAction,
    rules: HashMap<String, ElementRule>,
}

impl StrategyRegistry {
    /// Registry with the given defaults, an attribute root matcher, a full
    /// merge root action, and no per-tag rules.
    pub fn new(matcher: Matcher, mapper: Mapper, action: MergeAction) -> Self {
        Self {
            default_matcher: matcher,
            default_mapper: mapper,
            default_action: action,
            ..Default::default()
        }
    }

    /// Build from deserialized configuration.
    pub fn from_config(config: &MergeConfig) -> Self {
        let mut registry = Self::new(
            config.default.matcher.clone().unwrap_or_default(),
            config.default.mapper.clone().unwrap_or_default(),
            config.default.action.unwrap_or_default(),
        );
        if let Some(matcher) = &config.root.matcher {
            registry.root_matcher = matcher.clone();
        }
        if let Some(action) = config.root.action {
            registry.root_action = action;
        }
        for (tag, rule) in &config.rules {
            registry.rules.insert(tag.clone(), rule.clone());
        }
        registry
    }

    pub fn with_rule(mut self, tag: impl Into<String>, rule: ElementRule) -> Self {
        self.rules.insert(tag.into(), rule);
        self
    }

    pub fn with_root_matcher(mut self, matcher: Matcher) -> Self {
        self.root_matcher = matcher;
        self
    }

    pub fn with_root_action(mut self, action: MergeAction) -> Self {
        self.root_action = action;
        self
    }

    /// Strategies for `tag`: the rule table first, then the defaults.
    pub fn resolve(&self, tag: &str) -> Strategy<'_> {
        let rule = self.rules.get(tag);
        Strategy {
            matcher: rule
                .and_then(|r| r.matcher.as_ref())
                .unwrap_or(&self.default_matcher),
            mapper: rule
                .and_then(|r| r.mapper.as_ref())
                .unwrap_or(&self.default_mapper),
            action: rule
                .and_then(|r| r.action)
                .unwrap_or(self.default_action),
        }
    }

    pub fn root_matcher(&self) -> &Matcher {
        &self.root_matcher
    }

    pub fn root_action(&self) -> MergeAction {
        self.root_action
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
