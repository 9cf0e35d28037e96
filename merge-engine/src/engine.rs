//! N-way structural tree merge.
//!
//! Documents are folded left to right: the first input seeds the
//! accumulator and every following input is merged into it pairwise.
//!
//! A pairwise merge checks the two roots against the root matcher, then runs
//! the root merge action into a scratch wrapper element of a fresh output
//! document. Merge actions recurse through [`MergeSession::merge_children`],
//! which fixes the output order:
//!
//! 1. every incoming child claims the first not-yet-consumed original child
//!    its matcher accepts;
//! 2. original children are emitted in their own order, merged with their
//!    partner when they have one and passed to their action alone otherwise;
//! 3. unmatched incoming children follow, in incoming order.
//!
//! The single element left under the wrapper becomes the new accumulator.

use std::sync::Arc;

use crate::error::{MergeError, MergeResult};
use crate::strategy::{MappedNode, MergeAction, StrategyRegistry};
use crate::types::{Document, NodeId, NodeRef};

/// Tag of the scratch element every pairwise merge writes into.
const SCRATCH_ROOT: &str = "merge-root";

/// Synchronous, side-effect free merge of whole documents.
#[derive(Debug, Clone, Default)]
pub struct TreeMergeEngine {
    registry: Arc<StrategyRegistry>,
}

impl TreeMergeEngine {
    pub fn new(registry: Arc<StrategyRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Merge every input into the first one, in order.
    pub fn merge_all(&self, inputs: Vec<Document>) -> MergeResult<Document> {
        let mut inputs = inputs.into_iter();
        let mut accumulator = inputs.next().ok_or(MergeError::NoInput)?;
        for (index, incoming) in inputs.enumerate() {
            accumulator = self.merge_pair(&accumulator, &incoming)?;
            tracing::debug!(input = index + 1, "folded document into accumulator");
        }
        Ok(accumulator)
    }

    /// Merge `incoming` into `original`, producing a new document. The
    /// original's doctype is kept.
    pub fn merge_pair(&self, original: &Document, incoming: &Document) -> MergeResult<Document> {
        let registry = self.registry.as_ref();
        let original_root = original.root();
        let incoming_root = MappedNode::identity(incoming.root());

        if !registry
            .root_matcher()
            .matches(original_root, &incoming_root)
        {
            return Err(MergeError::StructureMismatch {
                original: original_root.tag().to_string(),
                incoming: incoming_root.tag.to_string(),
            });
        }

        let mut session = MergeSession {
            registry,
            output: Document::new(SCRATCH_ROOT),
        };
        let wrapper = session.output.root_id();
        session.perform(
            registry.root_action(),
            Some(original_root),
            Some(incoming_root),
            wrapper,
        );

        let merged_root = session
            .output
            .root()
            .children()
            .next()
            .map(|node| node.id())
            .ok_or(MergeError::EmptyResult)?;
        let mut merged = session.output.extract(merged_root);
        merged.set_doctype(original.doctype().map(str::to_owned));

        tracing::trace!(
            root = merged.root().tag(),
            elements = merged.element_count(),
            "pairwise merge complete"
        );
        Ok(merged)
    }
}

/// State of one pairwise merge: the strategies in force and the output
/// document being built.
struct MergeSession<'r> {
    registry: &'r StrategyRegistry,
    output: Document,
}

impl MergeSession<'_> {
    /// Run `action` for one element. At least one side is present; the
    /// result (if any) is appended under `parent`.
    fn perform(
        &mut self,
        action: MergeAction,
        original: Option<NodeRef<'_>>,
        incoming: Option<MappedNode<'_>>,
        parent: NodeId,
    ) {
        match action {
            MergeAction::FullMerge => match (original, incoming) {
                (Some(original), Some(incoming)) => self.full_merge(original, incoming, parent),
                (Some(original), None) => self.copy(original, parent),
                (None, Some(incoming)) => self.copy_mapped(incoming, parent),
                (None, None) => {}
            },
            MergeAction::Replace => match (original, incoming) {
                (_, Some(incoming)) => self.copy_mapped(incoming, parent),
                (Some(original), None) => self.copy(original, parent),
                (None, None) => {}
            },
            MergeAction::Override => match (original, incoming) {
                (Some(_), Some(incoming)) => self.copy_mapped(incoming, parent),
                (Some(original), None) => self.copy(original, parent),
                (None, _) => {}
            },
            MergeAction::Complete => match (original, incoming) {
                (Some(original), _) => self.copy(original, parent),
                (None, Some(incoming)) => self.copy_mapped(incoming, parent),
                (None, None) => {}
            },
            MergeAction::Preserve => {
                if let Some(original) = original {
                    self.copy(original, parent);
                }
            }
            MergeAction::Delete => {}
            MergeAction::Insert => {
                if let Some(original) = original {
                    self.copy(original, parent);
                }
                if let Some(incoming) = incoming {
                    self.copy_mapped(incoming, parent);
                }
            }
        }
    }

    fn full_merge(&mut self, original: NodeRef<'_>, incoming: MappedNode<'_>, parent: NodeId) {
        let id = self.output.append_element(parent, incoming.tag);

        for (name, value) in original.attributes() {
            self.output.set_attribute(id, name, value);
        }
        // Incoming wins on shared names; new names are appended.
        for (name, value) in incoming.node.attributes() {
            self.output.set_attribute(id, name, value);
        }

        let text = incoming
            .node
            .text()
            .filter(|text| !text.is_empty())
            .or(original.text());
        self.output.set_text(id, text.map(str::to_owned));

        self.merge_children(original, incoming.node, id);
    }

    fn merge_children(&mut self, original: NodeRef<'_>, incoming: NodeRef<'_>, parent: NodeId) {
        let registry = self.registry;
        let originals: Vec<NodeRef<'_>> = original.children().collect();
        let mut partners: Vec<Option<(MappedNode<'_>, MergeAction)>> = vec![None; originals.len()];
        let mut unmatched = Vec::new();

        for child in incoming.children() {
            let strategy = registry.resolve(child.tag());
            let mapped = strategy.mapper.map(child);
            let slot = originals.iter().enumerate().position(|(index, candidate)| {
                partners[index].is_none() && strategy.matcher.matches(*candidate, &mapped)
            });
            match slot {
                Some(index) => {
                    tracing::trace!(tag = mapped.tag, index, "matched incoming element");
                    partners[index] = Some((mapped, strategy.action));
                }
                None => unmatched.push((mapped, strategy.action)),
            }
        }

        for (candidate, partner) in originals.into_iter().zip(partners) {
            match partner {
                Some((mapped, action)) => self.perform(action, Some(candidate), Some(mapped), parent),
                None => {
                    let action = registry.resolve(candidate.tag()).action;
                    self.perform(action, Some(candidate), None, parent);
                }
            }
        }

        for (mapped, action) in unmatched {
            self.perform(action, None, Some(mapped), parent);
        }
    }

    fn copy(&mut self, node: NodeRef<'_>, parent: NodeId) {
        self.output.import_subtree(parent, node);
    }

    fn copy_mapped(&mut self, incoming: MappedNode<'_>, parent: NodeId) {
        let id = self.output.import_subtree(parent, incoming.node);
        if incoming.tag != incoming.node.tag() {
            self.output.rename(id, incoming.tag);
        }
    }
}
