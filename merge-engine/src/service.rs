//! Parse, merge, serialize.
//!
//! [`DocumentMergeService`] is the entry point callers normally use. It
//! accepts inputs as raw text, parsed documents, or file paths and answers in
//! the same form.

use std::path::Path;
use std::sync::Arc;

use crate::config::MergeConfig;
use crate::engine::TreeMergeEngine;
use crate::error::{MergeError, MergeResult};
use crate::parser::{parse_file, parse_str};
use crate::strategy::StrategyRegistry;
use crate::types::Document;
use crate::writer::{DEFAULT_INDENT, to_xml_string};

#[derive(Debug, Clone)]
pub struct DocumentMergeService {
    engine: TreeMergeEngine,
    indent: usize,
}

impl Default for DocumentMergeService {
    fn default() -> Self {
        Self::new(Arc::new(StrategyRegistry::default()))
    }
}

impl DocumentMergeService {
    pub fn new(registry: Arc<StrategyRegistry>) -> Self {
        Self {
            engine: TreeMergeEngine::new(registry),
            indent: DEFAULT_INDENT,
        }
    }

    /// Build the registry and output settings from configuration.
    pub fn from_config(config: &MergeConfig) -> Self {
        Self::new(Arc::new(StrategyRegistry::from_config(config))).with_indent(config.indent)
    }

    /// Spaces per nesting level in serialized output; zero writes compact XML.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn engine(&self) -> &TreeMergeEngine {
        &self.engine
    }

    /// Merge XML texts. Parse errors name the input as `input[i]`.
    pub fn merge_texts<S: AsRef<str>>(&self, texts: &[S]) -> MergeResult<String> {
        let documents = texts
            .iter()
            .enumerate()
            .map(|(index, text)| parse_str(&format!("input[{index}]"), text.as_ref()))
            .collect::<MergeResult<Vec<_>>>()?;
        let merged = self.merge_documents(documents)?;
        to_xml_string(&merged, self.indent)
    }

    pub fn merge_documents(&self, documents: Vec<Document>) -> MergeResult<Document> {
        let count = documents.len();
        let merged = self.engine.merge_all(documents)?;
        tracing::info!(
            inputs = count,
            elements = merged.element_count(),
            "merged documents"
        );
        Ok(merged)
    }

    /// Merge files and write the result to `target`, creating its parent
    /// directories. The target is replaced atomically (temp file, then
    /// rename) and is left untouched when the merge fails.
    pub fn merge_files<P: AsRef<Path>>(&self, inputs: &[P], target: &Path) -> MergeResult<()> {
        let documents = inputs
            .iter()
            .map(|path| parse_file(path.as_ref()))
            .collect::<MergeResult<Vec<_>>>()?;
        let merged = self.merge_documents(documents)?;
        let xml = to_xml_string(&merged, self.indent)?;

        let io_error = |source| MergeError::Io {
            path: target.to_path_buf(),
            source,
        };
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "merged.xml".to_string());
        let tmp = target.with_file_name(format!(".{file_name}.tmp"));
        if let Err(err) = std::fs::write(&tmp, xml).and_then(|()| std::fs::rename(&tmp, target)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_error(err));
        }

        tracing::info!(output = %target.display(), inputs = inputs.len(), "wrote merged document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ElementRule, MergeAction};

    #[test]
    fn test_merge_texts() {
        let service = DocumentMergeService::default();
        let xml = service
            .merge_texts(&[
                r#"<config><a x="1"/></config>"#,
                r#"<config><b/></config>"#,
            ])
            .unwrap();
        let merged = parse_str("merged", &xml).unwrap();
        assert_eq!(
            merged,
            parse_str("expected", r#"<config><a x="1"/><b/></config>"#).unwrap()
        );
    }

    #[test]
    fn test_single_text_round_trips() {
        let source = r#"<!DOCTYPE config><config v="1"><a>text</a></config>"#;
        let service = DocumentMergeService::default();
        let xml = service.merge_texts(&[source]).unwrap();
        assert_eq!(
            parse_str("merged", &xml).unwrap(),
            parse_str("source", source).unwrap()
        );
    }

    #[test]
    fn test_parse_error_names_input_index() {
        let service = DocumentMergeService::default();
        let err = service
            .merge_texts(&["<config/>", "<config>"])
            .unwrap_err();
        match err {
            MergeError::Parse { source_name, .. } => assert_eq!(source_name, "input[1]"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_text_list() {
        let service = DocumentMergeService::default();
        let empty: [&str; 0] = [];
        assert!(matches!(service.merge_texts(&empty), Err(MergeError::NoInput)));
    }

    #[test]
    fn test_from_config_applies_rules_and_indent() {
        let mut config = MergeConfig::default();
        config
            .rules
            .insert("old".into(), ElementRule::action(MergeAction::Delete));
        config.indent = 0;
        let service = DocumentMergeService::from_config(&config);
        let xml = service
            .merge_texts(&["<r><old/><keep/></r>", "<r/>"])
            .unwrap();
        assert_eq!(xml, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><r><keep/></r>\n");
    }

    #[test]
    fn test_merge_files_writes_target() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.xml");
        let second = dir.path().join("second.xml");
        std::fs::write(&first, r#"<install><panel id="a"/></install>"#).unwrap();
        std::fs::write(&second, r#"<install><panel id="b"/></install>"#).unwrap();

        let target = dir.path().join("out/merged.xml");
        DocumentMergeService::default()
            .merge_files(&[&first, &second], &target)
            .unwrap();

        let merged = parse_file(&target).unwrap();
        let ids: Vec<_> = merged
            .root()
            .children()
            .filter_map(|panel| panel.attribute("id"))
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!dir.path().join("out/.merged.xml.tmp").exists());
    }

    #[test]
    fn test_merge_files_parse_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.xml");
        let bad = dir.path().join("bad.xml");
        std::fs::write(&good, "<a/>").unwrap();
        std::fs::write(&bad, "<a>").unwrap();

        let target = dir.path().join("merged.xml");
        let err = DocumentMergeService::default()
            .merge_files(&[&good, &bad], &target)
            .unwrap_err();
        match err {
            MergeError::Parse { source_name, .. } => assert!(source_name.ends_with("bad.xml")),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(!target.exists());
    }

    #[test]
    fn test_merge_files_reads_declared_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.xml");
        let second = dir.path().join("second.xml");
        std::fs::write(
            &first,
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><menu><item id=\"1\">Caf\xE9</item></menu>",
        )
        .unwrap();
        std::fs::write(&second, r#"<menu><item id="2">Tea</item></menu>"#).unwrap();

        let target = dir.path().join("merged.xml");
        DocumentMergeService::default()
            .merge_files(&[&first, &second], &target)
            .unwrap();

        let merged = std::fs::read_to_string(&target).unwrap();
        assert!(merged.contains("Caf\u{e9}"));
        assert_eq!(parse_file(&target).unwrap().root().child_count(), 2);
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        std::fs::write(&input, "<a/>").unwrap();
        // A non-empty directory cannot be replaced by the rename.
        let target = dir.path().join("taken");
        std::fs::create_dir_all(target.join("inner")).unwrap();

        let err = DocumentMergeService::default()
            .merge_files(&[&input], &target)
            .unwrap_err();
        assert!(matches!(err, MergeError::Io { .. }));
        assert!(!dir.path().join(".taken.tmp").exists());
    }

    #[test]
    fn test_merge_files_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentMergeService::default()
            .merge_files(&[dir.path().join("absent.xml")], &dir.path().join("out.xml"))
            .unwrap_err();
        assert!(matches!(err, MergeError::Io { .. }));
    }
}
