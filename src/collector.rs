//! Collects translatable text nodes from a page.
//!
//! Walks the tree in document order and keeps every text node that is not
//! whitespace-only, not inside a skipped container and not already
//! translated.
//!
//! "Already translated" is decided per text node, never per subtree. A node
//! this collector saw written is skipped. Under a marked element that this
//! collector never wrote into (a marker carried in by the document itself),
//! the element's own text children are skipped. Nested elements, siblings
//! whose translation failed and content added later stay collectable.

use markup5ever_rcdom::{Handle, NodeData};
use tracing::debug;

use crate::dom::{get_attribute, is_marked, parent_of, tag_name, NodeSet};

/// Containers whose text is code, script, form input or foreign content.
pub const SKIP_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "code", "pre", "kbd", "samp", "textarea", "input", "select",
    "option", "iframe", "object", "embed", "svg", "math", "canvas", "template",
];

/// A collected text node and its owning element.
#[derive(Debug, Clone)]
pub struct TextNodeRef {
    pub node: Handle,
    /// Direct parent element; receives the translation marker
    pub owner: Handle,
    pub original_text: String,
    /// Set once the owner has been marked, immediately before the write
    pub owner_marked: bool,
}

impl TextNodeRef {
    /// Text sent for translation: the original without surrounding whitespace.
    pub fn source_text(&self) -> &str {
        self.original_text.trim()
    }

    /// `translated` wrapped in the original leading/trailing whitespace.
    pub fn rewrap(&self, translated: &str) -> String {
        let original = self.original_text.as_str();
        let start = original.len() - original.trim_start().len();
        let end = original.trim_end().len();
        format!(
            "{}{}{}",
            &original[..start],
            translated.trim(),
            &original[end.max(start)..]
        )
    }
}

/// Counters from the last collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub nodes_visited: usize,
    pub text_nodes_found: usize,
    pub skipped_elements: usize,
    pub marked_elements: usize,
    pub already_translated: usize,
    pub whitespace_only: usize,
    pub collected: usize,
}

/// Document-order text collector.
#[derive(Debug)]
pub struct TextCollector {
    skip_elements: Vec<String>,
    stats: CollectionStats,
    /// Text nodes whose translation has been written
    written: NodeSet,
    /// Owners marked by those writes
    written_owners: NodeSet,
}

impl Default for TextCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCollector {
    pub fn new() -> Self {
        Self {
            skip_elements: SKIP_ELEMENTS.iter().map(|s| s.to_string()).collect(),
            stats: CollectionStats::default(),
            written: NodeSet::new(),
            written_owners: NodeSet::new(),
        }
    }

    /// Skip additional container tags.
    pub fn with_extra_skip(mut self, tags: &[&str]) -> Self {
        self.skip_elements
            .extend(tags.iter().map(|t| t.to_ascii_lowercase()));
        self
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// Collect translatable text nodes under `root`, in document order.
    ///
    /// A root that is itself inside a skipped element yields nothing.
    pub fn collect(&mut self, root: &Handle) -> Vec<TextNodeRef> {
        self.stats = CollectionStats::default();
        let mut found = Vec::new();

        if self.is_inside_skipped(root) {
            debug!("Collection root is not translatable");
            return found;
        }

        self.collect_recursive(root, &mut found);
        self.stats.collected = found.len();

        debug!(
            "Collected {} text node(s) ({} visited, {} skipped containers, {} already translated)",
            self.stats.collected,
            self.stats.nodes_visited,
            self.stats.skipped_elements,
            self.stats.already_translated
        );
        found
    }

    fn collect_recursive(&mut self, node: &Handle, found: &mut Vec<TextNodeRef>) {
        self.stats.nodes_visited += 1;

        match node.data {
            NodeData::Text { ref contents } => {
                self.stats.text_nodes_found += 1;
                let text = contents.borrow().to_string();
                if text.trim().is_empty() {
                    self.stats.whitespace_only += 1;
                    return;
                }
                // Text directly under the document has no owner to mark.
                let Some(owner) = parent_of(node).filter(|p| tag_name(p).is_some()) else {
                    return;
                };
                if self.is_translated(node, &owner) {
                    self.stats.already_translated += 1;
                    return;
                }
                found.push(TextNodeRef {
                    node: node.clone(),
                    owner,
                    original_text: text,
                    owner_marked: false,
                });
            }
            NodeData::Element { .. } => {
                if self.should_skip_element(node) {
                    self.stats.skipped_elements += 1;
                    return;
                }
                if is_marked(node) {
                    self.stats.marked_elements += 1;
                }
                for child in node.children.borrow().iter() {
                    self.collect_recursive(child, found);
                }
            }
            NodeData::Document => {
                for child in node.children.borrow().iter() {
                    self.collect_recursive(child, found);
                }
            }
            _ => {}
        }
    }

    /// Skip-set tags, `translate="no"` and editable regions.
    fn should_skip_element(&self, node: &Handle) -> bool {
        if let Some(tag) = tag_name(node) {
            if self.skip_elements.iter().any(|s| s.eq_ignore_ascii_case(tag)) {
                return true;
            }
        }
        if get_attribute(node, "translate")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("no"))
        {
            return true;
        }
        get_attribute(node, "contenteditable")
            .is_some_and(|v| !v.trim().eq_ignore_ascii_case("false"))
    }

    /// Remember that `item` has been translated; call before writing it.
    pub fn record_written(&mut self, item: &TextNodeRef) {
        self.written.insert(&item.node);
        self.written_owners.insert(&item.owner);
    }

    fn is_translated(&self, node: &Handle, owner: &Handle) -> bool {
        self.written.contains(node) || (is_marked(owner) && !self.written_owners.contains(owner))
    }

    /// Whether the text node `node` counts as already translated.
    pub fn is_translated_text(&self, node: &Handle) -> bool {
        match parent_of(node) {
            Some(owner) => self.is_translated(node, &owner),
            None => self.written.contains(node),
        }
    }

    /// Whether `node` or an ancestor is a skipped container.
    pub fn is_inside_skipped(&self, node: &Handle) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if matches!(n.data, NodeData::Element { .. }) && self.should_skip_element(&n) {
                return true;
            }
            current = parent_of(&n);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{find_element, Page};

    fn collect_texts(html: &str) -> Vec<String> {
        let page = Page::parse(html);
        TextCollector::new()
            .collect(&page.document())
            .into_iter()
            .map(|t| t.original_text)
            .collect()
    }

    fn collect_texts_of(page: &Page, collector: &mut TextCollector) -> Vec<String> {
        collector
            .collect(&page.document())
            .into_iter()
            .map(|t| t.original_text)
            .collect()
    }

    #[test]
    fn test_document_order() {
        let texts = collect_texts(
            "<body><h1>Title</h1><p>First <b>bold</b> after</p><ul><li>Item</li></ul></body>",
        );
        assert_eq!(texts, vec!["Title", "First ", "bold", " after", "Item"]);
    }

    #[test]
    fn test_skip_set() {
        let texts = collect_texts(
            "<body><p>Keep</p><script>var x = 1;</script><style>p{}</style>\
             <pre>raw</pre><code>fn()</code><textarea>typed</textarea>\
             <svg><text>shape</text></svg><p>Also keep</p></body>",
        );
        assert_eq!(texts, vec!["Keep", "Also keep"]);
    }

    #[test]
    fn test_translate_no_and_contenteditable() {
        let texts = collect_texts(
            "<body><div translate=\"no\"><p>Brand</p></div>\
             <div contenteditable=\"true\">draft</div>\
             <div contenteditable=\"false\">fixed</div></body>",
        );
        assert_eq!(texts, vec!["fixed"]);
    }

    #[test]
    fn test_whitespace_only_excluded() {
        let page = Page::parse("<body><div>\n   <p>Text</p>\n</div></body>");
        let mut collector = TextCollector::new();
        let texts = collector.collect(&page.document());

        assert_eq!(texts.len(), 1);
        assert!(collector.stats().whitespace_only >= 2);
    }

    #[test]
    fn test_marked_owner_excluded() {
        let page = Page::parse("<body><p>Done</p><p>Pending</p></body>");
        let first = find_element(&page.document(), "p").unwrap();
        page.mark_translated(&first);

        let mut collector = TextCollector::new();
        let texts = collector.collect(&page.document());

        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].original_text, "Pending");
        assert!(!texts[0].owner_marked);
        assert_eq!(collector.stats().marked_elements, 1);
    }

    #[test]
    fn test_document_marker_covers_own_text_only() {
        let page = Page::parse("<body><p data-envi-translated=\"true\">Done <b>nested</b></p></body>");
        let texts = collect_texts_of(&page, &mut TextCollector::new());
        assert_eq!(texts, vec!["nested"]);
    }

    #[test]
    fn test_written_nodes_skipped_but_failed_sibling_kept() {
        let page = Page::parse("<body><p>Hello <b>x</b> World</p></body>");
        let mut collector = TextCollector::new();

        let items = collector.collect(&page.document());
        assert_eq!(items.len(), 3);

        // "World" failed; the other two were written.
        for item in &items[..2] {
            collector.record_written(item);
            page.mark_translated(&item.owner);
        }

        assert_eq!(collect_texts_of(&page, &mut collector), vec![" World"]);
        assert_eq!(collector.stats().already_translated, 2);
        assert!(collector.is_translated_text(&items[0].node));
        assert!(!collector.is_translated_text(&items[2].node));
    }

    #[test]
    fn test_marked_body_does_not_hide_later_content() {
        let page = Page::parse("<body>Intro<div id=\"feed\"></div></body>");
        let mut collector = TextCollector::new();

        let items = collector.collect(&page.document());
        assert_eq!(tag_name(&items[0].owner), Some("body"));
        collector.record_written(&items[0]);
        page.mark_translated(&items[0].owner);

        let feed = find_element(&page.document(), "div").unwrap();
        let p = page.create_element("p", &[]);
        page.append_child(&p, &page.create_text("Late content"));
        page.append_child(&feed, &p);

        assert_eq!(collect_texts_of(&page, &mut collector), vec!["Late content"]);
    }

    #[test]
    fn test_owner_is_direct_parent() {
        let page = Page::parse("<body><p>Plain <em>emphasis</em></p></body>");
        let texts = TextCollector::new().collect(&page.document());
        assert_eq!(tag_name(&texts[0].owner), Some("p"));
        assert_eq!(tag_name(&texts[1].owner), Some("em"));
    }

    #[test]
    fn test_root_inside_skipped_container() {
        let page = Page::parse("<body><pre><span>x</span></pre></body>");
        let span = find_element(&page.document(), "span").unwrap();
        assert!(TextCollector::new().collect(&span).is_empty());
    }

    #[test]
    fn test_extra_skip_tags() {
        let page = Page::parse("<body><nav>Menu</nav><p>Body</p></body>");
        let texts = TextCollector::new()
            .with_extra_skip(&["NAV"])
            .collect(&page.document());
        assert_eq!(texts.len(), 1);
    }

    #[test]
    fn test_rewrap_keeps_surrounding_whitespace() {
        let page = Page::parse("<body><p>\n  Hello world  </p></body>");
        let item = TextCollector::new().collect(&page.document()).remove(0);

        assert_eq!(item.source_text(), "Hello world");
        assert_eq!(item.rewrap("Xin chào thế giới"), "\n  Xin chào thế giới  ");
    }
}
