//! In-memory HTML document.
//!
//! Markup goes through the html5ever tree builder, so pushed fragments are
//! parsed the way `innerHTML` parses them: in the context of the element that
//! receives them, with implied end tags and character references resolved.
//! The resulting nodes live in an arena addressed by generational
//! [`NodeId`]s. Replacing an element's content frees the old subtree, so
//! handles into it stop resolving instead of aliasing the nodes that take
//! their slots.

use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, Namespace, ParseOpts, QualName, parse_document, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::trace;

use crate::document::Document;
use crate::error::{LiveViewError, Result};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text is written back without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "plaintext", "script", "style", "xmp",
];

/// Handle to a node of an [`HtmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Doctype(String),
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A mutable document tree built from markup.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
}

impl HtmlDocument {
    /// Parse a page or fragment.
    ///
    /// Markup opening with a doctype or `<html>` is parsed as a full page.
    /// Anything else is parsed as the content of a `<body>`.
    pub fn parse(markup: &str) -> Result<Self> {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        doc.root = doc.alloc(Node {
            kind: NodeKind::Root,
            children: Vec::new(),
        });

        let children = if is_full_page(markup) {
            let dom = parse_document(RcDom::default(), ParseOpts::default()).one(markup);
            doc.import_children(&dom.document)
        } else {
            doc.parse_content("body", markup)
        };
        if let Some(root) = doc.node_mut(doc.root) {
            root.children = children;
        }
        Ok(doc)
    }

    /// Serialize the whole document back to markup.
    pub fn to_html(&self) -> String {
        self.content(&self.root)
    }

    /// First element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attribute("id", id).into_iter().next()
    }

    /// Tag name of an element.
    pub fn tag_name(&self, element: NodeId) -> Option<&str> {
        match &self.node(element)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Concatenated text of `element` and its descendants, references decoded.
    pub fn text_content(&self, element: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(element, &mut out);
        out
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index: self.slots.len() - 1,
                generation: 0,
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let children = match self.node_mut(id) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            self.release(child);
        }
        let slot = &mut self.slots[id.index];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
    }

    /// Parse `markup` as the content of a `context` element into detached
    /// nodes owned by this document.
    fn parse_content(&mut self, context: &str, markup: &str) -> Vec<NodeId> {
        let context = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(context),
        );
        let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
            .one(markup);

        // The fragment parser roots its output in a synthetic <html> element.
        let Some(html) = dom.document.children.borrow().first().cloned() else {
            return Vec::new();
        };
        self.import_children(&html)
    }

    fn import_children(&mut self, parent: &Handle) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in parent.children.borrow().iter() {
            if let Some(id) = self.import(child) {
                out.push(id);
            }
        }
        out
    }

    fn import(&mut self, handle: &Handle) -> Option<NodeId> {
        let (kind, children) = match &handle.data {
            NodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let attrs = attrs
                    .borrow()
                    .iter()
                    .map(|attr| {
                        let key = match &attr.name.prefix {
                            Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                            None => attr.name.local.to_string(),
                        };
                        (key, attr.value.to_string())
                    })
                    .collect();
                // <template> keeps its parsed content in a separate fragment
                let children = match template_contents.borrow().as_ref() {
                    Some(contents) => self.import_children(contents),
                    None => self.import_children(handle),
                };
                let tag = name.local.to_string();
                (NodeKind::Element { tag, attrs }, children)
            }
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if text.is_empty() {
                    return None;
                }
                (NodeKind::Text(text), Vec::new())
            }
            NodeData::Comment { contents } => {
                (NodeKind::Comment(contents.to_string()), Vec::new())
            }
            NodeData::Doctype { name, .. } => (NodeKind::Doctype(name.to_string()), Vec::new()),
            NodeData::Document | NodeData::ProcessingInstruction { .. } => return None,
        };
        Some(self.alloc(Node { kind, children }))
    }

    fn collect(&self, id: NodeId, name: &str, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if let NodeKind::Element { attrs, .. } = &node.kind {
            if attrs.iter().any(|(key, _)| key == name) {
                out.push(id);
            }
        }
        for child in &node.children {
            self.collect(*child, name, out);
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    fn write_children(&self, node: &Node, raw_text: bool, out: &mut String) {
        for child in &node.children {
            self.write(*child, raw_text, out);
        }
    }

    fn write(&self, id: NodeId, raw_text: bool, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Root => self.write_children(node, false, out),
            NodeKind::Doctype(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => escape_into(text, false, out),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                self.write_children(node, RAW_TEXT_ELEMENTS.contains(&tag.as_str()), out);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn is_full_page(markup: &str) -> bool {
    let head: String = markup.trim_start().chars().take(9).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Escape text the way `innerHTML` serializes it.
fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

impl Document for HtmlDocument {
    type Element = NodeId;

    fn elements_with_attribute(&self, name: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect(self.root, &name.to_lowercase(), &mut out);
        out
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        let name = name.to_lowercase();
        match &self.node(*element)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone()),
            _ => None,
        }
    }

    fn replace_content(&mut self, element: &NodeId, markup: &str) -> Result<()> {
        let Some(context) = self.tag_name(*element).map(str::to_string) else {
            return Err(LiveViewError::UnknownElement(format!("{element:?}")));
        };

        let children = self.parse_content(&context, markup);
        let old = match self.node_mut(*element) {
            Some(node) => std::mem::replace(&mut node.children, children),
            None => Vec::new(),
        };
        trace!(removed = old.len(), "Replacing element content");
        for child in old {
            self.release(child);
        }
        Ok(())
    }

    fn content(&self, element: &NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.node(*element) {
            let raw_text = matches!(
                &node.kind,
                NodeKind::Element { tag, .. } if RAW_TEXT_ELEMENTS.contains(&tag.as_str())
            );
            self.write_children(node, raw_text, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = concat!(
        r#"<html><body>"#,
        r#"<div id="a" data-live-view="clock">old</div>"#,
        r#"<section><p id="b" data-live-view="feed"><i>x</i></p></section>"#,
        r#"<span id="c" data-live-view="clock"></span>"#,
        r#"</body></html>"#,
    );

    /// Content of a region after `markup` has been pushed into it.
    fn pushed(markup: &str) -> String {
        let mut doc = HtmlDocument::parse(r#"<div id="r" data-live-view="x"></div>"#).unwrap();
        let r = doc.element_by_id("r").unwrap();
        doc.replace_content(&r, markup).unwrap();
        doc.content(&r)
    }

    #[test]
    fn test_regions_in_document_order() {
        let doc = HtmlDocument::parse(PAGE).unwrap();
        let ids: Vec<String> = doc
            .elements_with_attribute("data-live-view")
            .iter()
            .map(|el| doc.attribute(el, "id").unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_find_by_attribute_exact_match() {
        let doc = HtmlDocument::parse(PAGE).unwrap();
        assert_eq!(doc.find_by_attribute("data-live-view", "clock").len(), 2);
        assert_eq!(doc.find_by_attribute("data-live-view", "Clock").len(), 0);
        assert_eq!(doc.find_by_attribute("data-live-view", "clo").len(), 0);
    }

    #[test]
    fn test_element_by_id_and_content() {
        let doc = HtmlDocument::parse(PAGE).unwrap();
        let b = doc.element_by_id("b").unwrap();
        assert_eq!(doc.tag_name(b), Some("p"));
        assert_eq!(doc.content(&b), "<i>x</i>");
    }

    #[test]
    fn test_replace_content_discards_old_subtree() {
        let mut doc = HtmlDocument::parse(PAGE).unwrap();
        let b = doc.element_by_id("b").unwrap();
        let before = doc.node_count();

        doc.replace_content(&b, "plain").unwrap();

        assert_eq!(doc.content(&b), "plain");
        // <i> and its text node freed, one text node added
        assert_eq!(doc.node_count(), before - 1);
    }

    #[test]
    fn test_pushed_markup_is_queryable() {
        let mut doc = HtmlDocument::parse(PAGE).unwrap();
        let a = doc.element_by_id("a").unwrap();
        doc.replace_content(&a, r#"<button id="inc" live-click="increment">+</button>"#)
            .unwrap();

        let button = doc.element_by_id("inc").unwrap();
        assert_eq!(doc.attribute(&button, "live-click").as_deref(), Some("increment"));
    }

    #[test]
    fn test_stale_handle_does_not_alias() {
        let mut doc = HtmlDocument::parse(PAGE).unwrap();
        let a = doc.element_by_id("a").unwrap();
        doc.replace_content(&a, r#"<em id="inner">1</em>"#).unwrap();
        let inner = doc.element_by_id("inner").unwrap();

        doc.replace_content(&a, r#"<strong id="other">2</strong>"#).unwrap();

        assert_eq!(doc.attribute(&inner, "id"), None);
        assert!(doc.replace_content(&inner, "x").is_err());
        assert_eq!(doc.content(&inner), "");
    }

    #[test]
    fn test_void_elements_and_bare_attributes() {
        let doc = HtmlDocument::parse(r#"<p><input disabled type="checkbox"><br></p>"#).unwrap();
        assert_eq!(doc.to_html(), r#"<p><input disabled="" type="checkbox"><br></p>"#);
        let input = doc.elements_with_attribute("disabled")[0];
        assert_eq!(doc.attribute(&input, "disabled").as_deref(), Some(""));
    }

    #[test]
    fn test_full_page_round_trip() {
        let page = r#"<!DOCTYPE html><html><head><title>t</title></head><body><p id="x">1</p></body></html>"#;
        let doc = HtmlDocument::parse(page).unwrap();
        assert_eq!(doc.to_html(), page);
        assert!(doc.element_by_id("x").is_some());
    }

    #[test]
    fn test_pushed_markup_round_trips_exactly() {
        let cases = [
            r#"<div data-live-view="x"><b>bold</b> text</div>"#,
            r#"<p class="c" id="i" title="t">x</p>"#,
            "a<!-- c -->b",
            "x &lt; y &amp; z",
            "<ul><li>1</li><li>2</li></ul>",
            "<script>if (a < b && c) {}</script>",
            r#"<a title="say &quot;hi&quot;" href="?a=1&amp;b=2">x</a>"#,
            "<br><hr><img src=\"a.png\">",
            "",
        ];
        for markup in cases {
            assert_eq!(pushed(markup), markup, "round trip of {markup:?}");
        }
    }

    #[test]
    fn test_pushed_markup_normalized_like_inner_html() {
        let cases = [
            ("<br/>", "<br>"),
            ("a<br/>b", "a<br>b"),
            ("<div/>after", "<div>after</div>"),
            ("x < y", "x &lt; y"),
            ("<ul><li>1<li>2</ul>", "<ul><li>1</li><li>2</li></ul>"),
            ("<p>one<p>two", "<p>one</p><p>two</p>"),
            ("<input disabled>", r#"<input disabled="">"#),
            ("a &amp b", "a &amp; b"),
            (r#"<svg><circle r="1"/></svg>"#, r#"<svg><circle r="1"></circle></svg>"#),
        ];
        for (markup, expected) in cases {
            assert_eq!(pushed(markup), expected, "content after pushing {markup:?}");
        }
    }

    #[test]
    fn test_bare_less_than_keeps_text() {
        let mut doc = HtmlDocument::parse(r#"<div id="r" data-live-view="x"></div>"#).unwrap();
        let r = doc.element_by_id("r").unwrap();
        doc.replace_content(&r, "x < y").unwrap();
        assert_eq!(doc.text_content(r), "x < y");
    }

    #[test]
    fn test_fragment_parsed_in_region_context() {
        let mut doc =
            HtmlDocument::parse(r#"<table><tbody id="rows" data-live-view="rows"></tbody></table>"#)
                .unwrap();
        let rows = doc.element_by_id("rows").unwrap();
        doc.replace_content(&rows, "<tr><td>1</td></tr>").unwrap();
        assert_eq!(doc.content(&rows), "<tr><td>1</td></tr>");
    }

    #[test]
    fn test_attribute_references_decoded() {
        let doc = HtmlDocument::parse(r#"<div id="r" data-live-view="a&amp;b">x</div>"#).unwrap();
        let r = doc.element_by_id("r").unwrap();
        assert_eq!(doc.attribute(&r, "data-live-view").as_deref(), Some("a&b"));
        assert_eq!(doc.find_by_attribute("data-live-view", "a&b"), vec![r]);
        assert!(doc.to_html().contains(r#"data-live-view="a&amp;b""#));
    }

    #[test]
    fn test_comments_kept() {
        let doc = HtmlDocument::parse("<p>a<!-- note -->b</p>").unwrap();
        assert_eq!(doc.to_html(), "<p>a<!-- note -->b</p>");
    }
}
