//! Observable HTML document.
//!
//! [`Page`] wraps an rcdom tree and reports every change made through its
//! mutating methods to the receivers handed out by [`Page::observe`], the
//! same way a browser's mutation observer reports DOM changes. Code that
//! edits nodes directly bypasses the observers.

use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::tree_builder::{create_element, NodeOrText, TreeSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc;

/// Attribute set on an element once its text has been translated.
pub const TRANSLATED_ATTR: &str = "data-envi-translated";

/// What changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// A text node's content was replaced
    CharacterData,
    /// A child was added to the target
    ChildList,
    /// The named attribute of the target was set
    Attributes(String),
}

/// One change notification.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub target: Handle,
    pub kind: MutationKind,
}

/// An HTML document with mutation notification.
pub struct Page {
    dom: RcDom,
    observers: RefCell<Vec<mpsc::UnboundedSender<Mutation>>>,
}

impl Page {
    pub fn parse(html: &str) -> Page {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        Page {
            dom,
            observers: RefCell::new(Vec::new()),
        }
    }

    pub fn document(&self) -> Handle {
        self.dom.document.clone()
    }

    /// The `<body>` element; the parser always creates one for HTML input.
    pub fn body(&self) -> Option<Handle> {
        find_element(&self.dom.document, "body")
    }

    /// Subscribe to every later change made through this page.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<Mutation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.borrow_mut().push(tx);
        rx
    }

    fn notify(&self, target: &Handle, kind: MutationKind) {
        self.observers.borrow_mut().retain(|tx| {
            tx.send(Mutation {
                target: target.clone(),
                kind: kind.clone(),
            })
            .is_ok()
        });
    }

    /// Replace the content of a text node. Returns `false` for other nodes.
    pub fn set_text(&self, node: &Handle, text: &str) -> bool {
        let NodeData::Text { ref contents } = node.data else {
            return false;
        };
        {
            let mut contents = contents.borrow_mut();
            contents.clear();
            contents.push_slice(text);
        }
        self.notify(node, MutationKind::CharacterData);
        true
    }

    /// Set (or add) an attribute on an element. Returns `false` for other nodes.
    pub fn set_attribute(&self, node: &Handle, name: &str, value: &str) -> bool {
        let NodeData::Element { ref attrs, .. } = node.data else {
            return false;
        };
        {
            let mut attrs = attrs.borrow_mut();
            match attrs.iter_mut().find(|a| &*a.name.local == name) {
                Some(existing) => {
                    existing.value.clear();
                    existing.value.push_slice(value);
                }
                None => attrs.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(name)),
                    value: format_tendril!("{}", value),
                }),
            }
        }
        self.notify(node, MutationKind::Attributes(name.to_string()));
        true
    }

    /// Append a detached node as the last child of `parent`.
    pub fn append_child(&self, parent: &Handle, child: &Handle) {
        self.dom
            .append(parent, NodeOrText::AppendNode(child.clone()));
        self.notify(parent, MutationKind::ChildList);
    }

    /// A detached HTML element.
    pub fn create_element(&self, tag: &str, attributes: &[(&str, &str)]) -> Handle {
        let attrs = attributes
            .iter()
            .map(|(name, value)| Attribute {
                name: QualName::new(None, ns!(), LocalName::from(*name)),
                value: format_tendril!("{}", value),
            })
            .collect();
        create_element(
            &self.dom,
            QualName::new(None, ns!(html), LocalName::from(tag)),
            attrs,
        )
    }

    /// A detached text node.
    pub fn create_text(&self, text: &str) -> Handle {
        Node::new(NodeData::Text {
            contents: RefCell::new(StrTendril::from(text)),
        })
    }

    /// Mark `owner` as translated.
    pub fn mark_translated(&self, owner: &Handle) -> bool {
        self.set_attribute(owner, TRANSLATED_ATTR, "true")
    }

    /// Serialize the whole document back to HTML.
    pub fn to_html(&self) -> std::io::Result<String> {
        let mut buf: Vec<u8> = Vec::new();
        let serializable: SerializableHandle = self.dom.document.clone().into();
        serialize(&mut buf, &serializable, SerializeOpts::default())?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Parent of `node`, leaving the node's parent link intact.
pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|p| p.upgrade());
    node.parent.set(weak);
    parent
}

pub fn tag_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

pub fn get_attribute(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == attr_name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Content of a text node.
pub fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Concatenated text of every descendant text node, in document order.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    push_text(node, &mut out);
    out
}

fn push_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        push_text(child, out);
    }
}

pub fn is_marked(node: &Handle) -> bool {
    get_attribute(node, TRANSLATED_ATTR).as_deref() == Some("true")
}

/// Set of nodes compared by identity, not content.
///
/// Holds a strong reference to every member, so an address is never reused
/// while it is in the set.
#[derive(Default)]
pub struct NodeSet {
    nodes: HashMap<*const Node, Handle>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: &Handle) -> bool {
        self.nodes.insert(Rc::as_ptr(node), node.clone()).is_none()
    }

    pub fn contains(&self, node: &Handle) -> bool {
        self.nodes.contains_key(&Rc::as_ptr(node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for NodeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSet").field("len", &self.nodes.len()).finish()
    }
}

/// First element named `tag` in document order.
pub fn find_element(node: &Handle, tag: &str) -> Option<Handle> {
    if tag_name(node) == Some(tag) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}
