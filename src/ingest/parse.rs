// src/ingest/parse.rs
//! Feed document parsing.
//!
//! The document is first read into a small element tree with `quick-xml`,
//! then the feed family is detected from the tree's shape (RSS 2.0, then
//! RSS 1.0/RDF, then Atom) and handed to that family's extractor. Element
//! names keep their namespace prefix (`dc:creator`, `rdf:RDF`).

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::error::ParseError;
use crate::ingest::types::RawItem;

/// Minimal element tree. `text` holds the element's own text and CDATA.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(e: &BytesStart) -> Self {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let attrs = e
            .attributes()
            .flatten()
            .map(|a| {
                let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                let value = a
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
                (key, value)
            })
            .collect();
        Self {
            name,
            attrs,
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Own text plus all descendant text, one space between element
    /// boundaries, trimmed.
    pub fn deep_text(&self) -> String {
        fn collect(n: &XmlNode, out: &mut String) {
            out.push_str(&n.text);
            for c in &n.children {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                collect(c, out);
            }
        }
        let mut out = String::new();
        collect(self, &mut out);
        out.trim().to_string()
    }

    /// Trimmed text of the first child called `name`, or "".
    pub fn child_text(&self, name: &str) -> String {
        self.child(name).map(XmlNode::deep_text).unwrap_or_default()
    }
}

fn text_of(e: &BytesText) -> String {
    e.unescape()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned())
}

/// Read a whole XML document into its root element.
pub fn parse_document(xml: &str) -> Result<XmlNode, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                if root.is_none() {
                    *root = Some(node);
                }
            }
        }
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(XmlNode::from_start(&e)),
            Event::Empty(e) => {
                let node = XmlNode::from_start(&e);
                attach(&mut stack, &mut root, node);
            }
            Event::Text(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text_of(&e));
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::UnclosedElement(open.name));
    }
    root.ok_or(ParseError::NoRoot)
}

/// Feed families in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFamily {
    Rss2,
    Rdf,
    Atom,
}

impl FeedFamily {
    pub const PRIORITY: [FeedFamily; 3] = [FeedFamily::Rss2, FeedFamily::Rdf, FeedFamily::Atom];

    /// Item nodes this family would read from `root` (empty when the shape
    /// does not match).
    pub fn items(self, root: &XmlNode) -> Vec<&XmlNode> {
        match self {
            FeedFamily::Rss2 if root.name == "rss" => root
                .child("channel")
                .map(|ch| ch.children_named("item").collect())
                .unwrap_or_default(),
            FeedFamily::Rdf if root.name == "rdf:RDF" || root.name == "RDF" => {
                root.children_named("item").collect()
            }
            FeedFamily::Atom if root.name == "feed" => root.children_named("entry").collect(),
            _ => Vec::new(),
        }
    }

    pub fn extract(self, node: &XmlNode, now: DateTime<Utc>) -> RawItem {
        match self {
            FeedFamily::Rss2 => extract_rss2(node, now),
            FeedFamily::Rdf => extract_rdf(node, now),
            FeedFamily::Atom => extract_atom(node, now),
        }
    }
}

/// First family (by priority) whose shape is present with at least one item.
pub fn detect_family(root: &XmlNode) -> Option<FeedFamily> {
    FeedFamily::PRIORITY
        .into_iter()
        .find(|f| !f.items(root).is_empty())
}

fn first_non_empty(candidates: impl IntoIterator<Item = String>) -> Option<String> {
    candidates.into_iter().find(|s| !s.is_empty())
}

fn fallback_now(now: DateTime<Utc>) -> String {
    now.to_rfc2822()
}

/// Link policy shared by all families: link text, then link href, then id,
/// then guid. Returns "" when nothing resolves.
pub fn pick_link(n: &XmlNode) -> String {
    let links: Vec<&XmlNode> = n.children_named("link").collect();

    if let Some(t) = first_non_empty(links.iter().map(|l| l.deep_text())) {
        return t;
    }

    // Atom may carry several <link/>; alternate (or untyped) first.
    let preferred = links
        .iter()
        .filter(|l| matches!(l.attr("rel"), None | Some("alternate")));
    if let Some(h) = first_non_empty(
        preferred
            .chain(links.iter())
            .filter_map(|l| l.attr("href"))
            .map(|h| h.trim().to_string()),
    ) {
        return h;
    }

    first_non_empty([n.child_text("id"), n.child_text("guid")]).unwrap_or_default()
}

fn extract_rss2(n: &XmlNode, now: DateTime<Utc>) -> RawItem {
    RawItem {
        title: n.child_text("title"),
        link: pick_link(n),
        content: n.child_text("description"),
        published: first_non_empty([n.child_text("pubDate")]).unwrap_or_else(|| fallback_now(now)),
        author: first_non_empty([n.child_text("dc:creator"), n.child_text("author")])
            .unwrap_or_default(),
    }
}

fn extract_rdf(n: &XmlNode, now: DateTime<Utc>) -> RawItem {
    RawItem {
        title: n.child_text("title"),
        link: pick_link(n),
        content: n.child_text("description"),
        published: first_non_empty([
            n.child_text("dcterms:issued"),
            n.child_text("dc:date"),
            n.child_text("pubDate"),
        ])
        .unwrap_or_else(|| fallback_now(now)),
        author: n.child_text("dc:creator"),
    }
}

fn extract_atom(n: &XmlNode, now: DateTime<Utc>) -> RawItem {
    RawItem {
        title: n.child_text("title"),
        link: pick_link(n),
        content: first_non_empty([n.child_text("summary"), n.child_text("content")])
            .unwrap_or_default(),
        published: first_non_empty([n.child_text("updated"), n.child_text("published")])
            .unwrap_or_else(|| fallback_now(now)),
        author: n
            .child("author")
            .map(|a| a.child_text("name"))
            .unwrap_or_default(),
    }
}

/// Parse a generic feed document. An unrecognised shape yields no items.
pub fn parse_feed(xml: &str, now: DateTime<Utc>) -> Result<Vec<RawItem>, ParseError> {
    let root = parse_document(xml)?;
    let Some(family) = detect_family(&root) else {
        return Ok(Vec::new());
    };
    Ok(family
        .items(&root)
        .into_iter()
        .map(|n| family.extract(n, now))
        .collect())
}

/// Leading `max` chars of a document, for error logs.
pub fn sample(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
