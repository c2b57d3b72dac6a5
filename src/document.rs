//! AniDB anime documents.
//!
//! Documents are parsed into a small owned element tree. Indexing reads tags
//! and relations out of the tree; the mature-content filter rebuilds a pruned
//! copy and serializes it, so the stored text is never touched.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// Tag name AniDB uses to flag adult titles.
pub const MATURE_TAG_NAME: &str = "18 restricted";

/// Category names containing any of these are dropped by the mature filter.
pub const MATURE_CATEGORY_KEYWORDS: &[&str] = &["hentai", "pornography", "18 restricted", "adult"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("document has no root element")]
    Empty,
    #[error("unclosed element <{0}>")]
    Unclosed(String),
    #[error("content found after the root element")]
    TrailingContent,
    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

fn xml_err(e: impl std::fmt::Display) -> DocumentError {
    DocumentError::Xml(e.to_string())
}

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, DocumentError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Concatenated direct text content, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        out.trim().to_string()
    }

    /// Trimmed text of the first child named `name`, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(Element::text)
            .filter(|text| !text.is_empty())
    }

    /// All descendant elements named `name`, in document order (self excluded).
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for el in self.elements() {
            if el.name == name {
                found.push(el);
            }
            el.collect_named(name, found);
        }
    }
}

/// A tag entry as found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub name: String,
    pub weight: i32,
}

/// A relation entry as found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRelation {
    pub related_aid: i64,
    pub relation_type: String,
}

/// A parsed anime document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeDocument {
    root: Element,
}

impl AnimeDocument {
    /// Parse document text. Anything other than a single well-formed root
    /// element is rejected.
    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(xml_err)? {
                Event::Start(start) => {
                    if stack.is_empty() && root.is_some() {
                        return Err(DocumentError::TrailingContent);
                    }
                    stack.push(Element::from_start(&start)?);
                }
                Event::Empty(start) => {
                    let el = Element::from_start(&start)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| DocumentError::Xml("unexpected end tag".to_string()))?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_err)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text.into_owned())),
                        None if text.trim().is_empty() => {}
                        None => return Err(DocumentError::TrailingContent),
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None => return Err(DocumentError::TrailingContent),
                    }
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and doctypes
                // carry nothing we index or serve.
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::Unclosed(open.name));
        }
        root.map(|root| Self { root }).ok_or(DocumentError::Empty)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Every `tag` element with a non-empty `name` child. A missing weight
    /// counts as 0.
    pub fn tags(&self) -> Result<Vec<ParsedTag>, DocumentError> {
        let mut tags = Vec::new();
        for el in self.root.descendants_named("tag") {
            let Some(name) = el.child_text("name") else {
                continue;
            };
            let weight = match el.attribute("weight").map(str::trim) {
                None | Some("") => 0,
                Some(raw) => raw.parse::<i32>().map_err(|_| DocumentError::InvalidNumber {
                    field: "tag weight",
                    value: raw.to_string(),
                })?,
            };
            tags.push(ParsedTag {
                name,
                weight: weight.max(0),
            });
        }
        Ok(tags)
    }

    /// Every `relatedanime/anime` entry carrying both an `id` and a `type`.
    pub fn relations(&self) -> Result<Vec<ParsedRelation>, DocumentError> {
        let mut relations = Vec::new();
        for group in self.root.descendants_named("relatedanime") {
            for el in group.elements().filter(|el| el.name == "anime") {
                let (Some(id), Some(kind)) = (el.attribute("id"), el.attribute("type")) else {
                    continue;
                };
                if id.is_empty() || kind.is_empty() {
                    continue;
                }
                let related_aid =
                    id.trim()
                        .parse::<i64>()
                        .map_err(|_| DocumentError::InvalidNumber {
                            field: "related anime id",
                            value: id.to_string(),
                        })?;
                relations.push(ParsedRelation {
                    related_aid,
                    relation_type: kind.to_string(),
                });
            }
        }
        Ok(relations)
    }

    /// Copy of the document with mature tags and categories removed.
    pub fn without_mature_content(&self) -> AnimeDocument {
        AnimeDocument {
            root: strip_mature(&self.root),
        }
    }

    /// Serialize back to XML text (without a declaration).
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, &self.root)?;
        String::from_utf8(writer.into_inner()).map_err(xml_err)
    }
}

/// Parse, drop mature content, serialize.
pub fn filter_mature_content(xml: &str) -> Result<String, DocumentError> {
    AnimeDocument::parse(xml)?.without_mature_content().to_xml()
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None if root.is_none() => *root = Some(el),
        None => return Err(DocumentError::TrailingContent),
    }
    Ok(())
}

fn is_mature_tag(el: &Element) -> bool {
    el.name == "tag"
        && el
            .child_text("name")
            .is_some_and(|name| name.eq_ignore_ascii_case(MATURE_TAG_NAME))
}

fn is_mature_category(el: &Element) -> bool {
    if el.name != "category" {
        return false;
    }
    let name = el.child_text("name").unwrap_or_default().to_lowercase();
    MATURE_CATEGORY_KEYWORDS
        .iter()
        .any(|keyword| name.contains(keyword))
}

fn strip_mature(el: &Element) -> Element {
    let in_categories = el.name == "categories";
    let children = el
        .children
        .iter()
        .filter_map(|node| match node {
            Node::Element(child) if is_mature_tag(child) => None,
            Node::Element(child) if in_categories && is_mature_category(child) => None,
            Node::Element(child) => Some(Node::Element(strip_mature(child))),
            Node::Text(text) => Some(Node::Text(text.clone())),
        })
        .collect();
    Element {
        name: el.name.clone(),
        attributes: el.attributes.clone(),
        children,
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_err);
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    for node in &el.children {
        match node {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_err)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(xml_err)
}
