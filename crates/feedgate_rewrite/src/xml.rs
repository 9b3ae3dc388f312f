//! An in-memory XML tree that round-trips feed documents.
//!
//! Namespace prefixes are kept as literal parts of element names
//! (`itunes:image`, `media:content`); feed rewriting matches on the
//! prefixed names and never resolves namespace URIs.

use crate::error::{RewriteError, RewriteResult};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A text payload inside an element, with its CDATA wrapping remembered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlText {
    /// The unescaped text value.
    pub value: String,
    /// Whether the text was wrapped in a CDATA section.
    pub cdata: bool,
}

/// One node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// An element with attributes and children.
    Element(XmlElement),
    /// Character data, escaped or CDATA-wrapped.
    Text(XmlText),
    /// A comment, stored verbatim.
    Comment(String),
    /// A processing instruction, stored as its full content
    /// (target and data, e.g. `xml-stylesheet href="..."`).
    ProcessingInstruction(String),
    /// The XML declaration.
    Declaration {
        /// The `version` pseudo-attribute.
        version: String,
        /// The `encoding` pseudo-attribute, if present.
        encoding: Option<String>,
        /// The `standalone` pseudo-attribute, if present.
        standalone: Option<String>,
    },
    /// A DOCTYPE declaration, stored verbatim.
    DocType(String),
}

/// An element: prefixed name, ordered attributes, ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Element name including any namespace prefix.
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds an attribute, builder style.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Adds a plain text child, builder style.
    #[must_use]
    pub fn with_text(mut self, value: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(XmlText {
            value: value.into(),
            cdata: false,
        }));
        self
    }

    /// Adds a CDATA-wrapped text child, builder style.
    #[must_use]
    pub fn with_cdata_text(mut self, value: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(XmlText {
            value: value.into(),
            cdata: true,
        }));
        self
    }

    /// Adds a child element, builder style.
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Appends a child node.
    pub fn push_child(&mut self, node: XmlNode) {
        self.children.push(node);
    }

    /// Appends a child element.
    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    /// Returns the value of the named attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the named attribute, appending it if absent.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.attributes.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value.to_string();
        } else {
            self.attributes.push((name.to_string(), value.to_string()));
        }
    }

    /// Returns the first child element with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find_map(|node| match node {
            XmlNode::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Returns the first child element with the given name, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Iterates over child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter_map(move |node| match node {
            XmlNode::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Iterates mutably over child elements with the given name.
    pub fn children_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut XmlElement> {
        self.children.iter_mut().filter_map(move |node| match node {
            XmlNode::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Iterates mutably over all child elements.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Keeps only the named children accepted by `keep`, removing the
    /// rest along with the whitespace that indented them.
    ///
    /// Children with other names are untouched.
    pub fn prune_children<F>(&mut self, name: &str, mut keep: F)
    where
        F: FnMut(&XmlElement) -> bool,
    {
        let mut kept = Vec::with_capacity(self.children.len());
        let mut swallow_whitespace = false;
        for node in self.children.drain(..) {
            match node {
                XmlNode::Element(element) if element.name == name => {
                    if keep(&element) {
                        kept.push(XmlNode::Element(element));
                        swallow_whitespace = false;
                    } else {
                        swallow_whitespace = true;
                    }
                }
                XmlNode::Text(text) if swallow_whitespace && text.value.trim().is_empty() => {
                    swallow_whitespace = false;
                }
                other => {
                    kept.push(other);
                    swallow_whitespace = false;
                }
            }
        }
        self.children = kept;
    }

    /// Removes every child element with the given name.
    pub fn remove_children(&mut self, name: &str) {
        self.prune_children(name, |_| false);
    }

    /// Returns the concatenated text of all text children, or `None` if
    /// the element has no text children at all.
    #[must_use]
    pub fn text_value(&self) -> Option<String> {
        let mut out = String::new();
        let mut found = false;
        for node in &self.children {
            if let XmlNode::Text(text) = node {
                out.push_str(&text.value);
                found = true;
            }
        }
        found.then_some(out)
    }

    /// Returns whether any text child is CDATA-wrapped.
    #[must_use]
    pub fn has_cdata_text(&self) -> bool {
        self.children
            .iter()
            .any(|node| matches!(node, XmlNode::Text(text) if text.cdata))
    }

    /// Replaces all text children with a single text node holding
    /// `value`, keeping the CDATA wrapping of the original content.
    pub fn set_text_value(&mut self, value: &str) {
        let cdata = self.has_cdata_text();
        self.children
            .retain(|node| !matches!(node, XmlNode::Text(_)));
        self.children.insert(
            0,
            XmlNode::Text(XmlText {
                value: value.to_string(),
                cdata,
            }),
        );
    }
}

/// A parsed XML document: nodes before the root, the root element, and
/// nodes after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// Declaration, processing instructions, comments, and whitespace
    /// preceding the root element.
    pub prolog: Vec<XmlNode>,
    /// The document root.
    pub root: XmlElement,
    /// Comments and whitespace following the root element.
    pub epilog: Vec<XmlNode>,
}

impl XmlDocument {
    /// Creates a document around `root` with a standard UTF-8 declaration.
    #[must_use]
    pub fn new(root: XmlElement) -> Self {
        Self {
            prolog: vec![
                XmlNode::Declaration {
                    version: "1.0".to_string(),
                    encoding: Some("UTF-8".to_string()),
                    standalone: None,
                },
                XmlNode::Text(XmlText {
                    value: "\n".to_string(),
                    cdata: false,
                }),
            ],
            root,
            epilog: Vec::new(),
        }
    }

    /// Parses a document from text.
    ///
    /// # Errors
    ///
    /// Returns [`RewriteError::ParseFailure`] for anything that is not a
    /// well-formed document with a single root element.
    pub fn parse(xml: &str) -> RewriteResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut builder = TreeBuilder::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|err| RewriteError::ParseFailure(err.to_string()))?;
            match event {
                Event::Start(start) => builder.open(element_from_start(&start)?),
                Event::Empty(start) => {
                    builder.place(XmlNode::Element(element_from_start(&start)?))?;
                }
                Event::End(_) => builder.close()?,
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|err| RewriteError::ParseFailure(err.to_string()))?
                        .into_owned();
                    builder.place(XmlNode::Text(XmlText {
                        value,
                        cdata: false,
                    }))?;
                }
                Event::CData(cdata) => {
                    let value = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    builder.place(XmlNode::Text(XmlText { value, cdata: true }))?;
                }
                Event::Comment(comment) => {
                    let value = String::from_utf8_lossy(&comment).into_owned();
                    builder.place(XmlNode::Comment(value))?;
                }
                Event::PI(pi) => {
                    let value = String::from_utf8_lossy(&pi).into_owned();
                    builder.place(XmlNode::ProcessingInstruction(value))?;
                }
                Event::Decl(decl) => builder.place(declaration_from_decl(&decl)?)?,
                Event::DocType(doctype) => {
                    let value = String::from_utf8_lossy(&doctype).into_owned();
                    builder.place(XmlNode::DocType(value))?;
                }
                Event::Eof => break,
            }
        }

        builder.finish()
    }

    /// Serializes the document back to text.
    ///
    /// # Errors
    ///
    /// Returns [`RewriteError::Serialization`] if an event cannot be
    /// written.
    pub fn serialize(&self) -> RewriteResult<String> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }
        String::from_utf8(writer.into_inner())
            .map_err(|err| RewriteError::Serialization(err.to_string()))
    }

    /// Drops every `xml-stylesheet` processing instruction, returning
    /// how many were removed. Legacy readers try to fetch and apply the
    /// stylesheet instead of ignoring it.
    pub fn remove_stylesheet_instructions(&mut self) -> usize {
        let before = self.prolog.len();
        self.prolog.retain(|node| {
            !matches!(
                node,
                XmlNode::ProcessingInstruction(content)
                    if content.trim_start().starts_with("xml-stylesheet")
            )
        });
        before - self.prolog.len()
    }
}

struct TreeBuilder {
    stack: Vec<XmlElement>,
    root: Option<XmlElement>,
    prolog: Vec<XmlNode>,
    epilog: Vec<XmlNode>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            root: None,
            prolog: Vec::new(),
            epilog: Vec::new(),
        }
    }

    fn open(&mut self, element: XmlElement) {
        self.stack.push(element);
    }

    fn close(&mut self) -> RewriteResult<()> {
        let element = self
            .stack
            .pop()
            .ok_or_else(|| RewriteError::ParseFailure("unmatched closing tag".to_string()))?;
        self.place(XmlNode::Element(element))
    }

    fn place(&mut self, node: XmlNode) -> RewriteResult<()> {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            return Ok(());
        }
        match node {
            XmlNode::Element(element) => {
                if self.root.is_some() {
                    return Err(RewriteError::ParseFailure(
                        "multiple root elements".to_string(),
                    ));
                }
                self.root = Some(element);
            }
            other if self.root.is_some() => self.epilog.push(other),
            other => self.prolog.push(other),
        }
        Ok(())
    }

    fn finish(self) -> RewriteResult<XmlDocument> {
        if !self.stack.is_empty() {
            return Err(RewriteError::ParseFailure(
                "unexpected end of document".to_string(),
            ));
        }
        let root = self
            .root
            .ok_or_else(|| RewriteError::ParseFailure("document has no root element".to_string()))?;
        Ok(XmlDocument {
            prolog: self.prolog,
            root,
            epilog: self.epilog,
        })
    }
}

fn element_from_start(start: &BytesStart<'_>) -> RewriteResult<XmlElement> {
    let name = String::from_utf8_lossy(start.name().into_inner()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| RewriteError::ParseFailure(err.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.into_inner()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| RewriteError::ParseFailure(err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn declaration_from_decl(decl: &BytesDecl<'_>) -> RewriteResult<XmlNode> {
    let version = decl
        .version()
        .map(|value| String::from_utf8_lossy(&value).into_owned())
        .map_err(|err| RewriteError::ParseFailure(err.to_string()))?;
    let encoding = match decl.encoding() {
        Some(Ok(value)) => Some(String::from_utf8_lossy(&value).into_owned()),
        Some(Err(err)) => return Err(RewriteError::ParseFailure(err.to_string())),
        None => None,
    };
    let standalone = match decl.standalone() {
        Some(Ok(value)) => Some(String::from_utf8_lossy(&value).into_owned()),
        Some(Err(err)) => return Err(RewriteError::ParseFailure(err.to_string())),
        None => None,
    };
    Ok(XmlNode::Declaration {
        version,
        encoding,
        standalone,
    })
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> RewriteResult<()> {
    writer
        .write_event(event)
        .map_err(|err| RewriteError::Serialization(err.to_string()))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> RewriteResult<()> {
    match node {
        XmlNode::Element(element) => write_element(writer, element),
        XmlNode::Text(text) => {
            if text.cdata {
                emit(writer, Event::CData(BytesCData::new(text.value.as_str())))
            } else {
                emit(writer, Event::Text(BytesText::new(text.value.as_str())))
            }
        }
        XmlNode::Comment(value) => emit(
            writer,
            Event::Comment(BytesText::from_escaped(value.as_str())),
        ),
        XmlNode::ProcessingInstruction(value) => {
            emit(writer, Event::PI(BytesPI::new(value.as_str())))
        }
        XmlNode::Declaration {
            version,
            encoding,
            standalone,
        } => emit(
            writer,
            Event::Decl(BytesDecl::new(
                version,
                encoding.as_deref(),
                standalone.as_deref(),
            )),
        ),
        XmlNode::DocType(value) => emit(
            writer,
            Event::DocType(BytesText::from_escaped(value.as_str())),
        ),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> RewriteResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        emit(writer, Event::Empty(start))
    } else {
        emit(writer, Event::Start(start))?;
        for child in &element.children {
            write_node(writer, child)?;
        }
        emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<?xml-stylesheet type=\"text/xsl\" href=\"/pretty.xsl\"?>\n",
        "<!-- generator: example -->\n",
        "<rss version=\"2.0\" xmlns:itunes=\"http://www.itunes.com/dtds/podcast-1.0.dtd\">\n",
        "  <channel>\n",
        "    <title>Show &amp; Tell</title>\n",
        "    <link>https://example.com/show</link>\n",
        "    <description><![CDATA[<p>hi</p>]]></description>\n",
        "    <enclosure url=\"https://example.com/e.mp3\" length=\"1\" type=\"audio/mpeg\"/>\n",
        "  </channel>\n",
        "</rss>\n",
    );

    #[test]
    fn round_trip_preserves_tree() {
        let document = XmlDocument::parse(FEED).unwrap();
        let serialized = document.serialize().unwrap();
        let reparsed = XmlDocument::parse(&serialized).unwrap();
        assert_eq!(document, reparsed);
    }

    #[test]
    fn text_is_unescaped_in_the_tree() {
        let document = XmlDocument::parse(FEED).unwrap();
        let channel = document.root.child("channel").unwrap();
        let title = channel.child("title").unwrap();
        assert_eq!(title.text_value().unwrap(), "Show & Tell");
    }

    #[test]
    fn attributes_are_reachable_by_name() {
        let document = XmlDocument::parse(FEED).unwrap();
        let channel = document.root.child("channel").unwrap();
        let enclosure = channel.child("enclosure").unwrap();
        assert_eq!(enclosure.attr("url"), Some("https://example.com/e.mp3"));
        assert_eq!(enclosure.attr("type"), Some("audio/mpeg"));
        assert_eq!(enclosure.attr("missing"), None);
    }

    #[test]
    fn cdata_is_flagged_and_survives_rewriting() {
        let mut document = XmlDocument::parse(FEED).unwrap();
        let channel = document.root.child_mut("channel").unwrap();
        let description = channel.child_mut("description").unwrap();
        assert!(description.has_cdata_text());

        description.set_text_value("<b>replaced</b>");
        let serialized = document.serialize().unwrap();
        assert!(serialized.contains("<![CDATA[<b>replaced</b>]]>"));
    }

    #[test]
    fn stylesheet_instructions_are_removed() {
        let mut document = XmlDocument::parse(FEED).unwrap();
        assert_eq!(document.remove_stylesheet_instructions(), 1);
        let serialized = document.serialize().unwrap();
        assert!(!serialized.contains("xml-stylesheet"));
        assert!(serialized.contains("<!-- generator: example -->"));
    }

    #[test]
    fn declaration_fields_survive() {
        let document = XmlDocument::parse(FEED).unwrap();
        let serialized = document.serialize().unwrap();
        let reparsed = XmlDocument::parse(&serialized).unwrap();
        assert!(reparsed.prolog.iter().any(|node| matches!(
            node,
            XmlNode::Declaration { encoding: Some(encoding), .. } if encoding == "UTF-8"
        )));
    }

    #[test]
    fn malformed_documents_fail_to_parse() {
        for raw in [
            "<rss><channel></rss>",
            "<rss><channel>",
            "</rss>",
            "",
            "just text",
            "<a/><b/>",
        ] {
            assert!(
                matches!(XmlDocument::parse(raw), Err(RewriteError::ParseFailure(_))),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn set_attr_replaces_in_place_and_appends() {
        let mut element = XmlElement::new("enclosure").with_attr("url", "a");
        element.set_attr("url", "b");
        element.set_attr("length", "3");
        assert_eq!(element.attr("url"), Some("b"));
        assert_eq!(element.attr("length"), Some("3"));
        assert_eq!(element.attributes.len(), 2);
    }

    #[test]
    fn prune_swallows_the_indentation_of_dropped_children() {
        let raw = "<channel>\n  <item>a</item>\n  <item>b</item>\n  <title>t</title>\n</channel>";
        let mut document = XmlDocument::parse(raw).unwrap();
        document.root.prune_children("item", |_| false);

        assert_eq!(document.root.children_named("item").count(), 0);
        assert!(document.root.child("title").is_some());
        let serialized = document.serialize().unwrap();
        assert_eq!(serialized, "<channel>\n  <title>t</title>\n</channel>");
    }

    #[test]
    fn prune_keeps_accepted_children_in_order() {
        let raw = "<channel><item>a</item><item>b</item><item>c</item></channel>";
        let mut document = XmlDocument::parse(raw).unwrap();
        let mut kept = 0;
        document.root.prune_children("item", |_| {
            kept += 1;
            kept <= 2
        });

        let texts: Vec<String> = document
            .root
            .children_named("item")
            .filter_map(XmlElement::text_value)
            .collect();
        assert_eq!(texts, ["a", "b"]);
    }

    #[test]
    fn childless_elements_serialize_self_closed() {
        let document = XmlDocument::parse("<a><b></b><c/></a>").unwrap();
        assert_eq!(document.serialize().unwrap(), "<a><b/><c/></a>");
    }

    #[test]
    fn built_documents_serialize() {
        let root = XmlElement::new("rss").with_attr("version", "2.0").with_child(
            XmlElement::new("channel")
                .with_child(XmlElement::new("title").with_text("hand made"))
                .with_child(XmlElement::new("description").with_cdata_text("<p>x</p>")),
        );
        let serialized = XmlDocument::new(root).serialize().unwrap();
        assert!(serialized.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(serialized.contains("<title>hand made</title>"));
        assert!(serialized.contains("<![CDATA[<p>x</p>]]>"));
    }
}
