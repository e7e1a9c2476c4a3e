use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::types::AnnotateError;

/// A single element of a session-description document.
///
/// Only what the annotator needs is kept: element name, attributes in
/// document order, text content and child elements. Comments, processing
/// instructions and whitespace between elements are not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Attributes as (key, value) pairs, in document order
    pub attributes: Vec<(String, String)>,
    /// Text content, if any
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    /// Creates an empty element with the given tag name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Creates an element holding only text.
    pub fn with_text<S: Into<String>, T: Into<String>>(name: S, text: T) -> Self {
        let mut element = Element::new(name);
        element.text = Some(text.into());
        element
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text<T: Into<String>>(&mut self, text: T) {
        self.text = Some(text.into());
    }

    /// Returns the value of an attribute, if present.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing any existing value for the same key.
    pub fn set_attribute<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// All direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Appends a child and returns a mutable reference to it.
    pub fn push_child(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Removes the first direct child with the given name.
    pub fn remove_child(&mut self, name: &str) -> Option<Element> {
        let index = self.children.iter().position(|c| c.name == name)?;
        Some(self.children.remove(index))
    }

    /// Drops all children, text and attributes, keeping only the tag name.
    pub fn clear(&mut self) {
        self.attributes.clear();
        self.text = None;
        self.children.clear();
    }

    /// Follows a `/`-separated path of child names starting below this element.
    pub fn find(&self, path: &str) -> Option<&Element> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.child(segment)?;
        }
        Some(current)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.child_mut(segment)?;
        }
        Some(current)
    }
}

/// A parsed session-description document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The document element (`parameters` in NeuroScope files)
    pub root: Element,
}

impl Document {
    /// Parses a document from a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use session_annotator::Document;
    ///
    /// let doc = Document::parse_str("<parameters><generalInfo><date>2024-06-10</date></generalInfo></parameters>").unwrap();
    /// assert_eq!(doc.find("generalInfo/date").and_then(|e| e.text()), Some("2024-06-10"));
    /// ```
    pub fn parse_str(xml: &str) -> Result<Document, AnnotateError> {
        let mut reader = Reader::from_str(xml);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(element_from_start(&e)?),
                Event::Empty(e) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let mut element = stack.pop().ok_or_else(|| {
                        AnnotateError::Malformed("closing tag without opening tag".to_string())
                    })?;
                    // Indentation around child elements is layout, not content
                    let blank = element.text.as_deref().is_some_and(is_blank);
                    if blank && !element.children.is_empty() {
                        element.text = None;
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    let blank = e.iter().all(u8::is_ascii_whitespace);
                    let text = e.unescape()?;
                    append_text(&mut stack, &text, blank);
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    append_text(&mut stack, &text, false);
                }
                Event::Eof => break,
                // Declarations, comments, PIs and doctypes are not kept
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(AnnotateError::Malformed(format!(
                "element <{}> is never closed",
                open.name
            )));
        }

        root.map(|root| Document { root })
            .ok_or_else(|| AnnotateError::Malformed("document has no root element".to_string()))
    }

    /// Reads and parses a document from disk. The file is not modified.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Document, AnnotateError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Document::parse_str(&contents)
    }

    /// Looks up an element by a path relative to the root element.
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.root.find(path)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        self.root.find_mut(path)
    }

    /// Serializes the document with an XML declaration, one-space
    /// indentation and a trailing newline.
    ///
    /// Elements holding only text are written on one line, and elements
    /// with neither text nor children are self-closed.
    pub fn to_pretty_string(&self) -> Result<String, AnnotateError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        write_element(&mut writer, &self.root)?;

        let mut out = String::from_utf8(writer.into_inner())
            .map_err(|e| AnnotateError::Malformed(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }

    /// Writes the document to `path`, replacing any existing file.
    ///
    /// The contents go to a temporary file in the same directory first and
    /// are renamed into place, so readers never see a half-written file.
    pub fn write_atomic<P: AsRef<Path>>(&self, path: P) -> Result<(), AnnotateError> {
        let path = path.as_ref();
        let contents = self.to_pretty_string()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| AnnotateError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// Returns true if `name` can be used as an XML element name.
///
/// Namespace prefixes are rejected since region labels never carry one.
pub fn is_valid_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

fn element_from_start(start: &BytesStart) -> Result<Element, AnnotateError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), AnnotateError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(AnnotateError::Malformed(format!(
            "second root element <{}>",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_whitespace())
}

/// Appends text to the innermost open element, verbatim.
///
/// Whitespace-only runs that follow a child element are dropped.
fn append_text(stack: &mut [Element], text: &str, blank: bool) {
    // Text outside the root element is ignored
    if let Some(current) = stack.last_mut() {
        if blank && !current.children.is_empty() {
            return;
        }
        match current.text.as_mut() {
            Some(existing) => existing.push_str(text),
            None => current.text = Some(text.to_string()),
        }
    }
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<(), AnnotateError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let text = element.text.as_deref().filter(|t| !t.is_empty());
    if text.is_none() && element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start))?;
    if let Some(text) = text {
        // Only markup characters are escaped; quotes stay literal in text
        writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(end))?;
    Ok(())
}
