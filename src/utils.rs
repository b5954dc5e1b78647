use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use quick_xml::{NsReader, escape::unescape, events::Event};

use crate::error::EpubError;

/// Normalizes a manifest href into a stored path
///
/// The href is cut at the first `#` fragment marker and then percent-decoded.
/// Cutting first keeps an encoded `%23` as part of the file name.
///
/// ## Return
/// - `Ok(String)`: The decoded path without fragment
/// - `Err(EpubError)`: The decoded bytes are not valid UTF-8
pub fn normalize_href(href: &str) -> Result<String, EpubError> {
    let without_fragment = match href.find('#') {
        Some(index) => &href[..index],
        None => href,
    };

    percent_decode_str(without_fragment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| EpubError::InvalidHref {
            href: href.to_string(),
        })
}

/// Resolves a path relative to a folder inside the container
///
/// Container paths always use `/` separators. `.` segments are dropped and
/// `..` segments climb one folder; climbing above the container root means
/// the link leaks out of the EPUB package. A path starting with `/` is taken
/// as relative to the container root.
///
/// ## Parameters
/// - `base_dir`: The folder the path is relative to, `""` for the root
/// - `relative`: The path to resolve
///
/// ## Return
/// - `Ok(String)`: The resolved container path
/// - `Err(EpubError)`: The path is outside the container
pub fn resolve_container_path(base_dir: &str, relative: &str) -> Result<String, EpubError> {
    let (mut segments, remaining) = match relative.strip_prefix('/') {
        Some(rest) => (Vec::new(), rest),
        None => (
            base_dir
                .split('/')
                .filter(|segment| !segment.is_empty())
                .collect::<Vec<&str>>(),
            relative,
        ),
    };

    for segment in remaining.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    // failed to navigate up,
                    // which means we're trying to escape the root directory
                    return Err(EpubError::RelativeLinkLeakage {
                        path: relative.to_string(),
                    });
                }
            }
            _ => segments.push(segment),
        }
    }

    Ok(segments.join("/"))
}

/// Returns the folder part of a container path, `""` for root-level files
pub fn parent_folder(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Provides functionality to decode byte data into strings
///
/// This trait decodes raw file data read from an archive into a string.
/// It supports UTF-8 (with or without BOM), UTF-16 BE and UTF-16 LE.
///
/// ## Notes
/// - When attempting to parse a byte stream lacking a BOM (Byte Order Mark), the parsing
///   results may be unreadable; caution should be exercised when using such streams.
pub trait DecodeBytes {
    fn decode(&self) -> Result<String, EpubError>;
}

impl DecodeBytes for [u8] {
    fn decode(&self) -> Result<String, EpubError> {
        // Check UTF-8 BOM (0xEF, 0xBB, 0xBF)
        if let Some(rest) = self.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
            return String::from_utf8(rest.to_vec()).map_err(EpubError::from);
        }

        // Check UTF-16 BE BOM (0xFE, 0xFF)
        if let Some(rest) = self.strip_prefix(&[0xFE, 0xFF]) {
            let utf16_units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .collect();
            return String::from_utf16(&utf16_units).map_err(EpubError::from);
        }

        // Check UTF-16 LE BOM (0xFF, 0xFE)
        if let Some(rest) = self.strip_prefix(&[0xFF, 0xFE]) {
            let utf16_units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect();
            return String::from_utf16(&utf16_units).map_err(EpubError::from);
        }

        String::from_utf8(self.to_vec()).map_err(EpubError::from)
    }
}

impl DecodeBytes for Vec<u8> {
    fn decode(&self) -> Result<String, EpubError> {
        self.as_slice().decode()
    }
}

/// Provides functionality for normalizing whitespace characters
///
/// This trait normalizes various sequences of whitespace characters
/// (including spaces, tabs, newlines, etc.) in a string into a single
/// whitespace character, removing leading and trailing whitespace characters.
pub trait NormalizeWhitespace {
    fn normalize_whitespace(&self) -> String;
}

impl NormalizeWhitespace for &str {
    fn normalize_whitespace(&self) -> String {
        self.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl NormalizeWhitespace for String {
    fn normalize_whitespace(&self) -> String {
        self.as_str().normalize_whitespace()
    }
}

/// Represents an element node in an XML document
#[derive(Debug)]
pub struct XmlElement {
    /// The local name of the element(excluding namespace prefix)
    pub name: String,

    /// The namespace prefix of the element
    pub prefix: Option<String>,

    /// The attributes of the element
    ///
    /// The key is the attribute name, the value is the unescaped attribute value
    pub attributes: HashMap<String, String>,

    /// The children of the element
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create a new element
    pub fn new(name: String) -> Self {
        Self {
            name,
            prefix: None,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// Get the full tag name of the element
    ///
    /// If the element has a namespace prefix, return "prefix:name" format;
    /// otherwise, return only the element name.
    pub fn tag_name(&self) -> String {
        if let Some(prefix) = &self.prefix {
            format!("{}:{}", prefix, self.name)
        } else {
            self.name.clone()
        }
    }

    /// Returns the value of the specified attribute
    ///
    /// A prefixed attribute (`opf:version`) also answers to its local name.
    pub fn get_attr(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned().or_else(|| {
            self.attributes
                .iter()
                .find(|(key, _)| key.rsplit(':').next() == Some(name))
                .map(|(_, value)| value.clone())
        })
    }

    /// Find all elements with the specified name, depth first, starting with this element
    pub fn find_elements_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        let mut elements = Vec::new();
        Self::collect_elements(self, &mut elements);
        elements
            .into_iter()
            .filter(move |element| element.name == name)
    }

    /// Find all elements with the specified name among the child elements of the current element
    pub fn find_children_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    fn collect_elements<'a>(element: &'a XmlElement, collection: &mut Vec<&'a XmlElement>) {
        collection.push(element);
        for child in &element.children {
            Self::collect_elements(child, collection);
        }
    }
}

/// XML parser used to parse XML content and build an XML element tree
///
/// Only elements and attributes are kept; text, comments, processing
/// instructions and doctype declarations are skipped because the package
/// document is consumed purely through its attributes.
pub struct XmlReader {}

impl XmlReader {
    /// Parses an XML from string and builds the root element
    ///
    /// ## Parameters
    /// - `content`: The XML string to be parsed
    ///
    /// ## Return
    /// - `Ok(XmlElement)`: The root element of the XML element tree
    /// - `Err(EpubError)`: The document is empty, not well-formed, or never closes its root
    pub fn parse(content: &str) -> Result<XmlElement, EpubError> {
        if content.trim().is_empty() {
            return Err(EpubError::EmptyDataError);
        }

        let mut reader = NsReader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack = Vec::<XmlElement>::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf) {
                // End of file, stop the loop
                Ok(Event::Eof) => break,

                // Start of an element
                Ok(Event::Start(e)) => {
                    let element = Self::make_element(&e);
                    stack.push(element);
                }

                // End of an element
                Ok(Event::End(_)) => {
                    if let Some(element) = stack.pop() {
                        // If the stack is empty,
                        // the current element is the root element
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(element);
                        } else {
                            root = Some(element);
                        }
                    }
                }

                // Self-closing element
                Ok(Event::Empty(e)) => {
                    let element = Self::make_element(&e);
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    } else {
                        root = Some(element);
                    }
                }

                Err(err) => return Err(err.into()),

                // Ignore the following events (elements):
                // Text, CData, Comment, PI, Declaration, Doctype, GeneralRef
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(EpubError::IncompleteMarkup);
        }

        root.ok_or(EpubError::IncompleteMarkup)
    }

    fn make_element(start: &quick_xml::events::BytesStart<'_>) -> XmlElement {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
        let mut element = XmlElement::new(name);

        if let Some(prefix) = start.name().prefix() {
            element.prefix = Some(String::from_utf8_lossy(prefix.as_ref()).to_string());
        }

        for attr in start.attributes().flatten() {
            let attr_key = String::from_utf8_lossy(attr.key.as_ref()).to_string();

            // Namespace declarations carry no information we consume
            if attr_key == "xmlns" || attr_key.starts_with("xmlns:") {
                continue;
            }

            let raw_value = String::from_utf8_lossy(&attr.value).to_string();
            let attr_value = match unescape(&raw_value) {
                Ok(value) => value.into_owned(),
                Err(_) => raw_value,
            };

            element.attributes.insert(attr_key, attr_value);
        }

        element
    }
}
