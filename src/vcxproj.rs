//! Format-preserving editing of MSBuild `.vcxproj` documents.
//!
//! Reading goes through `roxmltree`.  Writing never re-serialises the tree:
//! every change is a [`Splice`] of the raw source computed from
//! `roxmltree::Node::range()`, so whitespace, comments, attribute order and
//! quoting outside the edited spans stay byte-identical.
//!
//! Typical use is to parse a [`Document`](roxmltree::Document) from
//! [`Vcxproj::document`], collect [`Edits`] against that snapshot, drop the
//! document, then [`Vcxproj::apply`] the edits.

use std::ops::Range;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::error::{Error, Result};

pub const MSBUILD_NS: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

const BOM: &str = "\u{feff}";

// ═══════════════════════════════════════════════════════════════════════════════
//  Vcxproj – top-level handle
// ═══════════════════════════════════════════════════════════════════════════════

/// A `.vcxproj` held as source text.
#[derive(Debug, Clone)]
pub struct Vcxproj {
    source: String,
    /// Whether the file started with a UTF-8 byte-order mark.
    bom: bool,
    path: Option<PathBuf>,
}

impl Vcxproj {
    /// Parse a project from raw UTF-8 bytes.  The document is validated
    /// once here so later passes can assume it is well formed.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Encoding(format!("project is not valid UTF-8: {e}")))?;
        let (bom, source) = match text.strip_prefix(BOM) {
            Some(rest) => (true, rest.to_string()),
            None => (false, text.to_string()),
        };
        let project = Self { source, bom, path: None };
        project.document()?;
        Ok(project)
    }

    /// Load a project file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let mut project = Self::parse(&bytes)?;
        project.path = Some(path.to_path_buf());
        Ok(project)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The current XML source without byte-order mark (reflects any edits).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.source.len() + BOM.len());
        if self.bom {
            bytes.extend_from_slice(BOM.as_bytes());
        }
        bytes.extend_from_slice(self.source.as_bytes());
        bytes
    }

    /// Write the (potentially edited) project back to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()).map_err(|e| Error::io(path, e))
    }

    /// Parse the current source.  Fails unless the root is an MSBuild
    /// `<Project>` element.
    pub fn document(&self) -> Result<Document<'_>> {
        let doc = Document::parse(&self.source)?;
        let root = doc.root_element();
        if !is_element(&root, "Project") {
            return Err(Error::structure(format!(
                "root element is <{}>, expected <Project xmlns=\"{MSBUILD_NS}\">",
                root.tag_name().name()
            )));
        }
        Ok(doc)
    }

    /// Apply edits computed against the current source.  Returns whether
    /// anything was applied.
    pub fn apply(&mut self, edits: Edits) -> bool {
        if edits.is_empty() {
            return false;
        }
        edits.apply_to(&mut self.source);
        true
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Splices
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace `range` of the source with `text`.  An empty range is an
/// insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub range: Range<usize>,
    pub text: String,
}

impl Splice {
    fn shifted_back(self, offset: usize) -> Self {
        Self { range: self.range.start - offset..self.range.end - offset, text: self.text }
    }
}

/// Non-overlapping splices against one snapshot of a source string.
#[derive(Debug, Clone, Default)]
pub struct Edits {
    splices: Vec<Splice>,
}

impl Edits {
    pub fn push(&mut self, splice: Splice) {
        self.splices.push(splice);
    }

    pub fn is_empty(&self) -> bool {
        self.splices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.splices.len()
    }

    /// Apply back to front so earlier ranges stay valid.  Insertions at the
    /// same offset end up in the order they were pushed.
    fn apply_to(self, text: &mut String) {
        let mut splices: Vec<(usize, Splice)> = self.splices.into_iter().enumerate().collect();
        splices.sort_by_key(|(seq, s)| std::cmp::Reverse((s.range.start, *seq)));
        for (_, splice) in splices {
            text.replace_range(splice.range, &splice.text);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Node queries
// ═══════════════════════════════════════════════════════════════════════════════

/// An element named `name` in the MSBuild namespace.
pub fn is_element(node: &Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(MSBUILD_NS)
}

/// Child elements named `name`.
pub fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| is_element(n, name))
}

/// First child element named `name`.
pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_element(n, name))
}

/// Grandchildren `<outer><inner/></outer>` of the root, in document order.
pub fn root_grandchildren<'a, 'input: 'a>(
    doc: &'a Document<'input>,
    outer: &'a str,
    inner: &'a str,
) -> Vec<Node<'a, 'input>> {
    children(doc.root_element(), outer)
        .flat_map(|group| children(group, inner))
        .collect()
}

/// Text content of an element; empty when it has none.
pub fn text<'a>(node: &Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("")
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Escaping
// ═══════════════════════════════════════════════════════════════════════════════

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' if quote == '"' => out.push_str("&quot;"),
            '\'' if quote == '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Start-tag scanning
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct AttributeSpan {
    name: Range<usize>,
    value: Range<usize>,
    quote: char,
}

/// Byte layout of an element's start tag, relative to the element start.
#[derive(Debug)]
struct StartTag {
    name: Range<usize>,
    attributes: Vec<AttributeSpan>,
    /// Offset of the `/` in `/>` or of the closing `>`.
    close: usize,
    self_closing: bool,
}

fn scan_start_tag(element: &str) -> Option<StartTag> {
    let bytes = element.as_bytes();
    let is_name_end = |b: u8| b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/');

    let mut i = 1;
    while i < bytes.len() && !is_name_end(bytes[i]) {
        i += 1;
    }
    let name = 1..i;
    let mut attributes = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => return Some(StartTag { name, attributes, close: i, self_closing: false }),
            b'/' => return Some(StartTag { name, attributes, close: i, self_closing: true }),
            _ => {}
        }

        let name_start = i;
        while i < bytes.len() && !is_name_end(bytes[i]) {
            i += 1;
        }
        let attr_name = name_start..i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            return None;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let quote = *bytes.get(i)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let value_start = i + 1;
        let value_len = element[value_start..].find(quote as char)?;
        i = value_start + value_len + 1;
        attributes.push(AttributeSpan {
            name: attr_name,
            value: value_start..value_start + value_len,
            quote: quote as char,
        });
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Splice builders
// ═══════════════════════════════════════════════════════════════════════════════

/// Line terminator and indentation of the line `pos` sits on.
///
/// The indentation is empty when something other than whitespace precedes
/// `pos` on its line.
fn line_layout(src: &str, pos: usize) -> (&'static str, &str) {
    let line_start = src[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &src[line_start..pos];
    let indent = if prefix.chars().all(char::is_whitespace) { prefix } else { "" };
    let crlf = if line_start > 0 {
        src[..line_start - 1].ends_with('\r')
    } else {
        src.contains("\r\n")
    };
    (if crlf { "\r\n" } else { "\n" }, indent)
}

/// Insert `text` on a new line right after `node`, indented like `node`.
pub fn insert_after(src: &str, node: Node, text: &str) -> Splice {
    let range = node.range();
    let (newline, indent) = line_layout(src, range.start);
    Splice { range: range.end..range.end, text: format!("{newline}{indent}{text}") }
}

/// Remove `node` along with its indentation and the line break before it.
pub fn remove(src: &str, node: Node) -> Splice {
    let range = node.range();
    let mut start = range.start;
    let (_, indent) = line_layout(src, start);
    if !indent.is_empty() || src[..start].ends_with('\n') {
        start -= indent.len();
        if src[..start].ends_with("\r\n") {
            start -= 2;
        } else if src[..start].ends_with('\n') {
            start -= 1;
        }
    }
    Splice { range: start..range.end, text: String::new() }
}

/// Replace the text content of `node` with `value`.
pub fn set_text(src: &str, node: Node, value: &str) -> Splice {
    let value = escape_text(value);
    if let Some(text) = node.children().find(|n| n.is_text()) {
        return Splice { range: text.range(), text: value };
    }

    let range = node.range();
    let element = &src[range.clone()];
    match scan_start_tag(element) {
        Some(tag) if tag.self_closing => {
            let qname = &element[tag.name.clone()];
            let head = element[..tag.close].trim_end();
            Splice { range, text: format!("{head}>{value}</{qname}>") }
        }
        Some(tag) => {
            let at = range.start + tag.close + 1;
            Splice { range: at..at, text: value }
        }
        None => Splice { range: range.end..range.end, text: String::new() },
    }
}

/// Set attribute `name` on `node`, adding it if absent.
pub fn set_attribute(src: &str, node: Node, name: &str, value: &str) -> Splice {
    let start = node.range().start;
    let element = &src[node.range()];
    let Some(tag) = scan_start_tag(element) else {
        return Splice { range: start..start, text: String::new() };
    };
    match tag.attributes.iter().find(|a| &element[a.name.clone()] == name) {
        Some(attr) => Splice {
            range: start + attr.value.start..start + attr.value.end,
            text: escape_attribute(value, attr.quote),
        },
        None => {
            let at = start + element[..tag.close].trim_end().len();
            Splice { range: at..at, text: format!(" {name}=\"{}\"", escape_attribute(value, '"')) }
        }
    }
}

/// Append `text` as the last child of `parent`, on its own line.
pub fn append_child(src: &str, parent: Node, text: &str) -> Splice {
    if let Some(last) = parent.children().filter(|n| n.is_element()).last() {
        return insert_after(src, last, text);
    }

    let range = parent.range();
    let element = &src[range.clone()];
    let (newline, indent) = line_layout(src, range.start);
    let inner = format!("{indent}  ");
    let Some(tag) = scan_start_tag(element) else {
        return Splice { range: range.end..range.end, text: String::new() };
    };
    let qname = &element[tag.name.clone()];

    if tag.self_closing {
        let head = element[..tag.close].trim_end();
        return Splice {
            range,
            text: format!("{head}>{newline}{inner}{text}{newline}{indent}</{qname}>"),
        };
    }

    let content_start = range.start + tag.close + 1;
    let content_end = range.start + element.rfind("</").unwrap_or(element.len());
    Splice {
        range: content_start..content_end,
        text: format!("{newline}{inner}{text}{newline}{indent}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  ElementCopy
// ═══════════════════════════════════════════════════════════════════════════════

/// The source text of an element, with edits applied to the copy only.
#[derive(Debug)]
pub struct ElementCopy<'s> {
    src: &'s str,
    range: Range<usize>,
    edits: Edits,
}

impl<'s> ElementCopy<'s> {
    pub fn of(src: &'s str, node: Node) -> Self {
        Self { src, range: node.range(), edits: Edits::default() }
    }

    /// Set an attribute of `node`, which must lie inside the copied element.
    pub fn set_attribute(mut self, node: Node, name: &str, value: &str) -> Self {
        let splice = set_attribute(self.src, node, name, value);
        self.edits.push(splice.shifted_back(self.range.start));
        self
    }

    /// Set the text of `node`, which must lie inside the copied element.
    pub fn set_text(mut self, node: Node, value: &str) -> Self {
        let splice = set_text(self.src, node, value);
        self.edits.push(splice.shifted_back(self.range.start));
        self
    }

    pub fn into_string(self) -> String {
        let mut text = self.src[self.range].to_string();
        self.edits.apply_to(&mut text);
        text
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
