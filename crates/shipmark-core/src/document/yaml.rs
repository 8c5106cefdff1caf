//! Layout-preserving YAML documents.
//!
//! Reading goes through `serde_yaml` ([`load`]). Writing goes through
//! [`YamlDocument`], which keeps the original text and a layout tree that
//! records the byte span of every single-line scalar. An edit splices new
//! text into exactly one span (or adds one `key: value` entry to a map), so
//! comments, blank lines, key order and quoting elsewhere in the file are
//! untouched.
//!
//! Block collections and flow collections written on one line
//! (`image: {repository: nginx, tag: 1.0.0}`) are both editable. Only the
//! first document of a stream is editable. Flow collections spanning
//! several lines, block scalars, aliases and multi-line scalars are kept
//! verbatim; edits through them fail with [`DocumentError::Unsupported`].

use std::ops::Range;

use serde::Deserialize;
use serde_yaml::Value;

use super::{DocumentError, DocumentResult, Editable, NodeKind, Tree};

// ──── Data view ────────────────────────────────────────────────────

/// Parse the first document in `source`. An empty stream is `Null`.
pub fn load(source: &str) -> DocumentResult<Value> {
    match serde_yaml::Deserializer::from_str(source).next() {
        Some(document) => Value::deserialize(document).map_err(|e| DocumentError::Syntax {
            line: e.location().map_or(0, |loc| loc.line()),
            message: e.to_string(),
        }),
        None => Ok(Value::Null),
    }
}

/// Text of a string or numeric leaf. Integers print as integers and floats
/// print the way Rust prints an `f64` (`1.0` becomes `"1"`).
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string()))
            .or_else(|| n.as_f64().map(|f| f.to_string())),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}

fn key_matches(key: &Value, wanted: &str) -> bool {
    match key {
        Value::String(s) => s == wanted,
        Value::Number(n) => n.to_string() == wanted,
        Value::Bool(b) => b.to_string() == wanted,
        _ => false,
    }
}

impl Tree for Value {
    fn kind(&self) -> NodeKind {
        match self {
            Self::Mapping(_) => NodeKind::Map,
            Self::Sequence(_) => NodeKind::Seq,
            Self::Tagged(tagged) => tagged.value.kind(),
            _ => NodeKind::Leaf,
        }
    }

    fn child(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Mapping(map) => map
                .iter()
                .find(|(k, _)| key_matches(k, key))
                .map(|(_, v)| v),
            Self::Tagged(tagged) => tagged.value.child(key),
            _ => None,
        }
    }

    fn item(&self, index: usize) -> Option<&Self> {
        match self {
            Self::Sequence(items) => items.get(index),
            Self::Tagged(tagged) => tagged.value.item(index),
            _ => None,
        }
    }
}

// ──── Layout view ──────────────────────────────────────────────────

/// How a scalar was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    /// Unquoted.
    Plain,
    /// `'single quoted'`.
    SingleQuoted,
    /// `"double quoted"`.
    DoubleQuoted,
    /// Nothing after the colon or dash (a null).
    Empty,
    /// Unquoted, inside a flow collection.
    FlowPlain,
    /// Nothing after the colon inside a flow map.
    FlowEmpty,
}

/// Content the layout tree keeps as text only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbatim {
    /// A `[...]` or `{...}` collection the single-line scanner cannot follow.
    FlowCollection,
    /// A `|` or `>` scalar.
    BlockScalar,
    /// A `*alias` reference.
    Alias,
    /// A scalar continued on following lines.
    MultiLine,
}

impl Verbatim {
    /// Why nodes of this kind cannot be edited.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::FlowCollection => "flow collection spans several lines or uses unsupported syntax",
            Self::BlockScalar => "block scalars are not editable",
            Self::Alias => "aliases are not editable",
            Self::MultiLine => "multi-line scalars are not editable",
        }
    }
}

/// A node of the layout tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Block or flow mapping.
    Map(MapNode),
    /// Block or flow sequence.
    Seq(Vec<Node>),
    /// Single-line scalar whose text occupies `span`.
    Scalar {
        /// Byte range of the scalar text, excluding any quotes.
        span: Range<usize>,
        /// Quoting used in the source.
        style: ScalarStyle,
    },
    /// Content that is preserved but never edited.
    Opaque(Verbatim),
}

/// A mapping in the layout tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapNode {
    indent: usize,
    entries: Vec<(String, Node)>,
    /// Where a new entry goes: past the last line of a block map, or just
    /// after the last value of a flow map.
    end: usize,
    flow: bool,
}

impl Tree for Node {
    fn kind(&self) -> NodeKind {
        match self {
            Self::Map(_) => NodeKind::Map,
            Self::Seq(_) => NodeKind::Seq,
            Self::Scalar { .. } | Self::Opaque(_) => NodeKind::Leaf,
        }
    }

    fn verbatim_reason(&self) -> Option<&'static str> {
        match self {
            Self::Opaque(kind) => Some(kind.reason()),
            _ => None,
        }
    }

    fn child(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(map) => map
                .entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    fn item(&self, index: usize) -> Option<&Self> {
        match self {
            Self::Seq(items) => items.get(index),
            _ => None,
        }
    }
}

/// A text replacement within the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    range: Range<usize>,
    text: String,
}

/// YAML source text paired with its layout tree.
#[derive(Debug, Clone)]
pub struct YamlDocument {
    source: String,
    layout: Node,
}

impl YamlDocument {
    /// Scan `source` and build its layout tree.
    pub fn parse(source: impl Into<String>) -> DocumentResult<Self> {
        let source = source.into();
        let layout = Scanner::new(&source)?.document()?;
        Ok(Self { source, layout })
    }

    /// Current document text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Consume the document, returning its text.
    pub fn into_string(self) -> String {
        self.source
    }

    fn replace(&self, node: &Node, value: &str) -> Option<Splice> {
        match node {
            Node::Scalar { span, style } => Some(Splice {
                range: span.clone(),
                text: render(value, *style),
            }),
            _ => None,
        }
    }

    fn insert(&self, map: &MapNode, key: &str, value: &str) -> Splice {
        let at = map.end;
        if map.flow {
            let separator = if map.entries.is_empty() { "" } else { ", " };
            return Splice {
                range: at..at,
                text: format!(
                    "{separator}{}: {}",
                    render_key(key),
                    render(value, ScalarStyle::FlowPlain)
                ),
            };
        }
        let mut text = String::new();
        if at > 0 && !self.source[..at].ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&" ".repeat(map.indent));
        text.push_str(&render_key(key));
        text.push(':');
        text.push_str(&render(value, ScalarStyle::Empty));
        text.push('\n');
        Splice {
            range: at..at,
            text,
        }
    }
}

impl Editable for YamlDocument {
    type Node = Node;
    type Edit = Splice;

    fn root(&self) -> &Node {
        &self.layout
    }

    fn plan_set(&self, parent: &Node, key: &str, value: &str, path: &str) -> DocumentResult<Splice> {
        let unsupported = |reason: &str| DocumentError::Unsupported {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        match parent {
            Node::Map(map) => match parent.child(key) {
                Some(node) => self
                    .replace(node, value)
                    .ok_or_else(|| unsupported("existing value is not a single-line scalar")),
                None => Ok(self.insert(map, key, value)),
            },
            Node::Seq(items) => {
                let index: usize = key
                    .parse()
                    .map_err(|_| unsupported("sequence index is not a number"))?;
                let node = items
                    .get(index)
                    .ok_or_else(|| unsupported("sequence index is out of range"))?;
                self.replace(node, value)
                    .ok_or_else(|| unsupported("existing value is not a single-line scalar"))
            }
            Node::Opaque(kind) => Err(unsupported(kind.reason())),
            Node::Scalar { .. } => Err(unsupported("parent is not a map or sequence")),
        }
    }

    fn apply(&mut self, edit: Splice) -> DocumentResult<()> {
        self.source.replace_range(edit.range, &edit.text);
        self.layout = Scanner::new(&self.source)?.document()?;
        Ok(())
    }
}

// ──── Rendering ────────────────────────────────────────────────────

fn render(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::DoubleQuoted => escape_double(value),
        ScalarStyle::SingleQuoted => value.replace('\'', "''"),
        ScalarStyle::Plain if is_plain_safe(value) => value.to_string(),
        ScalarStyle::Plain => format!("\"{}\"", escape_double(value)),
        ScalarStyle::Empty => format!(" {}", render(value, ScalarStyle::Plain)),
        ScalarStyle::FlowPlain if is_plain_safe(value) && !value.contains(FLOW_INDICATORS) => {
            value.to_string()
        }
        ScalarStyle::FlowPlain => format!("\"{}\"", escape_double(value)),
        ScalarStyle::FlowEmpty => format!(" {}", render(value, ScalarStyle::FlowPlain)),
    }
}

const FLOW_INDICATORS: [char; 5] = [',', '[', ']', '{', '}'];

fn render_key(key: &str) -> String {
    let simple = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'));
    if simple && !key.is_empty() && !key.starts_with('-') {
        key.to_string()
    } else {
        format!("\"{}\"", escape_double(key))
    }
}

/// A plain scalar is safe when it reads back as the very same string.
fn is_plain_safe(value: &str) -> bool {
    const INDICATORS: &str = "-?:,[]{}#&*!|>'\"%@`";

    !value.is_empty()
        && value.trim() == value
        && !value.starts_with(|c: char| INDICATORS.contains(c))
        && !value.contains(": ")
        && !value.contains(" #")
        && !value.ends_with(':')
        && !value.contains(['\n', '\r', '\t'])
        && matches!(serde_yaml::from_str::<Value>(value), Ok(Value::String(s)) if s == value)
}

fn escape_double(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn unquote(inner: &str, quote: u8) -> String {
    if quote == b'\'' {
        return inner.replace("''", "'");
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other @ ('"' | '\\' | '/')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ──── Scanning ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    end: usize,
    indent: usize,
    number: usize,
}

fn syntax(line: usize, message: &str) -> DocumentError {
    DocumentError::Syntax {
        line,
        message: message.to_string(),
    }
}

fn is_marker(text: &str, marker: &str) -> bool {
    text.strip_prefix(marker)
        .is_some_and(|rest| rest.chars().next().is_none_or(char::is_whitespace))
}

fn is_blank_or_comment(text: &str) -> bool {
    let text = text.trim_start();
    text.is_empty() || text.starts_with('#')
}

fn is_seq_item(body: &str) -> bool {
    body == "-" || body.starts_with("- ") || body.starts_with("-\t")
}

fn is_mapping_colon(body: &str, at: usize) -> bool {
    body.as_bytes().get(at) == Some(&b':')
        && body[at + 1..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ' || c == '\t')
}

/// Index of the quote closing the scalar that opens at byte 0.
fn closing_quote(text: &str, quote: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b if b == quote => {
                if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// Split `key: rest` and return the key plus the offset just past the colon.
fn split_key(body: &str) -> Option<(String, usize)> {
    if is_seq_item(body) {
        return None;
    }
    let first = *body.as_bytes().first()?;
    match first {
        b'"' | b'\'' => {
            let close = closing_quote(body, first)?;
            let after = &body[close + 1..];
            let colon = close + 1 + (after.len() - after.trim_start_matches(' ').len());
            is_mapping_colon(body, colon).then(|| (unquote(&body[1..close], first), colon + 1))
        }
        b'[' | b'{' | b'?' | b'#' | b'|' | b'>' | b'*' | b'&' | b'!' | b'%' | b'@' | b'`' => None,
        _ => {
            let mut prev = ' ';
            for (i, c) in body.char_indices() {
                if c == '#' && prev.is_whitespace() {
                    return None;
                }
                if c == ':' && is_mapping_colon(body, i) {
                    let key = body[..i].trim_end();
                    return (!key.is_empty()).then(|| (key.to_string(), i + 1));
                }
                prev = c;
            }
            None
        }
    }
}

/// Plain scalar text without a trailing comment or whitespace.
fn strip_comment(text: &str) -> &str {
    let mut prev = 'x';
    for (i, c) in text.char_indices() {
        if c == '#' && prev.is_whitespace() {
            return text[..i].trim_end();
        }
        prev = c;
    }
    text.trim_end()
}

struct Scanner<'a> {
    src: &'a str,
    lines: Vec<Line>,
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Collect content lines of the first document, skipping blanks,
    /// comments, directives and the leading `---`.
    fn new(src: &'a str) -> DocumentResult<Self> {
        let mut lines: Vec<Line> = Vec::new();
        let mut offset = 0;

        for (idx, raw) in src.split_inclusive('\n').enumerate() {
            let start = offset;
            offset += raw.len();
            let number = idx + 1;
            let text = raw.trim_end_matches(['\n', '\r']);
            let content = text.trim_start_matches(' ');
            let indent = text.len() - content.len();

            if is_blank_or_comment(content) {
                continue;
            }
            if content.starts_with('\t') {
                return Err(syntax(number, "tab characters cannot be used for indentation"));
            }
            if indent == 0 && is_marker(text, "---") {
                if !lines.is_empty() {
                    break;
                }
                if !is_blank_or_comment(&text[3..]) {
                    return Err(syntax(number, "content on the document start line is not supported"));
                }
                continue;
            }
            if indent == 0 && is_marker(text, "...") {
                break;
            }
            if indent == 0 && text.starts_with('%') && lines.is_empty() {
                continue;
            }

            lines.push(Line {
                start,
                end: start + text.len(),
                indent,
                number,
            });
        }

        Ok(Self { src, lines, pos: 0 })
    }

    fn document(mut self) -> DocumentResult<Node> {
        let Some(first) = self.peek() else {
            return Ok(Node::Map(MapNode {
                indent: 0,
                entries: Vec::new(),
                end: self.src.len(),
                flow: false,
            }));
        };
        let root = self.block(first.indent)?;
        if let Some(extra) = self.peek() {
            return Err(syntax(extra.number, "unexpected content after the document root"));
        }
        Ok(root)
    }

    fn peek(&self) -> Option<Line> {
        self.lines.get(self.pos).copied()
    }

    fn body(&self, line: Line) -> &'a str {
        &self.src[line.start + line.indent..line.end]
    }

    /// End of the last consumed line, including its line break.
    fn consumed_end(&self) -> usize {
        let Some(line) = self.pos.checked_sub(1).and_then(|i| self.lines.get(i)) else {
            return 0;
        };
        let rest = &self.src[line.end..];
        if rest.starts_with("\r\n") {
            line.end + 2
        } else if rest.starts_with('\n') {
            line.end + 1
        } else {
            line.end
        }
    }

    /// Consume the lines of a flow collection opened at byte `from`, up to
    /// the line holding its closing bracket.
    fn skip_flow(&mut self, from: usize, line_end: usize) {
        let mut depth = flow_depth(&self.src[from..line_end], 0);
        while depth > 0 {
            let Some(next) = self.peek() else {
                return;
            };
            self.pos += 1;
            depth = flow_depth(&self.src[next.start..next.end], depth);
        }
    }

    fn skip_deeper(&mut self, indent: usize) {
        while self.peek().is_some_and(|line| line.indent > indent) {
            self.pos += 1;
        }
    }

    fn block(&mut self, indent: usize) -> DocumentResult<Node> {
        let Some(line) = self.peek() else {
            return Ok(Node::Opaque(Verbatim::MultiLine));
        };
        let body = self.body(line);
        if is_seq_item(body) {
            self.sequence(indent)
        } else if split_key(body).is_some() {
            self.mapping(indent)
        } else {
            self.pos += 1;
            self.value(line, indent, line.start + line.indent, false)
        }
    }

    fn mapping(&mut self, indent: usize) -> DocumentResult<Node> {
        let mut entries = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(syntax(line.number, "unexpected indentation"));
            }
            let Some((key, offset)) = split_key(self.body(line)) else {
                return Err(syntax(line.number, "expected a `key: value` entry"));
            };
            self.pos += 1;
            let value = self.value(line, indent, line.start + line.indent + offset, true)?;
            entries.push((key, value));
        }
        Ok(Node::Map(MapNode {
            indent,
            entries,
            end: self.consumed_end(),
            flow: false,
        }))
    }

    fn sequence(&mut self, indent: usize) -> DocumentResult<Node> {
        let mut items = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(syntax(line.number, "unexpected indentation"));
            }
            let body = self.body(line);
            if !is_seq_item(body) {
                break;
            }
            let after = &body[1..];
            let gap = after.len() - after.trim_start_matches(' ').len();
            let content = &after[gap..];

            if !is_blank_or_comment(content) && (is_seq_item(content) || split_key(content).is_some())
            {
                // `- key: value` opens a collection at the content column
                let column = line.indent + 1 + gap;
                self.lines[self.pos].indent = column;
                items.push(self.block(column)?);
            } else {
                self.pos += 1;
                items.push(self.value(line, indent, line.start + line.indent + 1, false)?);
            }
        }
        Ok(Node::Seq(items))
    }

    /// Value starting at byte `from` of `line`, owned by a parent at `indent`.
    fn value(&mut self, line: Line, indent: usize, from: usize, in_map: bool) -> DocumentResult<Node> {
        let src = self.src;
        let skip_blanks = |at: usize| {
            let rest = &src[at..line.end];
            at + rest.len() - rest.trim_start_matches([' ', '\t']).len()
        };

        let mut empty_at = from;
        let mut at = skip_blanks(from);
        while at < line.end && matches!(src.as_bytes()[at], b'&' | b'!') {
            let token_end = src[at..line.end].find(' ').map_or(line.end, |i| at + i);
            empty_at = token_end;
            at = skip_blanks(token_end);
        }

        let rest = &src[at..line.end];
        if is_blank_or_comment(rest) {
            if let Some(next) = self.peek() {
                if next.indent > indent {
                    return self.block(next.indent);
                }
                if in_map && next.indent == indent && is_seq_item(self.body(next)) {
                    return self.sequence(indent);
                }
            }
            return Ok(Node::Scalar {
                span: empty_at..empty_at,
                style: ScalarStyle::Empty,
            });
        }

        match rest.as_bytes()[0] {
            quote @ (b'"' | b'\'') => match closing_quote(rest, quote) {
                Some(close) if is_blank_or_comment(&rest[close + 1..]) => Ok(Node::Scalar {
                    span: at + 1..at + close,
                    style: if quote == b'"' {
                        ScalarStyle::DoubleQuoted
                    } else {
                        ScalarStyle::SingleQuoted
                    },
                }),
                Some(_) => Err(syntax(line.number, "unexpected text after a quoted scalar")),
                None => {
                    self.skip_deeper(indent);
                    Ok(Node::Opaque(Verbatim::MultiLine))
                }
            },
            b'[' | b'{' => {
                if let Some(node) = Flow::single_line(src, at, line.end) {
                    return Ok(node);
                }
                self.skip_flow(at, line.end);
                self.skip_deeper(indent);
                Ok(Node::Opaque(Verbatim::FlowCollection))
            }
            b'|' | b'>' => {
                self.skip_deeper(indent);
                Ok(Node::Opaque(Verbatim::BlockScalar))
            }
            b'*' => {
                self.skip_deeper(indent);
                Ok(Node::Opaque(Verbatim::Alias))
            }
            _ => {
                if self.peek().is_some_and(|next| next.indent > indent) {
                    self.skip_deeper(indent);
                    return Ok(Node::Opaque(Verbatim::MultiLine));
                }
                let text = strip_comment(rest);
                Ok(Node::Scalar {
                    span: at..at + text.len(),
                    style: ScalarStyle::Plain,
                })
            }
        }
    }
}

/// Bracket depth after scanning `text`, ignoring quoted scalars and
/// comments.
fn flow_depth(text: &str, mut depth: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'[' | b'{' => depth += 1,
            b']' | b'}' => depth = depth.saturating_sub(1),
            quote @ (b'"' | b'\'') => match closing_quote(&text[i..], quote) {
                Some(close) => i += close,
                None => return depth,
            },
            b'#' if i == 0 || bytes[i - 1].is_ascii_whitespace() => return depth,
            _ => {}
        }
        i += 1;
    }
    depth
}

// ──── Flow collections ─────────────────────────────────────────────

/// Scanner for a flow collection that opens and closes on one line.
///
/// Offsets are absolute positions in the document source. Any construct
/// outside the supported subset (anchors, tags, aliases, explicit keys,
/// single-pair maps inside sequences, keys without values) makes the scan
/// give up, and the caller keeps the collection verbatim.
struct Flow<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Flow<'a> {
    /// Layout of the collection starting at `from`, if it is closed before
    /// `end` and only blanks or a comment follow it.
    fn single_line(src: &'a str, from: usize, end: usize) -> Option<Node> {
        let mut flow = Self { src, pos: from, end };
        let node = flow.node()?;
        is_blank_or_comment(&src[flow.pos..end]).then_some(node)
    }

    fn peek(&self) -> Option<u8> {
        (self.pos < self.end).then(|| self.src.as_bytes()[self.pos])
    }

    fn eat(&mut self, byte: u8) -> bool {
        let found = self.peek() == Some(byte);
        if found {
            self.pos += 1;
        }
        found
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn node(&mut self) -> Option<Node> {
        self.skip_blanks();
        match self.peek()? {
            b'{' => self.map(),
            b'[' => self.seq(),
            b'"' | b'\'' => self.quoted().map(|(node, _)| node),
            b'&' | b'!' | b'*' | b'?' | b'#' | b'|' | b'>' | b'%' | b'@' | b'`' => None,
            _ => self.plain(),
        }
    }

    fn quoted(&mut self) -> Option<(Node, String)> {
        let quote = self.peek()?;
        let close = closing_quote(&self.src[self.pos..self.end], quote)?;
        let span = self.pos + 1..self.pos + close;
        let text = unquote(&self.src[span.clone()], quote);
        self.pos += close + 1;
        let style = if quote == b'"' {
            ScalarStyle::DoubleQuoted
        } else {
            ScalarStyle::SingleQuoted
        };
        Some((Node::Scalar { span, style }, text))
    }

    /// Plain scalar up to the next flow indicator, mapping colon or comment.
    fn plain(&mut self) -> Option<Node> {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        let mut stop = start;
        while stop < self.end {
            let byte = bytes[stop];
            let next = bytes.get(stop + 1).copied().filter(|_| stop + 1 < self.end);
            let colon = byte == b':'
                && next.is_none_or(|n| matches!(n, b' ' | b'\t' | b',' | b']' | b'}'));
            let comment = byte == b'#' && stop > start && bytes[stop - 1].is_ascii_whitespace();
            if matches!(byte, b',' | b'[' | b']' | b'{' | b'}') || colon || comment {
                break;
            }
            stop += 1;
        }
        let text = self.src[start..stop].trim_end();
        if text.is_empty() {
            return None;
        }
        self.pos = start + text.len();
        Some(Node::Scalar {
            span: start..self.pos,
            style: ScalarStyle::FlowPlain,
        })
    }

    fn key(&mut self) -> Option<String> {
        self.skip_blanks();
        match self.peek()? {
            b'"' | b'\'' => self.quoted().map(|(_, text)| text),
            _ => match self.plain()? {
                Node::Scalar { span, .. } => Some(self.src[span].to_string()),
                _ => None,
            },
        }
    }

    fn map(&mut self) -> Option<Node> {
        self.pos += 1;
        let mut entries = Vec::new();
        let mut end = self.pos;
        loop {
            self.skip_blanks();
            if self.eat(b'}') {
                break;
            }
            let key = self.key()?;
            self.skip_blanks();
            if !self.eat(b':') {
                return None;
            }
            let colon_end = self.pos;
            self.skip_blanks();
            let value = if matches!(self.peek()?, b',' | b'}') {
                Node::Scalar {
                    span: colon_end..colon_end,
                    style: ScalarStyle::FlowEmpty,
                }
            } else {
                self.node()?
            };
            end = match &value {
                Node::Scalar {
                    span,
                    style: ScalarStyle::FlowEmpty,
                } => span.end,
                _ => self.pos,
            };
            entries.push((key, value));

            self.skip_blanks();
            if self.eat(b',') {
                continue;
            }
            if self.eat(b'}') {
                break;
            }
            return None;
        }
        Some(Node::Map(MapNode {
            indent: 0,
            entries,
            end,
            flow: true,
        }))
    }

    fn seq(&mut self) -> Option<Node> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_blanks();
            if self.eat(b']') {
                break;
            }
            let item = self.node()?;
            self.skip_blanks();
            if self.peek() == Some(b':') {
                return None;
            }
            items.push(item);
            if self.eat(b',') {
                continue;
            }
            if self.eat(b']') {
                break;
            }
            return None;
        }
        Some(Node::Seq(items))
    }
}
