//! Textual frame snapshots
//!
//! Every metadata frame of a tracked file is persisted as a single line of the
//! form `FRAMEID(key1=value1, key2=value2)`. Values are single-quoted string
//! literals, signed integers or lists of string literals. Rendering a parsed
//! frame yields exactly the string it was parsed from, and parsing a rendered
//! frame yields an equal [`Frame`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Frame id of embedded pictures
pub const PICTURE_FRAME: &str = "APIC";

/// Field of a picture frame naming the blob that holds the image bytes
pub const PICTURE_PATH_KEY: &str = "path";

/// Field of a picture frame overriding the media type derived from the blob name
pub const PICTURE_MIME_KEY: &str = "mime";

const MAX_ID_LEN: usize = 8;

/// A single field value of a frame snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameValue {
    Str(String),
    Int(i64),
    List(Vec<String>),
}

impl FrameValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FrameValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for FrameValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for FrameValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<Vec<String>> for FrameValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl fmt::Display for FrameValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write_quoted(f, s),
            Self::Int(n) => write!(f, "{n}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, item)?;
                }
                f.write_str("]")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

/// An in-memory metadata frame: an id plus ordered, uniquely keyed fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    id: String,
    fields: Vec<(String, FrameValue)>,
}

impl Frame {
    /// Create an empty frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameSyntax`] if `id` is not 1 to 8 ASCII uppercase
    /// letters or digits.
    pub fn new(id: &str) -> Result<Self> {
        if !is_valid_id(id) {
            return Err(syntax(id, "frame id must be 1-8 uppercase letters or digits"));
        }
        Ok(Self {
            id: id.to_string(),
            fields: Vec::new(),
        })
    }

    /// Append a field, replacing an existing field with the same key in place.
    pub fn field(mut self, key: &str, value: impl Into<FrameValue>) -> Result<Self> {
        if !is_valid_key(key) {
            return Err(syntax(key, "field key must be an ASCII identifier"));
        }
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &[(String, FrameValue)] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FrameValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Blob name referenced by a picture frame, if this is one.
    pub fn picture_ref(&self) -> Option<&str> {
        if self.id != PICTURE_FRAME {
            return None;
        }
        self.get(PICTURE_PATH_KEY).and_then(FrameValue::as_str)
    }

    /// Parse a frame snapshot string.
    pub fn parse(snapshot: &str) -> Result<Self> {
        Parser::new(snapshot).frame()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.id)?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str(")")
    }
}

impl FromStr for Frame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn is_valid_key(key: &str) -> bool {
    let mut bytes = key.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn syntax(snapshot: &str, message: impl Into<String>) -> Error {
    Error::FrameSyntax {
        snapshot: snapshot.to_string(),
        message: message.into(),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn err(&self, message: &str) -> Error {
        syntax(self.src, format!("{message} at offset {}", self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.err(&format!("expected '{want}'"))),
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &src[start..self.pos]
    }

    fn frame(mut self) -> Result<Frame> {
        let id = self.take_while(|c| c.is_ascii_alphanumeric());
        if !is_valid_id(id) {
            return Err(self.err("invalid frame id"));
        }
        let mut frame = Frame {
            id: id.to_string(),
            fields: Vec::new(),
        };
        let mut seen = HashSet::new();

        self.expect('(')?;
        self.skip_spaces();
        if self.peek() != Some(')') {
            loop {
                self.skip_spaces();
                let key = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                if !is_valid_key(key) {
                    return Err(self.err("invalid field key"));
                }
                if !seen.insert(key) {
                    return Err(self.err(&format!("duplicate field '{key}'")));
                }
                self.expect('=')?;
                let value = self.value()?;
                frame.fields.push((key.to_string(), value));
                self.skip_spaces();
                match self.peek() {
                    Some(',') => {
                        self.pos += 1;
                    }
                    Some(')') => break,
                    _ => return Err(self.err("expected ',' or ')'")),
                }
            }
        }
        self.expect(')')?;

        if self.pos != self.src.len() {
            return Err(self.err("trailing characters"));
        }
        Ok(frame)
    }

    fn value(&mut self) -> Result<FrameValue> {
        match self.peek() {
            Some('\'') => Ok(FrameValue::Str(self.quoted()?)),
            Some('[') => {
                self.pos += 1;
                let mut items = Vec::new();
                self.skip_spaces();
                if self.peek() == Some(']') {
                    self.pos += 1;
                    return Ok(FrameValue::List(items));
                }
                loop {
                    self.skip_spaces();
                    items.push(self.quoted()?);
                    self.skip_spaces();
                    match self.bump() {
                        Some(',') => continue,
                        Some(']') => return Ok(FrameValue::List(items)),
                        _ => return Err(self.err("expected ',' or ']'")),
                    }
                }
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let start = self.pos;
                if c == '-' {
                    self.pos += 1;
                }
                let digits = self.take_while(|c| c.is_ascii_digit());
                if digits.is_empty() {
                    return Err(self.err("expected digits"));
                }
                self.src[start..self.pos]
                    .parse()
                    .map(FrameValue::Int)
                    .map_err(|_| self.err("integer out of range"))
            }
            _ => Err(self.err("expected a value")),
        }
    }

    fn quoted(&mut self) -> Result<String> {
        self.expect('\'')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated string")),
                Some('\'') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('u') => out.push(self.unicode_escape()?),
                    _ => return Err(self.err("unknown escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char> {
        self.expect('{')?;
        let hex = self.take_while(|c| c.is_ascii_hexdigit());
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.err("bad unicode escape"))?;
        self.expect('}')?;
        char::from_u32(code).ok_or_else(|| self.err("bad unicode escape"))
    }
}

/// Tag list in canonical (sorted) order.
pub fn sorted_tags(tags: &[String]) -> Vec<String> {
    let mut sorted = tags.to_vec();
    sorted.sort();
    sorted
}

/// Compare two tag lists as unordered multisets.
pub fn same_tag_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && sorted_tags(a) == sorted_tags(b)
}

/// Blob names referenced by picture frames of a tag list.
///
/// # Errors
///
/// Fails on the first malformed frame snapshot, since references hidden in
/// an unreadable frame could not be accounted for.
pub fn picture_refs(tags: &[String]) -> Result<Vec<String>> {
    let mut refs = Vec::new();
    for tag in tags {
        if !tag.starts_with(PICTURE_FRAME) {
            continue;
        }
        let frame = Frame::parse(tag)?;
        if let Some(name) = frame.picture_ref() {
            refs.push(name.to_string());
        }
    }
    Ok(refs)
}
