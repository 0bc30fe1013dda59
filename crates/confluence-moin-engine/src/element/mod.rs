//! # Element Parser
//!
//! A streaming walker over an XML element tree. It keeps one
//! [`ElementFrame`] per open element (name, attributes, the text fragments
//! collected so far) and calls back into an [`ElementHandler`] when an
//! element closes. No tree is ever built: memory is proportional to the
//! nesting depth, not to the document size.
//!
//! ```text
//! <p>Hello <b>World</b></p>
//!
//! open p       → frames: [p]
//! text "Hello" → frames: [p{"Hello "}]
//! open b       → frames: [p{"Hello "}, b]
//! text "World" → frames: [p{"Hello "}, b{"World"}]
//! close b      → handle_element(stack, "World"), frames: [p{"Hello "}]
//! close p      → handle_element(stack, "Hello ..."), frames: []
//! ```
//!
//! What the handler does with an element's text is its own business: the
//! markup translator appends converted text to the parent frame, the export
//! reader records property values.
//!
//! Tokenizing is done by `quick-xml`; this module adds the frame stack,
//! well-formedness checks, and character reference resolution (see
//! [`entities`]).

pub mod entities;

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};

use entities::Reference;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed XML at byte {position}: {source}")]
    Syntax {
        position: u64,
        source: quick_xml::Error,
    },

    #[error("invalid attribute at byte {position}: {source}")]
    Attribute { position: u64, source: AttrError },

    #[error("invalid UTF-8 at byte {position}")]
    Encoding { position: u64 },

    #[error("mismatched end tag at byte {position}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        position: u64,
        expected: String,
        found: String,
    },

    #[error("unexpected end tag </{found}> at byte {position}")]
    UnexpectedEndTag { position: u64, found: String },

    #[error("element <{name}> is not closed at end of input")]
    Unclosed { name: String },

    #[error("content outside the root element at byte {position}")]
    OutsideRoot { position: u64 },

    #[error("invalid character reference &{reference}; at byte {position}")]
    InvalidReference { position: u64, reference: String },
}

/// Attribute name/value pairs of one element, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Context of one currently open element.
#[derive(Debug, Clone)]
pub struct ElementFrame {
    name: String,
    attributes: Attributes,
    text: Vec<String>,
}

impl ElementFrame {
    fn new(name: String, attributes: Attributes) -> Self {
        Self {
            name,
            attributes,
            text: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Text fragments collected so far, in arrival order.
    pub fn fragments(&self) -> &[String] {
        &self.text
    }

    /// Whether any collected fragment is non-empty.
    pub fn has_text(&self) -> bool {
        self.text.iter().any(|fragment| !fragment.is_empty())
    }

    pub fn text(&self) -> String {
        self.text.concat()
    }

    pub fn push_text(&mut self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        if !fragment.is_empty() {
            self.text.push(fragment);
        }
    }
}

/// The path of open elements from the root down to the innermost one.
#[derive(Debug, Default)]
pub struct ElementStack {
    frames: Vec<ElementFrame>,
}

impl ElementStack {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[ElementFrame] {
        &self.frames
    }

    /// Element names from the root to the innermost element, inclusive.
    pub fn path(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(ElementFrame::name)
    }

    /// Attribute maps along the path.
    pub fn attributes(&self) -> impl Iterator<Item = &Attributes> {
        self.frames.iter().map(ElementFrame::attributes)
    }

    /// Text fragment lists along the path.
    pub fn texts(&self) -> impl Iterator<Item = &[String]> {
        self.frames.iter().map(ElementFrame::fragments)
    }

    pub fn current(&self) -> Option<&ElementFrame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut ElementFrame> {
        self.frames.last_mut()
    }

    pub fn parent(&self) -> Option<&ElementFrame> {
        self.ancestor(1)
    }

    pub fn parent_mut(&mut self) -> Option<&mut ElementFrame> {
        let depth = self.frames.len();
        if depth < 2 {
            return None;
        }
        self.frames.get_mut(depth - 2)
    }

    /// The frame `generations` levels above the current one (0 is current).
    pub fn ancestor(&self, generations: usize) -> Option<&ElementFrame> {
        let depth = self.frames.len();
        depth
            .checked_sub(generations + 1)
            .and_then(|index| self.frames.get(index))
    }

    fn push(&mut self, frame: ElementFrame) {
        self.frames.push(frame);
    }

    fn pop(&mut self) -> Option<ElementFrame> {
        self.frames.pop()
    }
}

/// Callbacks driven by [`ElementParser`].
///
/// Only [`handle_element`](ElementHandler::handle_element) is required. The
/// other hooks let a handler keep its own structural state in step with the
/// frame stack.
pub trait ElementHandler {
    type Error: From<ParseError>;

    /// An element is about to be pushed onto the stack.
    fn open_element(&mut self, _name: &str, _attributes: &Attributes) {}

    /// Rewrites character data before it is stored in the current frame.
    fn characters<'a>(&mut self, _stack: &ElementStack, content: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(content)
    }

    /// The current element is complete, its completion handler runs next.
    fn close_element(&mut self, _stack: &ElementStack) {}

    /// The current element is complete. `text` is the concatenation of its
    /// own fragments; its frame is still the top of `stack` and is discarded
    /// once this returns.
    fn handle_element(&mut self, stack: &mut ElementStack, text: String)
    -> Result<(), Self::Error>;

    /// An element has been popped from the stack.
    fn element_closed(&mut self, _name: &str) {}
}

pub struct ElementParser<'i> {
    reader: Reader<&'i [u8]>,
    stack: ElementStack,
    root_closed: bool,
}

impl<'i> ElementParser<'i> {
    pub fn new(input: &'i str) -> Self {
        let mut reader = Reader::from_str(input);
        reader.trim_text(false);
        reader.check_end_names(true);
        Self {
            reader,
            stack: ElementStack::default(),
            root_closed: false,
        }
    }

    /// Walk the whole input, driving `handler`. Stops at the first
    /// well-formedness error.
    pub fn parse<H: ElementHandler>(mut self, handler: &mut H) -> Result<(), H::Error> {
        loop {
            let event = self.reader.read_event();
            let position = self.position();
            match event {
                Ok(Event::Start(start)) => {
                    self.open(&start, position, handler)?;
                }
                Ok(Event::Empty(start)) => {
                    let name = self.open(&start, position, handler)?;
                    self.close(&name, position, handler)?;
                }
                Ok(Event::End(end)) => {
                    let name = utf8(end.name().as_ref(), position)?.to_owned();
                    self.close(&name, position, handler)?;
                }
                Ok(Event::Text(text)) => {
                    let raw = text.into_inner();
                    self.text(utf8(&raw, position)?, true, position, handler)?;
                }
                Ok(Event::CData(data)) => {
                    let raw = data.into_inner();
                    self.text(utf8(&raw, position)?, false, position, handler)?;
                }
                Ok(Event::Eof) => break,
                // Comments, processing instructions, declarations, DOCTYPE.
                Ok(_) => {}
                Err(source) => return Err(ParseError::Syntax { position, source }.into()),
            }
        }

        if let Some(frame) = self.stack.current() {
            return Err(ParseError::Unclosed {
                name: frame.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn open<H: ElementHandler>(
        &mut self,
        start: &BytesStart<'_>,
        position: u64,
        handler: &mut H,
    ) -> Result<String, H::Error> {
        if self.root_closed {
            return Err(ParseError::OutsideRoot { position }.into());
        }

        let name = utf8(start.name().as_ref(), position)?.to_owned();
        let mut attributes = Attributes::default();
        for attribute in start.attributes() {
            let attribute =
                attribute.map_err(|source| ParseError::Attribute { position, source })?;
            let key = utf8(attribute.key.as_ref(), position)?.to_owned();
            let value = decode_attribute(utf8(&attribute.value, position)?, position)?;
            attributes.push(key, value);
        }

        handler.open_element(&name, &attributes);
        self.stack.push(ElementFrame::new(name.clone(), attributes));
        Ok(name)
    }

    fn close<H: ElementHandler>(
        &mut self,
        name: &str,
        position: u64,
        handler: &mut H,
    ) -> Result<(), H::Error> {
        match self.stack.current() {
            None => {
                return Err(ParseError::UnexpectedEndTag {
                    position,
                    found: name.to_owned(),
                }
                .into());
            }
            Some(frame) if frame.name != name => {
                return Err(ParseError::MismatchedTag {
                    position,
                    expected: frame.name.clone(),
                    found: name.to_owned(),
                }
                .into());
            }
            Some(_) => {}
        }

        handler.close_element(&self.stack);
        let text = self.stack.current().map(ElementFrame::text).unwrap_or_default();
        handler.handle_element(&mut self.stack, text)?;

        if let Some(frame) = self.stack.pop() {
            handler.element_closed(&frame.name);
        }
        if self.stack.is_empty() {
            self.root_closed = true;
        }
        Ok(())
    }

    fn text<H: ElementHandler>(
        &mut self,
        raw: &str,
        decode_references: bool,
        position: u64,
        handler: &mut H,
    ) -> Result<(), H::Error> {
        if self.stack.is_empty() {
            if raw.chars().all(is_xml_whitespace) {
                return Ok(());
            }
            return Err(ParseError::OutsideRoot { position }.into());
        }

        if !decode_references {
            let content = handler.characters(&self.stack, raw).into_owned();
            self.push_text(content);
            return Ok(());
        }

        let references = entities::split_references(raw).map_err(|reference| {
            ParseError::InvalidReference {
                position,
                reference: reference.0,
            }
        })?;
        for reference in references {
            match reference {
                Reference::Text(text) => {
                    let content = handler.characters(&self.stack, &text).into_owned();
                    self.push_text(content);
                }
                Reference::Named(name) => match entities::resolve_named(name) {
                    Some(resolved) => self.push_text(resolved),
                    None => log::debug!("dropping unknown entity &{name}; at byte {position}"),
                },
            }
        }
        Ok(())
    }

    fn push_text(&mut self, content: String) {
        if let Some(frame) = self.stack.current_mut() {
            frame.push_text(content);
        }
    }
}

/// Parse `input`, driving `handler` for every element.
pub fn parse<H: ElementHandler>(input: &str, handler: &mut H) -> Result<(), H::Error> {
    ElementParser::new(input).parse(handler)
}

fn utf8(bytes: &[u8], position: u64) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|_| ParseError::Encoding { position })
}

fn decode_attribute(raw: &str, position: u64) -> Result<String, ParseError> {
    let references =
        entities::split_references(raw).map_err(|reference| ParseError::InvalidReference {
            position,
            reference: reference.0,
        })?;

    let mut value = String::with_capacity(raw.len());
    for reference in references {
        match reference {
            Reference::Text(text) => value.push_str(&text),
            Reference::Named(name) => {
                if let Some(resolved) = entities::resolve_named(name) {
                    value.push_str(&resolved);
                }
            }
        }
    }
    Ok(value)
}

fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}
