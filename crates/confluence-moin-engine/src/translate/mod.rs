//! # Markup Translator
//!
//! Turns a Confluence 4 storage-format page body (XHTML with `ac:` and `ri:`
//! elements) into MoinMoin wiki markup in a single pass over the element
//! tree.
//!
//! Each element's text is converted when the element closes and handed to
//! its parent, so by the time `body` closes the whole page has been built
//! bottom-up:
//!
//! ```text
//! <p>Hello <strong>World</strong></p>
//!
//! strong closes → "'''World'''"         appended to p
//! p closes      → "Hello '''World'''"   appended to body
//! body closes   → written to the sink
//! ```
//!
//! Preformatted and rich-text regions are fenced with `{{{ }}}`. Nested
//! regions get shorter fences than the region around them, so an inner
//! closing fence never ends the outer region early.

pub mod tags;
mod translator;

#[cfg(test)]
mod tests;

use std::io::{self, Write};

pub use translator::MarkupTranslator;

use crate::element::{self, ParseError};

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("page body is not well-formed: {0}")]
    Malformed(#[from] ParseError),

    #[error("failed to write translated markup: {0}")]
    Io(#[from] io::Error),
}

/// Translate a page body, returning the MoinMoin markup.
pub fn translate(body: &str) -> Result<String, TranslateError> {
    let mut out = Vec::with_capacity(body.len());
    translate_to(body, &mut out)?;
    String::from_utf8(out).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
}

/// Translate a page body, writing the MoinMoin markup to `sink`.
pub fn translate_to<W: Write>(body: &str, sink: W) -> Result<(), TranslateError> {
    let document = envelope(body);
    let mut translator = MarkupTranslator::new(sink);
    element::parse(&document, &mut translator)?;
    translator.into_inner().flush()?;
    Ok(())
}

/// Wrap a body fragment in a minimal document. Confluence exports sometimes
/// write the CDATA terminator as `]] >`.
fn envelope(body: &str) -> String {
    let body = body.replace("]] >", "]]>");
    format!("<html>\n<body>\n{body}\n</body>\n</html>")
}
