//! Tag categories and the fixed Confluence → MoinMoin tables.
//!
//! Everything here is read-only data. Per-document state lives in
//! [`MarkupTranslator`](super::MarkupTranslator).

use std::borrow::Cow;

/// Page titles longer than this are cut before being used as link targets.
pub const MAX_TITLE_LENGTH: usize = 120;

/// Every element name the translator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Body,
    Strong,
    Emphasis,
    Underline,
    Deleted,
    Superscript,
    Subscript,
    Code,
    Small,
    Big,
    Paragraph,
    BlockQuote,
    Heading(u8),
    /// Confluence's `bq` shorthand.
    Quote,
    OrderedList,
    UnorderedList,
    ListItem,
    Table,
    TableBody,
    TableRow,
    TableHeader,
    TableCell,
    LineBreak,
    /// `pre`
    Preformatted,
    PlainTextBody,
    RichTextBody,
    /// `ac:link`
    Link,
    /// `ac:image`
    Image,
    LinkBody,
    /// A conventional `a href` hyperlink.
    Hyperlink,
    LinkTarget(TargetKind),
    Macro,
    Parameter,
    DefaultParameter,
    Other,
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        match name {
            "html" => Tag::Html,
            "body" => Tag::Body,
            "strong" => Tag::Strong,
            "em" => Tag::Emphasis,
            "u" => Tag::Underline,
            "del" => Tag::Deleted,
            "sup" => Tag::Superscript,
            "sub" => Tag::Subscript,
            "code" => Tag::Code,
            "small" => Tag::Small,
            "big" => Tag::Big,
            "p" => Tag::Paragraph,
            "blockquote" => Tag::BlockQuote,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "bq" => Tag::Quote,
            "ol" => Tag::OrderedList,
            "ul" => Tag::UnorderedList,
            "li" => Tag::ListItem,
            "table" => Tag::Table,
            "tbody" => Tag::TableBody,
            "tr" => Tag::TableRow,
            "th" => Tag::TableHeader,
            "td" => Tag::TableCell,
            "br" => Tag::LineBreak,
            "pre" => Tag::Preformatted,
            "ac:plain-text-body" => Tag::PlainTextBody,
            "ac:rich-text-body" => Tag::RichTextBody,
            "ac:link" => Tag::Link,
            "ac:image" => Tag::Image,
            "ac:link-body" | "ac:plain-text-link-body" => Tag::LinkBody,
            "a" => Tag::Hyperlink,
            "ri:page" => Tag::LinkTarget(TargetKind::Page),
            "ri:attachment" => Tag::LinkTarget(TargetKind::Attachment),
            "ri:user" => Tag::LinkTarget(TargetKind::User),
            "ri:url" => Tag::LinkTarget(TargetKind::Url),
            "ac:macro" | "ac:structured-macro" => Tag::Macro,
            "ac:parameter" => Tag::Parameter,
            "ac:default-parameter" => Tag::DefaultParameter,
            _ => Tag::Other,
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, Tag::OrderedList | Tag::UnorderedList)
    }

    pub fn is_heading(self) -> bool {
        matches!(self, Tag::Heading(_))
    }

    /// Regions whose text is taken verbatim.
    pub fn is_preformatted(self) -> bool {
        matches!(self, Tag::Preformatted | Tag::PlainTextBody)
    }

    /// Regions wrapped in fences or table bars, preformatted or not.
    pub fn is_region(self) -> bool {
        matches!(
            self,
            Tag::Preformatted | Tag::PlainTextBody | Tag::RichTextBody | Tag::Table
        )
    }

    /// Inline styles that must not double their markers when nested.
    pub fn is_single_level(self) -> bool {
        matches!(
            self,
            Tag::Strong
                | Tag::Emphasis
                | Tag::Underline
                | Tag::Deleted
                | Tag::Superscript
                | Tag::Subscript
                | Tag::Code
        )
    }

    /// Whether the tag keeps a nesting counter.
    pub fn is_counted(self) -> bool {
        self.is_preformatted() || self.is_single_level()
    }

    /// Blocks whose text is re-indented to the current list depth.
    pub fn is_indented(self) -> bool {
        matches!(self, Tag::ListItem | Tag::Paragraph) || self.is_region()
    }

    /// Tags that always start on a line of their own.
    pub fn is_block(self) -> bool {
        self.is_indented() || self.is_heading() || self.is_list() || self == Tag::Quote
    }

    /// Span tags that do not pick up a pending line break.
    pub fn overrides_pending_block(self) -> bool {
        self == Tag::Link
    }

    /// What a run of whitespace collapses to inside this element.
    pub fn whitespace_replacement(self) -> &'static str {
        match self {
            Tag::Html
            | Tag::Body
            | Tag::Table
            | Tag::TableBody
            | Tag::TableRow
            | Tag::OrderedList
            | Tag::UnorderedList => "",
            Tag::Strong
            | Tag::Emphasis
            | Tag::Underline
            | Tag::Deleted
            | Tag::Superscript
            | Tag::Subscript
            | Tag::Code
            | Tag::Small
            | Tag::Big
            | Tag::Paragraph
            | Tag::BlockQuote
            | Tag::Heading(_)
            | Tag::Quote
            | Tag::ListItem
            | Tag::TableHeader
            | Tag::TableCell
            | Tag::LineBreak
            | Tag::Preformatted
            | Tag::PlainTextBody
            | Tag::RichTextBody
            | Tag::Link
            | Tag::Image
            | Tag::LinkBody
            | Tag::Hyperlink
            | Tag::LinkTarget(_)
            | Tag::Macro
            | Tag::Parameter
            | Tag::DefaultParameter
            | Tag::Other => " ",
        }
    }

    /// The static wrapper for the element's text, if it has one.
    pub fn template(self) -> Option<Wrap> {
        let (open, close) = match self {
            Tag::Strong | Tag::TableHeader => ("'''", "'''"),
            Tag::Emphasis => ("''", "''"),
            Tag::Underline => ("__", "__"),
            Tag::Deleted => ("--(", ")--"),
            Tag::Superscript => ("^", "^"),
            Tag::Subscript => (",,", ",,"),
            Tag::Code => ("`", "`"),
            Tag::Small => ("~-", "-~"),
            Tag::Big => ("~+", "+~"),
            Tag::BlockQuote => (" ", ""),
            Tag::Quote => ("{{{", "}}}"),
            Tag::Heading(level) => return Some(heading(level)),
            Tag::TableBody
            | Tag::TableRow
            | Tag::TableCell
            | Tag::Paragraph
            | Tag::OrderedList
            | Tag::UnorderedList => ("", ""),
            _ => return None,
        };
        Some(Wrap::fixed(open, close))
    }

    /// Item wrapper for `li` children of this list tag.
    pub fn list_item_template(self) -> Option<Wrap> {
        match self {
            Tag::OrderedList => Some(Wrap::fixed("1. ", "")),
            Tag::UnorderedList => Some(Wrap::fixed("* ", "")),
            _ => None,
        }
    }

    /// `br` replacement, depending on whether it sits in verbatim text.
    pub fn simple_replacement(self, preformatted: bool) -> Option<&'static str> {
        match (self, preformatted) {
            (Tag::LineBreak, false) => Some("<<BR>>"),
            (Tag::LineBreak, true) => Some("\n"),
            _ => None,
        }
    }
}

fn heading(level: u8) -> Wrap {
    let marks = "=".repeat(usize::from(level.clamp(1, 6)));
    Wrap::new(format!("{marks} "), format!(" {marks}"))
}

/// A text wrapper: the element's text goes between `open` and `close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrap {
    open: Cow<'static, str>,
    close: Cow<'static, str>,
}

impl Wrap {
    pub fn new(open: impl Into<Cow<'static, str>>, close: impl Into<Cow<'static, str>>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    pub const fn fixed(open: &'static str, close: &'static str) -> Self {
        Self {
            open: Cow::Borrowed(open),
            close: Cow::Borrowed(close),
        }
    }

    /// Leaves text untouched.
    pub const fn identity() -> Self {
        Self::fixed("", "")
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(self.open.len() + text.len() + self.close.len());
        out.push_str(&self.open);
        out.push_str(text);
        out.push_str(&self.close);
        out
    }
}

/// Confluence resource identifiers (`ri:*`) that name a link target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Page,
    Attachment,
    User,
    Url,
}

impl TargetKind {
    /// Attributes supplying target components, in order.
    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            TargetKind::Page => &["ri:space-key", "ri:content-title"],
            TargetKind::Attachment => &["ri:filename"],
            TargetKind::User => &["ri:username"],
            TargetKind::Url => &["ri:value"],
        }
    }

    /// MoinMoin link prefix for targets of this kind.
    pub fn link_prefix(self) -> &'static str {
        match self {
            TargetKind::Attachment => "attachment:",
            TargetKind::Page | TargetKind::User | TargetKind::Url => "",
        }
    }
}

/// Attributes whose value can label a link when nothing better is known.
pub fn is_label_attribute(attribute: &str) -> bool {
    matches!(attribute, "ri:content-title" | "ac:link-body")
}

/// Prefix component that makes a page link relative to the current page.
pub fn target_prefix(attribute: &str) -> Option<&'static str> {
    match attribute {
        "ri:space-key" | "ri:content-title" => Some(".."),
        _ => None,
    }
}

/// Cut a page title to the length MoinMoin page names allow.
pub fn page_title(title: &str) -> &str {
    let end = title
        .char_indices()
        .nth(MAX_TITLE_LENGTH)
        .map_or(title.len(), |(index, _)| index);
    title[..end].trim()
}

/// MoinMoin admonition style for a Confluence rich-text macro.
pub fn admonition_style(macro_name: &str) -> Option<&'static str> {
    match macro_name {
        "note" => Some("caution"),
        "warning" => Some("warning"),
        "info" => Some("important"),
        "tip" => Some("tip"),
        "excerpt" => Some(""),
        _ => None,
    }
}

/// A MoinMoin macro call template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece {
    Literal(&'static str),
    Parameter(&'static str),
}

/// Output template for a Confluence macro rendered as a MoinMoin macro.
pub fn macro_template(macro_name: &str) -> Option<&'static [Piece]> {
    use Piece::{Literal, Parameter};

    const ANCHOR: &[Piece] = &[Literal("<<Anchor("), Parameter("anchor"), Literal(")>>")];
    const COLOR: &[Piece] = &[
        Literal("<<Color2("),
        Parameter("content"),
        Literal(", "),
        Parameter("args"),
        Literal(")>>"),
    ];
    const TOC: &[Piece] = &[Literal("<<TableOfContents>>")];

    match macro_name {
        "anchor" => Some(ANCHOR),
        "color" => Some(COLOR),
        "toc" => Some(TOC),
        _ => None,
    }
}

/// Confluence parameter feeding the MoinMoin `args` slot, and its MoinMoin
/// name.
pub fn macro_arguments(macro_name: &str) -> Option<(&'static str, &'static str)> {
    match macro_name {
        "color" => Some(("color", "col")),
        _ => None,
    }
}

/// Quote a MoinMoin macro argument containing double quotes.
pub fn quote_macro_argument(argument: &str) -> Cow<'_, str> {
    if argument.contains('"') {
        Cow::Owned(format!("\"{}\"", argument.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(argument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("strong", "x", "'''x'''")]
    #[case("em", "x", "''x''")]
    #[case("u", "x", "__x__")]
    #[case("del", "x", "--(x)--")]
    #[case("sup", "x", "^x^")]
    #[case("sub", "x", ",,x,,")]
    #[case("code", "x", "`x`")]
    #[case("th", "x", "'''x'''")]
    #[case("td", "x", "x")]
    #[case("blockquote", "x", " x")]
    #[case("small", "x", "~-x-~")]
    #[case("big", "x", "~+x+~")]
    #[case("h1", "x", "= x =")]
    #[case("h3", "x", "=== x ===")]
    #[case("h6", "x", "====== x ======")]
    #[case("bq", "x", "{{{x}}}")]
    fn static_templates(#[case] name: &str, #[case] text: &str, #[case] expected: &str) {
        let wrap = Tag::from_name(name).template().unwrap();

        assert_eq!(wrap.apply(text), expected);
    }

    #[rstest]
    #[case("li")]
    #[case("ac:macro")]
    #[case("ac:link")]
    #[case("a")]
    #[case("span")]
    fn tags_without_static_template(#[case] name: &str) {
        assert_eq!(Tag::from_name(name).template(), None);
    }

    #[test]
    fn list_item_templates() {
        assert_eq!(
            Tag::OrderedList.list_item_template().unwrap().apply("a"),
            "1. a"
        );
        assert_eq!(
            Tag::UnorderedList.list_item_template().unwrap().apply("a"),
            "* a"
        );
        assert_eq!(Tag::Paragraph.list_item_template(), None);
    }

    #[rstest]
    #[case("html", "")]
    #[case("body", "")]
    #[case("table", "")]
    #[case("tbody", "")]
    #[case("tr", "")]
    #[case("ol", "")]
    #[case("ul", "")]
    #[case("td", " ")]
    #[case("p", " ")]
    #[case("li", " ")]
    #[case("unknown", " ")]
    fn whitespace_replacements(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(Tag::from_name(name).whitespace_replacement(), expected);
    }

    #[test]
    fn block_and_span_classification() {
        for name in [
            "li", "p", "pre", "ac:plain-text-body", "ac:rich-text-body", "table", "h1", "h6", "bq",
            "ol", "ul",
        ] {
            assert!(Tag::from_name(name).is_block(), "{name} should be block");
        }
        for name in ["strong", "a", "ac:link", "ac:image", "td", "tr", "span"] {
            assert!(!Tag::from_name(name).is_block(), "{name} should not be block");
        }
    }

    #[test]
    fn page_titles_are_cut_and_trimmed() {
        let long = format!("{} tail", "x".repeat(MAX_TITLE_LENGTH - 1));

        assert_eq!(page_title("  Title  "), "Title");
        assert_eq!(page_title(&long), "x".repeat(MAX_TITLE_LENGTH - 1));
        assert_eq!(page_title(&"é".repeat(200)).chars().count(), MAX_TITLE_LENGTH);
    }

    #[rstest]
    #[case("col=red", "col=red")]
    #[case("col=\"red\"", "\"col=\"\"red\"\"\"")]
    fn macro_argument_quoting(#[case] argument: &str, #[case] expected: &str) {
        assert_eq!(quote_macro_argument(argument), expected);
    }

    #[test]
    fn simple_replacements_depend_on_context() {
        assert_eq!(Tag::LineBreak.simple_replacement(false), Some("<<BR>>"));
        assert_eq!(Tag::LineBreak.simple_replacement(true), Some("\n"));
        assert_eq!(Tag::Paragraph.simple_replacement(false), None);
    }
}
