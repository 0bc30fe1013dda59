use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use super::TranslateError;
use super::tags::{
    Piece, Tag, TargetKind, Wrap, admonition_style, is_label_attribute, macro_arguments,
    macro_template, page_title, quote_macro_argument, target_prefix,
};
use crate::element::{Attributes, ElementHandler, ElementStack};

fn whitespace_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[ \t\n\r\x0B\x0C]+").expect("Invalid whitespace regex"))
}

/// Link details collected from `ri:*`, link-body and `a` elements until the
/// owning link element closes.
#[derive(Debug, Default)]
struct PendingLink {
    target: Option<String>,
    kind: Option<TargetKind>,
    label: Option<String>,
}

#[derive(Debug)]
struct MacroContext {
    name: String,
    parameters: HashMap<String, String>,
}

impl MacroContext {
    fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Converts one Confluence page body into MoinMoin markup.
///
/// All conversion state lives here, so independent pages can be translated
/// concurrently with one translator each. Text of the outermost element is
/// written to `out`; everything below it is handed up to the parent frame.
pub struct MarkupTranslator<W: Write> {
    out: W,
    indents: Vec<usize>,
    open_counts: HashMap<Tag, usize>,
    level: usize,
    max_level: usize,
    link: PendingLink,
    macros: Vec<MacroContext>,
    held_anchors: Vec<String>,
    table_rows: usize,
    table_columns: usize,
    have_block: bool,
}

impl<W: Write> MarkupTranslator<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            indents: vec![0],
            open_counts: HashMap::new(),
            level: 0,
            max_level: 0,
            link: PendingLink::default(),
            macros: Vec::new(),
            held_anchors: Vec::new(),
            table_rows: 0,
            table_columns: 0,
            have_block: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    fn open_count(&self, tag: Tag) -> usize {
        self.open_counts.get(&tag).copied().unwrap_or(0)
    }

    fn is_preformatted(&self) -> bool {
        self.open_count(Tag::Preformatted) > 0 || self.open_count(Tag::PlainTextBody) > 0
    }

    fn select_conversion(
        &mut self,
        tag: Tag,
        stack: &ElementStack,
        attributes: &Attributes,
        text: &mut String,
    ) -> Option<Wrap> {
        let parent = stack.parent();

        let conversion = match tag {
            Tag::ListItem if parent.is_some() => {
                parent.and_then(|p| Tag::from_name(p.name()).list_item_template())
            }
            Tag::LinkTarget(kind) => {
                self.capture_target(kind, attributes);
                text.clear();
                None
            }
            Tag::LinkBody => {
                self.link.target.get_or_insert_with(String::new);
                self.link.label = Some(text.trim().to_owned());
                text.clear();
                None
            }
            Tag::Hyperlink => {
                self.link.target = Some(attributes.get("href").unwrap_or_default().to_owned());
                self.link.label = Some(text.trim().to_owned());
                text.clear();
                None
            }
            Tag::Parameter => {
                self.store_parameter(attributes.get("ac:name"), text.trim());
                text.clear();
                None
            }
            Tag::DefaultParameter => {
                let key = parent.and_then(|p| p.attributes().get("ac:name"));
                self.store_parameter(key, text.trim());
                text.clear();
                None
            }
            tag if tag.is_single_level() && self.open_count(tag) > 1 => Some(Wrap::identity()),
            tag if tag.is_region() => Some(self.region_wrap(tag, text)),
            _ => None,
        };

        conversion.or_else(|| tag.template())
    }

    fn capture_target(&mut self, kind: TargetKind, attributes: &Attributes) {
        let mut components: Vec<&str> = Vec::new();

        for &attribute in kind.attributes() {
            let Some(value) = attributes.get(attribute).filter(|v| !v.is_empty()) else {
                continue;
            };
            if is_label_attribute(attribute) && self.link.label.as_deref().is_none_or(str::is_empty)
            {
                self.link.label = Some(value.to_owned());
            }
            if attribute == "ri:content-title" {
                components.push(page_title(value));
            } else {
                components.push(value);
            }
            if let Some(prefix) = target_prefix(attribute) {
                components.insert(0, prefix);
            }
        }

        if components.is_empty() {
            debug!("link target {kind:?} without target attributes");
        }
        self.link.target = Some(components.join("/"));
        self.link.kind = Some(kind);
    }

    fn store_parameter(&mut self, key: Option<&str>, value: &str) {
        let Some(key) = key else {
            debug!("macro parameter without a name");
            return;
        };
        match self.macros.last_mut() {
            Some(context) => {
                context.parameters.insert(key.to_owned(), value.to_owned());
            }
            None => debug!("parameter {key} outside of a macro"),
        }
    }

    /// Fences for preformatted and rich-text regions, or the table bars.
    fn region_wrap(&self, tag: Tag, text: &str) -> Wrap {
        let length = 3 + self.max_level.saturating_sub(self.level);
        let mut opening = "{".repeat(length);
        let closing = "}".repeat(length);

        if tag == Tag::Table {
            return Wrap::fixed("||", "||");
        }

        let admonition = self
            .macros
            .last()
            .and_then(|context| admonition_style(&context.name).map(|style| (context, style)));
        if let Some((context, style)) = admonition {
            let mut details = style.to_owned();
            if let Some(title) = context.parameter("title") {
                details = format!("{details}\n\n{title}");
            }
            return Wrap::new(
                format!("{opening}#!wiki {details}\n\n"),
                format!("\n{closing}"),
            );
        }

        if text.contains('\n') && !text.starts_with('\n') {
            opening.push('\n');
        }
        Wrap::new(opening, closing)
    }

    fn render_link(&mut self, tag: Tag, attributes: &Attributes, text: &str) -> String {
        let link = std::mem::take(&mut self.link);
        let target = link.target.unwrap_or_default();

        if tag == Tag::Hyperlink {
            let label = link.label.filter(|l| !l.is_empty()).unwrap_or_else(|| target.clone());
            return format!("[[{target}|{label}]]");
        }

        let prefix = link.kind.map_or("", TargetKind::link_prefix);
        let anchor = attributes
            .get("ac:anchor")
            .filter(|a| !a.is_empty())
            .map(|a| format!("#{a}"))
            .unwrap_or_default();
        let label = link
            .label
            .filter(|l| !l.is_empty())
            .or_else(|| Some(text.trim().to_owned()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| target.clone());

        let (open, close) = if tag == Tag::Image {
            ("{{", "}}")
        } else {
            ("[[", "]]")
        };
        format!("{open}{prefix}{target}{anchor}|{label}{close}")
    }

    fn render_macro(&mut self, content: String, forbids_macros: bool) -> String {
        let Some(context) = self.macros.last() else {
            return content;
        };

        if context.name == "status" {
            let colour = context
                .parameter("colour")
                .or_else(|| context.parameter("color"))
                .unwrap_or("grey")
                .to_lowercase();
            let title = context.parameter("title").unwrap_or("-");
            return ["{{{#!wiki status/status-", &colour, "\n", title, "\n}}}"].concat();
        }

        let Some(template) = macro_template(&context.name) else {
            debug!("no template for macro {:?}, keeping its content", context.name);
            return content;
        };

        let args = macro_arguments(&context.name).map(|(confluence, moin)| {
            let value = context.parameters.get(confluence).map_or("", String::as_str);
            quote_macro_argument(&format!("{moin}={value}")).into_owned()
        });

        let mut rendered = String::new();
        for piece in template {
            match *piece {
                Piece::Literal(literal) => rendered.push_str(literal),
                Piece::Parameter("args") if args.is_some() => {
                    rendered.push_str(args.as_deref().unwrap_or_default());
                }
                Piece::Parameter(name) => match context.parameters.get(name) {
                    Some(value) => rendered.push_str(value),
                    None if name == "content" => rendered.push_str(&content),
                    None => debug!("macro {:?} has no parameter {name}", context.name),
                },
            }
        }

        if context.name == "anchor" && forbids_macros {
            self.held_anchors.push(rendered);
            return String::new();
        }
        rendered
    }

    fn attach(&mut self, stack: &mut ElementStack, tag: Tag, text: String) -> Result<(), TranslateError> {
        let Some(parent) = stack.parent_mut() else {
            self.out.write_all(text.as_bytes())?;
            return Ok(());
        };
        let parent_tag = Tag::from_name(parent.name());

        if parent.has_text() {
            if parent_tag == Tag::Body {
                parent.push_text("\n");
            }
            if tag.is_block() || (self.have_block && !tag.overrides_pending_block()) {
                parent.push_text("\n");
            }
            self.have_block = false;
        } else if tag.is_list() && parent_tag == Tag::ListItem {
            parent.push_text("\n");
        } else if tag.is_block() && !parent_tag.is_block() {
            self.have_block = true;
        } else if !tag.is_block() && self.have_block && !tag.overrides_pending_block() {
            self.have_block = true;
        } else {
            self.have_block = false;
        }

        parent.push_text(text);
        Ok(())
    }
}

impl<W: Write> ElementHandler for MarkupTranslator<W> {
    type Error = TranslateError;

    fn open_element(&mut self, name: &str, attributes: &Attributes) {
        let tag = Tag::from_name(name);

        match tag {
            Tag::Table => self.table_rows = 0,
            Tag::TableRow => self.table_columns = 0,
            _ => {}
        }
        if tag.is_list() {
            self.indents.push(self.indent() + 1);
        }
        if tag.is_counted() {
            *self.open_counts.entry(tag).or_default() += 1;
        }
        if tag.is_region() {
            self.level += 1;
            self.max_level = self.max_level.max(self.level);
            self.indents.push(0);
        }
        if tag.is_heading() {
            self.held_anchors.clear();
        }
        if tag == Tag::Macro {
            self.macros.push(MacroContext {
                name: attributes.get("ac:name").unwrap_or_default().to_owned(),
                parameters: HashMap::new(),
            });
        }
    }

    fn characters<'a>(&mut self, stack: &ElementStack, content: &'a str) -> Cow<'a, str> {
        if self.is_preformatted() {
            return Cow::Borrowed(content);
        }
        let replacement = stack
            .current()
            .map_or(" ", |frame| Tag::from_name(frame.name()).whitespace_replacement());
        whitespace_regex().replace_all(content, replacement)
    }

    fn close_element(&mut self, stack: &ElementStack) {
        let closing_region = stack
            .current()
            .is_some_and(|frame| Tag::from_name(frame.name()).is_region());
        if closing_region {
            self.indents.pop();
        }
    }

    fn handle_element(&mut self, stack: &mut ElementStack, mut text: String) -> Result<(), TranslateError> {
        let Some(frame) = stack.current() else {
            return Ok(());
        };
        let tag = Tag::from_name(frame.name());
        let attributes = frame.attributes().clone();
        let path: Vec<Tag> = stack.path().map(Tag::from_name).collect();
        let in_heading = path.iter().any(|t| t.is_heading());
        let forbids_macros = in_heading || path.contains(&Tag::Hyperlink);

        match tag {
            Tag::Table => self.table_rows = 0,
            Tag::TableRow => self.table_columns = 0,
            _ => {}
        }

        let conversion = self.select_conversion(tag, stack, &attributes, &mut text);

        text = match tag {
            Tag::Link | Tag::Image | Tag::Hyperlink => self.render_link(tag, &attributes, &text),
            Tag::Macro => self.render_macro(text, forbids_macros),
            _ => match conversion {
                Some(wrap) if !text.is_empty() => wrap.apply(&text),
                _ => match tag.simple_replacement(self.is_preformatted()) {
                    Some(replacement) => replacement.to_owned(),
                    None => text,
                },
            },
        };

        match tag {
            Tag::TableHeader | Tag::TableCell => {
                if self.table_columns > 0 {
                    text.insert_str(0, "||");
                }
                self.table_columns += 1;
            }
            Tag::TableRow => {
                if self.table_rows > 0 {
                    text.insert_str(0, "||\n||");
                }
                self.table_rows += 1;
            }
            Tag::Heading(_) if !self.held_anchors.is_empty() => {
                let anchors = std::mem::take(&mut self.held_anchors).concat();
                text = format!("{anchors}\n{text}");
            }
            Tag::Hyperlink if !in_heading && !self.held_anchors.is_empty() => {
                let anchors = std::mem::take(&mut self.held_anchors).concat();
                text.insert_str(0, &anchors);
            }
            _ => {}
        }

        if tag.is_indented() {
            text = format!("{}{}", " ".repeat(self.indent()), text.trim_start());
        }

        self.attach(stack, tag, text)
    }

    fn element_closed(&mut self, name: &str) {
        let tag = Tag::from_name(name);

        if tag.is_list() {
            self.indents.pop();
        }
        if tag.is_counted()
            && let Some(count) = self.open_counts.get_mut(&tag)
        {
            *count = count.saturating_sub(1);
        }
        if tag.is_region() {
            self.level = self.level.saturating_sub(1);
            if self.level == 0 {
                self.max_level = 0;
            }
        }
        if tag == Tag::Macro {
            self.macros.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element;
    use pretty_assertions::assert_eq;

    fn run(input: &str) -> String {
        let mut translator = MarkupTranslator::new(Vec::new());
        element::parse(input, &mut translator).unwrap();
        String::from_utf8(translator.into_inner()).unwrap()
    }

    #[test]
    fn state_is_balanced_after_a_document() {
        let mut translator = MarkupTranslator::new(Vec::new());
        element::parse(
            "<body><ul><li><pre>x</pre></li></ul><ac:macro ac:name=\"info\">\
             <ac:rich-text-body><table><tr><td>a</td></tr></table></ac:rich-text-body>\
             </ac:macro><strong><strong>y</strong></strong></body>",
            &mut translator,
        )
        .unwrap();

        assert_eq!(translator.indents, vec![0]);
        assert_eq!(translator.level, 0);
        assert_eq!(translator.max_level, 0);
        assert!(translator.macros.is_empty());
        assert!(translator.open_counts.values().all(|&count| count == 0));
    }

    #[test]
    fn whitespace_in_structural_containers_disappears() {
        assert_eq!(run("<ul>\n  <li>a   b</li>\n</ul>"), " * a b");
    }

    #[test]
    fn preformatted_text_keeps_whitespace() {
        assert_eq!(run("<pre>a   b</pre>"), "{{{a   b}}}");
    }

    #[test]
    fn root_element_writes_to_the_sink() {
        assert_eq!(run("<strong>x</strong>"), "'''x'''");
    }

    #[test]
    fn page_target_uses_space_and_title() {
        assert_eq!(
            run(r#"<ac:link><ri:page ri:space-key="DOC" ri:content-title="Start"/></ac:link>"#),
            "[[../../DOC/Start|Start]]"
        );
    }

    #[test]
    fn unknown_macro_passes_content_through() {
        assert_eq!(
            run(r#"<ac:macro ac:name="unknown"><ac:parameter ac:name="x">1</ac:parameter>body</ac:macro>"#),
            "body"
        );
    }

    #[test]
    fn default_parameter_is_keyed_by_macro_name() {
        assert_eq!(
            run(r#"<ac:macro ac:name="anchor"><ac:default-parameter> top </ac:default-parameter></ac:macro>"#),
            "<<Anchor(top)>>"
        );
    }
}
