//! Translation tests.
//!
//! Fixture pairs (`.xml` page body, `.moin` expected markup) live in
//! `fixtures/`.

use std::io;

use pretty_assertions::assert_eq;

use super::{TranslateError, translate, translate_to};

#[test]
fn fixture_minimal_page() {
    assert_fixture("minimal_page");
}

#[test]
fn fixture_paragraphs_and_headings() {
    assert_fixture("paragraphs_and_headings");
}

#[test]
fn fixture_table() {
    assert_fixture("table");
}

#[test]
fn fixture_nested_lists() {
    assert_fixture("nested_lists");
}

#[test]
fn fixture_preformatted() {
    assert_fixture("preformatted");
}

#[test]
fn fixture_nested_regions() {
    assert_fixture("nested_regions");
}

#[test]
fn fixture_admonition() {
    assert_fixture("admonition");
}

#[test]
fn fixture_links() {
    assert_fixture("links");
}

#[test]
fn fixture_macros() {
    assert_fixture("macros");
}

fn assert_fixture(name: &str) {
    let fixtures_dir = format!("{}/src/translate/tests/fixtures", env!("CARGO_MANIFEST_DIR"));
    let body = std::fs::read_to_string(format!("{fixtures_dir}/{name}.xml")).unwrap();
    let expected = std::fs::read_to_string(format!("{fixtures_dir}/{name}.moin")).unwrap();

    let actual = translate(&body).unwrap();

    assert_eq!(actual, expected.trim_end_matches('\n'), "fixture {name}");
}

#[test]
fn outer_fence_is_longer_than_inner_fences() {
    // Given three nested regions
    let body = r#"<ac:macro ac:name="a"><ac:rich-text-body><ac:macro ac:name="b"><ac:rich-text-body><pre>z</pre></ac:rich-text-body></ac:macro></ac:rich-text-body></ac:macro>"#;

    // When
    let markup = translate(body).unwrap();

    // Then the fences shrink towards the innermost region
    let expected = format!(
        "{}{}{}z{}{}{}",
        "{".repeat(5),
        "{".repeat(4),
        "{".repeat(3),
        "}".repeat(3),
        "}".repeat(4),
        "}".repeat(5)
    );
    assert_eq!(markup, expected);
}

#[test]
fn sibling_regions_share_a_fence_length() {
    let body = r#"<ac:macro ac:name="a"><ac:rich-text-body><pre>x</pre><pre>y</pre></ac:rich-text-body></ac:macro>"#;

    assert_eq!(translate(body).unwrap(), "{{{{\n{{{x}}}\n{{{y}}}}}}}");
}

#[test]
fn fence_length_resets_after_outermost_region() {
    let body = r#"<ac:macro ac:name="a"><ac:rich-text-body><pre>x</pre></ac:rich-text-body></ac:macro><pre>y</pre>"#;

    assert_eq!(translate(body).unwrap(), "{{{{{{{x}}}}}}}\n\n{{{y}}}");
}

#[test]
fn nested_emphasis_is_not_doubled() {
    let once = translate("<strong>x</strong>").unwrap();
    let twice = translate("<strong><strong>x</strong></strong>").unwrap();

    assert_eq!(twice, once);
    insta::assert_snapshot!(twice, @"'''x'''");
}

#[test]
fn list_as_first_content_of_item_starts_on_new_line() {
    assert_eq!(
        translate("<ul><li><ul><li>x</li></ul></li></ul>").unwrap(),
        " * \n  * x"
    );
}

#[test]
fn unknown_elements_pass_text_through() {
    assert_eq!(
        translate("<p>a <span>b</span> <foo:bar>c</foo:bar></p>").unwrap(),
        "a b c"
    );
}

#[test]
fn link_without_target_keeps_its_label() {
    assert_eq!(
        translate("<p><ac:link><ac:link-body>Label</ac:link-body></ac:link></p>").unwrap(),
        "[[|Label]]"
    );
}

#[test]
fn link_without_any_details_is_empty() {
    assert_eq!(translate("<ac:link><ri:page/></ac:link>").unwrap(), "[[|]]");
}

#[test]
fn page_link_in_other_space() {
    assert_eq!(
        translate(r#"<ac:link><ri:page ri:space-key="DOC" ri:content-title="Start"/></ac:link>"#)
            .unwrap(),
        "[[../../DOC/Start|Start]]"
    );
}

#[test]
fn user_link() {
    assert_eq!(
        translate(r#"<ac:link><ri:user ri:username="jdoe"/></ac:link>"#).unwrap(),
        "[[jdoe|jdoe]]"
    );
}

#[test]
fn anchor_inside_link_is_emitted_before_it() {
    let body = r#"<p><a href="http://x/"><ac:macro ac:name="anchor"><ac:default-parameter>here</ac:default-parameter></ac:macro>x</a></p>"#;

    assert_eq!(translate(body).unwrap(), "<<Anchor(here)>>[[http://x/|x]]");
}

#[test]
fn status_macro_defaults() {
    assert_eq!(
        translate(r#"<ac:macro ac:name="status"/>"#).unwrap(),
        "{{{#!wiki status/status-grey\n-\n}}}"
    );
}

#[test]
fn color_argument_with_quotes_is_quoted() {
    let body = r#"<ac:macro ac:name="color"><ac:parameter ac:name="color">"red"</ac:parameter>x</ac:macro>"#;

    assert_eq!(
        translate(body).unwrap(),
        r#"<<Color2(x, "col=""red""")>>"#
    );
}

#[test]
fn structured_macro_with_plain_text_body() {
    let body = r#"<ac:structured-macro ac:name="code"><ac:plain-text-body><![CDATA[a  < b]] ></ac:plain-text-body></ac:structured-macro>"#;

    assert_eq!(translate(body).unwrap(), "{{{a  < b}}}");
}

#[test]
fn line_break_inside_preformatted_text() {
    assert_eq!(translate("<pre>a<br/>b</pre>").unwrap(), "{{{\na\nb}}}");
}

#[test]
fn nested_table_restarts_counters() {
    // Given a table nested in a cell of the second row
    let body = "<table><tr><th>A</th></tr><tr><td><table>\
                <tr><td>i1</td><td>i2</td></tr><tr><td>i3</td></tr>\
                </table></td><td>z</td></tr></table>";

    // When
    let markup = translate(body).unwrap();

    // Then the inner table starts with fresh counters and leaves them reset
    assert_eq!(markup, "||'''A'''||i1||i2||\n||i3||\n||z||");
}

#[test]
fn url_target_uses_its_value() {
    let body = r#"<ac:link><ri:url ri:value="http://example.org/"/><ac:plain-text-link-body><![CDATA[site]]></ac:plain-text-link-body></ac:link>"#;

    assert_eq!(translate(body).unwrap(), "[[http://example.org/|site]]");
}

#[test]
fn url_target_without_label_repeats_the_value() {
    let body = r#"<ac:link><ri:url ri:value="http://example.org/"/></ac:link>"#;

    assert_eq!(
        translate(body).unwrap(),
        "[[http://example.org/|http://example.org/]]"
    );
}

#[test]
fn admonition_applies_to_preformatted_region_inside_it() {
    let body = "<ac:macro ac:name=\"info\"><ac:rich-text-body><pre>x\ny</pre></ac:rich-text-body></ac:macro>";

    assert_eq!(
        translate(body).unwrap(),
        "{{{{#!wiki important\n\n{{{#!wiki important\n\nx\ny\n}}}\n}}}}"
    );
}

#[test]
fn admonition_applies_to_plain_text_body() {
    let body = r#"<ac:macro ac:name="info"><ac:plain-text-body><![CDATA[code]]></ac:plain-text-body></ac:macro>"#;

    assert_eq!(translate(body).unwrap(), "{{{#!wiki important\n\ncode\n}}}");
}

#[test]
fn excerpt_has_an_empty_style() {
    let body = r#"<ac:macro ac:name="excerpt"><ac:rich-text-body><p>e</p></ac:rich-text-body></ac:macro>"#;

    assert_eq!(translate(body).unwrap(), "{{{#!wiki \n\ne\n}}}");
}

#[test]
fn semicolon_entity_is_kept() {
    assert_eq!(translate("<p>a&semi;b</p>").unwrap(), "a;b");
}

#[test]
fn html_entities_are_resolved() {
    assert_eq!(
        translate("<p>a&nbsp;b &rarr; c&nosuch;</p>").unwrap(),
        "a\u{a0}b \u{2192} c"
    );
}

#[test]
fn malformed_body_is_an_error() {
    let result = translate("<p>unclosed");

    assert!(matches!(result, Err(TranslateError::Malformed(_))));
}

#[test]
fn translate_to_writes_into_the_sink() {
    let mut out = Vec::new();

    translate_to("<h3>Title</h3>", &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "=== Title ===");
}

#[test]
fn sink_failure_is_reported() {
    struct Broken;

    impl io::Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let result = translate_to("<p>x</p>", Broken);

    assert!(matches!(result, Err(TranslateError::Io(_))));
}
