// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_page_body(sections: usize) -> String {
    let base = "<h1>Title</h1><p>Paragraph with <strong>bold</strong> and <em>emphasis</em>.<br/>Second line.</p>\
<ul><li>Item<ul><li>Nested item</li></ul></li><li>Another item</li></ul>\
<table><tbody><tr><th>Key</th><th>Value</th></tr><tr><td>a</td><td>1</td></tr></tbody></table>\
<ac:macro ac:name=\"code\"><ac:plain-text-body><![CDATA[fn example() {\n    println!(\"Hello\");\n}]]></ac:plain-text-body></ac:macro>\
<p><ac:link><ri:page ri:content-title=\"Other Page\" /><ac:plain-text-link-body><![CDATA[see there]]></ac:plain-text-link-body></ac:link></p>";
    base.repeat(sections)
}

#[allow(dead_code)]
pub fn generate_nested_regions(depth: usize) -> String {
    let mut body = String::from("<p>innermost</p>");
    for level in 0..depth {
        let name = if level % 2 == 0 { "info" } else { "panel" };
        body = format!(
            "<ac:structured-macro ac:name=\"{name}\"><ac:rich-text-body>{body}</ac:rich-text-body></ac:structured-macro>"
        );
    }
    body
}

#[allow(dead_code)]
pub fn generate_entities(spaces: usize, pages_per_space: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<hibernate-generic>\n");
    for space in 0..spaces {
        xml.push_str(&format!(
            "<object class=\"Space\"><id name=\"id\">{space}</id><property name=\"key\">S{space}</property></object>\n"
        ));
        for page in 0..pages_per_space {
            let id = space * 100_000 + page + 1;
            let parent = if page == 0 {
                String::new()
            } else {
                format!(
                    "<property name=\"parent\" class=\"Page\"><id name=\"id\">{}</id></property>",
                    space * 100_000 + 1
                )
            };
            xml.push_str(&format!(
                "<object class=\"Page\"><id name=\"id\">{id}</id>\
<property name=\"title\">Page {page}</property>\
<property name=\"space\" class=\"Space\"><id name=\"id\">{space}</id></property>{parent}\
<collection name=\"bodyContents\"><element class=\"BodyContent\"><id name=\"id\">{id}</id></element></collection>\
<property name=\"contentStatus\">current</property>\
<property name=\"lastModificationDate\">2013-03-04 05:06:07.000</property></object>\n\
<object class=\"BodyContent\"><id name=\"id\">{id}</id><property name=\"body\">&lt;p&gt;Body {page}&lt;/p&gt;</property></object>\n"
            ));
        }
    }
    xml.push_str("</hibernate-generic>\n");
    xml
}
