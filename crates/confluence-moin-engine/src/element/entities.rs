//! Character reference handling.
//!
//! The XML predefined entities and numeric references are decoded in place.
//! Any other named reference is left for the caller, which looks it up in
//! the HTML entity table via [`resolve_named`]. Confluence bodies are XHTML
//! fragments and routinely contain `&nbsp;`, `&rarr;` and friends without
//! declaring them.

/// A run of decoded text, or a named reference the XML rules cannot resolve.
#[derive(Debug, PartialEq, Eq)]
pub enum Reference<'a> {
    Text(String),
    Named(&'a str),
}

/// A reference that is not well-formed. Holds the offending reference body.
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidReference(pub String);

pub fn split_references(raw: &str) -> Result<Vec<Reference<'_>>, InvalidReference> {
    if !raw.contains('&') {
        return Ok(vec![Reference::Text(raw.to_owned())]);
    }

    let mut references = Vec::new();
    let mut text = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        text.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semicolon) = after.find(';') else {
            return Err(InvalidReference(after.chars().take(16).collect()));
        };
        let body = &after[..semicolon];

        match resolve_builtin(body)? {
            Some(c) => text.push(c),
            None => {
                if !text.is_empty() {
                    references.push(Reference::Text(std::mem::take(&mut text)));
                }
                references.push(Reference::Named(body));
            }
        }
        rest = &after[semicolon + 1..];
    }

    text.push_str(rest);
    if !text.is_empty() {
        references.push(Reference::Text(text));
    }
    Ok(references)
}

/// Look a named reference up in the HTML entity table.
///
/// Unknown names yield `None` and are dropped by the parser.
// TODO: decide with the wiki owners whether unknown entities should leave a
// visible marker in the page instead of disappearing.
pub fn resolve_named(name: &str) -> Option<String> {
    let reference = format!("&{name};");
    let decoded = html_escape::decode_html_entities(&reference);
    // Legacy entities such as `&not` also match as a prefix, leaving the rest
    // of the name and the `;` undecoded.
    let partial = decoded
        .strip_suffix(';')
        .is_some_and(|head| head.ends_with(|c: char| c.is_ascii_alphanumeric()));
    if decoded == reference || partial {
        return None;
    }
    Some(decoded.into_owned())
}

fn resolve_builtin(body: &str) -> Result<Option<char>, InvalidReference> {
    let invalid = || InvalidReference(body.to_owned());

    let c = match body {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            if let Some(numeric) = body.strip_prefix('#') {
                let code = match numeric.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16),
                    None => numeric.parse::<u32>(),
                }
                .map_err(|_| invalid())?;
                return char::from_u32(code).map(Some).ok_or_else(invalid);
            }
            if is_name(body) {
                return Ok(None);
            }
            return Err(invalid());
        }
    };
    Ok(Some(c))
}

fn is_name(body: &str) -> bool {
    let mut chars = body.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn plain_text_is_one_run() {
        assert_eq!(
            split_references("no references here").unwrap(),
            vec![Reference::Text("no references here".to_owned())]
        );
    }

    #[test]
    fn named_references_split_the_text() {
        assert_eq!(
            split_references("a &lt; b&nbsp;c").unwrap(),
            vec![
                Reference::Text("a < b".to_owned()),
                Reference::Named("nbsp"),
                Reference::Text("c".to_owned()),
            ]
        );
    }

    #[rstest]
    #[case("&#65;", "A")]
    #[case("&#x263A;", "\u{263a}")]
    #[case("&#X41;", "A")]
    #[case("&quot;&apos;&amp;&gt;", "\"'&>")]
    fn builtin_references_decode_inline(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(
            split_references(raw).unwrap(),
            vec![Reference::Text(expected.to_owned())]
        );
    }

    #[rstest]
    #[case("a & b")]
    #[case("&#xZZ;")]
    #[case("&#1114112;")]
    #[case("& ;")]
    #[case("&;")]
    fn malformed_references_are_rejected(#[case] raw: &str) {
        assert!(split_references(raw).is_err());
    }

    #[rstest]
    #[case("nbsp", Some("\u{a0}"))]
    #[case("rarr", Some("\u{2192}"))]
    #[case("eacute", Some("\u{e9}"))]
    #[case("semi", Some(";"))]
    #[case("notanentity", None)]
    #[case("nosuchentity", None)]
    fn named_lookup(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(resolve_named(name).as_deref(), expected);
    }
}
