//! A forgiving scanner over HTML start tags that records where things are in the source.
//!
//! Nothing is re-serialized. Callers get byte ranges of attribute values and raw-text
//! element bodies, and splice replacements into the original text with [`splice`].
//! Everything outside those ranges comes out exactly as it went in.

use std::borrow::Cow;
use std::ops::Range;

/// Elements whose content is raw text up to the matching end tag.
#[inline]
fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea" | "title" | "xmp")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue<'a> {
    /// Value as written, without its quotes.
    pub raw: &'a str,
    /// Byte range of `raw` in the scanned markup.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: Option<AttributeValue<'a>>,
    /// Offset just past the attribute, closing quote included.
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag<'a> {
    /// Lowercase element name.
    pub name: String,
    pub attributes: Vec<Attribute<'a>>,
    /// Byte range of the whole tag, from `<` to `>` inclusive.
    pub span: Range<usize>,
    /// Content of a raw-text element (`script`, `style`, ...), up to its end tag.
    pub body: Option<Range<usize>>,
}

impl<'a> StartTag<'a> {
    /// First attribute named `name`, compared case-insensitively.
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
    }
}

/// Iterate over the start tags of `markup` in document order.
///
/// Comments, doctypes, processing instructions and end tags are skipped. The content of
/// raw-text elements is never scanned for tags, so `<script>if (a<b) {}</script>` yields
/// a single `script` tag.
pub fn start_tags(markup: &str) -> StartTags<'_> {
    StartTags { markup, pos: 0 }
}

pub struct StartTags<'a> {
    markup: &'a str,
    pos: usize,
}

impl<'a> Iterator for StartTags<'a> {
    type Item = StartTag<'a>;

    fn next(&mut self) -> Option<StartTag<'a>> {
        let markup = self.markup;
        let bytes = markup.as_bytes();

        loop {
            let open = self.pos + markup.get(self.pos..)?.find('<')?;
            let rest = &markup[open..];

            if rest.starts_with("<!--") {
                self.pos = find_from(markup, open + 4, "-->").map_or(markup.len(), |end| end + 3);
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") || rest.starts_with("</") {
                self.pos = find_from(markup, open + 2, ">").map_or(markup.len(), |end| end + 1);
                continue;
            }

            let name_start = open + 1;
            if !bytes.get(name_start).is_some_and(u8::is_ascii_alphabetic) {
                // A lone `<` in text
                self.pos = name_start;
                continue;
            }
            let name_end = scan_while(bytes, name_start, |b| {
                !b.is_ascii_whitespace() && b != b'/' && b != b'>'
            });
            let name = markup[name_start..name_end].to_ascii_lowercase();

            let (attributes, end) = scan_attributes(markup, name_end);
            self.pos = end;

            // A trailing `/` does not close these elements either
            let body = if is_raw_text_element(&name) {
                let close = find_end_tag(markup, end, &name);
                self.pos = close;
                Some(end..close)
            } else {
                None
            };

            return Some(StartTag {
                name,
                attributes,
                span: open..end,
                body,
            });
        }
    }
}

/// Parse attributes from `pos` up to the end of the tag.
///
/// Returns the attributes and the offset just past the closing `>`, or the end of the
/// markup for an unterminated tag.
fn scan_attributes(markup: &str, mut pos: usize) -> (Vec<Attribute<'_>>, usize) {
    let bytes = markup.as_bytes();
    let mut attributes = Vec::new();

    loop {
        pos = scan_while(bytes, pos, |b| b.is_ascii_whitespace() || b == b'/');
        match bytes.get(pos) {
            None => return (attributes, markup.len()),
            Some(b'>') => return (attributes, pos + 1),
            Some(_) => {}
        }

        let name_start = pos;
        // The first character may be anything, `=` included
        pos = scan_while(bytes, pos + 1, |b| {
            !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'=')
        });
        let name = &markup[name_start..pos];

        let after_name = pos;
        pos = scan_while(bytes, pos, |b| b.is_ascii_whitespace());
        if bytes.get(pos) != Some(&b'=') {
            attributes.push(Attribute {
                name,
                value: None,
                end: after_name,
            });
            continue;
        }

        pos = scan_while(bytes, pos + 1, |b| b.is_ascii_whitespace());
        let (span, end) = match bytes.get(pos) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let value_start = pos + 1;
                match bytes[value_start..].iter().position(|&b| b == quote) {
                    Some(len) => (value_start..value_start + len, value_start + len + 1),
                    None => (value_start..markup.len(), markup.len()),
                }
            }
            _ => {
                let value_end = scan_while(bytes, pos, |b| !b.is_ascii_whitespace() && b != b'>');
                (pos..value_end, value_end)
            }
        };
        pos = end;
        attributes.push(Attribute {
            name,
            value: Some(AttributeValue {
                raw: &markup[span.clone()],
                span,
            }),
            end,
        });
    }
}

/// Offset of the `</name` that closes a raw-text element whose content starts at `from`.
fn find_end_tag(markup: &str, from: usize, name: &str) -> usize {
    let bytes = markup.as_bytes();
    let needle = format!("</{name}");
    let mut pos = from;
    while let Some(found) = find_from(markup, pos, "</") {
        let candidate = &bytes[found..];
        let matches = candidate.len() >= needle.len()
            && candidate[..needle.len()].eq_ignore_ascii_case(needle.as_bytes());
        let terminated = matches!(
            candidate.get(needle.len()),
            None | Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r' | b'\x0C')
        );
        if matches && terminated {
            return found;
        }
        pos = found + 2;
    }
    markup.len()
}

fn find_from(markup: &str, from: usize, needle: &str) -> Option<usize> {
    markup.get(from..)?.find(needle).map(|at| from + at)
}

fn scan_while(bytes: &[u8], mut pos: usize, keep: impl Fn(u8) -> bool) -> usize {
    while pos < bytes.len() && keep(bytes[pos]) {
        pos += 1;
    }
    pos
}

/// A replacement of `span` in the original markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn replace(span: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }
}

/// Apply non-overlapping edits to `markup`, leaving every other byte untouched.
pub fn splice(markup: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| (edit.span.start, edit.span.end));

    let mut out = String::with_capacity(markup.len());
    let mut copied = 0;
    for edit in edits {
        if edit.span.start < copied {
            continue;
        }
        out.push_str(&markup[copied..edit.span.start]);
        out.push_str(&edit.replacement);
        copied = edit.span.end;
    }
    out.push_str(&markup[copied..]);
    out
}

/// Decode the character references that commonly appear in URL-valued attributes.
pub fn decode_attribute(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(
        raw.replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

/// Escape text for use inside a double-quoted attribute value.
pub fn escape_attribute(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '"']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace('&', "&amp;").replace('"', "&quot;"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(markup: &str) -> Vec<String> {
        start_tags(markup).map(|tag| tag.name).collect()
    }

    #[test]
    fn test_script_body_is_not_scanned() {
        let markup = "<script>for (var i=0;i<n;i++) { if (a < b && c > d) go(); }</script><p>end</p>";
        let tags: Vec<_> = start_tags(markup).collect();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].name, "p");

        let body = tags[0].body.clone().unwrap();
        assert_eq!(
            &markup[body],
            "for (var i=0;i<n;i++) { if (a < b && c > d) go(); }"
        );
    }

    #[test]
    fn test_end_tag_match_is_case_insensitive_and_whole_word() {
        let markup = "<SCRIPT>x = '</scripts>';</Script ><b>";
        let tags: Vec<_> = start_tags(markup).collect();
        assert_eq!(&markup[tags[0].body.clone().unwrap()], "x = '</scripts>';");
        assert_eq!(tags[1].name, "b");
    }

    #[test]
    fn test_attribute_values_and_spans() {
        let markup = r#"<img alt='say "hi"' src="a.png" width=10 hidden data-x = "1">"#;
        let tag = start_tags(markup).next().unwrap();
        assert_eq!(tag.span, 0..markup.len());

        let alt = tag.attribute("ALT").unwrap().value.clone().unwrap();
        assert_eq!(alt.raw, r#"say "hi""#);
        assert_eq!(&markup[alt.span], r#"say "hi""#);

        let src = tag.attribute("src").unwrap();
        assert_eq!(&markup[src.value.clone().unwrap().span], "a.png");
        assert_eq!(&markup[..src.end], r#"<img alt='say "hi"' src="a.png""#);

        assert_eq!(tag.attribute("width").unwrap().value.as_ref().unwrap().raw, "10");
        assert!(tag.attribute("hidden").unwrap().value.is_none());
        assert_eq!(tag.attribute("data-x").unwrap().value.as_ref().unwrap().raw, "1");
    }

    #[test]
    fn test_comments_and_declarations_are_skipped() {
        let markup = "<!DOCTYPE html><!-- <img src=x> --><?xml?><html></html><br/>a < b";
        assert_eq!(names(markup), ["html", "br"]);
    }

    #[test]
    fn test_unterminated_input() {
        assert_eq!(names("<div class=\"open"), ["div"]);
        assert_eq!(names("<script>never closed"), ["script"]);
        assert_eq!(names("<!-- never closed <p>"), Vec::<String>::new());
    }

    #[test]
    fn test_splice_keeps_everything_else() {
        let markup = "<a href=\"x\">é</a>";
        let tag = start_tags(markup).next().unwrap();
        let href = tag.attribute("href").unwrap();
        let edits = vec![
            Edit::insert(href.end, " data-k=\"v\""),
            Edit::replace(href.value.clone().unwrap().span, "#"),
        ];
        assert_eq!(splice(markup, edits), "<a href=\"#\" data-k=\"v\">é</a>");
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_attribute("a.png?x=1&amp;y=2"), "a.png?x=1&y=2");
        assert_eq!(escape_attribute(r#"a"b&c"#), "a&quot;b&amp;c");
    }
}
