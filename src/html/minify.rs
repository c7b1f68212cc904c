//! HTML minification.
//!
//! A single forward pass over the document:
//!
//! - comments are dropped, except conditional comments (`<!--[if IE]>`)
//! - whitespace runs collapse to one space; whitespace next to block-level
//!   tags is removed, `<script>`, `<style>` and other metadata tags are
//!   skipped over when deciding
//! - `<pre>` and `<textarea>` content is kept verbatim
//! - `<style>` bodies and `style=""` attributes go through the CSS minifier,
//!   JavaScript `<script>` bodies through the JS minifier; a block that fails
//!   to minify is kept as written
//! - attribute quotes and `/>` are kept as written
//!
//! Malformed markup that cannot be tokenized (unterminated comment or tag,
//! unclosed `<script>`) is an error for the whole document.

use std::borrow::Cow;
use std::fmt;

use crate::asset::minify::{
    MinifyError, ScriptKind, minify_css, minify_script, minify_style_attribute,
};
use crate::debug;

use super::element::{
    is_javascript_type, is_preformatted_element, is_raw_text_element, is_whitespace_boundary,
    is_whitespace_transparent,
};

/// Minify an HTML document.
pub fn minify_html(source: &str) -> Result<String, MinifyError> {
    HtmlMinifier::new(source).run()
}

// ============================================================================
// tokenizer
// ============================================================================

struct HtmlMinifier<'a> {
    src: &'a str,
    pos: usize,
    out: String,
    /// Text seen since the last emitted token
    pending: String,
    /// Whitespace right after the last emitted token is insignificant
    after_boundary: bool,
    /// Open `<pre>` elements
    preformatted: usize,
}

impl<'a> HtmlMinifier<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            out: String::with_capacity(src.len()),
            pending: String::new(),
            after_boundary: true,
            preformatted: 0,
        }
    }

    fn run(mut self) -> Result<String, MinifyError> {
        let src = self.src;
        while self.pos < self.src.len() {
            let rest = &src[self.pos..];
            let Some(lt) = rest.find('<') else {
                self.pending.push_str(rest);
                self.pos = self.src.len();
                break;
            };
            self.pending.push_str(&rest[..lt]);
            self.pos += lt;
            self.markup()?;
        }
        self.flush_text(true);
        Ok(self.out)
    }

    /// Dispatch on the token starting at `self.pos` (a `<`).
    fn markup(&mut self) -> Result<(), MinifyError> {
        let src = self.src;
        let rest = &src[self.pos..];
        if rest.starts_with("<!--") {
            return self.comment();
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            return self.declaration();
        }
        if let Some(after) = rest.strip_prefix("</") {
            if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return self.end_tag();
            }
        } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            return self.start_tag();
        }

        // stray `<` is text
        self.pending.push('<');
        self.pos += 1;
        Ok(())
    }

    fn comment(&mut self) -> Result<(), MinifyError> {
        let src = self.src;
        let body_start = self.pos + "<!--".len();
        let Some(len) = src[body_start..].find("-->") else {
            return Err(self.error("unterminated comment"));
        };
        let body = &src[body_start..body_start + len];
        let end = body_start + len + "-->".len();

        if body.starts_with("[if") || body.starts_with("<![endif]") {
            self.flush_text(true);
            self.out.push_str(&src[self.pos..end]);
            self.after_boundary = true;
        }
        // dropped comments leave surrounding text to merge
        self.pos = end;
        Ok(())
    }

    /// `<!DOCTYPE ...>`, `<![CDATA[...]>`, `<?xml ...?>`: copied as written.
    fn declaration(&mut self) -> Result<(), MinifyError> {
        let src = self.src;
        let Some(len) = src[self.pos..].find('>') else {
            return Err(self.error("unterminated declaration"));
        };
        let end = self.pos + len + 1;
        self.flush_text(true);
        self.out.push_str(&src[self.pos..end]);
        self.after_boundary = true;
        self.pos = end;
        Ok(())
    }

    fn end_tag(&mut self) -> Result<(), MinifyError> {
        let src = self.src;
        let start = self.pos + "</".len();
        let Some(len) = src[start..].find('>') else {
            return Err(self.error("unterminated end tag"));
        };
        let name = src[start..start + len]
            .split_ascii_whitespace()
            .next()
            .unwrap_or_default();
        let lower = name.to_ascii_lowercase();
        let transparent = is_whitespace_transparent(&lower);
        let boundary = is_whitespace_boundary(&lower);

        if transparent {
            self.flush_before_transparent();
        } else {
            self.flush_text(boundary);
        }
        if is_preformatted_element(&lower) {
            self.preformatted = self.preformatted.saturating_sub(1);
        }
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        if !transparent {
            self.after_boundary = boundary;
        }
        self.pos = start + len + 1;
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), MinifyError> {
        let src = self.src;
        let name_start = self.pos + 1;
        let name_len = src[name_start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
            .unwrap_or(self.src.len() - name_start);
        let name = &src[name_start..name_start + name_len];
        let attrs_start = name_start + name_len;
        let Some(len) = find_tag_end(&src[attrs_start..]) else {
            return Err(self.error(format_args!("unterminated <{name}> tag")));
        };

        let mut inner = &src[attrs_start..attrs_start + len];
        let self_closing = match inner.trim_end().strip_suffix('/') {
            Some(stripped) => {
                inner = stripped;
                true
            }
            None => false,
        };
        self.pos = attrs_start + len + 1;

        let lower = name.to_ascii_lowercase();
        let transparent = is_whitespace_transparent(&lower);
        let boundary = is_whitespace_boundary(&lower);
        let attrs = parse_attributes(inner);

        if transparent {
            self.flush_before_transparent();
        } else {
            self.flush_text(boundary);
        }
        self.out.push('<');
        self.out.push_str(name);
        for attr in &attrs {
            self.push_attribute(attr);
        }
        self.out.push_str(if self_closing { "/>" } else { ">" });
        if !transparent {
            self.after_boundary = boundary;
        }

        if self_closing {
            return Ok(());
        }
        if is_raw_text_element(&lower) {
            return self.raw_text(name, &lower, &attrs);
        }
        if is_preformatted_element(&lower) {
            self.preformatted += 1;
        }
        Ok(())
    }

    /// Content of `<script>`, `<style>` and `<textarea>` up to the matching
    /// end tag.
    fn raw_text(
        &mut self,
        name: &'a str,
        lower: &str,
        attrs: &[Attribute<'a>],
    ) -> Result<(), MinifyError> {
        let src = self.src;
        let body_start = self.pos;
        let close = format!("</{lower}");
        let Some(len) = find_ignore_ascii_case(&src[body_start..], &close) else {
            return Err(self.error(format_args!("unclosed <{name}>")));
        };
        let body = &src[body_start..body_start + len];
        let close_start = body_start + len;
        let Some(close_len) = src[close_start..].find('>') else {
            self.pos = close_start;
            return Err(self.error(format_args!("unterminated </{name}> tag")));
        };

        let content = match lower {
            "style" => minify_block(lower, body, minify_css),
            "script" => {
                let ty = attrs
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case("type"))
                    .and_then(|a| a.value);
                if is_javascript_type(ty) {
                    let kind = if ty.is_some_and(|t| t.trim().eq_ignore_ascii_case("module")) {
                        ScriptKind::Module
                    } else {
                        ScriptKind::Classic
                    };
                    minify_block(lower, body, |s| minify_script(s, kind))
                } else {
                    Cow::Borrowed(body)
                }
            }
            _ => Cow::Borrowed(body),
        };

        self.out.push_str(&content);
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        if !is_whitespace_transparent(lower) {
            self.after_boundary = is_whitespace_boundary(lower);
        }
        self.pos = close_start + close_len + 1;
        Ok(())
    }

    fn push_attribute(&mut self, attr: &Attribute<'_>) {
        self.out.push(' ');
        self.out.push_str(attr.name);
        let Some(value) = attr.value else {
            return;
        };
        let value = if attr.name.eq_ignore_ascii_case("style") {
            minify_inline_style(value, attr.quote)
        } else {
            Cow::Borrowed(value)
        };
        self.out.push('=');
        match attr.quote {
            Some(quote) => {
                self.out.push(quote);
                self.out.push_str(&value);
                self.out.push(quote);
            }
            None => self.out.push_str(&value),
        }
    }

    /// Emit pending text, collapsing whitespace.
    ///
    /// `before_boundary`: the next token makes trailing whitespace insignificant.
    fn flush_text(&mut self, before_boundary: bool) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);
        if self.preformatted > 0 {
            self.out.push_str(&text);
            self.after_boundary = false;
            return;
        }

        let collapsed = collapse_whitespace(&text);
        let mut slice = collapsed.as_str();
        if self.after_boundary {
            slice = slice.trim_start_matches(' ');
        }
        if before_boundary {
            slice = slice.trim_end_matches(' ');
        }
        if !slice.is_empty() {
            self.out.push_str(slice);
            self.after_boundary = false;
        }
    }

    /// Emit pending text ahead of a transparent tag.
    ///
    /// A trailing space is carried past the tag, so it still separates the
    /// text on both sides unless the next token is a boundary.
    fn flush_before_transparent(&mut self) {
        let carry = self.preformatted == 0
            && self.pending.ends_with(|c: char| c.is_ascii_whitespace());
        self.flush_text(true);
        if carry && !self.after_boundary {
            self.pending.push(' ');
        }
    }

    fn error(&self, message: impl fmt::Display) -> MinifyError {
        let line = self.src[..self.pos].matches('\n').count() + 1;
        MinifyError::Html(format!("{message} at line {line}"))
    }
}

// ============================================================================
// helpers
// ============================================================================

/// One attribute as written: name, raw value and its quote character.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute<'a> {
    name: &'a str,
    value: Option<&'a str>,
    quote: Option<char>,
}

/// Parse HTML attributes, keeping values and quotes untouched.
///
/// Input: `href="a.css" rel='stylesheet' defer`
fn parse_attributes(s: &str) -> Vec<Attribute<'_>> {
    let bytes = s.as_bytes();
    let len = bytes.len();
    let skip_ws = |mut i: usize| {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    let mut attrs = Vec::new();
    let mut i = 0;
    while i < len {
        if bytes[i].is_ascii_whitespace() || bytes[i] == b'/' {
            i += 1;
            continue;
        }

        let name_start = i;
        while i < len && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'/') {
            i += 1;
        }
        if i == name_start {
            // stray `=`
            i += 1;
            continue;
        }
        let name = &s[name_start..i];

        let j = skip_ws(i);
        if j >= len || bytes[j] != b'=' {
            attrs.push(Attribute {
                name,
                value: None,
                quote: None,
            });
            i = j;
            continue;
        }

        let mut j = skip_ws(j + 1);
        if j < len && matches!(bytes[j], b'"' | b'\'') {
            let quote = bytes[j] as char;
            let value_start = j + 1;
            let value_end = s[value_start..]
                .find(quote)
                .map_or(len, |k| value_start + k);
            attrs.push(Attribute {
                name,
                value: Some(&s[value_start..value_end]),
                quote: Some(quote),
            });
            i = (value_end + 1).min(len);
        } else {
            let value_start = j;
            while j < len && !bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            attrs.push(Attribute {
                name,
                value: Some(&s[value_start..j]),
                quote: None,
            });
            i = j;
        }
    }
    attrs
}

/// Byte offset of the `>` closing a tag, skipping quoted attribute values.
fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote = None;
    let mut after_eq = false;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '>' => return Some(i),
                '"' | '\'' if after_eq => quote = Some(c),
                '=' => {
                    after_eq = true;
                    continue;
                }
                c if c.is_ascii_whitespace() => continue,
                _ => {}
            },
        }
        after_eq = false;
    }
    None
}

/// `needle` must be lowercase ASCII.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Minify an embedded block, keeping it as written on failure.
fn minify_block<'a, F>(tag: &str, body: &'a str, minify: F) -> Cow<'a, str>
where
    F: FnOnce(&str) -> Result<String, MinifyError>,
{
    if body.trim().is_empty() {
        return Cow::Borrowed("");
    }
    match minify(body) {
        Ok(out) if find_ignore_ascii_case(&out, &format!("</{tag}")).is_none() => Cow::Owned(out),
        Ok(_) => Cow::Borrowed(body),
        Err(err) => {
            debug!("html"; "kept <{}> block as written: {}", tag, err);
            Cow::Borrowed(body)
        }
    }
}

fn minify_inline_style(value: &str, quote: Option<char>) -> Cow<'_, str> {
    if value.trim().is_empty() {
        return Cow::Borrowed(value);
    }
    match minify_style_attribute(value) {
        Ok(out) => {
            let fits = match quote {
                Some(q) => !out.contains(q),
                None => !out.contains(|c: char| c.is_ascii_whitespace() || matches!(c, '"' | '\'' | '>')),
            };
            if fits { Cow::Owned(out) } else { Cow::Borrowed(value) }
        }
        Err(_) => Cow::Borrowed(value),
    }
}
