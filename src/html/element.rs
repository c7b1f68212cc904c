//! Element classification used by the HTML minifier.

/// Check if tag is a raw text element (content is not markup).
///
/// `textarea` is escapable raw text; its content is kept verbatim as well.
#[inline]
pub fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea")
}

/// Check if whitespace inside the element is significant while its content
/// is still markup.
#[inline]
pub fn is_preformatted_element(tag: &str) -> bool {
    tag == "pre"
}

/// Check if tag is a block-level element.
///
/// Block elements create line breaks and take full width by default.
#[inline]
pub fn is_block_element(tag: &str) -> bool {
    matches!(
        tag,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "canvas"
            | "dd"
            | "div"
            | "dl"
            | "dt"
            | "fieldset"
            | "figcaption"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hgroup"
            | "hr"
            | "li"
            | "main"
            | "nav"
            | "noscript"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "table"
            | "tfoot"
            | "ul"
            | "video"
    )
}

/// Check if whitespace next to this tag never renders.
///
/// Block elements plus document structure and table parts.
#[inline]
pub fn is_whitespace_boundary(tag: &str) -> bool {
    is_block_element(tag)
        || matches!(
            tag,
            "html"
                | "head"
                | "body"
                | "title"
                | "caption"
                | "colgroup"
                | "col"
                | "thead"
                | "tbody"
                | "tr"
                | "td"
                | "th"
                | "option"
                | "optgroup"
                | "details"
                | "summary"
                | "dialog"
                | "menu"
                | "template"
        )
}

/// Check if tag renders nothing and leaves surrounding whitespace alone.
///
/// Such tags often sit in the middle of body text, so the space around them
/// belongs to the neighbouring words.
#[inline]
pub fn is_whitespace_transparent(tag: &str) -> bool {
    matches!(tag, "base" | "link" | "meta" | "script" | "style")
}

/// Check if a `<script type=...>` holds JavaScript.
///
/// Missing or empty `type` means classic JavaScript.
pub fn is_javascript_type(ty: Option<&str>) -> bool {
    match ty.map(|t| t.trim().to_ascii_lowercase()) {
        None => true,
        Some(t) => matches!(
            t.as_str(),
            "" | "module" | "text/javascript" | "application/javascript" | "application/ecmascript"
        ),
    }
}
