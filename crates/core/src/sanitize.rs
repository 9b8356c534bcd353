//! Allow-list HTML sanitization.
//!
//! Extracted article bodies pass through here before any image work:
//! the markup is re-parsed into a repaired tree (unclosed or mismatched
//! tags come back well-formed) and re-serialized keeping only allow-listed
//! tags and attributes. Disallowed elements are unwrapped so their content
//! survives, except for a small set whose content is meaningless without
//! the tag. Pure function, no network or disk access, never errors:
//! malformed input degrades gracefully.

use ego_tree::NodeRef;
use scraper::{Html, Node};

/// Tags permitted to survive sanitization. This is the EPUB content-model
/// allow-list, minus `script`.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "applet", "b", "bdo", "big", "blockquote", "br", "cite", "code", "del", "dfn",
    "div", "dl", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "iframe", "img", "ins", "kbd", "map", "noscript",
    "object", "ol", "p", "pre", "q", "samp", "small", "span", "strong", "sub", "sup", "svg", "table", "tt", "ul",
    "var",
];

/// Disallowed tags whose entire subtree is discarded rather than unwrapped.
const DROP_CONTENT_TAGS: &[&str] = &["script", "style", "textarea", "option"];

/// Tags serialized without a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img"];

/// Per-tag attribute allow-list; tags not listed here keep no attributes.
/// The list order is also the output order, keeping serialization
/// independent of the parser's attribute-map iteration.
fn allowed_attributes(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "name", "target"],
        "img" => &["src", "srcset", "alt", "title", "width", "height", "loading"],
        _ => &[],
    }
}

/// Sanitizes an HTML fragment down to the allow-list.
///
/// The input is parsed as a fragment (which repairs malformed markup) and
/// re-serialized. Disallowed elements are stripped entirely, not escaped.
///
/// # Example
///
/// ```rust
/// use bindery_core::sanitize;
///
/// let clean = sanitize("<p onclick=\"x()\">hi<script>evil()</script></p>");
/// assert_eq!(clean, "<p>hi</p>");
/// ```
pub fn sanitize(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    serialize_children(fragment.tree.root(), &mut out);
    out
}

fn serialize_children(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        serialize_node(child, out);
    }
}

fn serialize_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => escape_text(text, out),
        Node::Element(element) => {
            let name = element.name();

            if DROP_CONTENT_TAGS.contains(&name) {
                return;
            }

            if !ALLOWED_TAGS.contains(&name) {
                // Unwrap: the element goes away, its children survive.
                serialize_children(node, out);
                return;
            }

            out.push('<');
            out.push_str(name);
            for attr in allowed_attributes(name) {
                if let Some(value) = element.attr(attr) {
                    out.push(' ');
                    out.push_str(attr);
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
            }

            if VOID_TAGS.contains(&name) {
                out.push_str("/>");
                return;
            }

            out.push('>');
            serialize_children(node, out);
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        // Comments, doctypes, and processing instructions are dropped.
        _ => serialize_children(node, out),
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_script_is_stripped_with_content() {
        let clean = sanitize("<p>before</p><script>alert(1)</script><p>after</p>");
        assert!(!clean.contains("script"));
        assert!(!clean.contains("alert"));
        assert_eq!(clean, "<p>before</p><p>after</p>");
    }

    #[test]
    fn test_disallowed_tag_is_unwrapped() {
        let clean = sanitize("<section><p>kept</p></section>");
        assert_eq!(clean, "<p>kept</p>");
    }

    #[test]
    fn test_malformed_markup_is_repaired() {
        let clean = sanitize("<p><b>bold text<p>next paragraph");
        // html5ever closes the dangling tags on re-parse.
        assert!(clean.contains("<b>bold text</b>"));
        assert_eq!(clean.matches("<p>").count(), clean.matches("</p>").count());
    }

    #[test]
    fn test_attributes_are_filtered() {
        let clean = sanitize(r#"<a href="https://example.com" onclick="x()" style="color:red">link</a>"#);
        assert_eq!(clean, r#"<a href="https://example.com">link</a>"#);
    }

    #[test]
    fn test_img_keeps_src_and_alt() {
        let clean = sanitize(r#"<img src="a.png" alt="pic" data-tracking="1">"#);
        assert_eq!(clean, r#"<img src="a.png" alt="pic"/>"#);
    }

    #[test]
    fn test_attribute_order_is_fixed() {
        // Output order follows the allow-list, not the parser's attribute
        // map, so the same input always serializes identically.
        let reordered = sanitize(r#"<img loading="lazy" alt="pic" src="a.png" title="t">"#);
        assert_eq!(reordered, r#"<img src="a.png" alt="pic" title="t" loading="lazy"/>"#);

        let link = sanitize(r#"<a target="_blank" href="https://example.com">x</a>"#);
        assert_eq!(link, r#"<a href="https://example.com" target="_blank">x</a>"#);
    }

    #[test]
    fn test_text_is_escaped() {
        let clean = sanitize("<p>1 &lt; 2 &amp; 3 &gt; 2</p>");
        assert_eq!(clean, "<p>1 &lt; 2 &amp; 3 &gt; 2</p>");
    }

    #[test]
    fn test_comments_are_dropped() {
        let clean = sanitize("<p>a</p><!-- secret --><p>b</p>");
        assert!(!clean.contains("secret"));
    }

    #[test]
    fn test_style_content_is_discarded() {
        let clean = sanitize("<style>p { display: none }</style><p>visible</p>");
        assert!(!clean.contains("display"));
        assert_eq!(clean, "<p>visible</p>");
    }

    #[test]
    fn test_output_only_contains_allowed_tags() {
        let messy = r#"
            <article><header>site chrome</header>
            <h2>Title</h2>
            <p>Text with <custom-widget>widget</custom-widget> and <em>emphasis</em>.</p>
            <video src="v.mp4">no video</video>
            <table><tr><td>cell</td></tr></table>
            </article>
        "#;
        let clean = sanitize(messy);
        let reparsed = Html::parse_fragment(&clean);
        let all = Selector::parse("*").unwrap();
        for el in reparsed.select(&all) {
            let name = el.value().name();
            if name == "html" {
                continue; // fragment wrapper
            }
            assert!(ALLOWED_TAGS.contains(&name), "unexpected tag in output: {name}");
        }
        assert!(clean.contains("site chrome"));
        assert!(clean.contains("cell"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize(""), "");
    }
}
