//! Article extraction from web pages.
//!
//! This module turns a raw URL into a structured [`ExtractedPage`]: title,
//! author, domain, publish date, body HTML, and excerpt. Metadata fields
//! are resolved through priority fallback chains (JSON-LD, Open Graph,
//! plain meta tags, then document structure). The rest of the pipeline
//! treats the returned record as read-only.

use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::fetch::{FetchConfig, fetch_html};
use crate::{BinderyError, Result};

/// A structured page record produced by extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedPage {
    /// Page title, if any could be resolved.
    pub title: Option<String>,
    /// Author name, if any could be resolved.
    pub author: Option<String>,
    /// Host name of the source URL.
    pub domain: String,
    /// Publish date as found in the page, unparsed.
    pub published: Option<String>,
    /// Raw article body HTML, prior to sanitization.
    pub html_body: String,
    /// Short description of the page.
    pub excerpt: Option<String>,
    /// The URL the page was fetched from.
    pub canonical_url: Url,
}

/// Fetches a URL and extracts a structured page record from it.
pub async fn extract(url: &Url, config: &FetchConfig) -> Result<ExtractedPage> {
    let html = fetch_html(url, config).await?;
    extract_from_html(&html, url)
}

/// Extracts a structured page record from already-fetched HTML.
///
/// # Errors
///
/// Returns [`BinderyError::Extraction`] when the document has no usable
/// body content.
pub fn extract_from_html(html: &str, url: &Url) -> Result<ExtractedPage> {
    let doc = Html::parse_document(html);

    let body = extract_body(&doc)
        .ok_or_else(|| BinderyError::Extraction(format!("{} has no usable body content", url)))?;

    let domain = url.host_str().unwrap_or_default().to_string();

    Ok(ExtractedPage {
        title: extract_title(&doc),
        author: extract_author(&doc),
        domain,
        published: extract_published(&doc),
        html_body: absolutize_urls(&body, url),
        excerpt: extract_excerpt(&doc),
        canonical_url: url.clone(),
    })
}

/// Picks the article body: the first of `<article>`, `<main>`, `<body>`
/// that has any text content.
fn extract_body(doc: &Html) -> Option<String> {
    for selector in ["article", "main", "body"] {
        let sel = Selector::parse(selector).ok()?;
        if let Some(el) = doc.select(&sel).next() {
            let text: String = el.text().collect();
            if !text.trim().is_empty() {
                return Some(el.inner_html());
            }
        }
    }
    None
}

/// Title fallback chain:
/// 1. JSON-LD `headline`
/// 2. Open Graph `og:title`
/// 3. Twitter `twitter:title`
/// 4. `<title>` element
/// 5. First `<h1>` element
fn extract_title(doc: &Html) -> Option<String> {
    if let Some(json_ld) = extract_json_ld(doc)
        && let Some(headline) = json_ld.get("headline")
        && let Some(value) = headline.as_str()
    {
        return Some(value.to_string());
    }

    if let Some(title) = meta_content(doc, "og:title") {
        return Some(title);
    }

    if let Some(title) = meta_content(doc, "twitter:title") {
        return Some(title);
    }

    if let Ok(sel) = Selector::parse("title")
        && let Some(el) = doc.select(&sel).next()
    {
        let text: String = el.text().collect();
        let text = text.trim();
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    first_text(doc, "h1")
}

/// Author fallback chain:
/// 1. JSON-LD `author.name`
/// 2. Meta `author`
/// 3. `[rel="author"]` link text
fn extract_author(doc: &Html) -> Option<String> {
    if let Some(json_ld) = extract_json_ld(doc)
        && let Some(author) = json_ld.get("author")
        && let Some(name) = author_name(author)
    {
        return Some(name);
    }

    if let Some(author) = meta_content(doc, "author") {
        return Some(author);
    }

    first_text(doc, "[rel=\"author\"]")
}

/// Publish date fallback chain:
/// 1. JSON-LD `datePublished`
/// 2. Meta `article:published_time`
/// 3. `<time datetime="">` element
fn extract_published(doc: &Html) -> Option<String> {
    if let Some(json_ld) = extract_json_ld(doc)
        && let Some(date) = json_ld.get("datePublished")
        && let Some(value) = date.as_str()
    {
        return Some(value.to_string());
    }

    if let Some(date) = meta_content(doc, "article:published_time") {
        return Some(date);
    }

    if let Ok(sel) = Selector::parse("time[datetime]")
        && let Some(el) = doc.select(&sel).next()
        && let Some(datetime) = el.value().attr("datetime")
    {
        return Some(datetime.to_string());
    }

    None
}

/// Excerpt fallback chain:
/// 1. Open Graph `og:description`
/// 2. Meta `description`
/// 3. First substantial paragraph
fn extract_excerpt(doc: &Html) -> Option<String> {
    if let Some(desc) = meta_content(doc, "og:description") {
        return Some(desc);
    }

    if let Some(desc) = meta_content(doc, "description") {
        return Some(desc);
    }

    if let Ok(sel) = Selector::parse("p") {
        for el in doc.select(&sel).take(5) {
            let text: String = el.text().collect();
            let text = text.trim();
            if text.len() > 50 {
                let excerpt: String = text.chars().take(300).collect();
                return Some(excerpt);
            }
        }
    }

    None
}

/// Resolves relative `img src` and `a href` values against the page URL,
/// so later pipeline stages only ever see absolute references.
fn absolutize_urls(html: &str, base: &Url) -> String {
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                lol_html::element!("img[src]", |el| {
                    if let Some(src) = el.get_attribute("src")
                        && let Ok(absolute) = base.join(&src)
                    {
                        el.set_attribute("src", absolute.as_str())?;
                    }
                    Ok(())
                }),
                lol_html::element!("a[href]", |el| {
                    if let Some(href) = el.get_attribute("href")
                        && let Ok(absolute) = base.join(&href)
                    {
                        el.set_attribute("href", absolute.as_str())?;
                    }
                    Ok(())
                }),
            ],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    if rewriter.write(html.as_bytes()).is_err() || rewriter.end().is_err() {
        return html.to_string();
    }

    match String::from_utf8(output) {
        Ok(rewritten) if !rewritten.is_empty() || html.is_empty() => rewritten,
        _ => html.to_string(),
    }
}

/// Gets meta tag content by name or property attribute.
fn meta_content(doc: &Html, attr: &str) -> Option<String> {
    for key in ["name", "property"] {
        let selector = format!("meta[{}=\"{}\"]", key, attr);
        if let Ok(sel) = Selector::parse(&selector)
            && let Some(el) = doc.select(&sel).next()
            && let Some(content) = el.value().attr("content")
        {
            let content = content.trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
    }
    None
}

/// Trimmed text of the first element matching a selector.
fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let el = doc.select(&sel).next()?;
    let text: String = el.text().collect();
    let text = text.trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
}

/// Extracts and parses the first JSON-LD block, if any.
fn extract_json_ld(doc: &Html) -> Option<serde_json::Value> {
    let sel = Selector::parse("script[type=\"application/ld+json\"]").ok()?;
    for el in doc.select(&sel) {
        let text: String = el.text().collect();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim()) {
            return Some(value);
        }
    }
    None
}

/// Author name from a JSON-LD author field, which may be a string, an
/// object, or an array of either.
fn author_name(author: &serde_json::Value) -> Option<String> {
    if let Some(name) = author.as_str() {
        return Some(name.to_string());
    }

    if let Some(obj) = author.as_object()
        && let Some(name) = obj.get("name")
        && let Some(name_str) = name.as_str()
    {
        return Some(name_str.to_string());
    }

    if let Some(arr) = author.as_array()
        && let Some(first) = arr.first()
    {
        return author_name(first);
    }

    None
}
