//! Book assembly: metadata resolution, section ordering, file naming.
//!
//! The assembler merges the per-article results into the final metadata
//! record and ordered section list handed to the package writer. Titles
//! resolve through fallback chains (caller-supplied, then the extracted
//! page, then the URL itself); everything else comes from the first
//! article's page. The output file name derives from the first article's
//! URL only, even for multi-article books.

use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

use crate::extract::ExtractedPage;
use crate::{BinderyError, Result};

/// One article the caller wants in the book.
#[derive(Debug, Clone)]
pub struct ArticleRequest {
    /// The article URL.
    pub url: Url,
    /// Optional caller-supplied section title, overriding the page's own.
    pub title: Option<String>,
}

impl ArticleRequest {
    pub fn new(url: Url) -> Self {
        Self { url, title: None }
    }

    pub fn with_title(url: Url, title: Option<String>) -> Self {
        Self { url, title }
    }
}

/// One fully processed article, ready for assembly.
#[derive(Debug, Clone)]
pub struct ProcessedArticle {
    /// Caller-supplied section title, if any.
    pub request_title: Option<String>,
    /// The extracted page record.
    pub page: ExtractedPage,
    /// Sanitized, image-relocated section HTML.
    pub html: String,
    /// Paths of this article's relocated images, in document order.
    pub images: Vec<PathBuf>,
}

/// A section of the final book. Ordering is significant: it defines
/// reading order.
#[derive(Debug, Clone, Serialize)]
pub struct EpubSection {
    pub title: String,
    pub html: String,
}

/// Metadata for the packaged book.
#[derive(Debug, Clone, Serialize)]
pub struct BookMetadata {
    /// Random book id, also the workspace namespace.
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub source_url: String,
    /// Publish date of the first article; empty when unknown (validators
    /// complain when the field is absent entirely).
    pub published: String,
    pub series: String,
    pub publisher: String,
    /// Path of the generated cover PNG.
    pub cover_path: PathBuf,
    /// Every relocated image across all sections.
    pub image_paths: Vec<PathBuf>,
}

/// Merges processed articles into metadata plus ordered sections.
///
/// `articles` must be in caller-request order; the section list mirrors
/// it exactly, one section per article. An empty slice is
/// [`BinderyError::EmptyRequest`].
pub fn assemble(
    id: &str, articles: &[ProcessedArticle], book_title: Option<&str>, cover_path: PathBuf,
) -> Result<(BookMetadata, Vec<EpubSection>)> {
    let Some(first) = articles.first() else {
        return Err(BinderyError::EmptyRequest);
    };
    let first_url = first.page.canonical_url.to_string();

    let title = book_title
        .map(str::to_string)
        .or_else(|| first.page.title.clone())
        .unwrap_or_else(|| first_url.clone());

    let sections = articles
        .iter()
        .map(|article| EpubSection {
            title: article
                .request_title
                .clone()
                .or_else(|| article.page.title.clone())
                .unwrap_or_else(|| article.page.canonical_url.to_string()),
            html: article.html.clone(),
        })
        .collect();

    let metadata = BookMetadata {
        id: id.to_string(),
        title,
        author: first
            .page
            .author
            .clone()
            .unwrap_or_else(|| first.page.domain.clone()),
        description: first.page.excerpt.clone().unwrap_or_default(),
        source_url: first_url,
        published: first.page.published.clone().unwrap_or_default(),
        series: first.page.domain.clone(),
        publisher: first.page.domain.clone(),
        cover_path,
        image_paths: articles.iter().flat_map(|a| a.images.clone()).collect(),
    };

    Ok((metadata, sections))
}

/// Derives the output file name stem from an article URL.
///
/// Decoded path and query are concatenated, every character outside
/// `[a-zA-Z0-9.]` becomes `_`, the result is lowercased and edge
/// underscores are trimmed. Deterministic for a fixed URL.
pub fn derive_file_stem(url: &Url) -> String {
    let mut name = percent_decode_str(url.path()).decode_utf8_lossy().into_owned();
    if let Some(query) = url.query() {
        name.push('?');
        name.push_str(&percent_decode_str(query).decode_utf8_lossy());
    }

    let mapped: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    mapped.trim_matches('_').to_string()
}
