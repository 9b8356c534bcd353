//! The book-generation pipeline.
//!
//! Drives one or more articles through extraction, sanitization, and
//! image relocation concurrently, renders the cover alongside them, then
//! assembles and packages the book. One request produces exactly one
//! packaged output; the first failure in any sub-task aborts the whole
//! request and the remaining tasks with it.

use std::path::PathBuf;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::info;

use crate::book::{ArticleRequest, ProcessedArticle, assemble, derive_file_stem};
use crate::cover::write_cover;
use crate::epub::write_epub;
use crate::extract::extract;
use crate::fetch::FetchConfig;
use crate::images::relocate_images;
use crate::sanitize::sanitize;
use crate::workspace::Workspace;
use crate::{BinderyError, Result};

/// Options for one book generation.
#[derive(Debug, Clone)]
pub struct BookOptions {
    /// Overall book title, overriding the first article's.
    pub title: Option<String>,
    /// HTTP settings shared by page and image fetches.
    pub fetch: FetchConfig,
    /// Directory the packaged file is written to.
    pub output_dir: PathBuf,
}

impl Default for BookOptions {
    fn default() -> Self {
        Self { title: None, fetch: FetchConfig::default(), output_dir: PathBuf::from(".") }
    }
}

/// Generates one packaged book from the given articles.
///
/// Article pipelines run concurrently; the section list always follows
/// the caller-supplied article order regardless of completion order. The
/// cover renders concurrently too, starting as soon as the book title is
/// resolvable. Returns the path of the written `.epub`.
pub async fn make_epub(articles: &[ArticleRequest], options: &BookOptions) -> Result<PathBuf> {
    if articles.is_empty() {
        return Err(BinderyError::EmptyRequest);
    }

    let workspace = Workspace::create()?;
    info!(id = workspace.id(), articles = articles.len(), "generating book");

    // The cover needs only the resolved book title: with a caller-supplied
    // one it starts immediately, otherwise the first article's extraction
    // hands the resolved title over this channel.
    let (title_tx, title_rx) = oneshot::channel::<String>();
    let mut title_tx = if options.title.is_none() { Some(title_tx) } else { None };

    let cover_path = workspace.cover_path();
    let custom_title = options.title.clone();
    let cover_handle = tokio::spawn(async move {
        let title = match custom_title {
            Some(title) => title,
            None => title_rx
                .await
                .map_err(|_| BinderyError::Render("book title never resolved".to_string()))?,
        };
        info!(title = %title, "rendering cover");
        tokio::task::spawn_blocking(move || write_cover(&title, &cover_path))
            .await
            .map_err(|e| BinderyError::Render(format!("cover task failed: {}", e)))?
    });

    let mut set: JoinSet<Result<(usize, ProcessedArticle)>> = JoinSet::new();
    for (index, request) in articles.iter().enumerate() {
        let url = request.url.clone();
        let request_title = request.title.clone();
        let fetch = options.fetch.clone();
        let dir = workspace.path().to_path_buf();
        let title_tx = if index == 0 { title_tx.take() } else { None };

        set.spawn(async move {
            info!(%url, "extracting article");
            let page = extract(&url, &fetch).await?;

            if let Some(tx) = title_tx {
                let resolved = page.title.clone().unwrap_or_else(|| url.to_string());
                let _ = tx.send(resolved);
            }

            let clean = sanitize(&page.html_body);
            let (html, images) = relocate_images(&clean, &dir, &fetch).await?;
            info!(%url, images = images.len(), "article processed");

            Ok((index, ProcessedArticle { request_title, page, html, images }))
        });
    }

    // Join point: first failure wins, siblings are aborted.
    let mut processed: Vec<Option<ProcessedArticle>> = (0..articles.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(BinderyError::Extraction(format!("article task failed: {}", e))),
        };
        match result {
            Ok((index, article)) => processed[index] = Some(article),
            Err(e) => {
                set.shutdown().await;
                cover_handle.abort();
                return Err(e);
            }
        }
    }

    match cover_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(e) => return Err(BinderyError::Render(format!("cover task failed: {}", e))),
    }

    let processed: Vec<ProcessedArticle> = processed.into_iter().flatten().collect();
    let (metadata, sections) = assemble(
        workspace.id(),
        &processed,
        options.title.as_deref(),
        workspace.cover_path(),
    )?;

    // The output name comes from the first article's URL only, even for
    // multi-article books.
    let stem = derive_file_stem(&articles[0].url);
    let stem = if stem.is_empty() { "book".to_string() } else { stem };

    info!(stem = %stem, "packaging book");
    let path = write_epub(&metadata, &sections, &options.output_dir, &stem)?;
    info!(path = %path.display(), "book written");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let result = make_epub(&[], &BookOptions::default()).await;
        assert!(matches!(result, Err(BinderyError::EmptyRequest)));
    }

    #[tokio::test]
    async fn test_unreachable_article_fails_whole_request() {
        let dir = tempfile::tempdir().unwrap();
        let options = BookOptions { output_dir: dir.path().to_path_buf(), ..Default::default() };
        let articles = vec![ArticleRequest::new(Url::parse("http://127.0.0.1:1/post").unwrap())];

        let result = make_epub(&articles, &options).await;
        assert!(result.is_err());
        // No partial output is left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_default_options_write_to_working_directory() {
        let options = BookOptions::default();
        assert_eq!(options.output_dir, PathBuf::from("."));
        assert!(options.title.is_none());
    }
}
