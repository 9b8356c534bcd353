//! Image relocation: rewrites `<img>` references to locally fetched copies.
//!
//! Every `<img>` in the sanitized content gets a fresh local file name
//! (assigned before its fetch is scheduled, so names are independent of
//! completion order), all fetches run concurrently, and the document is
//! then rewritten in a streaming pass so non-image markup round-trips
//! byte-for-byte. Failure policy is fail-fast: one bad image rejects the
//! whole relocation, aborting the remaining fetches.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use tokio::task::JoinSet;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::fetch::{FetchConfig, fetch_bytes};
use crate::{BinderyError, Result};

/// One discovered `<img>` element, scheduled for relocation.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    /// The `src` attribute as found in the document.
    pub original_url: String,
    /// Generated local file name (random token + extension).
    pub local_name: String,
    /// Absolute path the bytes are written to.
    pub path: PathBuf,
    /// The element's alt text; empty when the document had none.
    pub alt: String,
}

/// Relocates every image in `html` into `dest_dir`.
///
/// Returns the rewritten HTML and the written asset paths in document
/// order. The rewritten `src` values use the `../images/<name>` convention
/// the package writer's asset layout expects; images without an `alt`
/// attribute get an empty one.
pub async fn relocate_images(html: &str, dest_dir: &Path, config: &FetchConfig) -> Result<(String, Vec<PathBuf>)> {
    let assets = assign_assets(&discover_sources(html), dest_dir);

    if assets.is_empty() {
        return Ok((html.to_string(), Vec::new()));
    }

    debug!(count = assets.len(), "fetching images");
    fetch_all(&assets, config).await?;

    let names: Vec<String> = assets.iter().map(|a| a.local_name.clone()).collect();
    let rewritten = rewrite_sources(html, &names)?;

    let paths = assets.into_iter().map(|a| a.path).collect();
    Ok((rewritten, paths))
}

/// Collects `img` sources and alt texts in document order.
fn discover_sources(html: &str) -> Vec<(String, String)> {
    let Ok(sel) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    let doc = Html::parse_fragment(html);
    doc.select(&sel)
        .filter_map(|el| {
            el.value()
                .attr("src")
                .map(|src| (src.to_string(), el.value().attr("alt").unwrap_or_default().to_string()))
        })
        .collect()
}

/// Assigns each source a unique local file name under `dest_dir`.
///
/// Names are fixed here, before any fetch starts, so the mapping between
/// elements and files never depends on completion order.
fn assign_assets(sources: &[(String, String)], dest_dir: &Path) -> Vec<ImageAsset> {
    sources
        .iter()
        .map(|(src, alt)| {
            let local_name = format!("{}.{}", Uuid::new_v4().simple(), extension_for(src));
            let path = dest_dir.join(&local_name);
            ImageAsset { original_url: src.clone(), local_name, path, alt: alt.clone() }
        })
        .collect()
}

/// File extension from the URL path, defaulting to `png`.
///
/// Readers want *an* extension to render the image; it does not have to
/// match the actual encoding.
fn extension_for(src: &str) -> String {
    let path_part = match Url::parse(src) {
        Ok(url) => url.path().to_string(),
        Err(_) => src.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    Path::new(&path_part)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "png".to_string())
}

/// Fetches all assets concurrently, failing fast on the first error.
async fn fetch_all(assets: &[ImageAsset], config: &FetchConfig) -> Result<()> {
    let mut set = JoinSet::new();

    for asset in assets {
        let url = asset.original_url.clone();
        let path = asset.path.clone();
        let config = config.clone();
        set.spawn(async move {
            let bytes = fetch_bytes(&url, &config).await?;
            tokio::fs::write(&path, bytes).await?;
            Ok::<(), BinderyError>(())
        });
    }

    while let Some(joined) = set.join_next().await {
        let result = joined.map_err(|e| BinderyError::Render(format!("image worker failed: {}", e)))?;
        if let Err(e) = result {
            // First rejection wins; abort the in-flight siblings.
            set.shutdown().await;
            return Err(e);
        }
    }

    Ok(())
}

/// Rewrites `img src` attributes to packager-relative paths.
///
/// Uses a streaming rewriter so everything outside the touched attributes
/// is preserved byte-for-byte. `names` must be in document order, one per
/// `<img>` carrying a `src`.
fn rewrite_sources(html: &str, names: &[String]) -> Result<String> {
    let mut queue: VecDeque<&String> = names.iter().collect();
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("img", |el| {
                if el.get_attribute("src").is_some()
                    && let Some(name) = queue.pop_front()
                {
                    el.set_attribute("src", &format!("../images/{}", name))?;
                }
                // Only the relocated copy may be referenced; a srcset
                // would still point at the remote originals.
                el.remove_attribute("srcset");
                if el.get_attribute("alt").is_none() {
                    el.set_attribute("alt", "")?;
                }
                Ok(())
            })],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| BinderyError::Render(format!("image rewrite failed: {}", e)))?;
    rewriter
        .end()
        .map_err(|e| BinderyError::Render(format!("image rewrite failed: {}", e)))?;

    if output.is_empty() && !html.is_empty() {
        return Err(BinderyError::Render("image pass produced empty document".to_string()));
    }

    String::from_utf8(output).map_err(|e| BinderyError::Render(format!("image rewrite produced invalid UTF-8: {}", e)))
}
