//! HTTP shell around the book pipeline.
//!
//! `GET /` with one or more `url=` query parameters builds an EPUB from
//! those articles and streams it back; requests without `url` fall through
//! to static file serving.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bindery_core::{ArticleRequest, BinderyError, BookOptions, FetchConfig, make_epub, parse_url};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

const BIND_ADDR: &str = "127.0.0.1:3000";
const STATIC_DIR: &str = "public";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Optional access-control file, pointed at by `BINDERY_ACCESS_CONFIG`.
#[derive(Debug, Deserialize)]
struct AccessConfig {
    tokens: Vec<String>,
}

struct AppState {
    access: Option<AccessConfig>,
    fetch: FetchConfig,
}

/// The query string of one book request, keys taken in document order.
#[derive(Debug, Default)]
struct BookQuery {
    urls: Vec<String>,
    titles: Vec<String>,
    book_title: Option<String>,
    token: Option<String>,
}

/// Parses the raw query by hand; `url=` and `title=` repeat and pair up
/// positionally, which typed extractors cannot express.
fn parse_query(raw: Option<&str>) -> BookQuery {
    let mut query = BookQuery::default();

    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "url" => query.urls.push(value.into_owned()),
            "title" => query.titles.push(value.into_owned()),
            "book_title" => query.book_title = Some(value.into_owned()),
            "token" => query.token = Some(value.into_owned()),
            _ => {}
        }
    }

    query
}

fn status_for(err: &BinderyError) -> StatusCode {
    match err {
        BinderyError::EmptyRequest | BinderyError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

async fn make_book(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Response {
    let query = parse_query(raw.as_deref());

    if let Some(access) = &state.access
        && !query.token.as_ref().is_some_and(|t| access.tokens.contains(t))
    {
        return (StatusCode::FORBIDDEN, "invalid or missing token").into_response();
    }

    if query.urls.is_empty() {
        // No book requested; hand the root over to the static index.
        return match tokio::fs::read(format!("{}/index.html", STATIC_DIR)).await {
            Ok(bytes) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], bytes).into_response(),
            Err(_) => StatusCode::NOT_FOUND.into_response(),
        };
    }

    let mut requests = Vec::with_capacity(query.urls.len());
    for (idx, raw_url) in query.urls.iter().enumerate() {
        match parse_url(raw_url) {
            Ok(url) => requests.push(ArticleRequest::with_title(url, query.titles.get(idx).cloned())),
            Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        }
    }

    let scratch = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => {
            error!(error = %err, "could not create scratch directory");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let options = BookOptions {
        title: query.book_title,
        fetch: state.fetch.clone(),
        output_dir: scratch.path().to_path_buf(),
    };

    info!(articles = requests.len(), "building book");

    let output = match make_epub(&requests, &options).await {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "book build failed");
            return (status_for(&err), err.to_string()).into_response();
        }
    };

    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book.epub".to_string());

    match tokio::fs::read(&output).await {
        Ok(bytes) => {
            info!(file = %file_name, bytes = bytes.len(), "book ready");
            (
                [
                    (header::CONTENT_TYPE, "application/epub+zip".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", file_name),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(err) => {
            error!(error = %err, "could not read packaged book");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn load_access_config() -> Result<Option<AccessConfig>, Box<dyn std::error::Error>> {
    let Ok(path) = std::env::var("BINDERY_ACCESS_CONFIG") else {
        return Ok(None);
    };

    let raw = std::fs::read_to_string(&path)?;
    let config: AccessConfig = serde_json::from_str(&raw)?;
    info!(tokens = config.tokens.len(), path = %path, "access control enabled");
    Ok(Some(config))
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(make_book))
        .with_state(state)
        .fallback_service(ServeDir::new(STATIC_DIR))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting bindery-server v{}", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(AppState {
        access: load_access_config()?,
        fetch: FetchConfig::default(),
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(BIND_ADDR).await?;
    info!("listening on http://{}", BIND_ADDR);

    axum::serve(listener, app).await?;

    Ok(())
}
