pub mod book;
pub mod cover;
pub mod epub;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod images;
pub mod pipeline;
pub mod sanitize;
pub mod workspace;

pub use book::{ArticleRequest, BookMetadata, EpubSection, ProcessedArticle, assemble, derive_file_stem};
pub use cover::{render_cover, write_cover};
pub use epub::write_epub;
pub use error::{BinderyError, Result};
pub use extract::{ExtractedPage, extract, extract_from_html};
pub use fetch::{FetchConfig, fetch_bytes, fetch_html, parse_url};
pub use images::{ImageAsset, relocate_images};
pub use pipeline::{BookOptions, make_epub};
pub use sanitize::sanitize;
pub use workspace::Workspace;
