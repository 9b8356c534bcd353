//! End-to-end pipeline tests against a local canned HTTP server.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use bindery_core::{ArticleRequest, BinderyError, BookOptions, FetchConfig, make_epub, relocate_images};

type Routes = HashMap<String, (&'static str, Vec<u8>)>;

/// Serves canned responses on an ephemeral local port.
async fn serve(routes: Routes) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let response = match routes.get(&path) {
                    Some((content_type, body)) => {
                        let mut r = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            content_type,
                            body.len()
                        )
                        .into_bytes();
                        r.extend_from_slice(body);
                        r
                    }
                    None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
                };
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

fn article_page(title: &str, body: &str) -> Vec<u8> {
    format!(
        "<!DOCTYPE html><html><head><title>{}</title><meta name=\"author\" content=\"Test Author\"></head>\
         <body><article>{}</article></body></html>",
        title, body
    )
    .into_bytes()
}

fn zip_entry(path: &std::path::Path, name: &str) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}

#[tokio::test]
async fn test_single_article_end_to_end() {
    let mut routes = Routes::new();
    routes.insert(
        "/posts/A%20Great%20Read".to_string(),
        (
            "text/html",
            article_page(
                "A Great Read",
                "<p>Hello</p><script>alert(1)</script><img src=\"/pic.jpg\"><img src=\"/pic2\" alt=\"second\">",
            ),
        ),
    );
    routes.insert("/pic.jpg".to_string(), ("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]));
    routes.insert("/pic2".to_string(), ("image/png", vec![0x89, 0x50, 0x4E, 0x47]));
    let base = serve(routes).await;

    let out = tempfile::tempdir().unwrap();
    let options = BookOptions { output_dir: out.path().to_path_buf(), ..Default::default() };
    let url = url::Url::parse(&format!("{}/posts/A%20Great%20Read", base)).unwrap();

    let path = make_epub(&[ArticleRequest::new(url)], &options).await.unwrap();

    assert_eq!(path.file_name().unwrap(), "posts_a_great_read.epub");

    let opf = zip_entry(&path, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>A Great Read</dc:title>"));
    assert!(opf.contains("<dc:creator>Test Author</dc:creator>"));

    let section = zip_entry(&path, "OEBPS/content/section-1.xhtml");
    assert!(section.contains("<p>Hello</p>"));
    assert!(!section.contains("script"), "sanitizer must remove scripts");
    assert_eq!(section.matches("../images/").count(), 2);
    // Relocated extensions: from the URL path, defaulting to png.
    assert!(section.contains(".jpg\""));
    assert!(section.contains("alt=\"second\""));
}

#[tokio::test]
async fn test_sections_follow_request_order() {
    let mut routes = Routes::new();
    for (path, title) in [("/one", "First"), ("/two", "Second"), ("/three", "Third")] {
        routes.insert(path.to_string(), ("text/html", article_page(title, "<p>text</p>")));
    }
    let base = serve(routes).await;

    let out = tempfile::tempdir().unwrap();
    let options = BookOptions {
        title: Some("Collected".to_string()),
        output_dir: out.path().to_path_buf(),
        ..Default::default()
    };
    let articles: Vec<_> = ["/one", "/two", "/three"]
        .iter()
        .map(|p| ArticleRequest::new(url::Url::parse(&format!("{}{}", base, p)).unwrap()))
        .collect();

    let path = make_epub(&articles, &options).await.unwrap();

    let opf = zip_entry(&path, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>Collected</dc:title>"));

    let ncx = zip_entry(&path, "OEBPS/toc.ncx");
    let first = ncx.find("<text>First</text>").unwrap();
    let second = ncx.find("<text>Second</text>").unwrap();
    let third = ncx.find("<text>Third</text>").unwrap();
    assert!(first < second && second < third);

    for n in 1..=3 {
        zip_entry(&path, &format!("OEBPS/content/section-{}.xhtml", n));
    }
}

#[tokio::test]
async fn test_one_failed_image_fails_the_request() {
    let mut routes = Routes::new();
    routes.insert(
        "/post".to_string(),
        (
            "text/html",
            article_page("Post", "<p>x</p><img src=\"/good.png\"><img src=\"/missing.png\">"),
        ),
    );
    routes.insert("/good.png".to_string(), ("image/png", vec![1, 2, 3]));
    let base = serve(routes).await;

    let out = tempfile::tempdir().unwrap();
    let options = BookOptions { output_dir: out.path().to_path_buf(), ..Default::default() };
    let url = url::Url::parse(&format!("{}/post", base)).unwrap();

    let result = make_epub(&[ArticleRequest::new(url)], &options).await;

    assert!(matches!(result, Err(BinderyError::ImageFetch { .. })));
    assert_eq!(
        std::fs::read_dir(out.path()).unwrap().count(),
        0,
        "no partial book output"
    );
}

#[tokio::test]
async fn test_relocated_sources_match_returned_asset_list() {
    let mut routes = Routes::new();
    routes.insert("/a.png".to_string(), ("image/png", vec![1]));
    routes.insert("/b.gif".to_string(), ("image/gif", vec![2]));
    let base = serve(routes).await;

    let dir = tempfile::tempdir().unwrap();
    let html = format!("<p>t</p><img src=\"{base}/a.png\"><img src=\"{base}/b.gif\">");
    let (rewritten, paths) = relocate_images(&html, dir.path(), &FetchConfig::default()).await.unwrap();

    assert_eq!(paths.len(), 2);
    for path in &paths {
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(
            rewritten.contains(&format!("../images/{}", name)),
            "every asset on disk is referenced: {}",
            name
        );
    }
}

#[tokio::test]
async fn test_concurrent_requests_use_disjoint_workspaces() {
    let mut routes = Routes::new();
    routes.insert("/x".to_string(), ("text/html", article_page("X", "<p>x</p><img src=\"/i.png\">")));
    routes.insert("/y".to_string(), ("text/html", article_page("Y", "<p>y</p><img src=\"/i.png\">")));
    routes.insert("/i.png".to_string(), ("image/png", vec![9]));
    let base = serve(routes).await;

    let out_a = tempfile::tempdir().unwrap();
    let out_b = tempfile::tempdir().unwrap();
    let opts_a = BookOptions { output_dir: out_a.path().to_path_buf(), ..Default::default() };
    let opts_b = BookOptions { output_dir: out_b.path().to_path_buf(), ..Default::default() };
    let req_a = vec![ArticleRequest::new(url::Url::parse(&format!("{}/x", base)).unwrap())];
    let req_b = vec![ArticleRequest::new(url::Url::parse(&format!("{}/y", base)).unwrap())];

    let (a, b) = tokio::join!(make_epub(&req_a, &opts_a), make_epub(&req_b, &opts_b));
    let a = a.unwrap();
    let b = b.unwrap();

    assert!(a.exists() && b.exists());
    // Asset names are random per workspace, so the two books cannot share
    // image entries.
    let opf_a = zip_entry(&a, "OEBPS/content.opf");
    let opf_b = zip_entry(&b, "OEBPS/content.opf");
    let image_of = |opf: &str| {
        opf.lines()
            .find(|l| l.contains("images/") && !l.contains("cover"))
            .unwrap()
            .to_string()
    };
    assert_ne!(image_of(&opf_a), image_of(&opf_b));
}
