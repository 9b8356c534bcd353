use std::path::PathBuf;

use anyhow::Context;
use bindery_core::{ArticleRequest, BookOptions, FetchConfig, make_epub, parse_url};
use clap::Parser;
use owo_colors::OwoColorize;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bundle web articles into a single EPUB with a generated cover
#[derive(Parser, Debug)]
#[command(name = "bindery")]
#[command(author = "Bindery Contributors")]
#[command(version = VERSION)]
#[command(about = "Bundle web articles into an EPUB", long_about = None)]
struct Args {
    /// Article URLs, in reading order
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Book title (default: first article's title)
    #[arg(short, long, value_name = "TITLE")]
    title: Option<String>,

    /// Section title for each URL, in order (may repeat)
    #[arg(short = 's', long = "section-title", value_name = "TITLE")]
    section_titles: Vec<String>,

    /// Directory to write the EPUB into (default: current directory)
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    output_dir: PathBuf,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Enable progress output
    #[arg(short, long)]
    verbose: bool,
}

/// Print a styled banner for verbose mode
fn print_banner() {
    eprintln!(
        "\n{} {} {}",
        "Bindery".bold().bright_blue(),
        "v".dimmed(),
        VERSION.dimmed()
    );
    eprintln!("{}", "Bundle web articles into an EPUB".dimmed());
    eprintln!();
}

/// Print a styled step message
fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        print_banner();
        print_info(&format!("{} article(s) requested", args.urls.len()));
        eprintln!();
    }

    if args.section_titles.len() > args.urls.len() {
        anyhow::bail!(
            "got {} section titles for {} URLs",
            args.section_titles.len(),
            args.urls.len()
        );
    }

    if args.verbose {
        print_step(1, 2, "Validating article URLs");
    }

    let mut requests = Vec::with_capacity(args.urls.len());
    for (idx, raw) in args.urls.iter().enumerate() {
        let url = parse_url(raw).with_context(|| format!("Invalid URL: {}", raw))?;
        requests.push(ArticleRequest::with_title(url, args.section_titles.get(idx).cloned()));
    }

    let options = BookOptions {
        title: args.title,
        fetch: FetchConfig {
            timeout: args.timeout,
            user_agent: args
                .user_agent
                .unwrap_or_else(|| "Mozilla/5.0 (compatible; Bindery/1.0)".to_string()),
        },
        output_dir: args.output_dir,
    };

    if args.verbose {
        print_step(2, 2, "Fetching articles and packaging book");
        for request in &requests {
            eprintln!("  {} {}", "•".dimmed(), request.url.as_str().bright_white().underline());
        }
        eprintln!();
    }

    let output = make_epub(&requests, &options).await.context("Failed to build book")?;

    print_success(&format!("Book written to {}", output.display().bright_white()));

    Ok(())
}
