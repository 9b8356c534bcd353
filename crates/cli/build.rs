use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("bindery")
        .version("0.3.0")
        .author("Bindery Contributors")
        .about("Bundle web articles into an EPUB")
        .arg(clap::arg!(<URL> ... "Article URLs, in reading order"))
        .arg(clap::arg!(-t --title <TITLE> "Book title (default: first article's title)").value_name("TITLE"))
        .arg(
            clap::arg!(-s --section_title <TITLE> "Section title for each URL, in order (may repeat)")
                .value_name("TITLE")
                .action(clap::ArgAction::Append),
        )
        .arg(
            clap::arg!(-o --output_dir <DIR> "Directory to write the EPUB into")
                .value_name("DIR")
                .default_value(".")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("30"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for HTTP requests").value_name("UA"))
        .arg(clap::arg!(-v --verbose "Enable progress output"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "bindery", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "bindery", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "bindery", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "bindery", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
