//! EPUB packaging.
//!
//! Serializes assembled book metadata, ordered sections, and asset files
//! into an EPUB 2 container: stored `mimetype`, `META-INF/container.xml`,
//! OPF package document, NCX table of contents, XHTML section files under
//! `OEBPS/content/`, and the cover plus relocated images under
//! `OEBPS/images/` (which is why section markup references assets as
//! `../images/<name>`).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::book::{BookMetadata, EpubSection};
use crate::{BinderyError, Result};

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Writes the packaged book to `<output_dir>/<stem>.epub`.
///
/// # Errors
///
/// Returns [`BinderyError::Packaging`] when required metadata is missing
/// or any asset path is unreadable.
pub fn write_epub(
    metadata: &BookMetadata, sections: &[EpubSection], output_dir: &Path, stem: &str,
) -> Result<PathBuf> {
    if metadata.title.trim().is_empty() {
        return Err(BinderyError::Packaging("book title is required".to_string()));
    }
    if sections.is_empty() {
        return Err(BinderyError::Packaging("a book needs at least one section".to_string()));
    }

    let cover_bytes = read_asset(&metadata.cover_path)?;
    let image_bytes: Vec<(String, Vec<u8>)> = metadata
        .image_paths
        .iter()
        .map(|path| Ok((asset_file_name(path)?, read_asset(path)?)))
        .collect::<Result<_>>()?;

    std::fs::create_dir_all(output_dir)?;
    let out_path = output_dir.join(format!("{}.epub", stem));
    let file = File::create(&out_path)?;
    let mut zip = ZipWriter::new(file);

    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    // The mimetype entry must come first and stay uncompressed.
    zip_write(&mut zip, "mimetype", b"application/epub+zip", stored)?;
    zip_write(&mut zip, "META-INF/container.xml", CONTAINER_XML.as_bytes(), deflated)?;
    zip_write(
        &mut zip,
        "OEBPS/content.opf",
        generate_opf(metadata, sections, &image_bytes).as_bytes(),
        deflated,
    )?;
    zip_write(&mut zip, "OEBPS/toc.ncx", generate_ncx(metadata, sections).as_bytes(), deflated)?;

    for (index, section) in sections.iter().enumerate() {
        zip_write(
            &mut zip,
            &format!("OEBPS/content/section-{}.xhtml", index + 1),
            section_xhtml(section).as_bytes(),
            deflated,
        )?;
    }

    zip_write(&mut zip, "OEBPS/images/cover.png", &cover_bytes, deflated)?;
    for (name, bytes) in &image_bytes {
        zip_write(&mut zip, &format!("OEBPS/images/{}", name), bytes, deflated)?;
    }

    zip.finish().map_err(|e| BinderyError::Packaging(e.to_string()))?;
    Ok(out_path)
}

fn zip_write<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>, name: &str, bytes: &[u8], options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|e| BinderyError::Packaging(e.to_string()))?;
    zip.write_all(bytes)?;
    Ok(())
}

fn read_asset(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| BinderyError::Packaging(format!("unreadable asset {}: {}", path.display(), e)))
}

fn asset_file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BinderyError::Packaging(format!("asset path {} has no file name", path.display())))
}

fn generate_opf(metadata: &BookMetadata, sections: &[EpubSection], images: &[(String, Vec<u8>)]) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
    );

    opf.push_str(&format!("    <dc:title>{}</dc:title>\n", escape_xml(&metadata.title)));
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">urn:uuid:{}</dc:identifier>\n",
        escape_xml(&metadata.id)
    ));
    opf.push_str("    <dc:language>en</dc:language>\n");
    opf.push_str(&format!("    <dc:creator>{}</dc:creator>\n", escape_xml(&metadata.author)));
    opf.push_str(&format!(
        "    <dc:publisher>{}</dc:publisher>\n",
        escape_xml(&metadata.publisher)
    ));
    opf.push_str(&format!("    <dc:source>{}</dc:source>\n", escape_xml(&metadata.source_url)));

    if !metadata.description.is_empty() {
        opf.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            escape_xml(&metadata.description)
        ));
    }
    if !metadata.published.is_empty() {
        opf.push_str(&format!("    <dc:date>{}</dc:date>\n", escape_xml(&metadata.published)));
    }
    if !metadata.series.is_empty() {
        opf.push_str(&format!(
            "    <meta name=\"calibre:series\" content=\"{}\"/>\n",
            escape_xml(&metadata.series)
        ));
    }
    opf.push_str("    <meta name=\"cover\" content=\"cover-image\"/>\n");

    opf.push_str("  </metadata>\n  <manifest>\n");
    opf.push_str("    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n");
    opf.push_str("    <item id=\"cover-image\" href=\"images/cover.png\" media-type=\"image/png\"/>\n");

    for index in 1..=sections.len() {
        opf.push_str(&format!(
            "    <item id=\"section-{idx}\" href=\"content/section-{idx}.xhtml\" media-type=\"application/xhtml+xml\"/>\n",
            idx = index
        ));
    }
    for (name, _) in images {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"images/{}\" media-type=\"{}\"/>\n",
            href_to_id(name),
            escape_xml(name),
            media_type_for(name)
        ));
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    for index in 1..=sections.len() {
        opf.push_str(&format!("    <itemref idref=\"section-{}\"/>\n", index));
    }
    opf.push_str("  </spine>\n</package>\n");

    opf
}

fn generate_ncx(metadata: &BookMetadata, sections: &[EpubSection]) -> String {
    let mut ncx = String::new();

    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="urn:uuid:"#,
    );
    ncx.push_str(&escape_xml(&metadata.id));
    ncx.push_str(
        r#""/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>"#,
    );
    ncx.push_str(&escape_xml(&metadata.title));
    ncx.push_str(
        r#"</text>
  </docTitle>
  <navMap>
"#,
    );

    for (index, section) in sections.iter().enumerate() {
        let order = index + 1;
        ncx.push_str(&format!(
            "    <navPoint id=\"navpoint-{order}\" playOrder=\"{order}\">\n      <navLabel>\n        <text>{}</text>\n      </navLabel>\n      <content src=\"content/section-{order}.xhtml\"/>\n    </navPoint>\n",
            escape_xml(&section.title),
            order = order
        ));
    }

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn section_xhtml(section: &EpubSection) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>{}</title>
</head>
<body>
{}
</body>
</html>
"#,
        escape_xml(&section.title),
        section.html
    )
}

fn media_type_for(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// XML ids must not start with a digit, which uuid-named assets often do.
fn href_to_id(href: &str) -> String {
    format!("img_{}", href.replace(['/', '.', ' ', '-'], "_"))
}
