//! Single-chapter EPUB 3 packaging.
//!
//! Layout:
//!
//! ```text
//! mimetype                 (stored, must be first)
//! META-INF/container.xml
//! OEBPS/content.opf
//! OEBPS/nav.xhtml
//! OEBPS/toc.ncx            (EPUB 2 readers)
//! OEBPS/content.xhtml
//! ```

use std::io::{Cursor, Write};

use chrono::Utc;
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{Document, Packager};
use crate::error::PackageError;

const MIMETYPE: &str = "application/epub+zip";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Packages a [`Document`] as an EPUB 3 file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubPackager;

impl Packager for EpubPackager {
    fn extension(&self) -> &str {
        "epub"
    }

    fn package(&self, doc: &Document) -> Result<Vec<u8>, PackageError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored)?;
        zip.write_all(MIMETYPE.as_bytes())?;

        let entries = [
            ("META-INF/container.xml", CONTAINER_XML.to_string()),
            ("OEBPS/content.opf", package_opf(doc)),
            ("OEBPS/nav.xhtml", nav_xhtml(doc)),
            ("OEBPS/toc.ncx", toc_ncx(doc)),
            ("OEBPS/content.xhtml", chapter_xhtml(doc)),
        ];
        for (name, body) in entries {
            zip.start_file(name, deflated)?;
            zip.write_all(body.as_bytes())?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

fn package_opf(doc: &Document) -> String {
    let id = escape(doc.id.as_str());
    let title = escape(doc.title.as_str());
    let lang = escape(doc.language.as_str());
    let creator = escape(doc.author.as_deref().unwrap_or("Unknown"));
    let modified = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    let mut optional = String::new();
    if let Some(link) = &doc.link {
        optional.push_str(&format!(
            "    <dc:source>{}</dc:source>\n",
            escape(link.as_str())
        ));
    }
    if let Some(published) = doc.published {
        optional.push_str(&format!(
            "    <dc:date>{}</dc:date>\n",
            published.format("%Y-%m-%dT%H:%M:%SZ")
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="item-id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="item-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{lang}</dc:language>
    <dc:creator>{creator}</dc:creator>
{optional}    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="content" href="content.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="nav" linear="no"/>
    <itemref idref="content"/>
  </spine>
</package>
"#
    )
}

fn nav_xhtml(doc: &Document) -> String {
    let title = escape(doc.title.as_str());
    let lang = escape(doc.language.as_str());
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="{lang}" lang="{lang}">
<head><title>{title}</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <ol><li><a href="content.xhtml">{title}</a></li></ol>
  </nav>
</body>
</html>
"#
    )
}

fn toc_ncx(doc: &Document) -> String {
    let id = escape(doc.id.as_str());
    let title = escape(doc.title.as_str());
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="{id}"/></head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
    <navPoint id="content" playOrder="1">
      <navLabel><text>{title}</text></navLabel>
      <content src="content.xhtml"/>
    </navPoint>
  </navMap>
</ncx>
"#
    )
}

fn chapter_xhtml(doc: &Document) -> String {
    let title = escape(doc.title.as_str());
    let lang = escape(doc.language.as_str());
    let body = &doc.body;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{lang}" lang="{lang}">
<head><title>{title}</title></head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn doc() -> Document {
        Document {
            id: "urn:x:1".to_string(),
            title: "Fish & Chips <review>".to_string(),
            body: "<p>tasty</p>".to_string(),
            link: Some("https://example.com/fish".to_string()),
            published: None,
            author: None,
            language: "en".to_string(),
        }
    }

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let bytes = EpubPackager.package(&doc()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes[..])).unwrap();

        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);

        assert_eq!(read_entry(&bytes, "mimetype"), MIMETYPE);
        assert_eq!(archive.len(), 6);
    }

    #[test]
    fn chapter_has_escaped_title_and_body() {
        let bytes = EpubPackager.package(&doc()).unwrap();
        let chapter = read_entry(&bytes, "OEBPS/content.xhtml");

        assert!(chapter.contains("<h1>Fish &amp; Chips &lt;review&gt;</h1>"));
        assert!(chapter.contains("<p>tasty</p>"));
    }

    #[test]
    fn opf_carries_metadata_with_defaults() {
        let bytes = EpubPackager.package(&doc()).unwrap();
        let opf = read_entry(&bytes, "OEBPS/content.opf");

        assert!(opf.contains(r#"<dc:identifier id="item-id">urn:x:1</dc:identifier>"#));
        assert!(opf.contains("<dc:creator>Unknown</dc:creator>"));
        assert!(opf.contains("<dc:source>https://example.com/fish</dc:source>"));
        assert!(!opf.contains("<dc:date>"));
        assert!(opf.contains(r#"property="dcterms:modified""#));
    }
}
