//! Plain-text extraction for every supported corpus format.
//!
//! The format is chosen by file extension (case-insensitive). Plain text
//! and Markdown pass through; JSON and YAML are parsed and re-serialized
//! to a canonical form; PDF and OOXML (docx, pptx) are decoded.
//!
//! Extraction never panics. Any decode failure is an [`ExtractError`] and
//! the indexer skips that one file.

use std::fmt;
use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Markdown,
    Json,
    Yaml,
    Pdf,
    Docx,
    Pptx,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Format::Text),
            "md" => Some(Format::Markdown),
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "pdf" => Some(Format::Pdf),
            "docx" => Some(Format::Docx),
            "pptx" => Some(Format::Pptx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Markdown => "markdown",
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Pptx => "pptx",
        }
    }
}

#[derive(Debug)]
pub enum ExtractError {
    Unsupported(String),
    Io(String),
    Structured(String),
    Pdf(String),
    Ooxml(String),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Unsupported(what) => write!(f, "unsupported format: {}", what),
            ExtractError::Io(e) => write!(f, "read failed: {}", e),
            ExtractError::Structured(e) => write!(f, "structured text decode failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Read `path` and extract its text according to its extension.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let format = Format::from_path(path)
        .ok_or_else(|| ExtractError::Unsupported(path.display().to_string()))?;
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    extract_bytes(&bytes, format)
}

/// Extract text from raw file bytes of a known format.
pub fn extract_bytes(bytes: &[u8], format: Format) -> Result<String, ExtractError> {
    match format {
        // Invalid UTF-8 sequences are replaced rather than failing the file.
        Format::Text | Format::Markdown => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Format::Json => extract_json(bytes),
        Format::Yaml => extract_yaml(bytes),
        Format::Pdf => extract_pdf(bytes),
        Format::Docx => extract_docx(bytes),
        Format::Pptx => extract_pptx(bytes),
    }
}

fn extract_json(bytes: &[u8]) -> Result<String, ExtractError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ExtractError::Structured(e.to_string()))?;
    if value.is_null() {
        return Ok(String::new());
    }
    serde_json::to_string_pretty(&value).map_err(|e| ExtractError::Structured(e.to_string()))
}

fn extract_yaml(bytes: &[u8]) -> Result<String, ExtractError> {
    let value: serde_yaml::Value =
        serde_yaml::from_slice(bytes).map_err(|e| ExtractError::Structured(e.to_string()))?;
    if value.is_null() {
        return Ok(String::new());
    }
    serde_yaml::to_string(&value).map_err(|e| ExtractError::Structured(e.to_string()))
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("decoder panicked on malformed input".into())),
    }
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let paragraphs = paragraph_texts(&xml)?;
    Ok(paragraphs.join("\n"))
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut lines = Vec::new();
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        lines.extend(paragraph_texts(&xml)?.into_iter().filter(|p| !p.is_empty()));
    }
    Ok(lines.join("\n"))
}

/// Text of every `<*:p>` paragraph, concatenating its `<*:t>` runs.
///
/// WordprocessingML (`w:p`/`w:t`) and DrawingML (`a:p`/`a:t`) share the
/// same local names, so one walker serves docx and pptx.
fn paragraph_texts(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, String)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, body) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        assert_eq!(Format::from_extension("PDF"), Some(Format::Pdf));
        assert_eq!(Format::from_extension("Yml"), Some(Format::Yaml));
        assert_eq!(Format::from_extension("exe"), None);
        assert_eq!(
            Format::from_path(Path::new("notes/README.MD")),
            Some(Format::Markdown)
        );
        assert_eq!(Format::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_json_is_pretty_printed() {
        let out = extract_bytes(br#"{"a":1,"b":[true,null]}"#, Format::Json).unwrap();
        assert!(out.contains("\n  \"a\": 1"));
    }

    #[test]
    fn test_invalid_json_is_structured_error() {
        let err = extract_bytes(b"{not json", Format::Json).unwrap_err();
        assert!(matches!(err, ExtractError::Structured(_)));
    }

    #[test]
    fn test_yaml_is_reserialized() {
        let out = extract_bytes(b"name:   scanner\nports: [22, 80]\n", Format::Yaml).unwrap();
        assert!(out.contains("name: scanner"));
        assert!(out.contains("- 22"));
        assert_eq!(extract_bytes(b"", Format::Yaml).unwrap(), "");
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_bytes(b"not a pdf", Format::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_invalid_zip_returns_error_for_docx() {
        let err = extract_bytes(b"not a zip", Format::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn test_docx_paragraphs_joined_by_newline() {
        let xml = "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>\
            <w:p><w:r><w:t xml:space=\"preserve\">Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>\
            <w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>\
            </w:body></w:document>"
            .to_string();
        let docx = zip_with(&[("word/document.xml", xml)]);
        let out = extract_bytes(&docx, Format::Docx).unwrap();
        assert_eq!(out, "Hello world\nSecond & last");
    }

    #[test]
    fn test_docx_without_document_part_fails() {
        let docx = zip_with(&[("word/other.xml", "<x/>".to_string())]);
        assert!(matches!(
            extract_bytes(&docx, Format::Docx),
            Err(ExtractError::Ooxml(_))
        ));
    }

    #[test]
    fn test_pptx_slides_in_numeric_order() {
        let slide = |text: &str| {
            format!(
                "<p:sld xmlns:p=\"p\" xmlns:a=\"a\"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>",
                text
            )
        };
        let pptx = zip_with(&[
            ("ppt/slides/slide10.xml", slide("ten")),
            ("ppt/slides/slide2.xml", slide("two")),
            ("ppt/slides/slide1.xml", slide("one")),
        ]);
        let out = extract_bytes(&pptx, Format::Pptx).unwrap();
        assert_eq!(out, "one\ntwo\nten");
    }

    #[test]
    fn test_extract_file_unsupported_extension() {
        let err = extract_file(Path::new("binary.exe")).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }
}
