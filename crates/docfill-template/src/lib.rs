//! Placeholder substitution for docx templates.
//!
//! A template is a docx archive whose text contains `{name}` tags. Binding a
//! name → value map and rendering replaces every tag in the body, headers,
//! footers and notes, producing a new archive. Missing names render as empty
//! text.
//!
//! `{#name}...{/name}` shows its content for truthy values and repeats it for
//! each element of an array, with the element's fields in scope.
//! `{^name}...{/name}` shows its content for falsy values and empty arrays.
//! When both tags of a section sit alone in their own paragraphs, the
//! paragraphs between them are repeated.

pub mod error;
mod part;
mod scan;
mod section;

use std::io::{Cursor, Read, Write};

use serde_json::{Map, Value};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub use error::TemplateError;
pub use scan::TagError;

const DOCUMENT_PART: &str = "word/document.xml";

/// One archive member, kept in archive order
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// A docx template loaded into memory
pub struct Template {
    entries: Vec<Entry>,
}

impl Template {
    /// Read a docx archive
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                compression: file.compression(),
                is_dir: file.is_dir(),
                data,
            });
        }

        if !entries.iter().any(|e| e.name == DOCUMENT_PART) {
            return Err(TemplateError::MissingPart(DOCUMENT_PART.to_string()));
        }

        Ok(Self { entries })
    }

    /// Names of the archive members whose tags are substituted
    pub fn template_parts(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir && is_template_part(&e.name))
            .map(|e| e.name.as_str())
    }

    /// Substitute every tag and return the rendered archive.
    ///
    /// Fails with [`TemplateError::Render`] listing every malformed tag or
    /// section when any part contains one; nothing is produced in that case.
    pub fn render(&self, replacements: &Map<String, Value>) -> Result<Vec<u8>, TemplateError> {
        let mut rendered: Vec<Option<Vec<u8>>> = Vec::with_capacity(self.entries.len());
        let mut errors = Vec::new();

        for entry in &self.entries {
            if entry.is_dir || !is_template_part(&entry.name) {
                rendered.push(None);
                continue;
            }
            let part = part::render_part(&entry.data, replacements).map_err(|source| {
                TemplateError::Xml {
                    part: entry.name.clone(),
                    source,
                }
            })?;
            errors.extend(part.errors);
            rendered.push(Some(part.xml));
        }

        if !errors.is_empty() {
            return Err(TemplateError::Render {
                message: "Multi error".to_string(),
                details: errors.iter().map(TagError::to_string).collect(),
            });
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (entry, data) in self.entries.iter().zip(rendered) {
            let options =
                FileOptions::default().compression_method(output_compression(entry.compression));
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
                continue;
            }
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(data.as_deref().unwrap_or(&entry.data))?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Render `archive` with `replacements` in one step
pub fn render_template(
    archive: &[u8],
    replacements: &Map<String, Value>,
) -> Result<Vec<u8>, TemplateError> {
    Template::from_bytes(archive)?.render(replacements)
}

fn is_template_part(name: &str) -> bool {
    if name == DOCUMENT_PART || name == "word/footnotes.xml" || name == "word/endnotes.xml" {
        return true;
    }
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    !file.contains('/')
        && file.ends_with(".xml")
        && (file.starts_with("header") || file.starts_with("footer"))
}

fn output_compression(method: CompressionMethod) -> CompressionMethod {
    match method {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}

/// Text substituted for a replacement value
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docx(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", FileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        for (name, xml) in parts {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn paragraph(text: &str) -> String {
        format!(
            r#"<w:document><w:body><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:body></w:document>"#
        )
    }

    fn read_part(archive: &[u8], name: &str) -> String {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut file = zip.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_renders_body_header_and_footer() {
        let archive = docx(&[
            (DOCUMENT_PART, paragraph("Invoice {number} for {client}").as_str()),
            ("word/header1.xml", paragraph("{client}").as_str()),
            ("word/footer2.xml", paragraph("Page footer {note}").as_str()),
            ("word/styles.xml", "<w:styles>{client}</w:styles>"),
        ]);

        let replacements = data(json!({"number": 42, "client": "ACME"}));
        let out = render_template(&archive, &replacements).unwrap();

        assert!(read_part(&out, DOCUMENT_PART).contains("Invoice 42 for ACME"));
        assert!(read_part(&out, "word/header1.xml").contains(">ACME<"));
        assert!(read_part(&out, "word/footer2.xml").contains("Page footer <"));
        assert_eq!(read_part(&out, "word/styles.xml"), "<w:styles>{client}</w:styles>");
        assert_eq!(read_part(&out, "[Content_Types].xml"), "<Types/>");
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("a")), "a");
        assert_eq!(value_text(&json!(1.5)), "1.5");
        assert_eq!(value_text(&json!(false)), "false");
        assert_eq!(value_text(&Value::Null), "");
        assert_eq!(value_text(&json!({"k": 1})), r#"{"k":1}"#);
    }

    #[test]
    fn test_render_is_repeatable() {
        let archive = docx(&[(DOCUMENT_PART, paragraph("{a}").as_str())]);
        let template = Template::from_bytes(&archive).unwrap();
        let first = template.render(&data(json!({"a": "x"}))).unwrap();
        let second = template.render(&data(json!({"a": "y"}))).unwrap();

        assert!(read_part(&first, DOCUMENT_PART).contains(">x<"));
        assert!(read_part(&second, DOCUMENT_PART).contains(">y<"));
    }

    #[test]
    fn test_collects_errors_from_all_parts() {
        let archive = docx(&[
            (DOCUMENT_PART, paragraph("{unclosed").as_str()),
            ("word/header1.xml", paragraph("oops}").as_str()),
        ]);

        let err = render_template(&archive, &Map::new()).unwrap_err();
        match &err {
            TemplateError::Render { message, details } => {
                assert_eq!(message, "Multi error");
                assert_eq!(details.len(), 2);
                assert!(details[0].contains("unclosed_tag"));
                assert!(details[1].contains("unopened_tag"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().starts_with("Docx render error: Multi error :: "));
    }

    #[test]
    fn test_rejects_non_docx() {
        assert!(matches!(
            Template::from_bytes(b"not a zip"),
            Err(TemplateError::Archive(_))
        ));
        let archive = docx(&[("xl/workbook.xml", "<workbook/>")]);
        assert!(matches!(
            Template::from_bytes(&archive),
            Err(TemplateError::MissingPart(part)) if part == DOCUMENT_PART
        ));
    }

    #[test]
    fn test_template_parts() {
        let archive = docx(&[
            (DOCUMENT_PART, paragraph("x").as_str()),
            ("word/header1.xml", paragraph("x").as_str()),
            ("word/footnotes.xml", paragraph("x").as_str()),
            ("word/_rels/header1.xml.rels", "<Relationships/>"),
            ("word/theme/theme1.xml", "<a:theme/>"),
        ]);
        let template = Template::from_bytes(&archive).unwrap();
        let parts: Vec<_> = template.template_parts().collect();
        assert_eq!(parts, vec![DOCUMENT_PART, "word/header1.xml", "word/footnotes.xml"]);
    }

    #[test]
    fn test_renders_sections() {
        let document = concat!(
            "<w:document><w:body>",
            "<w:p><w:r><w:t>{#lines}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{item}: {#paid}paid{/paid}{^paid}due{/paid}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{/lines}</w:t></w:r></w:p>",
            "</w:body></w:document>"
        );
        let archive = docx(&[(DOCUMENT_PART, document)]);
        let replacements = data(json!({"lines": [
            {"item": "Rent", "paid": true},
            {"item": "Power", "paid": false}
        ]}));

        let out = read_part(&render_template(&archive, &replacements).unwrap(), DOCUMENT_PART);

        assert!(out.contains(">Rent: paid<"));
        assert!(out.contains(">Power: due<"));
        assert!(!out.contains("{#lines}"));
        assert_eq!(out.matches("<w:p>").count(), 2);
    }

    #[test]
    fn test_section_errors_fail_render() {
        let document = paragraph("{#items}{name}{/items} and {#open}");
        let archive = docx(&[(DOCUMENT_PART, document.as_str())]);
        match render_template(&archive, &Map::new()) {
            Err(TemplateError::Render { details, .. }) => {
                assert_eq!(details.len(), 1);
                assert!(details[0].contains("unclosed_loop"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_declared_entry_size_is_not_trusted() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file(DOCUMENT_PART, stored).unwrap();
        writer.write_all(paragraph("{a}").as_bytes()).unwrap();
        let mut archive = writer.finish().unwrap().into_inner();

        // Claim an enormous uncompressed size in the central directory entry
        let header = archive
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        archive[header + 24..header + 28].copy_from_slice(&0xFFFF_0000u32.to_le_bytes());

        let template = Template::from_bytes(&archive).unwrap();
        let out = template.render(&data(json!({"a": "ok"}))).unwrap();
        assert!(read_part(&out, DOCUMENT_PART).contains(">ok<"));
    }

    #[test]
    fn test_malformed_part_is_xml_error() {
        let archive = docx(&[(DOCUMENT_PART, "<w:document><w:p></w:document>")]);
        assert!(matches!(
            render_template(&archive, &Map::new()),
            Err(TemplateError::Xml { .. })
        ));
    }
}
