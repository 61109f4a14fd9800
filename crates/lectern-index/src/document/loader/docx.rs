use std::path::Path;
use std::pin::Pin;

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, Run, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};

use super::{join_error, metadata_for, open_checked};
use crate::document::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Office Open XML word documents.
///
/// Keeps body text only: paragraphs end with a newline, run tabs become `\t` and breaks a
/// line break. Table cells are read in row order. Headers, footers, comments and embedded
/// objects are ignored.
pub struct DocxLoader {
    pub max_file_size: u64,
}

impl Default for DocxLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for DocxLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = open_checked(&path, max_size).await?;

            let bytes = tokio::fs::read(&path).await?;
            let content = tokio::task::spawn_blocking(move || read_body(&bytes))
                .await
                .map_err(join_error)??;

            Ok(vec![Document {
                content,
                metadata: metadata_for(&path, DOCX_CONTENT_TYPE, None),
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["docx"]
    }
}

fn read_body(bytes: &[u8]) -> Result<String, DocumentError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| DocumentError::Docx(e.to_string()))?;
    Ok(document_text(&docx.document))
}

fn document_text(document: &docx_rs::Document) -> String {
    let mut out = String::new();
    for child in &document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => push_paragraph(paragraph, &mut out),
            DocumentChild::Table(table) => push_table(table, &mut out),
            _ => {}
        }
    }
    let trimmed = out.trim_end_matches('\n').len();
    out.truncate(trimmed);
    out
}

fn push_paragraph(paragraph: &Paragraph, out: &mut String) {
    push_paragraph_children(&paragraph.children, out);
    out.push('\n');
}

fn push_paragraph_children(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(run, out),
            ParagraphChild::Hyperlink(link) => push_paragraph_children(&link.children, out),
            _ => {}
        }
    }
}

fn push_run(run: &Run, out: &mut String) {
    for child in &run.children {
        match child {
            RunChild::Text(text) => out.push_str(&text.text),
            RunChild::Tab(_) => out.push('\t'),
            RunChild::Break(_) => out.push('\n'),
            _ => {}
        }
    }
}

// Row and cell wrappers are single-variant enums in current docx-rs releases.
#[allow(irrefutable_let_patterns)]
fn push_table(table: &Table, out: &mut String) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row else {
            continue;
        };
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell else {
                continue;
            };
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(paragraph) => push_paragraph(paragraph, out),
                    TableCellContent::Table(nested) => push_table(nested, out),
                    _ => {}
                }
            }
        }
    }
}
