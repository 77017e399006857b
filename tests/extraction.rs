//! Source extraction tests, including a hand-built minimal PDF so the PDF
//! path is exercised without fixture files.

use std::path::PathBuf;
use tempfile::TempDir;

use datasheet_index::extract::read_text;
use datasheet_index::ingest::clean_text;

/// Minimal valid PDF containing the text "buck regulator test phrase".
/// Builds the body then an xref with correct byte offsets so pdf-extract can
/// parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 58 >> stream\nBT /F1 12 Tf 100 700 Td (buck regulator test phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o4).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o5).as_bytes());
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn pdf_text_is_extracted() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "regulator.pdf", &minimal_pdf_with_phrase());

    let text = read_text(&path).unwrap();
    assert!(
        text.contains("buck regulator test phrase"),
        "extracted text was: {:?}",
        text
    );
}

#[test]
fn extracted_pdf_text_survives_cleaning() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "regulator.pdf", &minimal_pdf_with_phrase());

    let cleaned = clean_text(&read_text(&path).unwrap());
    assert!(cleaned.contains("buck regulator test phrase"));
}

#[test]
fn extension_check_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "REGULATOR.PDF", &minimal_pdf_with_phrase());
    let text = read_text(&path).unwrap();
    assert!(text.contains("buck regulator test phrase"));
}
