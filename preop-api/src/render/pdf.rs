//! Minimal PDF assembly: Helvetica text pages, no compression.
//!
//! Output is deterministic for a given input, so re-rendering the same
//! record list yields byte-identical documents.

/// Build a single PDF from one list of text lines per page.
pub(super) fn build_pdf(pages: &[Vec<String>]) -> Vec<u8> {
    let npages = pages.len().max(1);

    // Object layout: 1 catalog, 2 page tree, 3 font, then a page object
    // and its content stream per page.
    let kids: Vec<String> = (0..npages).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();

    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            npages
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    static EMPTY: Vec<String> = Vec::new();
    for i in 0..npages {
        let lines = pages.get(i).unwrap_or(&EMPTY);
        let content = content_stream(lines);
        objects.push(format!(
            "<< /Type /Page\n/Parent 2 0 R\n/MediaBox [0 0 612 792]\n/Resources << /Font << /F1 3 0 R >> >>\n/Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_pos = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_pos
        )
        .as_bytes(),
    );

    out
}

fn content_stream(lines: &[String]) -> String {
    let mut ops = String::from("BT\n/F1 10 Tf\n14 TL\n50 760 Td\n");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ops.push_str("T*\n");
        }
        ops.push('(');
        ops.push_str(&escape_text(line));
        ops.push_str(") Tj\n");
    }
    ops.push_str("ET");
    ops
}

/// Escape the PDF literal-string delimiters.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            _ => out.push(c),
        }
    }
    out
}
