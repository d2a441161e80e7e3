//! Shared in-memory fixtures for reader, writer and ops tests.

use crate::config::Config;
use crate::context::Context;

/// Assemble a classical-xref file from numbered object bodies,
/// computing offsets as it goes.
pub(crate) fn build_classical(objects: &[(u32, &str)], trailer_extra: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (number, body) in objects {
        offsets.push((*number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }
    let xref_pos = out.len();
    out.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
    for (number, offset) in &offsets {
        out.extend_from_slice(format!("{number} 1\n{offset:010} 00000 n \n").as_bytes());
    }
    let size = objects.iter().map(|(n, _)| n + 1).max().unwrap_or(1);
    out.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root 1 0 R {trailer_extra} >>\nstartxref\n{xref_pos}\n%%EOF")
            .as_bytes(),
    );
    out
}

/// Catalog, page tree, one page and one content stream.
pub(crate) fn simple_pdf() -> Vec<u8> {
    build_classical(
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>"),
            (4, "<< /Length 5 >>\nstream\nhello\nendstream"),
        ],
        "",
    )
}

pub(crate) fn simple_context(config: Config) -> Context {
    Context::load_mem(&simple_pdf(), config).expect("fixture must load")
}

/// A hybrid file: classical xref for the regular objects, an XRefStm
/// routing one object into an object stream.
pub(crate) fn hybrid_pdf() -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    let bodies: Vec<(u32, String)> = vec![
        (1, "<< /Type /Catalog /Pages 2 0 R /PieceInfo 4 0 R >>".to_string()),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string()),
        (3, "<< /Type /Page /Parent 2 0 R >>".to_string()),
        (5, {
            let member = "<< /Kind /Extra >>";
            let header = "4 0 ";
            format!(
                "<< /Type /ObjStm /N 1 /First {} /Length {} >>\nstream\n{}{}\nendstream",
                header.len(),
                header.len() + member.len(),
                header,
                member
            )
        }),
    ];
    for (number, body) in &bodies {
        offsets.push((*number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    // The xref stream mapping object 4 into container 5.
    let xref_stm_pos = out.len();
    let rows: &[u8] = &[2, 0, 5, 0];
    out.extend_from_slice(
        format!(
            "6 0 obj\n<< /Type /XRef /Size 7 /W [1 2 1] /Index [4 1] /Length {} >>\nstream\n",
            rows.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(rows);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_pos = out.len();
    out.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
    for (number, offset) in &offsets {
        out.extend_from_slice(format!("{number} 1\n{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size 7 /Root 1 0 R /XRefStm {xref_stm_pos} >>\nstartxref\n{xref_pos}\n%%EOF"
        )
        .as_bytes(),
    );
    out
}
