use criterion::{Criterion, criterion_group, criterion_main};
use pdfmill::{Config, Context};

/// A classical file with one content stream per page.
fn synthesize(pages: usize) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets: Vec<(u32, usize)> = Vec::new();
    let push = |out: &mut Vec<u8>, offsets: &mut Vec<(u32, usize)>, number: u32, body: String| {
        offsets.push((number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    };

    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    push(&mut out, &mut offsets, 1, "<< /Type /Catalog /Pages 2 0 R >>".to_string());
    push(
        &mut out,
        &mut offsets,
        2,
        format!("<< /Type /Pages /Kids [{}] /Count {pages} >>", kids.join(" ")),
    );
    for i in 0..pages {
        let page = 3 + 2 * i as u32;
        let content = format!("BT /F1 12 Tf 72 720 Td (page {i}) Tj ET");
        push(
            &mut out,
            &mut offsets,
            page,
            format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1),
        );
        push(
            &mut out,
            &mut offsets,
            page + 1,
            format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
        );
    }

    let xref_pos = out.len();
    out.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
    for (number, offset) in &offsets {
        out.extend_from_slice(format!("{number} 1\n{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_pos}\n%%EOF",
            3 + 2 * pages
        )
        .as_bytes(),
    );
    out
}

fn bench_load(c: &mut Criterion) {
    let buffer = synthesize(50);
    c.bench_function("load", |b| {
        b.iter(|| {
            Context::load_mem(&buffer, Config::default()).unwrap();
        })
    });
}

fn bench_load_and_materialize(c: &mut Criterion) {
    let buffer = synthesize(50);
    c.bench_function("load_and_materialize", |b| {
        b.iter(|| {
            let mut ctx = Context::load_mem(&buffer, Config::default()).unwrap();
            ctx.materialize_all().unwrap();
        })
    });
}

criterion_group!(benches, bench_load, bench_load_and_materialize);
criterion_main!(benches);
