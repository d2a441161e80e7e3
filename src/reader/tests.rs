use super::tests_support::{build_classical, hybrid_pdf, simple_pdf};
use crate::config::{Config, ValidationMode};
use crate::context::Context;
use crate::error::{Error, ParseError};
use crate::xref::XrefEntry;

#[test]
fn load_simple_document() {
    let mut ctx = Context::load_mem(&simple_pdf(), Config::default()).unwrap();
    assert_eq!(ctx.version, "1.4");
    assert_eq!(ctx.max_id, 4);
    // Nothing is materialized until asked for.
    assert!(ctx.objects.is_empty());
    let catalog = ctx.catalog().unwrap();
    assert!(catalog.has_type(b"Catalog"));
    let contents = ctx.get_object((4, 0)).unwrap().as_stream().unwrap();
    assert_eq!(contents.content, b"hello");
}

#[test]
fn store_parses_each_object_once() {
    let mut ctx = Context::load_mem(&simple_pdf(), Config::default()).unwrap();
    ctx.get_object((3, 0)).unwrap();
    let parsed = ctx.stats.objects_parsed;
    ctx.get_object((3, 0)).unwrap();
    ctx.get_object((3, 0)).unwrap();
    assert_eq!(ctx.stats.objects_parsed, parsed);
}

#[test]
fn leading_garbage_before_header_is_tolerated() {
    let mut data = b"some leading garbage".to_vec();
    data.extend_from_slice(&simple_pdf());
    let mut ctx = Context::load_mem(&data, Config::default()).unwrap();
    assert!(ctx.catalog().unwrap().has_type(b"Catalog"));
}

#[test]
fn missing_startxref_is_an_error() {
    let strict = Config {
        validation_mode: ValidationMode::Strict,
        ..Config::default()
    };
    assert!(Context::load_mem(b"%PDF-1.4\nnothing here\n%%EOF", strict).is_err());
}

#[test]
fn incremental_update_newest_entry_wins() {
    let mut data = simple_pdf();
    let base_xref: usize = {
        // startxref of the base file; the fixture is not valid UTF-8.
        let pos = data.windows(9).rposition(|w| w == b"startxref").unwrap();
        let digits: Vec<u8> = data[pos + 9..]
            .iter()
            .copied()
            .skip_while(|b| b.is_ascii_whitespace())
            .take_while(|b| b.is_ascii_digit())
            .collect();
        String::from_utf8(digits).unwrap().parse().unwrap()
    };
    data.push(b'\n');
    let new_offset = data.len();
    data.extend_from_slice(b"3 0 obj\n<< /Type /Page /Parent 2 0 R /Rotate 90 >>\nendobj\n");
    let xref_pos = data.len();
    data.extend_from_slice(
        format!(
            "xref\n0 1\n0000000000 65535 f \n3 1\n{new_offset:010} 00000 n \ntrailer\n<< /Size 5 /Root 1 0 R /Prev {base_xref} >>\nstartxref\n{xref_pos}\n%%EOF"
        )
        .as_bytes(),
    );

    let mut ctx = Context::load_mem(&data, Config::default()).unwrap();
    // The updated page shadows the original at the same id.
    let page = ctx.get_object((3, 0)).unwrap().as_dict().unwrap();
    assert_eq!(page.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
    // Objects only present in the older layer still resolve.
    assert!(ctx.get_object((4, 0)).unwrap().as_stream().is_ok());
}

#[test]
fn wrong_stream_length_strict_vs_relaxed() {
    let doc = build_classical(
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [] /Count 0 >>"),
            (3, "<< /Length 10 >>\nstream\nhello\nendstream"),
        ],
        "",
    );

    let mut relaxed = Context::load_mem(&doc, Config::default()).unwrap();
    let stream = relaxed.get_object((3, 0)).unwrap().as_stream().unwrap();
    assert_eq!(stream.content, b"hello");

    let strict = Config {
        validation_mode: ValidationMode::Strict,
        ..Config::default()
    };
    let mut ctx = Context::load_mem(&doc, strict).unwrap();
    assert!(matches!(
        ctx.get_object((3, 0)),
        Err(Error::Parse(ParseError::StreamLength((3, 0))))
    ));
}

#[test]
fn indirect_stream_length_resolves() {
    let doc = build_classical(
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [] /Count 0 >>"),
            (3, "<< /Length 5 0 R >>\nstream\nhello\nendstream"),
            (5, "5"),
        ],
        "",
    );
    let mut ctx = Context::load_mem(&doc, Config::default()).unwrap();
    let stream = ctx.get_object((3, 0)).unwrap().as_stream().unwrap();
    assert_eq!(stream.content, b"hello");
}

#[test]
fn broken_startxref_rebuilds_in_relaxed_mode() {
    let mut data = simple_pdf();
    // Point startxref somewhere useless.
    let pos = data.windows(9).rposition(|w| w == b"startxref").unwrap();
    data.truncate(pos);
    data.extend_from_slice(b"startxref\n3\n%%EOF");

    let mut ctx = Context::load_mem(&data, Config::default()).unwrap();
    assert!(ctx.stats.rebuilt_xref);
    assert!(ctx.catalog().unwrap().has_type(b"Catalog"));
    let stream = ctx.get_object((4, 0)).unwrap().as_stream().unwrap();
    assert_eq!(stream.content, b"hello");

    let strict = Config {
        validation_mode: ValidationMode::Strict,
        ..Config::default()
    };
    assert!(Context::load_mem(&data, strict).is_err());
}

#[test]
fn hybrid_file_resolves_compressed_objects_with_reader15() {
    let mut ctx = Context::load_mem(&hybrid_pdf(), Config::default()).unwrap();
    assert!(matches!(
        ctx.xref.get(4),
        Some(XrefEntry::Compressed { container: 5, index: 0 })
    ));
    let extra = ctx.get_object((4, 0)).unwrap().as_dict().unwrap();
    assert_eq!(extra.get(b"Kind").unwrap().as_name().unwrap(), b"Extra");
}

#[test]
fn hybrid_file_hides_compressed_objects_without_reader15() {
    let config = Config {
        reader15: false,
        ..Config::default()
    };
    let mut ctx = Context::load_mem(&hybrid_pdf(), config).unwrap();
    // Classical entries stay visible.
    assert!(ctx.get_object((3, 0)).is_ok());
    // The XRefStm was never read.
    assert!(ctx.xref.get(4).is_none());
    assert!(ctx.get_object((4, 0)).is_err());
}

#[test]
fn object_stream_members_share_one_parse() {
    let mut ctx = Context::load_mem(&hybrid_pdf(), Config::default()).unwrap();
    ctx.get_object((4, 0)).unwrap();
    let decoded = ctx.stats.streams_decoded;
    ctx.get_object((4, 0)).unwrap();
    assert_eq!(ctx.stats.streams_decoded, decoded);
}

#[test]
fn try_from_bytes_uses_default_config() {
    let data = simple_pdf();
    let ctx = Context::try_from(data.as_slice()).unwrap();
    assert_eq!(ctx.version, "1.4");
}

#[test]
fn prev_chain_loop_is_detected() {
    // A file whose trailer Prev points at its own xref section.
    let objects: Vec<(u32, &str)> = vec![
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [] /Count 0 >>"),
    ];
    let base = build_classical(&objects, "");
    let xref_pos = base.windows(6).rposition(|w| w == b"\nxref\n").unwrap() + 1;
    let with_loop = build_classical(&objects, &format!("/Prev {xref_pos}"));
    let mut ctx = Context::load_mem(&with_loop, Config::default()).unwrap();
    assert!(ctx.catalog().unwrap().has_type(b"Catalog"));
}
