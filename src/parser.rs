use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while, take_while1, take_while_m_n};
use nom::character::complete::{digit0, digit1, one_of};
use nom::combinator::{map, map_opt, map_res, opt, recognize, value};
use nom::error::{ErrorKind, ParseError as NomErrorTrait};
use nom::multi::{fold_many0, many0_count};
use nom::sequence::{delimited, pair, preceded};
use nom::{IResult, Input, Parser};
use nom_locate::LocatedSpan;

use crate::error::{Error, ParseError, Result};
use crate::object::{Dictionary, Object, ObjectId, Stream, StringFormat};
use crate::xref::{Xref, XrefEntry};

pub(crate) type ParserInput<'a> = LocatedSpan<&'a [u8], &'static str>;
pub(crate) type NomResult<'a, O> = IResult<ParserInput<'a>, O>;

/// Maximum allowed embedding of literal strings.
pub const MAX_BRACKET: usize = 100;

#[inline]
fn strip<O>(result: NomResult<O>) -> Option<O> {
    result.ok().map(|(_, output)| output)
}

#[inline]
fn nom_error(input: ParserInput, kind: ErrorKind) -> nom::Err<nom::error::Error<ParserInput>> {
    nom::Err::Error(nom::error::Error::from_error_kind(input, kind))
}

#[inline]
fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'\0')
}

#[inline]
fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

#[inline]
fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn eol(input: ParserInput) -> NomResult<ParserInput> {
    alt((tag(&b"\r\n"[..]), tag(&b"\n"[..]), tag(&b"\r"[..]))).parse(input)
}

/// A comment runs to the end of the line and counts as whitespace.
fn comment(input: ParserInput) -> NomResult<()> {
    map(
        pair(tag(&b"%"[..]), take_while(|c: u8| c != b'\r' && c != b'\n')),
        |_| (),
    )
    .parse(input)
}

/// Whitespace runs, comments included.
fn space(input: ParserInput) -> NomResult<()> {
    map(
        many0_count(alt((map(take_while1(is_whitespace), |_| ()), comment))),
        |_| (),
    )
    .parse(input)
}

fn unsigned_int<T: std::str::FromStr>(input: ParserInput) -> NomResult<T> {
    map_res(digit1, |digits: ParserInput| {
        std::str::from_utf8(digits.fragment())
            .unwrap_or("")
            .parse::<T>()
    })
    .parse(input)
}

fn integer(input: ParserInput) -> NomResult<i64> {
    map_res(
        recognize(pair(opt(one_of("+-")), digit1)),
        |text: ParserInput| std::str::from_utf8(text.fragment()).unwrap_or("").parse::<i64>(),
    )
    .parse(input)
}

/// A token is a real iff it contains a decimal point.
fn real(input: ParserInput) -> NomResult<f32> {
    map_res(
        recognize(pair(
            opt(one_of("+-")),
            alt((
                recognize((digit1, tag(&b"."[..]), digit0)),
                recognize(pair(tag(&b"."[..]), digit1)),
            )),
        )),
        |text: ParserInput| std::str::from_utf8(text.fragment()).unwrap_or("").parse::<f32>(),
    )
    .parse(input)
}

/// Name object; `#hh` escapes are decoded here.
fn name(input: ParserInput) -> NomResult<Vec<u8>> {
    preceded(
        tag(&b"/"[..]),
        fold_many0(
            alt((
                preceded(
                    tag(&b"#"[..]),
                    map_res(take(2usize), |hex: ParserInput| {
                        u8::from_str_radix(std::str::from_utf8(hex.fragment()).unwrap_or("zz"), 16)
                    }),
                ),
                map_opt(take(1usize), |byte: ParserInput| {
                    let c = byte.fragment()[0];
                    (c != b'#' && is_regular(c)).then_some(c)
                }),
            )),
            Vec::new,
            |mut acc, c| {
                acc.push(c);
                acc
            },
        ),
    )
    .parse(input)
}

/// Literal string: balanced parens, octal and character escapes,
/// line continuations.
fn literal_string(input: ParserInput) -> NomResult<Vec<u8>> {
    let bytes = input.fragment();
    if bytes.first() != Some(&b'(') {
        return Err(nom_error(input, ErrorKind::Tag));
    }
    let mut out = Vec::new();
    let mut depth = 1usize;
    let mut i = 1usize;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                depth += 1;
                if depth > MAX_BRACKET {
                    return Err(nom_error(input, ErrorKind::TooLarge));
                }
                out.push(b'(');
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((input.take_from(i + 1), out));
                }
                out.push(b')');
            }
            b'\\' => {
                i += 1;
                if i >= bytes.len() {
                    break;
                }
                match bytes[i] {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'(' => out.push(b'('),
                    b')' => out.push(b')'),
                    b'\\' => out.push(b'\\'),
                    // Escaped EOL continues the string on the next line.
                    b'\r' => {
                        if bytes.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    b'\n' => {}
                    c @ b'0'..=b'7' => {
                        let mut octal = (c - b'0') as u16;
                        for _ in 0..2 {
                            match bytes.get(i + 1) {
                                Some(&d @ b'0'..=b'7') => {
                                    octal = octal * 8 + (d - b'0') as u16;
                                    i += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push(octal as u8);
                    }
                    c => out.push(c),
                }
            }
            c => out.push(c),
        }
        i += 1;
    }
    Err(nom_error(input, ErrorKind::Eof))
}

/// Hex string; whitespace ignored, odd length padded with 0.
fn hexadecimal_string(input: ParserInput) -> NomResult<Object> {
    map(
        delimited(
            tag(&b"<"[..]),
            take_while(|c: u8| c != b'>' && c != b'<'),
            tag(&b">"[..]),
        ),
        |digits: ParserInput| {
            let mut nibbles: Vec<u8> = digits
                .fragment()
                .iter()
                .copied()
                .filter(u8::is_ascii_hexdigit)
                .map(|c| match c {
                    b'0'..=b'9' => c - b'0',
                    b'a'..=b'f' => c - b'a' + 10,
                    _ => c - b'A' + 10,
                })
                .collect();
            if nibbles.len() % 2 == 1 {
                nibbles.push(0);
            }
            let bytes = nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect();
            Object::String(bytes, StringFormat::Hexadecimal)
        },
    )
    .parse(input)
}

fn boolean(input: ParserInput) -> NomResult<Object> {
    alt((
        value(Object::Boolean(true), tag(&b"true"[..])),
        value(Object::Boolean(false), tag(&b"false"[..])),
    ))
    .parse(input)
}

fn null(input: ParserInput) -> NomResult<Object> {
    value(Object::Null, tag(&b"null"[..])).parse(input)
}

/// `N G R`, with both numbers on their syntactic boundaries.
fn reference(input: ParserInput) -> NomResult<Object> {
    map(
        (
            unsigned_int::<u32>,
            preceded(take_while1(is_whitespace), unsigned_int::<u16>),
            preceded(take_while1(is_whitespace), tag(&b"R"[..])),
        ),
        |(num, r#gen, _)| Object::Reference((num, r#gen)),
    )
    .parse(input)
}

fn array(input: ParserInput) -> NomResult<Vec<Object>> {
    delimited(
        pair(tag(&b"["[..]), space),
        fold_many0(
            |i| direct_object(i),
            Vec::new,
            |mut acc, obj| {
                acc.push(obj);
                acc
            },
        ),
        pair(space, tag(&b"]"[..])),
    )
    .parse(input)
}

/// Dictionary; duplicate keys resolve last-wins.
pub(crate) fn dictionary(input: ParserInput) -> NomResult<Dictionary> {
    delimited(
        pair(tag(&b"<<"[..]), space),
        fold_many0(
            pair(
                delimited(space, name, space),
                |i| direct_object(i),
            ),
            Dictionary::new,
            |mut dict, (key, value)| {
                dict.set(key, value);
                dict
            },
        ),
        pair(space, tag(&b">>"[..])),
    )
    .parse(input)
}

/// Any direct (non-stream) object, leading whitespace consumed.
pub(crate) fn direct_object(input: ParserInput) -> NomResult<Object> {
    preceded(
        space,
        alt((
            null,
            boolean,
            reference,
            map(real, Object::Real),
            map(integer, Object::Integer),
            map(name, Object::Name),
            map(literal_string, Object::string_literal),
            map(dictionary, Object::Dictionary),
            hexadecimal_string,
            map(array, Object::Array),
        )),
    )
    .parse(input)
}

/// Dictionary followed by the `stream` keyword. The payload extent is
/// sliced here only when Length is a direct in-bounds integer and the
/// payload is followed by `endstream`; otherwise the payload start is
/// recorded and content is filled in by the object loader.
fn stream_object(input: ParserInput) -> NomResult<Object> {
    let (i, dict) = preceded(space, dictionary).parse(input)?;
    let (i, _) = preceded(space, tag(&b"stream"[..])).parse(i)?;
    let (i, _) = eol(i)?;
    let start = i.location_offset();

    if let Ok(length) = dict.get(b"Length").and_then(Object::as_i64) {
        if length >= 0 && (length as usize) <= i.fragment().len() {
            let (rest, content) = take(length as usize).parse(i)?;
            if let Ok((rest, _)) = preceded(space, tag(&b"endstream"[..])).parse(rest) {
                let stream = Stream {
                    dict,
                    content: content.fragment().to_vec(),
                    decoded: None,
                    start_position: Some(start),
                };
                return Ok((rest, Object::Stream(stream)));
            }
        }
    }

    let stream = Stream {
        dict,
        content: Vec::new(),
        decoded: None,
        start_position: Some(start),
    };
    Ok((i, Object::Stream(stream)))
}

fn object_body(input: ParserInput) -> NomResult<Object> {
    alt((stream_object, |i| direct_object(i))).parse(input)
}

fn indirect_object_header(input: ParserInput) -> NomResult<ObjectId> {
    map(
        (
            space,
            unsigned_int::<u32>,
            preceded(take_while1(is_whitespace), unsigned_int::<u16>),
            preceded(take_while1(is_whitespace), tag(&b"obj"[..])),
        ),
        |(_, num, r#gen, _)| (num, r#gen),
    )
    .parse(input)
}

/// Parse the indirect object starting at `offset` of `file`.
pub(crate) fn indirect_object(
    file: ParserInput,
    offset: usize,
    expected_id: Option<ObjectId>,
) -> Result<(ObjectId, Object)> {
    if offset > file.fragment().len() {
        return Err(Error::InvalidOffset(offset));
    }
    let input = file.take_from(offset);
    let (input, id) =
        indirect_object_header(input).map_err(|_| ParseError::InvalidObject(offset))?;
    if let Some(expected) = expected_id {
        if expected != id {
            return Err(ParseError::ObjectIdMismatch(id).into());
        }
    }
    let (input, object) = object_body(input).map_err(|_| ParseError::InvalidObject(offset))?;
    // endobj is frequently missing in the wild; consume it when present.
    let _ = strip(preceded(space, tag(&b"endobj"[..])).parse(input));
    Ok((id, object))
}

/// Parse one direct object at `offset`, as found inside object
/// streams.
pub(crate) fn object_at(input: ParserInput, offset: usize) -> Result<Object> {
    if offset > input.fragment().len() {
        return Err(Error::InvalidOffset(offset));
    }
    match direct_object(input.take_from(offset)) {
        Ok((_, object)) => Ok(object),
        Err(_) => Err(ParseError::InvalidObject(offset).into()),
    }
}

/// `%PDF-M.m` within the given input, returning the version text.
pub(crate) fn header(input: ParserInput) -> Option<String> {
    strip(
        map_res(
            preceded(
                tag(&b"%PDF-"[..]),
                take_while1(|c: u8| c.is_ascii_digit() || c == b'.'),
            ),
            |version: ParserInput| String::from_utf8(version.fragment().to_vec()),
        )
        .parse(input),
    )
}

/// Comment bytes of the binary-mark line, if the line is a comment.
pub(crate) fn binary_mark(input: ParserInput) -> Option<Vec<u8>> {
    strip(
        map(
            preceded(tag(&b"%"[..]), take_while(|c: u8| c != b'\r' && c != b'\n')),
            |bytes: ParserInput| bytes.fragment().to_vec(),
        )
        .parse(input),
    )
}

/// The integer following the `startxref` keyword.
pub(crate) fn xref_start(input: ParserInput) -> Option<i64> {
    strip(
        delimited(pair(tag(&b"startxref"[..]), space), integer, space).parse(input),
    )
}

fn xref_entry_line(input: ParserInput) -> NomResult<(u64, u32, char)> {
    map(
        (
            unsigned_int::<u64>,
            tag(&b" "[..]),
            unsigned_int::<u32>,
            tag(&b" "[..]),
            one_of("nf"),
            take_while_m_n(0, 2, |c: u8| c == b' ' || c == b'\r' || c == b'\n'),
        ),
        |(offset, _, r#gen, _, kind, _)| (offset, r#gen, kind),
    )
    .parse(input)
}

/// Classical `xref` table and its trailer dictionary.
pub(crate) fn classical_xref_and_trailer(input: ParserInput) -> Result<(Xref, Dictionary)> {
    let (mut rest, _) = pair(tag(&b"xref"[..]), space)
        .parse(input)
        .map_err(|_| Error::Xref(crate::error::XrefError::Parse))?;

    let mut xref = Xref::new(0);
    loop {
        let Ok((i, (first, count))) = pair(
            unsigned_int::<u32>,
            delimited(take_while1(is_whitespace), unsigned_int::<u32>, space),
        )
        .parse(rest) else {
            break;
        };
        rest = i;
        for n in 0..count {
            let id = first + n;
            let (i, (offset, generation, kind)) =
                xref_entry_line(rest).map_err(|_| ParseError::InvalidXref)?;
            rest = i;
            let generation = generation.min(u16::MAX as u32) as u16;
            let entry = match kind {
                'n' => XrefEntry::Normal {
                    offset: u32::try_from(offset).map_err(|_| ParseError::InvalidXref)?,
                    generation,
                },
                _ => XrefEntry::Free {
                    next: offset as u32,
                    generation,
                },
            };
            xref.entries.entry(id).or_insert(entry);
        }
    }

    let (_, trailer) = preceded(pair(space, tag(&b"trailer"[..])), |i| direct_object(i))
        .parse(rest)
        .map_err(|_| ParseError::InvalidTrailer)?;
    let trailer = match trailer {
        Object::Dictionary(dict) => dict,
        _ => return Err(ParseError::InvalidTrailer.into()),
    };
    xref.size = trailer
        .get(b"Size")
        .and_then(Object::as_i64)
        .ok()
        .and_then(|size| u32::try_from(size).ok())
        .unwrap_or_else(|| xref.max_id() + 1);
    Ok((xref, trailer))
}
