//! Cross-reference reconstruction: locating startxref, walking
//! classical tables, xref streams, hybrid files and the Prev chain.

mod encrypted;
mod load;
mod object_loader;
mod scan;

#[cfg(test)]
mod tests;
#[cfg(test)]
pub(crate) mod tests_support;

use std::collections::{HashSet, VecDeque};

use log::warn;

use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, ParseError, Result, XrefError};
use crate::object::{Dictionary, Object, Stream};
use crate::parser::{self, ParserInput};
use crate::source::ByteSource;
use crate::xref::{Xref, XrefEntry};

/// Window searched for the header at the front and for `startxref` at
/// the back of the file.
const SCAN_WINDOW: usize = 1024;

/// Keys of an xref stream dictionary that describe the stream itself
/// rather than the document; they never enter the trailer.
const XREF_STREAM_KEYS: [&[u8]; 7] = [
    b"Type", b"W", b"Index", b"Length", b"Filter", b"DecodeParms", b"Prev",
];

struct XrefSection {
    xref: Xref,
    trailer: Dictionary,
    prev: Option<usize>,
    hybrid_stream: Option<usize>,
}

impl Context {
    pub(crate) fn read_internal(mut buffer: Vec<u8>, config: Config) -> Result<Context> {
        // Leading garbage before the header is tolerated; offsets in
        // the file are relative to the header.
        let window_len = buffer.len().min(SCAN_WINDOW);
        let offset = buffer[..window_len]
            .windows(5)
            .position(|w| w == b"%PDF-")
            .ok_or(ParseError::InvalidFileHeader)?;
        if offset > 0 {
            buffer.drain(..offset);
        }

        let mut ctx = Context::new(config);
        ctx.source = ByteSource::new(buffer);

        ctx.version = parser::header(ParserInput::new_extra(ctx.source.as_slice(), "header"))
            .ok_or(ParseError::InvalidFileHeader)?;

        // The binary mark is the comment on the second line; only kept
        // when all its bytes have the high bit set.
        if let Some(pos) = ctx.source.as_slice().iter().position(|&b| b == b'\n') {
            if let Some(mark) =
                parser::binary_mark(ParserInput::new_extra(&ctx.source.as_slice()[pos + 1..], "binary mark"))
            {
                if !mark.is_empty() && mark.iter().all(|&b| b >= 128) {
                    ctx.binary_mark = mark;
                }
            }
        }

        match ctx.reconstruct_xref() {
            Ok(()) => {}
            Err(err) if ctx.config.relaxed() => {
                warn!("cross-reference reconstruction failed ({err}); scanning the whole file");
                ctx.rebuild_xref_by_scan()?;
            }
            Err(err) => return Err(err),
        }

        ctx.setup_encryption()?;

        if ctx.config.decode_all_streams {
            ctx.decode_all_streams()?;
        }
        Ok(ctx)
    }

    fn reconstruct_xref(&mut self) -> Result<()> {
        let start = self.locate_startxref()?;

        let mut xref = Xref::new(0);
        let mut trailer: Option<Dictionary> = None;
        let mut queue: VecDeque<usize> = VecDeque::from([start]);
        let mut seen: HashSet<usize> = HashSet::new();

        // Sections are processed newest first, so merged entries only
        // fill slots newer layers have not claimed.
        while let Some(offset) = queue.pop_front() {
            if !seen.insert(offset) {
                warn!("cross-reference chain loops at offset {offset}");
                continue;
            }
            let section = self.parse_xref_section(offset)?;
            self.stats.xref_sections += 1;
            xref.merge(section.xref);
            if trailer.is_none() {
                trailer = Some(section.trailer);
            }
            if let Some(hybrid) = section.hybrid_stream {
                if self.config.reader15 {
                    queue.push_back(hybrid);
                }
            }
            if let Some(prev) = section.prev {
                queue.push_back(prev);
            }
        }

        let mut trailer = trailer.ok_or(ParseError::InvalidTrailer)?;
        trailer.remove(b"Prev");
        trailer.remove(b"XRefStm");

        if !trailer.has(b"Root") {
            return Err(crate::error::ValidationError::MissingRoot.into());
        }
        let entry_count = xref
            .max_id()
            .checked_add(1)
            .ok_or(ParseError::InvalidXref)?;
        if xref.size != entry_count {
            warn!(
                "Size entry of trailer dictionary is {}, correct value is {}.",
                xref.size, entry_count
            );
            xref.size = entry_count;
        }

        self.max_id = xref.size.saturating_sub(1);
        self.xref = xref;
        self.trailer = trailer;
        Ok(())
    }

    fn locate_startxref(&self) -> Result<usize> {
        let tail_start = self.source.len().saturating_sub(SCAN_WINDOW);
        let keyword = self
            .source
            .rfind(b"startxref", tail_start)
            .ok_or(Error::Xref(XrefError::Start))?;
        let offset = parser::xref_start(ParserInput::new_extra(
            self.source.tail(keyword)?,
            "startxref",
        ))
        .ok_or(Error::Xref(XrefError::Start))?;
        let offset = usize::try_from(offset).map_err(|_| Error::Xref(XrefError::Start))?;
        if offset >= self.source.len() {
            return Err(Error::Xref(XrefError::OffsetOutOfBounds));
        }
        Ok(offset)
    }

    /// One xref section: classical table or xref stream.
    fn parse_xref_section(&mut self, offset: usize) -> Result<XrefSection> {
        let bytes = self.source.tail(offset)?;
        let lead = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(0);
        if bytes[lead..].starts_with(b"xref") {
            let (xref, trailer) =
                parser::classical_xref_and_trailer(ParserInput::new_extra(&bytes[lead..], "xref"))?;
            let prev = dict_offset(&trailer, b"Prev", self.source.len())?;
            let hybrid_stream = dict_offset(&trailer, b"XRefStm", self.source.len())?;
            return Ok(XrefSection {
                xref,
                trailer,
                prev,
                hybrid_stream,
            });
        }

        if !self.config.reader15 {
            return Err(Error::Unsupported(
                "cross-reference streams are disabled by the reader configuration",
            ));
        }

        let input = ParserInput::new_extra(self.source.as_slice(), "xref stream");
        let (_, object) = parser::indirect_object(input, offset, None)?;
        let mut stream = match object {
            Object::Stream(stream) => stream,
            _ => return Err(Error::Xref(XrefError::Parse)),
        };
        if !stream.dict.has_type(b"XRef") {
            return Err(Error::Xref(XrefError::Parse));
        }
        // Xref streams must carry a direct Length; when the slice is
        // still open, fall back to the endstream scan.
        if stream.content.is_empty() {
            if let Some(start) = stream.start_position {
                if let Some(end) = self.source.find(b"endstream", start) {
                    let mut end = end;
                    let bytes = self.source.as_slice();
                    if end > start && bytes[end - 1] == b'\n' {
                        end -= 1;
                    }
                    if end > start && bytes[end - 1] == b'\r' {
                        end -= 1;
                    }
                    stream.content = bytes[start..end].to_vec();
                }
            }
        }

        let xref = parse_xref_stream(&mut stream, self.config.relaxed())?;
        let mut trailer = stream.dict.clone();
        let prev = dict_offset(&trailer, b"Prev", self.source.len())?;
        for key in XREF_STREAM_KEYS {
            trailer.remove(key);
        }
        Ok(XrefSection {
            xref,
            trailer,
            prev,
            hybrid_stream: None,
        })
    }
}

fn dict_offset(dict: &Dictionary, key: &[u8], file_len: usize) -> Result<Option<usize>> {
    let Ok(value) = dict.get(key) else {
        return Ok(None);
    };
    let offset = value.as_i64()?;
    if offset < 0 || offset as usize >= file_len {
        return Err(Error::Xref(XrefError::PrevStart));
    }
    Ok(Some(offset as usize))
}

/// Decode an xref stream payload into entries per W, Index and Size.
fn parse_xref_stream(stream: &mut Stream, relaxed: bool) -> Result<Xref> {
    let data = stream.decompressed_content(relaxed)?;

    let widths: Vec<usize> = stream
        .dict
        .get(b"W")
        .and_then(Object::as_array)
        .map_err(|_| Error::Xref(XrefError::StreamWidths))?
        .iter()
        .map(|w| w.as_i64().map(|w| w as usize))
        .collect::<Result<_>>()
        .map_err(|_| Error::Xref(XrefError::StreamWidths))?;
    if widths.len() != 3 || widths.iter().sum::<usize>() == 0 || widths.iter().any(|&w| w > 8) {
        return Err(Error::Xref(XrefError::StreamWidths));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let row_len = w1 + w2 + w3;

    let size = stream
        .dict
        .get(b"Size")
        .and_then(Object::as_i64)
        .map_err(|_| ParseError::InvalidXref)?;
    let size = u32::try_from(size).map_err(|_| ParseError::InvalidXref)?;

    let index: Vec<i64> = match stream.dict.get(b"Index").and_then(Object::as_array) {
        Ok(values) => values
            .iter()
            .map(Object::as_i64)
            .collect::<Result<_>>()
            .map_err(|_| ParseError::InvalidXref)?,
        Err(_) => vec![0, size as i64],
    };
    if index.len() % 2 != 0 {
        return Err(ParseError::InvalidXref.into());
    }

    let mut xref = Xref::new(size);
    let mut rows = data.chunks_exact(row_len);
    for range in index.chunks_exact(2) {
        let (first, count) = (range[0], range[1]);
        if first < 0 || count < 0 {
            return Err(ParseError::InvalidXref.into());
        }
        for number in first..first + count {
            let Some(row) = rows.next() else {
                if relaxed {
                    warn!("xref stream payload is short of its Index ranges");
                    break;
                }
                return Err(ParseError::InvalidXref.into());
            };
            let (kind_field, rest) = row.split_at(w1);
            let (second, third) = rest.split_at(w2);
            // A zero-width type field defaults the entry to in-use.
            let kind = if w1 == 0 { 1 } else { be_value(kind_field) };
            let second = be_value(second);
            let third = be_value(third);
            let entry = match kind {
                0 => XrefEntry::Free {
                    next: second as u32,
                    generation: third.min(u16::MAX as u64) as u16,
                },
                1 => XrefEntry::Normal {
                    offset: u32::try_from(second).map_err(|_| ParseError::InvalidXref)?,
                    generation: third.min(u16::MAX as u64) as u16,
                },
                2 => XrefEntry::Compressed {
                    container: second as u32,
                    index: third.min(u16::MAX as u64) as u16,
                },
                _ => XrefEntry::UnusableFree,
            };
            xref.entries.entry(number as u32).or_insert(entry);
        }
    }
    Ok(xref)
}

fn be_value(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod stream_tests {
    use super::*;
    use crate::dictionary;

    #[test]
    fn xref_stream_rows_decode() {
        // W = [1 2 1], three entries starting at object 0.
        let rows: Vec<u8> = vec![
            0, 0, 0, 255, // free
            1, 0, 17, 0, // in use at 17
            2, 0, 1, 3, // in stream 1, index 3
        ];
        let dict = dictionary! {
            "Type" => "XRef",
            "Size" => 3,
            "W" => vec![Object::Integer(1), Object::Integer(2), Object::Integer(1)],
        };
        let mut stream = Stream::new(dict, rows);
        let xref = parse_xref_stream(&mut stream, false).unwrap();
        assert_eq!(xref.get(0), Some(&XrefEntry::Free { next: 0, generation: 255 }));
        assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: 17, generation: 0 }));
        assert_eq!(xref.get(2), Some(&XrefEntry::Compressed { container: 1, index: 3 }));
    }

    #[test]
    fn xref_stream_index_ranges() {
        let rows: Vec<u8> = vec![
            1, 0, 9, //
            1, 0, 81,
        ];
        let dict = dictionary! {
            "Type" => "XRef",
            "Size" => 13,
            "W" => vec![Object::Integer(1), Object::Integer(2), Object::Integer(0)],
            "Index" => vec![
                Object::Integer(4),
                Object::Integer(1),
                Object::Integer(12),
                Object::Integer(1),
            ],
        };
        let mut stream = Stream::new(dict, rows);
        let xref = parse_xref_stream(&mut stream, false).unwrap();
        assert_eq!(xref.get(4), Some(&XrefEntry::Normal { offset: 9, generation: 0 }));
        assert_eq!(xref.get(12), Some(&XrefEntry::Normal { offset: 81, generation: 0 }));
        assert_eq!(xref.get(5), None);
    }

    #[test]
    fn bad_widths_are_rejected() {
        let dict = dictionary! {
            "Type" => "XRef",
            "Size" => 1,
            "W" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
        };
        let mut stream = Stream::new(dict, vec![]);
        assert!(matches!(
            parse_xref_stream(&mut stream, false),
            Err(Error::Xref(XrefError::StreamWidths))
        ));
    }
}
