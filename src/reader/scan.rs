//! Relaxed-mode recovery: rebuild the cross-reference table by scanning
//! the whole file for `num gen obj` markers.

use log::warn;

use crate::context::Context;
use crate::error::{Result, XrefError};
use crate::object::{Dictionary, Object};
use crate::parser::{self, ParserInput};
use crate::xref::{Xref, XrefEntry};

impl Context {
    /// Walk the file front to back recording every indirect object
    /// header. Later definitions shadow earlier ones, which reproduces
    /// the incremental-update order without a usable chain.
    pub(crate) fn rebuild_xref_by_scan(&mut self) -> Result<()> {
        self.stats.rebuilt_xref = true;
        self.objects.clear();
        self.pending.clear();

        let data = self.source.as_slice();
        let mut xref = Xref::new(0);
        let mut search = 0usize;
        while let Some(pos) = self.source.find(b"obj", search) {
            search = pos + 3;
            // The keyword must stand on its own.
            if data.get(pos + 3).is_some_and(|&b| !is_boundary(b)) {
                continue;
            }
            let Some((number, generation, offset)) = header_before(data, pos) else {
                continue;
            };
            xref.insert(
                number,
                XrefEntry::Normal {
                    offset: offset as u32,
                    generation,
                },
            );
        }

        if xref.entries.is_empty() {
            return Err(XrefError::Parse.into());
        }
        xref.size = xref.max_id() + 1;
        self.max_id = xref.size - 1;
        self.xref = xref;
        self.trailer = self.recover_trailer()?;
        self.trailer.set("Size", self.xref.size as i64);
        Ok(())
    }

    /// Trailer dictionaries found in the file, newest (last) first;
    /// failing those, any object graph root that looks like a catalog.
    fn recover_trailer(&mut self) -> Result<Dictionary> {
        let mut candidates = Vec::new();
        let mut search = 0usize;
        while let Some(pos) = self.source.find(b"trailer", search) {
            search = pos + 7;
            let input = ParserInput::new_extra(self.source.as_slice(), "trailer");
            if let Ok(Object::Dictionary(dict)) = parser::object_at(input, pos + 7) {
                candidates.push(dict);
            }
        }
        for mut dict in candidates.into_iter().rev() {
            if dict.has(b"Root") {
                dict.remove(b"Prev");
                dict.remove(b"XRefStm");
                return Ok(dict);
            }
        }

        // No classical trailer: look at the recovered objects. An XRef
        // stream dictionary doubles as one, and a Catalog object names
        // the root directly.
        let ids: Vec<u32> = self.xref.entries.keys().copied().collect();
        let mut from_catalog: Option<Dictionary> = None;
        for number in ids {
            let Some(XrefEntry::Normal { generation, .. }) = self.xref.get(number).cloned() else {
                continue;
            };
            let Ok(object) = self.get_object((number, generation)) else {
                continue;
            };
            match object {
                Object::Stream(stream) if stream.dict.has_type(b"XRef") && stream.dict.has(b"Root") => {
                    let mut dict = stream.dict.clone();
                    for key in [&b"Type"[..], b"W", b"Index", b"Length", b"Filter", b"DecodeParms", b"Prev"] {
                        dict.remove(key);
                    }
                    return Ok(dict);
                }
                Object::Dictionary(dict) if dict.has_type(b"Catalog") => {
                    let mut trailer = Dictionary::new();
                    trailer.set("Root", Object::Reference((number, generation)));
                    from_catalog = Some(trailer);
                }
                _ => {}
            }
        }
        match from_catalog {
            Some(trailer) => {
                warn!("no trailer found; using the last Catalog object as the root");
                Ok(trailer)
            }
            None => Err(XrefError::Parse.into()),
        }
    }
}

fn is_boundary(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'<' | b'[' | b'(' | b'/' | b'%')
}

/// Parse `num gen` backwards from the position of the `obj` keyword,
/// returning the numbers and the offset of the header start.
fn header_before(data: &[u8], obj_pos: usize) -> Option<(u32, u16, usize)> {
    let mut i = obj_pos;
    let mut skip_ws = |i: &mut usize| {
        let mut seen = false;
        while *i > 0 && data[*i - 1].is_ascii_whitespace() {
            *i -= 1;
            seen = true;
        }
        seen
    };
    let digits_before = |i: &mut usize| -> Option<u64> {
        let end = *i;
        while *i > 0 && data[*i - 1].is_ascii_digit() {
            *i -= 1;
        }
        if *i == end {
            return None;
        }
        std::str::from_utf8(&data[*i..end]).ok()?.parse().ok()
    };

    if !skip_ws(&mut i) {
        return None;
    }
    let generation = digits_before(&mut i)?;
    if !skip_ws(&mut i) {
        return None;
    }
    let number = digits_before(&mut i)?;
    let start = i;
    // Digits must not continue to the left.
    if start > 0 && data[start - 1].is_ascii_digit() {
        return None;
    }
    Some((
        u32::try_from(number).ok()?,
        u16::try_from(generation).ok()?,
        start,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_before_parses_backwards() {
        let data = b"garbage 12 0 obj << >> endobj";
        let pos = 13;
        assert_eq!(&data[pos..pos + 3], b"obj");
        assert_eq!(header_before(data, pos), Some((12, 0, 8)));
    }

    #[test]
    fn header_before_rejects_missing_numbers() {
        let data = b"stream obj";
        assert_eq!(header_before(data, 7), None);
    }
}
