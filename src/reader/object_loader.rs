//! Lazy object store: objects materialize on first dereference and are
//! parsed at most once per (number, generation).

use log::warn;

use crate::context::Context;
use crate::encryption;
use crate::error::{Error, ParseError, Result, XrefError};
use crate::object::{Object, ObjectId};
use crate::object_stream::ObjectStream;
use crate::parser::{self, ParserInput};
use crate::xref::XrefEntry;

impl Context {
    /// Dereference an indirect object id. A second call for the same id
    /// returns the cached value.
    pub fn get_object(&mut self, id: ObjectId) -> Result<&Object> {
        self.materialize(id)?;
        self.objects.get(&id).ok_or(Error::ObjectNotFound(id))
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.materialize(id)?;
        self.objects.get_mut(&id).ok_or(Error::ObjectNotFound(id))
    }

    pub(crate) fn materialize(&mut self, id: ObjectId) -> Result<()> {
        if self.objects.contains_key(&id) {
            return Ok(());
        }
        if self.source.is_empty() {
            // Built in memory; everything lives in the cache already.
            return Err(Error::ObjectNotFound(id));
        }
        if !self.pending.insert(id) {
            if self.config.strict() {
                return Err(Error::ReferenceCycle(id));
            }
            warn!("reference cycle resolving object {} {}", id.0, id.1);
            self.objects.insert(id, Object::Null);
            return Ok(());
        }
        let result = self.load_object(id);
        self.pending.remove(&id);
        let object = result?;
        self.stats.objects_parsed += 1;
        self.objects.insert(id, object);
        Ok(())
    }

    fn load_object(&mut self, id: ObjectId) -> Result<Object> {
        let entry = self
            .xref
            .get(id.0)
            .cloned()
            .ok_or(Error::Xref(XrefError::EntryMissing(id.0)))?;
        match entry {
            XrefEntry::Normal { offset, generation } => {
                if generation != id.1 {
                    return Err(Error::ObjectNotFound(id));
                }
                self.load_at_offset(id, offset as usize)
            }
            XrefEntry::Compressed { container, .. } => self.load_compressed(id, container),
            XrefEntry::Free { .. } | XrefEntry::UnusableFree => Err(Error::ObjectNotFound(id)),
        }
    }

    fn load_at_offset(&mut self, id: ObjectId, offset: usize) -> Result<Object> {
        let (_, mut object) = {
            let input = ParserInput::new_extra(self.source.as_slice(), "indirect object");
            parser::indirect_object(input, offset, Some(id))?
        };

        if matches!(object, Object::Stream(_)) {
            self.fill_stream_content(id, &mut object)?;
        }

        // Strings and stream payloads of objects stored uncompressed
        // are transformed by the handler; the Encrypt dictionary never.
        if let Some(state) = &self.encryption_state {
            if self.encrypt_ref() != Some(id) {
                encryption::decrypt_object(state, id, &mut object)?;
            }
        }
        Ok(object)
    }

    /// The parser slices a stream payload only when Length is a direct
    /// integer that lines up with `endstream`. Everything else lands
    /// here: Length behind a reference, or a Length that lies.
    fn fill_stream_content(&mut self, id: ObjectId, object: &mut Object) -> Result<()> {
        let (filled, start, declared) = {
            let stream = object.as_stream()?;
            (
                !stream.content.is_empty(),
                stream.start_position,
                stream.dict.get(b"Length").ok().cloned(),
            )
        };
        if filled {
            return Ok(());
        }
        let start = start.ok_or_else(|| Error::InvalidStream("missing start position".to_string()))?;

        let length = match declared {
            Some(value) => self.resolve_i64(&value).ok(),
            None => None,
        };
        let strict = self.config.strict();

        let content = match length {
            Some(length) if length >= 0 && start + length as usize <= self.source.len() => {
                let length = length as usize;
                if endstream_follows(self.source.tail(start + length)?) {
                    self.source.read_at(start, length)?.to_vec()
                } else if strict {
                    return Err(ParseError::StreamLength(id).into());
                } else {
                    warn!(
                        "stream {} {}: Length {} does not reach endstream, scanning",
                        id.0, id.1, length
                    );
                    self.scan_for_endstream(start)?
                }
            }
            _ if strict => return Err(ParseError::StreamLength(id).into()),
            _ => {
                warn!("stream {} {}: unusable Length entry, scanning", id.0, id.1);
                self.scan_for_endstream(start)?
            }
        };
        object.as_stream_mut()?.set_content(content);
        Ok(())
    }

    /// Relaxed recovery: the payload runs to the next `endstream`,
    /// minus one optional EOL directly before it.
    fn scan_for_endstream(&self, start: usize) -> Result<Vec<u8>> {
        let mut end = self
            .source
            .find(b"endstream", start)
            .ok_or(ParseError::EndstreamNotFound)?;
        let bytes = self.source.as_slice();
        if end > start && bytes[end - 1] == b'\n' {
            end -= 1;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
        } else if end > start && bytes[end - 1] == b'\r' {
            end -= 1;
        }
        Ok(bytes[start..end].to_vec())
    }

    fn load_compressed(&mut self, id: ObjectId, container: u32) -> Result<Object> {
        if !self.config.reader15 {
            return Err(Error::Unsupported("compressed objects require the 1.5 reader"));
        }
        let host_id = (container, 0);
        let host = self.get_object(host_id)?.clone();
        let mut host_stream = host
            .as_stream()
            .map_err(|_| ParseError::InvalidObjectStream)?
            .clone();
        let relaxed = self.config.relaxed();
        let object_stream = ObjectStream::new(&mut host_stream, relaxed)?;
        self.stats.streams_decoded += 1;

        // One parse serves every member of the host. Only entries the
        // table routes to this container are installed; contained
        // objects are never individually encrypted.
        for (member_id, object) in object_stream.objects {
            let belongs = matches!(
                self.xref.get(member_id.0),
                Some(XrefEntry::Compressed { container: c, .. }) if *c == container
            );
            if belongs {
                self.objects.entry(member_id).or_insert(object);
            }
        }
        self.objects.get(&id).cloned().ok_or(Error::ObjectNotFound(id))
    }
}

fn endstream_follows(tail: &[u8]) -> bool {
    let mut i = 0;
    while i < tail.len() && i < 4 && matches!(tail[i], b'\r' | b'\n' | b' ' | b'\t') {
        i += 1;
    }
    tail[i..].starts_with(b"endstream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endstream_tolerates_leading_eol() {
        assert!(endstream_follows(b"endstream"));
        assert!(endstream_follows(b"\nendstream"));
        assert!(endstream_follows(b"\r\nendstream"));
        assert!(!endstream_follows(b"xxendstream"));
        assert!(!endstream_follows(b"endstrea"));
    }
}
