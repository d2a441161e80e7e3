//! Object streams: parsing the packed form on read, and the packer the
//! writer uses to build them.

use std::collections::BTreeMap;

use log::warn;

use crate::error::{ParseError, Result};
use crate::object::{Object, ObjectId, Stream};
use crate::parser::{self, ParserInput};

/// Decoded view of one ObjStm host.
#[derive(Debug)]
pub struct ObjectStream {
    pub objects: BTreeMap<ObjectId, Object>,
}

impl ObjectStream {
    /// Decode the host payload and parse every contained object.
    /// Contained objects always have generation 0 and can never be
    /// streams, the grammar used here has no stream production.
    pub fn new(stream: &mut Stream, relaxed: bool) -> Result<ObjectStream> {
        if !stream.dict.has_type(b"ObjStm") {
            return Err(ParseError::InvalidObjectStream.into());
        }
        stream.decompress(relaxed)?;
        let data = stream.decoded.as_deref().unwrap_or(&stream.content);

        let count = stream
            .dict
            .get(b"N")
            .and_then(Object::as_i64)
            .map_err(|_| ParseError::InvalidObjectStream)?;
        let first = stream
            .dict
            .get(b"First")
            .and_then(Object::as_i64)
            .map_err(|_| ParseError::InvalidObjectStream)?;
        let count = usize::try_from(count).map_err(|_| ParseError::InvalidObjectStream)?;
        let first = usize::try_from(first).map_err(|_| ParseError::InvalidObjectStream)?;
        if first > data.len() {
            return Err(ParseError::InvalidObjectStream.into());
        }

        let header = std::str::from_utf8(&data[..first]).map_err(|_| ParseError::InvalidObjectStream)?;
        let mut numbers = header.split_ascii_whitespace().map(str::parse::<u32>);

        let mut objects = BTreeMap::new();
        for _ in 0..count {
            let (Some(Ok(number)), Some(Ok(offset))) = (numbers.next(), numbers.next()) else {
                return Err(ParseError::InvalidObjectStream.into());
            };
            let position = first + offset as usize;
            if position > data.len() {
                return Err(ParseError::InvalidObjectStream.into());
            }
            let input = ParserInput::new_extra(data, "object stream");
            match parser::object_at(input, position) {
                Ok(object) => {
                    objects.insert((number, 0), object);
                }
                Err(err) if relaxed => {
                    warn!("skipping unparsable object {number} in object stream: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(ObjectStream { objects })
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStreamConfig {
    /// Objects packed into one host before a new one is started.
    pub max_objects: usize,
}

impl Default for ObjectStreamConfig {
    fn default() -> Self {
        ObjectStreamConfig { max_objects: 200 }
    }
}

/// Writer-side packer: accumulates eligible objects and emits finished
/// Flate-encoded ObjStm hosts.
pub struct ObjectStreamBuilder {
    config: ObjectStreamConfig,
}

impl ObjectStreamBuilder {
    pub fn new(config: ObjectStreamConfig) -> ObjectStreamBuilder {
        ObjectStreamBuilder { config }
    }

    /// Streams and non-zero generations stay outside; so does the
    /// Encrypt dictionary, which the security handler must reach before
    /// any stream can be decoded.
    pub fn eligible(id: ObjectId, object: &Object, encrypt_ref: Option<ObjectId>) -> bool {
        if id.1 != 0 || matches!(object, Object::Stream(_)) {
            return false;
        }
        Some(id) != encrypt_ref
    }

    /// Pack objects into hosts of at most `max_objects`, preserving id
    /// order. Returns each host's member list and the finished stream.
    pub fn build_object_streams(
        &self,
        objects: &BTreeMap<ObjectId, Object>,
    ) -> Result<Vec<(Vec<ObjectId>, Stream)>> {
        let mut hosts = Vec::new();
        let members: Vec<(&ObjectId, &Object)> = objects.iter().collect();
        for chunk in members.chunks(self.config.max_objects.max(1)) {
            let mut header = Vec::new();
            let mut body = Vec::new();
            let mut ids = Vec::with_capacity(chunk.len());
            for (id, object) in chunk {
                let mut buf = itoa::Buffer::new();
                header.extend_from_slice(buf.format(id.0).as_bytes());
                header.push(b' ');
                header.extend_from_slice(buf.format(body.len()).as_bytes());
                header.push(b' ');
                crate::writer::serialize_object(&mut body, object)?;
                body.push(b'\n');
                ids.push(**id);
            }

            let first = header.len();
            let mut content = header;
            content.extend_from_slice(&body);

            let dict = crate::dictionary! {
                "Type" => "ObjStm",
                "N" => chunk.len(),
                "First" => first,
            };
            let mut stream = Stream::new(dict, content);
            stream.compress()?;
            hosts.push((ids, stream));
        }
        Ok(hosts)
    }
}
