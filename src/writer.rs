//! Serialization of the object graph back to a cross-referenced PDF
//! byte stream, as a classical file or with xref/object streams.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::context::Context;
use crate::encryption::{self, EncryptionState};
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectId, Stream, StringFormat};
use crate::object_stream::{ObjectStreamBuilder, ObjectStreamConfig};
use crate::xref::XrefEntry;

/// Trailer keys that describe an xref stream rather than the document.
const STREAM_ONLY_KEYS: [&[u8]; 8] = [
    b"Type", b"W", b"Index", b"Length", b"Filter", b"DecodeParms", b"Prev", b"XRefStm",
];

impl Context {
    /// Serialize to a file. The byte sequence is rendered completely
    /// before anything touches the file system, so failures never leave
    /// a truncated document behind.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.render()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serialize into any sink.
    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        let bytes = self.render()?;
        target.write_all(&bytes)?;
        Ok(())
    }

    /// Render the document to its final byte sequence.
    pub fn render(&mut self) -> Result<Vec<u8>> {
        self.materialize_all()?;
        self.apply_catalog_version();

        let eol: &[u8] = self.config.eol.as_bytes();
        let encrypt_ref = self.encrypt_ref();
        let use_object_streams = self.config.use_object_streams();
        let use_xref_streams = self.config.use_xref_streams();

        let mut out = Vec::with_capacity(self.source.len() + 1024);
        out.extend_from_slice(b"%PDF-");
        out.extend_from_slice(self.version.as_bytes());
        out.extend_from_slice(eol);
        out.push(b'%');
        out.extend_from_slice(&self.binary_mark);
        out.extend_from_slice(eol);

        // Pack eligible objects into object streams first; packed
        // members are written through their host only.
        let mut entries: BTreeMap<u32, XrefEntry> = BTreeMap::new();
        let mut packed: BTreeMap<ObjectId, (u32, u16)> = BTreeMap::new();
        let mut hosts: Vec<(u32, Stream)> = Vec::new();
        let mut next_number = self.max_id + 1;

        if use_object_streams {
            let eligible: BTreeMap<ObjectId, Object> = self
                .objects
                .iter()
                .filter(|(id, object)| ObjectStreamBuilder::eligible(**id, object, encrypt_ref))
                .map(|(id, object)| (*id, object.clone()))
                .collect();
            let builder = ObjectStreamBuilder::new(ObjectStreamConfig::default());
            for (members, stream) in builder.build_object_streams(&eligible)? {
                let host_number = next_number;
                next_number += 1;
                for (index, &member) in members.iter().enumerate() {
                    packed.insert(member, (host_number, index as u16));
                    entries.insert(
                        member.0,
                        XrefEntry::Compressed {
                            container: host_number,
                            index: index as u16,
                        },
                    );
                }
                hosts.push((host_number, stream));
            }
        }

        for (&id, object) in &self.objects {
            if packed.contains_key(&id) {
                continue;
            }
            entries.insert(
                id.0,
                XrefEntry::Normal {
                    offset: out.len() as u32,
                    generation: id.1,
                },
            );
            write_indirect_object(
                &mut out,
                id,
                object,
                eol,
                self.encryption_state.as_ref(),
                encrypt_ref,
            )?;
        }

        // Hosts are encrypted as a whole; their members never were.
        for (host_number, stream) in hosts {
            let id = (host_number, 0);
            entries.insert(
                host_number,
                XrefEntry::Normal {
                    offset: out.len() as u32,
                    generation: 0,
                },
            );
            let object = Object::Stream(stream);
            write_indirect_object(
                &mut out,
                id,
                &object,
                eol,
                self.encryption_state.as_ref(),
                encrypt_ref,
            )?;
        }

        let startxref = if use_xref_streams {
            self.write_xref_stream(&mut out, entries, next_number, eol)?
        } else {
            self.write_classical_xref(&mut out, entries, eol)?
        };

        out.extend_from_slice(b"startxref");
        out.extend_from_slice(eol);
        let mut buffer = itoa::Buffer::new();
        out.extend_from_slice(buffer.format(startxref).as_bytes());
        out.extend_from_slice(eol);
        out.extend_from_slice(b"%%EOF");
        out.extend_from_slice(eol);

        self.stats.objects_written += self.objects.len() as u64;
        self.stats.bytes_written += out.len() as u64;
        Ok(out)
    }

    /// The catalog's Version entry supersedes the header when newer.
    fn apply_catalog_version(&mut self) {
        let Ok(catalog) = self.catalog() else { return };
        let Some(version) = catalog
            .get(b"Version")
            .ok()
            .and_then(|v| v.as_name().ok())
            .and_then(|v| std::str::from_utf8(v).ok())
            .map(str::to_string)
        else {
            return;
        };
        let numeric = |v: &str| -> (u32, u32) {
            let mut parts = v.splitn(2, '.');
            let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
            let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
            (major, minor)
        };
        if numeric(&version) > numeric(&self.version) {
            self.version = version;
        }
    }

    fn trailer_for_output(&self, size: u32) -> Dictionary {
        let mut trailer = self.trailer.clone();
        for key in STREAM_ONLY_KEYS {
            trailer.remove(key);
        }
        trailer.set("Size", size as i64);
        trailer
    }

    fn write_classical_xref(
        &mut self,
        out: &mut Vec<u8>,
        entries: BTreeMap<u32, XrefEntry>,
        eol: &[u8],
    ) -> Result<usize> {
        let offset = out.len();
        let size = entries.keys().next_back().map(|n| n + 1).unwrap_or(1);
        let free_ids: Vec<u32> = (0..size).filter(|n| !entries.contains_key(n)).collect();
        let mut next_free: BTreeMap<u32, u32> = BTreeMap::new();
        let mut iter = free_ids.iter().peekable();
        while let Some(&id) = iter.next() {
            next_free.insert(id, iter.peek().map(|&&n| n).unwrap_or(0));
        }

        out.extend_from_slice(b"xref");
        out.extend_from_slice(eol);
        out.extend_from_slice(format!("0 {size}").as_bytes());
        out.extend_from_slice(eol);
        for number in 0..size {
            let (position, generation, kind) = match entries.get(&number) {
                Some(XrefEntry::Normal { offset, generation }) => (*offset as u64, *generation, 'n'),
                // Object streams force an xref stream terminator, so a
                // classical section only ever sees in-use entries.
                Some(XrefEntry::Compressed { .. }) => (0, 0, 'f'),
                _ => {
                    let next = next_free.get(&number).copied().unwrap_or(0) as u64;
                    let generation = if number == 0 { 65535 } else { 0 };
                    (next, generation, 'f')
                }
            };
            // Entries are exactly 20 bytes; a one-byte EOL is padded
            // with a space.
            out.extend_from_slice(format!("{position:010} {generation:05} {kind}").as_bytes());
            if eol.len() == 1 {
                out.push(b' ');
            }
            out.extend_from_slice(eol);
        }

        out.extend_from_slice(b"trailer");
        out.extend_from_slice(eol);
        serialize_object(out, &Object::Dictionary(self.trailer_for_output(size)))?;
        out.extend_from_slice(eol);
        self.stats.xref_sections += 1;
        Ok(offset)
    }

    fn write_xref_stream(
        &mut self,
        out: &mut Vec<u8>,
        entries: BTreeMap<u32, XrefEntry>,
        next_number: u32,
        eol: &[u8],
    ) -> Result<usize> {
        let xref_number = next_number;
        let size = xref_number + 1;
        let offset = out.len();

        // The stream indexes itself.
        let mut all = entries;
        all.insert(
            xref_number,
            XrefEntry::Normal {
                offset: offset as u32,
                generation: 0,
            },
        );

        let (rows, w) = encode_xref_rows(&all, size);
        let mut dict = self.trailer_for_output(size);
        dict.set("Type", "XRef");
        dict.set(
            "W",
            vec![
                Object::Integer(w[0] as i64),
                Object::Integer(w[1] as i64),
                Object::Integer(w[2] as i64),
            ],
        );
        let mut stream = Stream::new(dict, rows);
        stream.compress()?;

        // Never encrypted, whatever the security handler says.
        let object = Object::Stream(stream);
        write_indirect_object(out, (xref_number, 0), &object, eol, None, None)?;
        self.stats.xref_sections += 1;
        Ok(offset)
    }
}

/// Pick minimal big-endian field widths and encode every entry,
/// 0 through size-1, free entries chained in order.
fn encode_xref_rows(entries: &BTreeMap<u32, XrefEntry>, size: u32) -> (Vec<u8>, [usize; 3]) {
    let free_ids: Vec<u32> = (0..size).filter(|n| !entries.contains_key(n)).collect();
    let mut next_free: BTreeMap<u32, u32> = BTreeMap::new();
    let mut iter = free_ids.iter().peekable();
    while let Some(&id) = iter.next() {
        next_free.insert(id, iter.peek().map(|&&n| n).unwrap_or(0));
    }

    let mut fields: Vec<(u64, u64, u64)> = Vec::with_capacity(size as usize);
    for number in 0..size {
        let row = match entries.get(&number) {
            Some(XrefEntry::Normal { offset, generation }) => (1, *offset as u64, *generation as u64),
            Some(XrefEntry::Compressed { container, index }) => (2, *container as u64, *index as u64),
            Some(XrefEntry::Free { next, generation }) => (0, *next as u64, *generation as u64),
            Some(XrefEntry::UnusableFree) => (0, 0, 65535),
            None => {
                let next = next_free.get(&number).copied().unwrap_or(0) as u64;
                let generation = if number == 0 { 65535 } else { 0 };
                (0, next, generation)
            }
        };
        fields.push(row);
    }

    let width = |value: u64| -> usize {
        if value == 0 { 1 } else { (value.ilog2() / 8 + 1) as usize }
    };
    let w = [
        1,
        fields.iter().map(|f| width(f.1)).max().unwrap_or(1),
        fields.iter().map(|f| width(f.2)).max().unwrap_or(1),
    ];

    let mut rows = Vec::with_capacity(fields.len() * (w[0] + w[1] + w[2]));
    for (kind, second, third) in fields {
        push_be(&mut rows, kind, w[0]);
        push_be(&mut rows, second, w[1]);
        push_be(&mut rows, third, w[2]);
    }
    (rows, w)
}

fn push_be(out: &mut Vec<u8>, value: u64, width: usize) {
    for shift in (0..width).rev() {
        out.push((value >> (shift * 8)) as u8);
    }
}

fn write_indirect_object(
    out: &mut Vec<u8>,
    id: ObjectId,
    object: &Object,
    eol: &[u8],
    state: Option<&EncryptionState>,
    encrypt_ref: Option<ObjectId>,
) -> Result<()> {
    let mut encrypted;
    let object = match state {
        Some(state) if Some(id) != encrypt_ref => {
            encrypted = object.clone();
            encryption::encrypt_object(state, id, &mut encrypted)?;
            &encrypted
        }
        _ => object,
    };

    let mut buffer = itoa::Buffer::new();
    out.extend_from_slice(buffer.format(id.0).as_bytes());
    out.push(b' ');
    out.extend_from_slice(buffer.format(id.1).as_bytes());
    out.extend_from_slice(b" obj");
    out.extend_from_slice(eol);
    match object {
        Object::Stream(stream) => write_stream(out, stream, eol)?,
        other => serialize_object(out, other)?,
    }
    out.extend_from_slice(eol);
    out.extend_from_slice(b"endobj");
    out.extend_from_slice(eol);
    Ok(())
}

fn write_stream(out: &mut Vec<u8>, stream: &Stream, eol: &[u8]) -> Result<()> {
    let mut dict = stream.dict.clone();
    dict.set("Length", stream.content.len());
    serialize_object(out, &Object::Dictionary(dict))?;
    out.extend_from_slice(eol);
    out.extend_from_slice(b"stream");
    // The keyword is followed by LF or CRLF, never a lone CR.
    if eol == b"\r" {
        out.extend_from_slice(b"\r\n");
    } else {
        out.extend_from_slice(eol);
    }
    out.extend_from_slice(&stream.content);
    out.extend_from_slice(eol);
    out.extend_from_slice(b"endstream");
    Ok(())
}

/// Serialize one value in its direct form. Preserved string and name
/// forms re-emit the notation the document used.
pub(crate) fn serialize_object(out: &mut Vec<u8>, object: &Object) -> Result<()> {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(value) => {
            let mut buffer = itoa::Buffer::new();
            out.extend_from_slice(buffer.format(*value).as_bytes());
        }
        Object::Real(value) => {
            // Keep the decimal point so the value reads back as a real.
            if value.fract() == 0.0 {
                out.extend_from_slice(format!("{value:.1}").as_bytes());
            } else {
                out.extend_from_slice(format!("{value}").as_bytes());
            }
        }
        Object::Name(name) => write_name(out, name),
        Object::String(bytes, StringFormat::Literal) => write_literal_string(out, bytes),
        Object::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            for byte in bytes {
                out.extend_from_slice(format!("{byte:02X}").as_bytes());
            }
            out.push(b'>');
        }
        Object::Array(array) => {
            out.push(b'[');
            for (index, item) in array.iter().enumerate() {
                if index > 0 {
                    out.push(b' ');
                }
                serialize_object(out, item)?;
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => {
            out.extend_from_slice(b"<<");
            for (key, value) in dict {
                write_name(out, key);
                out.push(b' ');
                serialize_object(out, value)?;
            }
            out.extend_from_slice(b">>");
        }
        Object::Stream(stream) => {
            // Streams are indirect by definition; a nested one can only
            // be written through write_indirect_object.
            write_stream(out, stream, b"\n")?;
        }
        Object::Reference(id) => {
            let mut buffer = itoa::Buffer::new();
            out.extend_from_slice(buffer.format(id.0).as_bytes());
            out.push(b' ');
            out.extend_from_slice(buffer.format(id.1).as_bytes());
            out.extend_from_slice(b" R");
        }
    }
    Ok(())
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        let regular = byte > 0x20
            && byte < 0x7F
            && !matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#');
        if regular {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        }
    }
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
}
