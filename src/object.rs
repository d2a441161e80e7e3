use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Object identifier: object number and generation number.
pub type ObjectId = (u32, u16);

/// Source form of a string object, kept so the writer can re-emit the
/// same notation the document used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Literal,
    Hexadecimal,
}

/// A PDF value.
#[derive(Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    String(Vec<u8>, StringFormat),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

/// Dictionary object, insertion order preserved.
#[derive(Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<Vec<u8>, Object>);

/// Stream object: dictionary plus the raw (still encoded) payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    /// Raw payload exactly as stored in the file.
    pub content: Vec<u8>,
    /// Filter-pipeline inverse of `content`, filled lazily.
    pub decoded: Option<Vec<u8>>,
    /// Byte offset of the payload in the source, recorded at parse time.
    pub start_position: Option<usize>,
}

impl Object {
    pub fn string_literal<S: Into<Vec<u8>>>(s: S) -> Self {
        Object::String(s.into(), StringFormat::Literal)
    }

    pub fn name<S: Into<Vec<u8>>>(s: S) -> Self {
        Object::Name(s.into())
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::Name(_) => "Name",
            Object::String(..) => "String",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    fn wrong_type(&self, expected: &'static str) -> Error {
        Error::ObjectType {
            expected,
            found: self.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(value) => Ok(*value),
            _ => Err(self.wrong_type("Boolean")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Object::Integer(value) => Ok(*value),
            _ => Err(self.wrong_type("Integer")),
        }
    }

    /// Integer or real, as f32.
    pub fn as_float(&self) -> Result<f32> {
        match self {
            Object::Integer(value) => Ok(*value as f32),
            Object::Real(value) => Ok(*value),
            _ => Err(self.wrong_type("Real")),
        }
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(name) => Ok(name),
            _ => Err(self.wrong_type("Name")),
        }
    }

    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(bytes, _) => Ok(bytes),
            _ => Err(self.wrong_type("String")),
        }
    }

    pub fn as_str_mut(&mut self) -> Result<&mut Vec<u8>> {
        match self {
            Object::String(bytes, _) => Ok(bytes),
            _ => Err(self.wrong_type("String")),
        }
    }

    pub fn as_array(&self) -> Result<&Vec<Object>> {
        match self {
            Object::Array(array) => Ok(array),
            _ => Err(self.wrong_type("Array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Object>> {
        match self {
            Object::Array(array) => Ok(array),
            _ => Err(self.wrong_type("Array")),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&stream.dict),
            _ => Err(self.wrong_type("Dictionary")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&mut stream.dict),
            _ => Err(self.wrong_type("Dictionary")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(self.wrong_type("Stream")),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(self.wrong_type("Stream")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(id) => Ok(*id),
            _ => Err(self.wrong_type("Reference")),
        }
    }

    /// Decode a text string: UTF-16BE when BOM-prefixed, byte encoding
    /// otherwise.
    pub fn as_text_string(&self) -> Result<String> {
        let bytes = self.as_str()?;
        if bytes.starts_with(&[0xFE, 0xFF]) {
            let (text, _, _) = encoding_rs::UTF_16BE.decode(&bytes[2..]);
            Ok(text.into_owned())
        } else {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            Ok(text.into_owned())
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Integer(value)
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Object::Integer(value as i64)
    }
}

impl From<u32> for Object {
    fn from(value: u32) -> Self {
        Object::Integer(value as i64)
    }
}

impl From<usize> for Object {
    fn from(value: usize) -> Self {
        Object::Integer(value as i64)
    }
}

impl From<f32> for Object {
    fn from(value: f32) -> Self {
        Object::Real(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::Name(value.as_bytes().to_vec())
    }
}

impl From<Vec<Object>> for Object {
    fn from(value: Vec<Object>) -> Self {
        Object::Array(value)
    }
}

impl From<Dictionary> for Object {
    fn from(value: Dictionary) -> Self {
        Object::Dictionary(value)
    }
}

impl From<Stream> for Object {
    fn from(value: Stream) -> Self {
        Object::Stream(value)
    }
}

impl From<ObjectId> for Object {
    fn from(value: ObjectId) -> Self {
        Object::Reference(value)
    }
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary(IndexMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.0
            .get(key)
            .ok_or_else(|| Error::DictKey(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Object> {
        self.0
            .get_mut(key)
            .ok_or_else(|| Error::DictKey(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    /// True when the Type entry equals the given name.
    pub fn has_type(&self, type_name: &[u8]) -> bool {
        self.get(b"Type")
            .and_then(Object::as_name)
            .map(|name| name == type_name)
            .unwrap_or(false)
    }

    pub fn set<K: Into<Vec<u8>>, V: Into<Object>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Vec<u8>, Object> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, Vec<u8>, Object> {
        self.0.iter_mut()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Vec<u8>, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, Vec<u8>, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Vec<u8>, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (Vec<u8>, Object)>>(iter: T) -> Self {
        Dictionary(IndexMap::from_iter(iter))
    }
}

impl Stream {
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Stream {
        dict.set("Length", content.len());
        Stream {
            dict,
            content,
            decoded: None,
            start_position: None,
        }
    }

    /// Replace the raw payload, updating Length and dropping the stale
    /// decoded slot.
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.dict.set("Length", content.len());
        self.content = content;
        self.decoded = None;
    }

    /// Replace the payload with already-decoded bytes and drop the filter
    /// chain.
    pub fn set_plain_content(&mut self, content: Vec<u8>) {
        self.dict.remove(b"Filter");
        self.dict.remove(b"DecodeParms");
        self.set_content(content);
    }

    /// Filter names declared on this stream, outermost first.
    pub fn filters(&self) -> Vec<Vec<u8>> {
        match self.dict.get(b"Filter") {
            Ok(Object::Name(name)) => vec![name.clone()],
            Ok(Object::Array(names)) => names
                .iter()
                .filter_map(|n| n.as_name().ok().map(|n| n.to_vec()))
                .collect(),
            _ => vec![],
        }
    }

    /// Run the declared filter chain over the raw payload.
    pub fn decompressed_content(&self, relaxed: bool) -> Result<Vec<u8>> {
        let filters = self.filters();
        if filters.is_empty() {
            return Ok(self.content.clone());
        }
        crate::filters::decode_chain(&self.content, &filters, &self.decode_parms(), relaxed)
    }

    /// Fill the decoded slot; at most one decode per stream.
    pub fn decompress(&mut self, relaxed: bool) -> Result<()> {
        if self.decoded.is_none() {
            self.decoded = Some(self.decompressed_content(relaxed)?);
        }
        Ok(())
    }

    /// Flate-compress plain content, replacing the payload and filter
    /// chain. Streams already carrying filters are left alone.
    pub fn compress(&mut self) -> Result<()> {
        if self.dict.has(b"Filter") {
            return Ok(());
        }
        let compressed = crate::filters::flate::encode(&self.content);
        if compressed.len() < self.content.len() {
            self.dict.set("Filter", "FlateDecode");
            self.set_content(compressed);
        }
        Ok(())
    }

    /// DecodeParms dictionaries aligned with `filters()`.
    pub fn decode_parms(&self) -> Vec<Option<Dictionary>> {
        let count = self.filters().len().max(1);
        match self.dict.get(b"DecodeParms").or_else(|_| self.dict.get(b"DP")) {
            Ok(Object::Dictionary(dict)) => vec![Some(dict.clone())],
            Ok(Object::Array(parms)) => parms
                .iter()
                .map(|p| p.as_dict().ok().cloned())
                .collect(),
            _ => vec![None; count],
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Object::Null => f.write_str("null"),
            Object::Boolean(value) => write!(f, "{value}"),
            Object::Integer(value) => write!(f, "{value}"),
            Object::Real(value) => write!(f, "{value}"),
            Object::Name(name) => write!(f, "/{}", String::from_utf8_lossy(name)),
            Object::String(bytes, _) => write!(f, "({})", String::from_utf8_lossy(bytes)),
            Object::Array(array) => f.debug_list().entries(array).finish(),
            Object::Dictionary(dict) => dict.fmt(f),
            Object::Stream(stream) => write!(f, "stream[{}] {:?}", stream.content.len(), stream.dict),
            Object::Reference(id) => write!(f, "{} {} R", id.0, id.1),
        }
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("<<")?;
        for (key, value) in self {
            write!(f, "/{} {:?}", String::from_utf8_lossy(key), value)?;
        }
        f.write_str(">>")
    }
}

/// Build a [`Dictionary`] from literal key/value pairs.
#[macro_export]
macro_rules! dictionary {
    () => { $crate::Dictionary::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut dict = $crate::Dictionary::new();
        $(
            dict.set($key, $value);
        )+
        dict
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_preserves_insertion_order() {
        let dict = crate::dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference((2, 0)),
            "Lang" => Object::string_literal("en"),
        };
        let keys: Vec<_> = dict.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![&b"Type"[..], b"Pages", b"Lang"]);
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let mut dict = Dictionary::new();
        dict.set("Length", 5);
        dict.set("Length", 10);
        assert_eq!(dict.get(b"Length").unwrap().as_i64().unwrap(), 10);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn stream_set_content_updates_length() {
        let mut stream = Stream::new(Dictionary::new(), b"abc".to_vec());
        assert_eq!(stream.dict.get(b"Length").unwrap().as_i64().unwrap(), 3);
        stream.set_content(b"abcdef".to_vec());
        assert_eq!(stream.dict.get(b"Length").unwrap().as_i64().unwrap(), 6);
        assert!(stream.decoded.is_none());
    }

    #[test]
    fn text_string_utf16() {
        let s = Object::String(vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69], StringFormat::Literal);
        assert_eq!(s.as_text_string().unwrap(), "Hi");
    }
}
