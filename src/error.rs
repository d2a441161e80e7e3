use thiserror::Error;

use crate::object::ObjectId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
    #[error("cross-reference error: {0}")]
    Xref(#[from] XrefError),
    #[error("stream decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("encryption error: {0}")]
    Encryption(#[from] EncryptionError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),

    #[error("object {0:?} not found")]
    ObjectNotFound(ObjectId),
    #[error("reference cycle resolving object {0:?}")]
    ReferenceCycle(ObjectId),
    #[error("invalid byte offset: {0}")]
    InvalidOffset(usize),
    #[error("invalid stream: {0}")]
    InvalidStream(String),
    #[error("dictionary key not found: {0}")]
    DictKey(String),
    #[error("expected {expected}, found {found}")]
    ObjectType { expected: &'static str, found: &'static str },
    #[error("numeric value does not fit: {0}")]
    NumericCast(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing or damaged file header")]
    InvalidFileHeader,
    #[error("object at offset {0} could not be parsed")]
    InvalidObject(usize),
    #[error("indirect object header does not match the expected id {0:?}")]
    ObjectIdMismatch(ObjectId),
    #[error("stream keyword without enclosing dictionary")]
    StreamDictMissing,
    #[error("stream Length of object {0:?} is missing or wrong")]
    StreamLength(ObjectId),
    #[error("endstream keyword not found")]
    EndstreamNotFound,
    #[error("stream object inside an object stream")]
    StreamInObjStm,
    #[error("object stream header is malformed")]
    InvalidObjectStream,
    #[error("literal string nesting exceeds limit")]
    BracketLimit,
    #[error("invalid cross-reference data")]
    InvalidXref,
    #[error("trailer dictionary is missing or damaged")]
    InvalidTrailer,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XrefError {
    #[error("startxref not found")]
    Start,
    #[error("xref offset points outside the file")]
    OffsetOutOfBounds,
    #[error("Prev offset points outside the file")]
    PrevStart,
    #[error("XRefStm offset points outside the file")]
    StreamStart,
    #[error("xref entry for object {0} is missing")]
    EntryMissing(u32),
    #[error("xref stream W widths are invalid")]
    StreamWidths,
    #[error("xref table could not be parsed")]
    Parse,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{filter}: truncated input")]
    Truncated { filter: &'static str },
    #[error("{filter}: corrupt input: {reason}")]
    Corrupt { filter: &'static str, reason: String },
    #[error("unknown filter name: {0}")]
    UnknownFilter(String),
    #[error("predictor {0} is not supported")]
    InvalidPredictor(i64),
    #[error("predictor row is incomplete")]
    PredictorRow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("the supplied password is incorrect")]
    WrongPassword,
    #[error("encryption dictionary is missing or damaged")]
    InvalidEncryptDict,
    #[error("unsupported security handler version V={0}")]
    UnsupportedVersion(i64),
    #[error("unsupported security handler revision R={0}")]
    UnsupportedRevision(i64),
    #[error("key length {0} is outside the allowed set")]
    InvalidKeyLength(u16),
    #[error("unsupported crypt filter method")]
    UnsupportedCryptFilter,
    #[error("encrypted payload is malformed")]
    InvalidCiphertext,
    #[error("document has no file identifier")]
    MissingFileId,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("trailer has no Root entry")]
    MissingRoot,
    #[error("catalog is not a dictionary")]
    InvalidCatalog,
    #[error("{dict}: required entry {key} is missing")]
    MissingEntry { dict: &'static str, key: &'static str },
    #[error("{dict}: entry {key} has the wrong type")]
    WrongType { dict: &'static str, key: &'static str },
    #[error("page tree is cyclic or malformed")]
    InvalidPageTree,
    #[error("page tree Count is {found}, counted {counted}")]
    PageCount { found: i64, counted: i64 },
}
