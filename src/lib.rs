//! A PDF processing engine: read a document into a typed object graph,
//! transform it, and write it back out as a conforming file.
//!
//! The [`Context`] is the handle everything goes through. Reading
//! reconstructs the cross-reference table (classical tables, xref
//! streams, hybrid files and incremental-update chains) and exposes a
//! lazy object store; [`ops`] provides the core command primitives
//! (validate, optimize, encrypt, decrypt, rekey); writing serializes
//! the graph with either xref form, optionally packing objects into
//! object streams.
//!
//! ```no_run
//! use pdfmill::{Config, Context};
//!
//! let mut ctx = Context::load("input.pdf", Config::default())?;
//! pdfmill::ops::optimize(&mut ctx)?;
//! ctx.save("output.pdf")?;
//! # Ok::<(), pdfmill::Error>(())
//! ```

mod config;
mod context;
pub mod encryption;
mod error;
pub mod filters;
mod object;
mod object_stream;
pub mod ops;
mod parser;
mod reader;
mod source;
pub mod stats;
mod validate;
mod writer;
mod xref;

pub use config::{Cmd, Config, Eol, PERMISSIONS_ALL, PERMISSIONS_NONE, Permissions, Units, ValidationMode};
pub use context::Context;
pub use encryption::{CryptMethod, EncryptOptions, EncryptionState};
pub use error::{
    DecodeError, EncryptionError, Error, ParseError, Result, ValidationError, XrefError,
};
pub use object::{Dictionary, Object, ObjectId, Stream, StringFormat};
pub use object_stream::{ObjectStream, ObjectStreamBuilder, ObjectStreamConfig};
pub use source::ByteSource;
pub use stats::Stats;
pub use xref::{Xref, XrefEntry};
