use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, Result};

impl Context {
    /// Read a PDF document from a file path.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P, config: Config) -> Result<Context> {
        let file = File::open(path)?;
        let capacity = Some(file.metadata()?.len() as usize);
        Self::load_internal(file, capacity, config)
    }

    /// Read a PDF document from an arbitrary source.
    #[inline]
    pub fn load_from<R: Read>(source: R, config: Config) -> Result<Context> {
        Self::load_internal(source, None, config)
    }

    /// Read a PDF document from a memory slice.
    #[inline]
    pub fn load_mem(buffer: &[u8], config: Config) -> Result<Context> {
        Self::read_internal(buffer.to_vec(), config)
    }

    fn load_internal<R: Read>(mut source: R, capacity: Option<usize>, config: Config) -> Result<Context> {
        let mut buffer = capacity.map(Vec::with_capacity).unwrap_or_default();
        source.read_to_end(&mut buffer)?;
        Self::read_internal(buffer, config)
    }
}

impl TryFrom<&[u8]> for Context {
    type Error = Error;

    fn try_from(buffer: &[u8]) -> Result<Context> {
        Context::load_mem(buffer, Config::default())
    }
}
