//! FlateDecode over the zlib container.

use std::io::prelude::*;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::warn;

use crate::error::{DecodeError, Result};

pub fn decode(data: &[u8], relaxed: bool) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 2);
    let mut decoder = ZlibDecoder::new(data);
    match decoder.read_to_end(&mut output) {
        Ok(_) => Ok(output),
        Err(err) => {
            // Trailing garbage after a complete deflate body is common
            // enough that relaxed mode keeps the decoded prefix.
            if relaxed && !output.is_empty() {
                warn!("FlateDecode: keeping {} bytes before error: {err}", output.len());
                Ok(output)
            } else {
                Err(DecodeError::Corrupt {
                    filter: "FlateDecode",
                    reason: err.to_string(),
                }
                .into())
            }
        }
    }
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(decode(&encode(&data), false).unwrap(), data);
    }

    #[test]
    fn corrupt_data_is_an_error_in_strict() {
        assert!(decode(b"not a zlib stream", false).is_err());
    }

    #[test]
    fn trailing_garbage_tolerated_when_relaxed() {
        let mut data = encode(b"payload");
        data.extend_from_slice(b"GARBAGEGARBAGE");
        assert_eq!(decode(&data, true).unwrap(), b"payload");
        assert!(decode(&data, false).is_err() || decode(&data, false).unwrap() == b"payload");
    }
}
