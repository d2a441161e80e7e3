//! Stream filter pipeline: composable encode/decode chains for the
//! standard filters and their predictors.

pub mod ascii;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod rle;

use crate::error::{DecodeError, Error, Result};
use crate::object::Dictionary;

/// Standard filter names, abbreviations included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    AsciiHex,
    Ascii85,
    Lzw,
    Flate,
    RunLength,
    CcittFax,
    Dct,
    Jbig2,
    Jpx,
    Crypt,
}

impl Filter {
    pub fn from_name(name: &[u8]) -> Result<Filter> {
        match name {
            b"ASCIIHexDecode" | b"AHx" => Ok(Filter::AsciiHex),
            b"ASCII85Decode" | b"A85" => Ok(Filter::Ascii85),
            b"LZWDecode" | b"LZW" => Ok(Filter::Lzw),
            b"FlateDecode" | b"Fl" => Ok(Filter::Flate),
            b"RunLengthDecode" | b"RL" => Ok(Filter::RunLength),
            b"CCITTFaxDecode" | b"CCF" => Ok(Filter::CcittFax),
            b"DCTDecode" | b"DCT" => Ok(Filter::Dct),
            b"JBIG2Decode" => Ok(Filter::Jbig2),
            b"JPXDecode" => Ok(Filter::Jpx),
            b"Crypt" => Ok(Filter::Crypt),
            _ => Err(DecodeError::UnknownFilter(String::from_utf8_lossy(name).into_owned()).into()),
        }
    }

    pub fn name(self) -> &'static [u8] {
        match self {
            Filter::AsciiHex => b"ASCIIHexDecode",
            Filter::Ascii85 => b"ASCII85Decode",
            Filter::Lzw => b"LZWDecode",
            Filter::Flate => b"FlateDecode",
            Filter::RunLength => b"RunLengthDecode",
            Filter::CcittFax => b"CCITTFaxDecode",
            Filter::Dct => b"DCTDecode",
            Filter::Jbig2 => b"JBIG2Decode",
            Filter::Jpx => b"JPXDecode",
            Filter::Crypt => b"Crypt",
        }
    }

    /// Image codecs the pipeline recognizes but does not transcode;
    /// their payloads pass through and the filter entry is preserved on
    /// write.
    pub fn is_image(self) -> bool {
        matches!(self, Filter::CcittFax | Filter::Dct | Filter::Jbig2 | Filter::Jpx)
    }
}

/// Decode one filter stage.
pub fn decode(filter: Filter, data: &[u8], parms: Option<&Dictionary>, relaxed: bool) -> Result<Vec<u8>> {
    match filter {
        Filter::AsciiHex => ascii::hex_decode(data),
        Filter::Ascii85 => ascii::a85_decode(data),
        Filter::Lzw => {
            let decoded = lzw::decode(data, parms)?;
            predictor::reverse(decoded, parms)
        }
        Filter::Flate => {
            let decoded = flate::decode(data, relaxed)?;
            predictor::reverse(decoded, parms)
        }
        Filter::RunLength => rle::decode(data),
        Filter::Crypt => crypt_identity(data, parms),
        Filter::CcittFax => Err(Error::Unsupported("CCITTFaxDecode")),
        Filter::Dct => Err(Error::Unsupported("DCTDecode")),
        Filter::Jbig2 => Err(Error::Unsupported("JBIG2Decode")),
        Filter::Jpx => Err(Error::Unsupported("JPXDecode")),
    }
}

/// Encode one filter stage.
pub fn encode(filter: Filter, data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    match filter {
        Filter::AsciiHex => Ok(ascii::hex_encode(data)),
        Filter::Ascii85 => Ok(ascii::a85_encode(data)),
        Filter::Lzw => {
            let shifted = predictor::apply(data, parms)?;
            lzw::encode(&shifted, parms)
        }
        Filter::Flate => {
            let shifted = predictor::apply(data, parms)?;
            Ok(flate::encode(&shifted))
        }
        Filter::RunLength => Ok(rle::encode(data)),
        Filter::Crypt => crypt_identity(data, parms),
        _ => Err(Error::Unsupported("re-encoding an image filter")),
    }
}

/// Run the whole declared chain in decode order. Image filters abort
/// with Unsupported; the caller decides whether that is fatal.
pub fn decode_chain(
    data: &[u8],
    filters: &[Vec<u8>],
    parms: &[Option<Dictionary>],
    relaxed: bool,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for (index, name) in filters.iter().enumerate() {
        let filter = Filter::from_name(name)?;
        let stage_parms = parms.get(index).and_then(Option::as_ref);
        current = decode(filter, &current, stage_parms, relaxed)?;
    }
    Ok(current)
}

/// A Crypt filter entry at pipeline level is only honored for the
/// Identity transform; anything else is the security handler's business.
fn crypt_identity(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let name = parms
        .and_then(|p| p.get(b"Name").ok())
        .and_then(|n| n.as_name().ok())
        .unwrap_or(b"Identity");
    if name == b"Identity" {
        Ok(data.to_vec())
    } else {
        Err(Error::Unsupported("non-identity Crypt filter in a filter chain"))
    }
}
