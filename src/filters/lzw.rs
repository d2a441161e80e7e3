//! LZWDecode via weezl. PDF's EarlyChange=1 variant is weezl's TIFF
//! size switch.

use weezl::BitOrder;

use crate::error::{DecodeError, Result};
use crate::object::Dictionary;

fn early_change(parms: Option<&Dictionary>) -> bool {
    parms
        .and_then(|p| p.get(b"EarlyChange").ok())
        .and_then(|v| v.as_i64().ok())
        .map(|v| v != 0)
        .unwrap_or(true)
}

pub fn decode(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let mut decoder = if early_change(parms) {
        weezl::decode::Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        weezl::decode::Decoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::with_capacity(data.len() * 2);
    let result = decoder.into_stream(&mut output).decode_all(data);
    result.status.map_err(|err| DecodeError::Corrupt {
        filter: "LZWDecode",
        reason: err.to_string(),
    })?;
    Ok(output)
}

pub fn encode(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let mut encoder = if early_change(parms) {
        weezl::encode::Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        weezl::encode::Encoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::with_capacity(data.len());
    let result = encoder.into_stream(&mut output).encode_all(data);
    result.status.map_err(|err| DecodeError::Corrupt {
        filter: "LZWDecode",
        reason: err.to_string(),
    })?;
    Ok(output)
}
