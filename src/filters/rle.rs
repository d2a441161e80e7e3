//! RunLengthDecode.

use crate::error::{DecodeError, Result};

const EOD: u8 = 128;

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0usize;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            EOD => return Ok(out),
            0..=127 => {
                let count = length as usize + 1;
                let run = data.get(i..i + count).ok_or(DecodeError::Truncated {
                    filter: "RunLengthDecode",
                })?;
                out.extend_from_slice(run);
                i += count;
            }
            _ => {
                let count = 257 - length as usize;
                let byte = *data.get(i).ok_or(DecodeError::Truncated {
                    filter: "RunLengthDecode",
                })?;
                out.extend(std::iter::repeat_n(byte, count));
                i += 1;
            }
        }
    }
    // Missing EOD is tolerated; everything decoded is returned.
    Ok(out)
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 127 + 2);
    let mut i = 0usize;
    while i < data.len() {
        // Length of the run starting here.
        let byte = data[i];
        let mut run = 1usize;
        while run < 128 && i + run < data.len() && data[i + run] == byte {
            run += 1;
        }
        if run >= 3 {
            out.push((257 - run) as u8);
            out.push(byte);
            i += run;
            continue;
        }
        // Literal segment up to the next run of 3 or the 128-byte cap.
        let start = i;
        let mut end = i + run;
        while end < data.len() && end - start < 128 {
            let byte = data[end];
            let mut next_run = 1usize;
            while next_run < 3 && end + next_run < data.len() && data[end + next_run] == byte {
                next_run += 1;
            }
            if next_run >= 3 {
                break;
            }
            end += 1;
        }
        let end = end.min(start + 128);
        out.push((end - start - 1) as u8);
        out.extend_from_slice(&data[start..end]);
        i = end;
    }
    out.push(EOD);
    out
}
