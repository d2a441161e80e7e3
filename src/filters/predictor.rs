//! TIFF and PNG predictors applied around Flate and LZW.

use crate::error::{DecodeError, Result};
use crate::object::Dictionary;

#[derive(Debug, Clone, Copy)]
pub struct Predictor {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Predictor {
    pub fn from_parms(parms: Option<&Dictionary>) -> Result<Option<Predictor>> {
        let Some(parms) = parms else { return Ok(None) };
        let get = |key: &[u8], default: i64| {
            parms
                .get(key)
                .ok()
                .and_then(|v| v.as_i64().ok())
                .unwrap_or(default)
        };
        let predictor = get(b"Predictor", 1);
        if predictor <= 1 {
            return Ok(None);
        }
        if predictor != 2 && !(10..=15).contains(&predictor) {
            return Err(DecodeError::InvalidPredictor(predictor).into());
        }
        Ok(Some(Predictor {
            predictor,
            colors: get(b"Colors", 1).max(1) as usize,
            bits_per_component: get(b"BitsPerComponent", 8).max(1) as usize,
            columns: get(b"Columns", 1).max(1) as usize,
        }))
    }

    /// Bytes per complete pixel, at least one.
    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }

    /// Bytes per row of samples.
    fn bytes_per_row(&self) -> usize {
        (self.colors * self.bits_per_component * self.columns).div_ceil(8)
    }
}

/// Undo the predictor after decompression.
pub fn reverse(data: Vec<u8>, parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    match Predictor::from_parms(parms)? {
        None => Ok(data),
        Some(p) if p.predictor == 2 => tiff_reverse(data, &p),
        Some(p) => png_reverse(&data, &p),
    }
}

/// Apply the predictor before compression.
pub fn apply(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    match Predictor::from_parms(parms)? {
        None => Ok(data.to_vec()),
        Some(p) if p.predictor == 2 => tiff_apply(data, &p),
        Some(p) => png_apply(data, &p),
    }
}

fn tiff_reverse(mut data: Vec<u8>, p: &Predictor) -> Result<Vec<u8>> {
    let row_len = p.bytes_per_row();
    match p.bits_per_component {
        8 => {
            for row in data.chunks_mut(row_len) {
                for i in p.colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - p.colors]);
                }
            }
            Ok(data)
        }
        16 => {
            let stride = p.colors * 2;
            for row in data.chunks_mut(row_len) {
                let mut i = stride;
                while i + 1 < row.len() {
                    let prev = u16::from_be_bytes([row[i - stride], row[i - stride + 1]]);
                    let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                    let sum = cur.wrapping_add(prev).to_be_bytes();
                    row[i] = sum[0];
                    row[i + 1] = sum[1];
                    i += 2;
                }
            }
            Ok(data)
        }
        bits => Err(DecodeError::Corrupt {
            filter: "TIFF predictor",
            reason: format!("unsupported {bits} bits per component"),
        }
        .into()),
    }
}

fn tiff_apply(data: &[u8], p: &Predictor) -> Result<Vec<u8>> {
    let row_len = p.bytes_per_row();
    match p.bits_per_component {
        8 => {
            let mut out = data.to_vec();
            for (row_out, row_in) in out.chunks_mut(row_len).zip(data.chunks(row_len)) {
                for i in (p.colors..row_out.len()).rev() {
                    row_out[i] = row_in[i].wrapping_sub(row_in[i - p.colors]);
                }
            }
            Ok(out)
        }
        16 => {
            let stride = p.colors * 2;
            let mut out = data.to_vec();
            for (row_out, row_in) in out.chunks_mut(row_len).zip(data.chunks(row_len)) {
                let mut i = stride;
                while i + 1 < row_out.len() {
                    let prev = u16::from_be_bytes([row_in[i - stride], row_in[i - stride + 1]]);
                    let cur = u16::from_be_bytes([row_in[i], row_in[i + 1]]);
                    let diff = cur.wrapping_sub(prev).to_be_bytes();
                    row_out[i] = diff[0];
                    row_out[i + 1] = diff[1];
                    i += 2;
                }
            }
            Ok(out)
        }
        bits => Err(DecodeError::Corrupt {
            filter: "TIFF predictor",
            reason: format!("unsupported {bits} bits per component"),
        }
        .into()),
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    // Tie order is significant: left, then above, then upper-left.
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// PNG reconstruction. Every row carries its own selector byte, whatever
/// the declared predictor value says.
fn png_reverse(data: &[u8], p: &Predictor) -> Result<Vec<u8>> {
    let row_len = p.bytes_per_row();
    let bpp = p.bytes_per_pixel();
    let mut out: Vec<u8> = Vec::with_capacity(data.len());
    let mut prior = vec![0u8; row_len];

    for raw_row in data.chunks(row_len + 1) {
        if raw_row.len() != row_len + 1 {
            return Err(DecodeError::PredictorRow.into());
        }
        let selector = raw_row[0];
        let mut row = raw_row[1..].to_vec();
        for i in 0..row.len() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prior.get(i).copied().unwrap_or(0);
            let up_left = if i >= bpp { prior.get(i - bpp).copied().unwrap_or(0) } else { 0 };
            row[i] = match selector {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add((((left as u16) + (up as u16)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                s => return Err(DecodeError::InvalidPredictor(s as i64).into()),
            };
        }
        prior.clear();
        prior.extend_from_slice(&row);
        prior.resize(row_len, 0);
        out.extend_from_slice(&row);
    }
    Ok(out)
}

fn png_apply(data: &[u8], p: &Predictor) -> Result<Vec<u8>> {
    let row_len = p.bytes_per_row();
    let bpp = p.bytes_per_pixel();
    // 15 (optimum) picks per row; everything else maps to one selector.
    let fixed_selector = match p.predictor {
        10 => Some(0u8),
        11 => Some(1),
        12 => Some(2),
        13 => Some(3),
        14 => Some(4),
        _ => None,
    };
    let mut out = Vec::with_capacity(data.len() + data.len() / row_len.max(1) + 1);
    let mut prior = vec![0u8; row_len];

    for row in data.chunks(row_len) {
        let filter_row = |selector: u8| -> Vec<u8> {
            let mut encoded = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                let left = if i >= bpp { row[i - bpp] } else { 0 };
                let up = prior.get(i).copied().unwrap_or(0);
                let up_left = if i >= bpp { prior.get(i - bpp).copied().unwrap_or(0) } else { 0 };
                let value = match selector {
                    1 => row[i].wrapping_sub(left),
                    2 => row[i].wrapping_sub(up),
                    3 => row[i].wrapping_sub((((left as u16) + (up as u16)) / 2) as u8),
                    4 => row[i].wrapping_sub(paeth(left, up, up_left)),
                    _ => row[i],
                };
                encoded.push(value);
            }
            encoded
        };

        let (selector, encoded) = match fixed_selector {
            Some(s) => (s, filter_row(s)),
            None => (0..=4u8)
                .map(|s| (s, filter_row(s)))
                .min_by_key(|(_, encoded)| {
                    encoded.iter().map(|&b| (b as i8).unsigned_abs() as u64).sum::<u64>()
                })
                .unwrap_or((0, row.to_vec())),
        };
        out.push(selector);
        out.extend_from_slice(&encoded);
        prior.clear();
        prior.extend_from_slice(row);
        prior.resize(row_len, 0);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    fn parms(predictor: i64, colors: i64, bits: i64, columns: i64) -> Dictionary {
        dictionary! {
            "Predictor" => predictor,
            "Colors" => colors,
            "BitsPerComponent" => bits,
            "Columns" => columns,
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 31 + i / 5) % 256) as u8).collect()
    }

    #[test]
    fn png_predictors_invert() {
        for predictor in [10i64, 11, 12, 13, 14, 15] {
            let parms = parms(predictor, 3, 8, 16);
            let data = sample(3 * 16 * 8);
            let filtered = apply(&data, Some(&parms)).unwrap();
            assert_eq!(reverse(filtered, Some(&parms)).unwrap(), data, "predictor {predictor}");
        }
    }

    #[test]
    fn tiff_predictor_inverts() {
        let parms8 = parms(2, 3, 8, 10);
        let data = sample(3 * 10 * 4);
        let filtered = apply(&data, Some(&parms8)).unwrap();
        assert_eq!(reverse(filtered, Some(&parms8)).unwrap(), data);

        let parms16 = parms(2, 1, 16, 12);
        let data = sample(24 * 6);
        let filtered = apply(&data, Some(&parms16)).unwrap();
        assert_eq!(reverse(filtered, Some(&parms16)).unwrap(), data);
    }

    #[test]
    fn predictor_one_is_identity() {
        let parms = parms(1, 1, 8, 5);
        let data = sample(25);
        assert_eq!(apply(&data, Some(&parms)).unwrap(), data);
        assert_eq!(reverse(data.clone(), Some(&parms)).unwrap(), data);
    }

    #[test]
    fn unknown_predictor_rejected() {
        let parms = parms(7, 1, 8, 5);
        assert!(apply(&sample(10), Some(&parms)).is_err());
    }

    #[test]
    fn xref_width_rows_reverse() {
        // The common shape of xref stream payloads: Up predictor over
        // narrow integer rows.
        let parms = parms(12, 1, 8, 5);
        let rows: Vec<u8> = vec![
            1, 0, 0, 0, 17, //
            1, 0, 0, 0, 81, //
            2, 0, 0, 1, 3,
        ];
        let filtered = apply(&rows, Some(&parms)).unwrap();
        assert_eq!(reverse(filtered, Some(&parms)).unwrap(), rows);
    }
}
