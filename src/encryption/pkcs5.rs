use aes::cipher::block_padding::{PadType, RawPadding, UnpadError};

/// PKCS#5 padding over the 16-byte AES block: every added byte carries
/// the pad length.
///
/// Differs from the generic PKCS#7 rules only in being fixed to small
/// blocks; stream payloads written by this handler always pad, even
/// when the plaintext is already block-aligned.
#[derive(Clone, Copy, Debug)]
pub struct Pkcs5;

impl RawPadding for Pkcs5 {
    const TYPE: PadType = PadType::Reversible;

    #[inline]
    fn raw_pad(block: &mut [u8], pos: usize) {
        debug_assert!(block.len() <= 16, "block too large for PKCS#5");
        debug_assert!(pos < block.len(), "no room left to pad");
        let pad = (block.len() - pos) as u8;
        for byte in &mut block[pos..] {
            *byte = pad;
        }
    }

    #[inline]
    fn raw_unpad(block: &[u8]) -> Result<&[u8], UnpadError> {
        if block.is_empty() || block.len() > 16 {
            return Err(UnpadError);
        }
        let pad = block[block.len() - 1] as usize;
        if pad == 0 || pad > block.len() {
            return Err(UnpadError);
        }
        let body = block.len() - pad;
        if block[body..block.len() - 1].iter().any(|&b| b as usize != pad) {
            return Err(UnpadError);
        }
        Ok(&block[..body])
    }
}
