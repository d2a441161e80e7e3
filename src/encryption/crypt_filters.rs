//! AES transforms used by the standard security handler.
//!
//! Content encryption is AES-CBC with a random 16-byte IV prepended to
//! the ciphertext; key wrapping (UE/OE) is AES-256-CBC with a zero IV
//! and no padding; the Perms blob is AES-256-ECB.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};
use rand::RngCore;

use super::pkcs5::Pkcs5;
use crate::error::EncryptionError;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256EcbEnc = ecb::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

pub const AES_BLOCK: usize = 16;

fn random_iv() -> [u8; AES_BLOCK] {
    let mut iv = [0u8; AES_BLOCK];
    rand::rng().fill_bytes(&mut iv);
    iv
}

pub fn aes_cbc_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let iv = random_iv();
    let ciphertext = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, &iv)
            .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?
            .encrypt_padded_vec_mut::<Pkcs5>(data),
        32 => Aes256CbcEnc::new_from_slices(key, &iv)
            .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?
            .encrypt_padded_vec_mut::<Pkcs5>(data),
        len => return Err(EncryptionError::InvalidKeyLength(len as u16 * 8)),
    };
    let mut out = Vec::with_capacity(AES_BLOCK + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn aes_cbc_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_BLOCK || (data.len() - AES_BLOCK) % AES_BLOCK != 0 {
        return Err(EncryptionError::InvalidCiphertext);
    }
    let (iv, ciphertext) = data.split_at(AES_BLOCK);
    match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?
            .decrypt_padded_vec_mut::<Pkcs5>(ciphertext)
            .map_err(|_| EncryptionError::InvalidCiphertext),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?
            .decrypt_padded_vec_mut::<Pkcs5>(ciphertext)
            .map_err(|_| EncryptionError::InvalidCiphertext),
        len => Err(EncryptionError::InvalidKeyLength(len as u16 * 8)),
    }
}

/// AES-128-CBC without padding, caller-provided IV. Used by the
/// revision 6 iterated hash.
pub fn aes128_cbc_nopad_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() % AES_BLOCK != 0 {
        return Err(EncryptionError::InvalidCiphertext);
    }
    let encryptor = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?;
    Ok(encryptor.encrypt_padded_vec_mut::<NoPadding>(data))
}

/// AES-256-CBC with a zero IV and no padding. Wraps and unwraps the
/// file key stored in UE/OE.
pub fn aes256_cbc_zero_iv_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() % AES_BLOCK != 0 {
        return Err(EncryptionError::InvalidCiphertext);
    }
    let encryptor = Aes256CbcEnc::new_from_slices(key, &[0u8; AES_BLOCK])
        .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?;
    Ok(encryptor.encrypt_padded_vec_mut::<NoPadding>(data))
}

pub fn aes256_cbc_zero_iv_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() % AES_BLOCK != 0 {
        return Err(EncryptionError::InvalidCiphertext);
    }
    Aes256CbcDec::new_from_slices(key, &[0u8; AES_BLOCK])
        .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .map_err(|_| EncryptionError::InvalidCiphertext)
}

/// AES-256-ECB over the 16-byte Perms blob.
pub fn aes256_ecb_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() % AES_BLOCK != 0 {
        return Err(EncryptionError::InvalidCiphertext);
    }
    let encryptor = Aes256EcbEnc::new_from_slice(key)
        .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?;
    Ok(encryptor.encrypt_padded_vec_mut::<NoPadding>(data))
}

pub fn aes256_ecb_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() % AES_BLOCK != 0 {
        return Err(EncryptionError::InvalidCiphertext);
    }
    Aes256EcbDec::new_from_slice(key)
        .map_err(|_| EncryptionError::InvalidKeyLength(key.len() as u16 * 8))?
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .map_err(|_| EncryptionError::InvalidCiphertext)
}
