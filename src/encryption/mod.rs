//! Standard security handler: password-based key derivation,
//! authentication, per-object crypto keys and the RC4/AES transforms.

pub mod crypt_filters;
pub mod pkcs5;
pub mod rc4;

use std::cell::RefCell;
use std::collections::HashMap;

use log::warn;
use md5::{Digest, Md5};
use sha2::{Sha256, Sha384, Sha512};

use crate::config::Permissions;
use crate::error::{EncryptionError, Result};
use crate::object::{Dictionary, Object, ObjectId, StringFormat};

/// Canonical 32-byte password pad of ISO 32000-1 table 20.
pub const PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const AES_SALT: &[u8; 4] = b"sAlT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    Rc4,
    Aes128,
    Aes256,
}

impl CryptMethod {
    pub fn is_aes(self) -> bool {
        !matches!(self, CryptMethod::Rc4)
    }
}

/// Everything needed to transform strings and streams of one document.
#[derive(Debug, Clone)]
pub struct EncryptionState {
    pub v: i64,
    pub r: i64,
    pub method: CryptMethod,
    /// File encryption key length in bytes.
    pub key_length: usize,
    pub file_key: Vec<u8>,
    pub permissions: Permissions,
    pub encrypt_metadata: bool,
    /// Owner-password authentication grants everything, whatever P says.
    pub owner_authenticated: bool,
    object_keys: RefCell<HashMap<ObjectId, Vec<u8>>>,
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let take = password.len().min(32);
    padded[..take].copy_from_slice(&password[..take]);
    padded[take..].copy_from_slice(&PAD[..32 - take]);
    padded
}

fn md5(chunks: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

/// Algorithm 2: file key from a padded user password (V < 5).
fn legacy_file_key(
    padded_password: &[u8; 32],
    o_value: &[u8],
    p: i32,
    file_id: &[u8],
    key_length: usize,
    r: i64,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(padded_password);
    hasher.update(&o_value[..o_value.len().min(32)]);
    hasher.update(p.to_le_bytes());
    hasher.update(&file_id[..file_id.len().min(16)]);
    if r >= 4 && !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut digest: [u8; 16] = hasher.finalize().into();
    if r >= 3 {
        for _ in 0..50 {
            digest = md5(&[&digest[..key_length]]);
        }
    }
    digest[..key_length].to_vec()
}

/// Algorithm 3: the O value from owner and user passwords.
fn legacy_owner_value(owner_padded: &[u8; 32], user_padded: &[u8; 32], r: i64, key_length: usize) -> Vec<u8> {
    let mut digest = md5(&[owner_padded]);
    if r >= 3 {
        for _ in 0..50 {
            digest = md5(&[&digest]);
        }
    }
    let rc4_key = &digest[..key_length];
    let mut value = rc4::rc4(rc4_key, user_padded);
    if r >= 3 {
        for i in 1..=19u8 {
            let key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
            value = rc4::rc4(&key, &value);
        }
    }
    value
}

/// Inverse of algorithm 3: recover the padded user password from O.
fn legacy_user_password_from_owner(owner_padded: &[u8; 32], o_value: &[u8], r: i64, key_length: usize) -> [u8; 32] {
    let mut digest = md5(&[owner_padded]);
    if r >= 3 {
        for _ in 0..50 {
            digest = md5(&[&digest]);
        }
    }
    let rc4_key = &digest[..key_length];
    let mut value = o_value[..o_value.len().min(32)].to_vec();
    if r >= 3 {
        for i in (1..=19u8).rev() {
            let key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
            value = rc4::rc4(&key, &value);
        }
    }
    value = rc4::rc4(rc4_key, &value);
    let mut padded = [0u8; 32];
    let take = value.len().min(32);
    padded[..take].copy_from_slice(&value[..take]);
    padded
}

/// Algorithms 4 and 5: the U value for a derived file key.
fn legacy_user_value(file_key: &[u8], file_id: &[u8], r: i64) -> Vec<u8> {
    if r == 2 {
        return rc4::rc4(file_key, &PAD);
    }
    let digest = md5(&[&PAD, &file_id[..file_id.len().min(16)]]);
    let mut value = rc4::rc4(file_key, &digest);
    for i in 1..=19u8 {
        let key: Vec<u8> = file_key.iter().map(|b| b ^ i).collect();
        value = rc4::rc4(&key, &value);
    }
    value.resize(32, 0);
    value
}

/// Passwords of revision 5/6 handlers are SASLprep'd UTF-8, truncated
/// to 127 bytes.
fn prep_password(password: &str) -> Vec<u8> {
    let prepped = stringprep::saslprep(password)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| password.to_string());
    let mut bytes = prepped.into_bytes();
    bytes.truncate(127);
    bytes
}

/// Revision 5 hash, and the revision 6 iterated hash of clause
/// 7.6.4.3.4.
fn hash_password(r: i64, password: &[u8], salt: &[u8], udata: &[u8]) -> Result<[u8; 32]> {
    let initial: [u8; 32] = {
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(salt);
        hasher.update(udata);
        hasher.finalize().into()
    };
    if r == 5 {
        return Ok(initial);
    }
    let mut k: Vec<u8> = initial.to_vec();

    let mut round = 0usize;
    loop {
        let unit_len = password.len() + k.len() + udata.len();
        let mut k1 = Vec::with_capacity(unit_len * 64);
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(udata);
        }
        let e = crypt_filters::aes128_cbc_nopad_encrypt(&k[..16], &k[16..32], &k1)?;
        k = match e[..16].iter().map(|&b| b as u32).sum::<u32>() % 3 {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };
        round += 1;
        if round >= 64 && (*e.last().unwrap_or(&0) as usize) <= round - 32 {
            break;
        }
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&k[..32]);
    Ok(out)
}

struct EncryptDictValues {
    v: i64,
    r: i64,
    key_length: usize,
    method: CryptMethod,
    o: Vec<u8>,
    u: Vec<u8>,
    oe: Option<Vec<u8>>,
    ue: Option<Vec<u8>>,
    perms: Option<Vec<u8>>,
    p: i32,
    encrypt_metadata: bool,
}

fn parse_encrypt_dict(encrypt: &Dictionary) -> Result<EncryptDictValues> {
    let filter = encrypt
        .get(b"Filter")
        .and_then(Object::as_name)
        .map_err(|_| EncryptionError::InvalidEncryptDict)?;
    if filter != b"Standard" {
        return Err(crate::Error::Unsupported("non-standard security handler"));
    }

    let v = encrypt.get(b"V").and_then(Object::as_i64).unwrap_or(0);
    let r = encrypt
        .get(b"R")
        .and_then(Object::as_i64)
        .map_err(|_| EncryptionError::InvalidEncryptDict)?;
    match v {
        1 | 2 | 4 | 5 => {}
        _ => return Err(EncryptionError::UnsupportedVersion(v).into()),
    }
    if !(2..=6).contains(&r) {
        return Err(EncryptionError::UnsupportedRevision(r).into());
    }

    let length_bits = encrypt.get(b"Length").and_then(Object::as_i64).unwrap_or(40);
    let o = encrypt
        .get(b"O")
        .and_then(Object::as_str)
        .map_err(|_| EncryptionError::InvalidEncryptDict)?
        .to_vec();
    let u = encrypt
        .get(b"U")
        .and_then(Object::as_str)
        .map_err(|_| EncryptionError::InvalidEncryptDict)?
        .to_vec();
    let p = encrypt
        .get(b"P")
        .and_then(Object::as_i64)
        .map_err(|_| EncryptionError::InvalidEncryptDict)? as i32;
    let encrypt_metadata = encrypt
        .get(b"EncryptMetadata")
        .and_then(Object::as_bool)
        .unwrap_or(true);

    let (method, key_length) = match v {
        1 => (CryptMethod::Rc4, 5),
        2 => {
            if !(40..=128).contains(&length_bits) || length_bits % 8 != 0 {
                return Err(EncryptionError::InvalidKeyLength(length_bits as u16).into());
            }
            (CryptMethod::Rc4, (length_bits / 8) as usize)
        }
        4 | 5 => {
            // The crypt filter named by StmF decides the method; this
            // handler requires StmF and StrF to agree.
            let stmf = encrypt
                .get(b"StmF")
                .and_then(Object::as_name)
                .unwrap_or(b"Identity")
                .to_vec();
            let strf = encrypt
                .get(b"StrF")
                .and_then(Object::as_name)
                .unwrap_or(b"Identity")
                .to_vec();
            if stmf != strf {
                return Err(crate::Error::Unsupported("split StmF/StrF crypt filters"));
            }
            let cf = encrypt
                .get(b"CF")
                .and_then(Object::as_dict)
                .map_err(|_| EncryptionError::InvalidEncryptDict)?;
            let filter_dict = cf
                .get(&stmf)
                .and_then(Object::as_dict)
                .map_err(|_| EncryptionError::InvalidEncryptDict)?;
            let cfm = filter_dict
                .get(b"CFM")
                .and_then(Object::as_name)
                .map_err(|_| EncryptionError::InvalidEncryptDict)?;
            match cfm {
                b"V2" => (CryptMethod::Rc4, (length_bits.max(40) / 8) as usize),
                b"AESV2" => (CryptMethod::Aes128, 16),
                b"AESV3" => (CryptMethod::Aes256, 32),
                _ => return Err(EncryptionError::UnsupportedCryptFilter.into()),
            }
        }
        _ => unreachable!(),
    };

    if v == 5 && method != CryptMethod::Aes256 {
        return Err(EncryptionError::UnsupportedCryptFilter.into());
    }

    let oe = encrypt.get(b"OE").and_then(Object::as_str).map(<[u8]>::to_vec).ok();
    let ue = encrypt.get(b"UE").and_then(Object::as_str).map(<[u8]>::to_vec).ok();
    let perms = encrypt.get(b"Perms").and_then(Object::as_str).map(<[u8]>::to_vec).ok();

    Ok(EncryptDictValues {
        v,
        r,
        key_length,
        method,
        o,
        u,
        oe,
        ue,
        perms,
        p,
        encrypt_metadata,
    })
}

impl EncryptionState {
    /// Build the handler from the Encrypt dictionary, trying the
    /// supplied passwords and the empty user password.
    pub fn decode(
        encrypt: &Dictionary,
        file_id: &[u8],
        user_pw: &str,
        owner_pw: &str,
    ) -> Result<EncryptionState> {
        let values = parse_encrypt_dict(encrypt)?;
        if values.v < 5 {
            Self::decode_legacy(values, file_id, user_pw, owner_pw)
        } else {
            Self::decode_v5(values, user_pw, owner_pw)
        }
    }

    fn from_parts(values: &EncryptDictValues, file_key: Vec<u8>, owner_authenticated: bool) -> EncryptionState {
        EncryptionState {
            v: values.v,
            r: values.r,
            method: values.method,
            key_length: values.key_length,
            file_key,
            permissions: Permissions::from_bits_retain(values.p as u32),
            encrypt_metadata: values.encrypt_metadata,
            owner_authenticated,
            object_keys: RefCell::new(HashMap::new()),
        }
    }

    fn decode_legacy(
        values: EncryptDictValues,
        file_id: &[u8],
        user_pw: &str,
        owner_pw: &str,
    ) -> Result<EncryptionState> {
        let check_user = |padded: &[u8; 32]| -> Option<Vec<u8>> {
            let key = legacy_file_key(
                padded,
                &values.o,
                values.p,
                file_id,
                values.key_length,
                values.r,
                values.encrypt_metadata,
            );
            let expected = legacy_user_value(&key, file_id, values.r);
            let matches = if values.r == 2 {
                expected.get(..32) == values.u.get(..32)
            } else {
                expected.get(..16) == values.u.get(..16)
            };
            matches.then_some(key)
        };

        // Owner password first: it recovers the user password from O.
        for owner_candidate in [owner_pw, user_pw, ""] {
            let owner_padded = pad_password(owner_candidate.as_bytes());
            let recovered =
                legacy_user_password_from_owner(&owner_padded, &values.o, values.r, values.key_length);
            if let Some(key) = check_user(&recovered) {
                return Ok(Self::from_parts(&values, key, true));
            }
        }
        for user_candidate in [user_pw, ""] {
            let padded = pad_password(user_candidate.as_bytes());
            if let Some(key) = check_user(&padded) {
                return Ok(Self::from_parts(&values, key, false));
            }
        }
        Err(EncryptionError::WrongPassword.into())
    }

    fn decode_v5(values: EncryptDictValues, user_pw: &str, owner_pw: &str) -> Result<EncryptionState> {
        if values.u.len() < 48 || values.o.len() < 48 {
            return Err(EncryptionError::InvalidEncryptDict.into());
        }
        let ue = values.ue.clone().ok_or(EncryptionError::InvalidEncryptDict)?;
        let oe = values.oe.clone().ok_or(EncryptionError::InvalidEncryptDict)?;

        for owner_candidate in [owner_pw, user_pw, ""] {
            let password = prep_password(owner_candidate);
            let expected = hash_password(values.r, &password, &values.o[32..40], &values.u[..48])?;
            if expected == values.o[..32] {
                let intermediate = hash_password(values.r, &password, &values.o[40..48], &values.u[..48])?;
                let file_key = crypt_filters::aes256_cbc_zero_iv_decrypt(&intermediate, &oe)?;
                let state = Self::from_parts(&values, file_key, true);
                state.verify_perms(&values);
                return Ok(state);
            }
        }
        for user_candidate in [user_pw, ""] {
            let password = prep_password(user_candidate);
            let expected = hash_password(values.r, &password, &values.u[32..40], &[])?;
            if expected == values.u[..32] {
                let intermediate = hash_password(values.r, &password, &values.u[40..48], &[])?;
                let file_key = crypt_filters::aes256_cbc_zero_iv_decrypt(&intermediate, &ue)?;
                let state = Self::from_parts(&values, file_key, false);
                state.verify_perms(&values);
                return Ok(state);
            }
        }
        Err(EncryptionError::WrongPassword.into())
    }

    /// The Perms blob repeats P under the file key; a mismatch means a
    /// tampered or damaged dictionary. Diagnosed, not fatal.
    fn verify_perms(&self, values: &EncryptDictValues) {
        let Some(perms) = values.perms.as_deref() else { return };
        match crypt_filters::aes256_ecb_decrypt(&self.file_key, perms) {
            Ok(clear) if clear.len() >= 12 => {
                if &clear[9..12] != b"adb" {
                    warn!("Perms entry does not decrypt to an adb block");
                } else {
                    let p = i32::from_le_bytes([clear[0], clear[1], clear[2], clear[3]]);
                    if p != values.p {
                        warn!("Perms P value {} disagrees with the P entry {}", p, values.p);
                    }
                }
            }
            _ => warn!("Perms entry could not be decrypted"),
        }
    }

    /// The key used for one object's strings and streams.
    pub fn object_key(&self, id: ObjectId) -> Vec<u8> {
        if self.v == 5 {
            return self.file_key.clone();
        }
        if let Some(key) = self.object_keys.borrow().get(&id) {
            return key.clone();
        }
        let mut hasher = Md5::new();
        hasher.update(&self.file_key);
        hasher.update(&id.0.to_le_bytes()[..3]);
        hasher.update(&id.1.to_le_bytes()[..2]);
        if self.method.is_aes() {
            hasher.update(AES_SALT);
        }
        let digest = hasher.finalize();
        let len = (self.key_length + 5).min(16);
        let key = digest[..len].to_vec();
        self.object_keys.borrow_mut().insert(id, key.clone());
        key
    }

    /// Drop all cached per-object keys; required after rekeying.
    pub fn invalidate_object_keys(&self) {
        self.object_keys.borrow_mut().clear();
    }

    pub fn decrypt_bytes(&self, id: ObjectId, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.object_key(id);
        match self.method {
            CryptMethod::Rc4 => Ok(rc4::rc4(&key, data)),
            CryptMethod::Aes128 | CryptMethod::Aes256 => {
                // Zero-length payloads occur in the wild and stay empty.
                if data.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(crypt_filters::aes_cbc_decrypt(&key, data)?)
            }
        }
    }

    pub fn encrypt_bytes(&self, id: ObjectId, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.object_key(id);
        match self.method {
            CryptMethod::Rc4 => Ok(rc4::rc4(&key, data)),
            CryptMethod::Aes128 | CryptMethod::Aes256 => Ok(crypt_filters::aes_cbc_encrypt(&key, data)?),
        }
    }
}

fn stream_is_exempt(stream: &crate::object::Stream, encrypt_metadata: bool) -> bool {
    if stream.dict.has_type(b"XRef") {
        return true;
    }
    !encrypt_metadata && stream.dict.has_type(b"Metadata")
}

/// Decrypt every string and stream payload of one object in place.
pub fn decrypt_object(state: &EncryptionState, id: ObjectId, object: &mut Object) -> Result<()> {
    transform_object(state, id, object, false)
}

/// Encrypt every string and stream payload of one object in place.
pub fn encrypt_object(state: &EncryptionState, id: ObjectId, object: &mut Object) -> Result<()> {
    transform_object(state, id, object, true)
}

fn transform_object(state: &EncryptionState, id: ObjectId, object: &mut Object, encrypt: bool) -> Result<()> {
    match object {
        Object::String(bytes, _) => {
            *bytes = if encrypt {
                state.encrypt_bytes(id, bytes)?
            } else {
                state.decrypt_bytes(id, bytes)?
            };
        }
        Object::Array(array) => {
            for item in array {
                transform_object(state, id, item, encrypt)?;
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                transform_object(state, id, value, encrypt)?;
            }
        }
        Object::Stream(stream) => {
            let exempt = stream_is_exempt(stream, state.encrypt_metadata);
            for (_, value) in stream.dict.iter_mut() {
                transform_object(state, id, value, encrypt)?;
            }
            if !exempt {
                let content = if encrypt {
                    state.encrypt_bytes(id, &stream.content)?
                } else {
                    state.decrypt_bytes(id, &stream.content)?
                };
                stream.set_content(content);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parameters for newly created encryption.
#[derive(Debug, Clone)]
pub struct EncryptOptions {
    pub user_pw: String,
    pub owner_pw: String,
    pub permissions: Permissions,
    pub use_aes: bool,
    pub key_length: u16,
}

/// Create a fresh handler and its Encrypt dictionary.
pub fn generate(options: &EncryptOptions, file_id: &[u8]) -> Result<(EncryptionState, Dictionary)> {
    let owner_pw = if options.owner_pw.is_empty() {
        options.user_pw.clone()
    } else {
        options.owner_pw.clone()
    };

    match (options.use_aes, options.key_length) {
        (false, 40) => generate_legacy(options, &owner_pw, 2, 1, CryptMethod::Rc4, 5, file_id),
        (false, 128) => generate_legacy(options, &owner_pw, 3, 2, CryptMethod::Rc4, 16, file_id),
        // AES with a legacy length means the 128-bit AESV2 crypt filter.
        (true, 40) | (true, 128) => generate_legacy(options, &owner_pw, 4, 4, CryptMethod::Aes128, 16, file_id),
        (true, 256) => generate_v5(options, &owner_pw),
        (_, bits) => Err(EncryptionError::InvalidKeyLength(bits).into()),
    }
}

fn generate_legacy(
    options: &EncryptOptions,
    owner_pw: &str,
    r: i64,
    v: i64,
    method: CryptMethod,
    key_length: usize,
    file_id: &[u8],
) -> Result<(EncryptionState, Dictionary)> {
    let p = options.permissions.as_p_value();
    let user_padded = pad_password(options.user_pw.as_bytes());
    let owner_padded = pad_password(owner_pw.as_bytes());
    let o = legacy_owner_value(&owner_padded, &user_padded, r, key_length);
    let file_key = legacy_file_key(&user_padded, &o, p, file_id, key_length, r, true);
    let u = legacy_user_value(&file_key, file_id, r);

    let mut dict = crate::dictionary! {
        "Filter" => "Standard",
        "V" => v,
        "R" => r,
        "Length" => (key_length * 8) as i64,
        "P" => p as i64,
        "O" => Object::String(o, StringFormat::Hexadecimal),
        "U" => Object::String(u, StringFormat::Hexadecimal),
    };
    if v == 4 {
        dict.set(
            "CF",
            crate::dictionary! {
                "StdCF" => crate::dictionary! {
                    "Type" => "CryptFilter",
                    "CFM" => "AESV2",
                    "AuthEvent" => "DocOpen",
                    "Length" => 16,
                },
            },
        );
        dict.set("StmF", "StdCF");
        dict.set("StrF", "StdCF");
    }

    let state = EncryptionState {
        v,
        r,
        method,
        key_length,
        file_key,
        permissions: options.permissions,
        encrypt_metadata: true,
        owner_authenticated: true,
        object_keys: RefCell::new(HashMap::new()),
    };
    Ok((state, dict))
}

fn generate_v5(options: &EncryptOptions, owner_pw: &str) -> Result<(EncryptionState, Dictionary)> {
    use rand::RngCore;

    let r = 6;
    let mut rng = rand::rng();
    let mut file_key = vec![0u8; 32];
    rng.fill_bytes(&mut file_key);
    let mut salts = [0u8; 16];
    rng.fill_bytes(&mut salts);

    let user_password = prep_password(&options.user_pw);
    let mut u = hash_password(r, &user_password, &salts[..8], &[])?.to_vec();
    u.extend_from_slice(&salts);
    let user_intermediate = hash_password(r, &user_password, &salts[8..16], &[])?;
    let ue = crypt_filters::aes256_cbc_zero_iv_encrypt(&user_intermediate, &file_key)?;

    let mut owner_salts = [0u8; 16];
    rng.fill_bytes(&mut owner_salts);
    let owner_password = prep_password(owner_pw);
    let mut o = hash_password(r, &owner_password, &owner_salts[..8], &u[..48])?.to_vec();
    o.extend_from_slice(&owner_salts);
    let owner_intermediate = hash_password(r, &owner_password, &owner_salts[8..16], &u[..48])?;
    let oe = crypt_filters::aes256_cbc_zero_iv_encrypt(&owner_intermediate, &file_key)?;

    let p = options.permissions.as_p_value();
    let mut perms_clear = [0u8; 16];
    perms_clear[..4].copy_from_slice(&p.to_le_bytes());
    perms_clear[4..8].copy_from_slice(&[0xFF; 4]);
    perms_clear[8] = b'T';
    perms_clear[9..12].copy_from_slice(b"adb");
    rng.fill_bytes(&mut perms_clear[12..16]);
    let perms = crypt_filters::aes256_ecb_encrypt(&file_key, &perms_clear)?;

    let dict = crate::dictionary! {
        "Filter" => "Standard",
        "V" => 5,
        "R" => r,
        "Length" => 256,
        "P" => p as i64,
        "O" => Object::String(o, StringFormat::Hexadecimal),
        "U" => Object::String(u, StringFormat::Hexadecimal),
        "OE" => Object::String(oe, StringFormat::Hexadecimal),
        "UE" => Object::String(ue, StringFormat::Hexadecimal),
        "Perms" => Object::String(perms, StringFormat::Hexadecimal),
        "CF" => crate::dictionary! {
            "StdCF" => crate::dictionary! {
                "Type" => "CryptFilter",
                "CFM" => "AESV3",
                "AuthEvent" => "DocOpen",
                "Length" => 32,
            },
        },
        "StmF" => "StdCF",
        "StrF" => "StdCF",
        "EncryptMetadata" => true,
    };

    let state = EncryptionState {
        v: 5,
        r,
        method: CryptMethod::Aes256,
        key_length: 32,
        file_key,
        permissions: options.permissions,
        encrypt_metadata: true,
        owner_authenticated: true,
        object_keys: RefCell::new(HashMap::new()),
    };
    Ok((state, dict))
}
