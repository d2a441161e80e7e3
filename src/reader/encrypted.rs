//! Security handler construction at read time.

use crate::context::Context;
use crate::encryption::EncryptionState;
use crate::error::{EncryptionError, Result};
use crate::object::Object;

impl Context {
    /// When the trailer carries Encrypt, authenticate the configured
    /// passwords (the empty user password included) and install the
    /// handler. Wrong passwords are fatal.
    pub(crate) fn setup_encryption(&mut self) -> Result<()> {
        if !self.is_encrypted() {
            return Ok(());
        }

        // The Encrypt dictionary itself is materialized before any
        // handler exists, so it is never run through one.
        let encrypt = match self.trailer.get(b"Encrypt")?.clone() {
            Object::Reference(id) => self.get_object(id)?.clone(),
            direct => direct,
        };
        let encrypt_dict = encrypt
            .as_dict()
            .map_err(|_| EncryptionError::InvalidEncryptDict)?
            .clone();

        let file_id = self.first_file_id();
        let user_pw = self.config.user_pw.clone();
        let owner_pw = self.config.owner_pw.clone();
        let state = EncryptionState::decode(&encrypt_dict, &file_id, &user_pw, &owner_pw)?;
        self.encryption_state = Some(state);
        Ok(())
    }

    /// First element of the trailer's ID array; key derivation hashes
    /// its first 16 bytes.
    pub(crate) fn first_file_id(&self) -> Vec<u8> {
        self.trailer
            .get(b"ID")
            .and_then(Object::as_array)
            .ok()
            .and_then(|ids| ids.first())
            .and_then(|id| id.as_str().ok())
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }
}
