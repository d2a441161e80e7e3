use bitflags::bitflags;

use crate::error::{EncryptionError, Result};

/// How thoroughly the object graph is checked against the document
/// schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    Strict,
    #[default]
    Relaxed,
    None,
}

/// Line terminator the writer uses for everything it generates itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eol {
    #[default]
    Lf,
    Cr,
    CrLf,
}

impl Eol {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Eol::Lf => b"\n",
            Eol::Cr => b"\r",
            Eol::CrLf => b"\r\n",
        }
    }
}

/// Display unit echoed back to the caller; the engine itself works in
/// points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Points,
    Inches,
    Centimetres,
    Millimetres,
}

/// Command tag handed down by the command layer. The engine inspects
/// it only to decide whether the reduced feature set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cmd {
    #[default]
    Validate,
    Optimize,
    Split,
    MergeCreate,
    MergeAppend,
    ExtractImages,
    ExtractFonts,
    ExtractPages,
    ExtractContent,
    ExtractMetadata,
    ExtractAttachments,
    Trim,
    AddAttachments,
    RemoveAttachments,
    ListAttachments,
    SetPermissions,
    ListPermissions,
    Encrypt,
    Decrypt,
    ChangeUserPw,
    ChangeOwnerPw,
    AddWatermarks,
    RemoveWatermarks,
    ImportImages,
    InsertPagesBefore,
    InsertPagesAfter,
    RemovePages,
    Rotate,
    NUp,
    Info,
    InstallFonts,
    ListFonts,
    ListKeywords,
    AddKeywords,
    RemoveKeywords,
    ListProperties,
    AddProperties,
    RemoveProperties,
    Collect,
}

impl Cmd {
    /// Commands whose output intentionally drops annotations and other
    /// interactive entries.
    pub fn applies_reduced_feature_set(self) -> bool {
        matches!(
            self,
            Cmd::Split | Cmd::Trim | Cmd::ExtractPages | Cmd::MergeCreate | Cmd::MergeAppend | Cmd::ImportImages
        )
    }
}

bitflags! {
    /// Access permissions carried in the P field of the encryption
    /// dictionary. Bit positions follow ISO 32000-1 table 22.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        const PRINT = 1 << 2;
        const MODIFY = 1 << 3;
        const EXTRACT = 1 << 4;
        const ANNOTATE = 1 << 5;
        const FILL_FORMS = 1 << 8;
        const EXTRACT_ACCESSIBILITY = 1 << 9;
        const ASSEMBLE = 1 << 10;
        const PRINT_FAITHFUL = 1 << 11;
    }
}

/// All permissions granted.
pub const PERMISSIONS_ALL: i16 = -1;
/// No permissions granted (0xF0C3 as a signed 16-bit quantity).
pub const PERMISSIONS_NONE: i16 = -3901;

impl Permissions {
    /// Widen the configuration surface's signed 16-bit mask to the
    /// 32-bit P value. Sign extension here is load-bearing: the key
    /// derivation hashes P as a little-endian two's-complement i32.
    pub fn from_i16(mask: i16) -> Permissions {
        Permissions::from_bits_retain(mask as i32 as u32)
    }

    pub fn as_p_value(self) -> i32 {
        self.bits() as i32
    }
}

/// Effective configuration. A context captures an immutable snapshot at
/// construction and never re-reads it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable xref streams, object streams and hybrid files on read.
    pub reader15: bool,
    /// Decode every stream at read time (diagnostic).
    pub decode_all_streams: bool,
    pub validation_mode: ValidationMode,
    pub eol: Eol,
    /// Pack non-stream objects into object streams on write. Implies
    /// `write_xref_stream`.
    pub write_object_stream: bool,
    /// Terminate the file with an XRef stream instead of a classical
    /// xref section.
    pub write_xref_stream: bool,
    /// AES vs RC4 for newly encrypted output.
    pub encrypt_using_aes: bool,
    /// Key length in bits; validated against the cipher choice.
    pub encrypt_key_length: u16,
    /// Signed 16-bit permission mask; -1 grants all, -3901 none.
    pub permissions: i16,
    pub user_pw: String,
    pub owner_pw: String,
    /// Replacement passwords for rekeying commands.
    pub user_pw_new: Option<String>,
    pub owner_pw_new: Option<String>,
    pub units: Units,
    pub cmd: Cmd,
    /// Accepted and counted; the statistics contract is a single CSV row.
    pub collect_stats: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            reader15: true,
            decode_all_streams: false,
            validation_mode: ValidationMode::Relaxed,
            eol: Eol::Lf,
            write_object_stream: true,
            write_xref_stream: true,
            encrypt_using_aes: true,
            encrypt_key_length: 256,
            permissions: PERMISSIONS_ALL,
            user_pw: String::new(),
            owner_pw: String::new(),
            user_pw_new: None,
            owner_pw_new: None,
            units: Units::Points,
            cmd: Cmd::Validate,
            collect_stats: false,
        }
    }
}

impl Config {
    /// Object streams force an xref stream terminator.
    pub fn use_xref_streams(&self) -> bool {
        self.write_xref_stream || self.write_object_stream
    }

    pub fn use_object_streams(&self) -> bool {
        self.write_object_stream
    }

    pub fn strict(&self) -> bool {
        self.validation_mode == ValidationMode::Strict
    }

    pub fn relaxed(&self) -> bool {
        self.validation_mode == ValidationMode::Relaxed
    }

    /// Check the key length against the permitted set for the chosen
    /// cipher: 40 and 128 for RC4; 40, 128 and 256 for AES.
    pub fn validate_key_length(&self) -> Result<()> {
        let allowed: &[u16] = if self.encrypt_using_aes {
            &[40, 128, 256]
        } else {
            &[40, 128]
        };
        if allowed.contains(&self.encrypt_key_length) {
            Ok(())
        } else {
            Err(EncryptionError::InvalidKeyLength(self.encrypt_key_length).into())
        }
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_i16(self.permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_sentinels() {
        let all = Permissions::from_i16(PERMISSIONS_ALL);
        assert!(all.contains(Permissions::PRINT | Permissions::MODIFY | Permissions::EXTRACT));
        assert_eq!(all.as_p_value(), -1);

        let none = Permissions::from_i16(PERMISSIONS_NONE);
        assert!(!none.intersects(
            Permissions::PRINT
                | Permissions::MODIFY
                | Permissions::EXTRACT
                | Permissions::ANNOTATE
                | Permissions::FILL_FORMS
                | Permissions::ASSEMBLE
                | Permissions::PRINT_FAITHFUL
        ));
        // Sign extension, not zero extension.
        assert_eq!(none.as_p_value(), -3901);
        assert_eq!(none.bits(), 0xFFFF_F0C3);
    }

    #[test]
    fn key_length_sets() {
        let mut config = Config::default();
        config.encrypt_using_aes = false;
        config.encrypt_key_length = 128;
        assert!(config.validate_key_length().is_ok());
        config.encrypt_key_length = 256;
        assert!(config.validate_key_length().is_err());
        config.encrypt_using_aes = true;
        assert!(config.validate_key_length().is_ok());
        config.encrypt_key_length = 64;
        assert!(config.validate_key_length().is_err());
    }

    #[test]
    fn object_streams_imply_xref_streams() {
        let config = Config {
            write_object_stream: true,
            write_xref_stream: false,
            ..Config::default()
        };
        assert!(config.use_xref_streams());
    }

    #[test]
    fn reduced_feature_commands() {
        assert!(Cmd::Split.applies_reduced_feature_set());
        assert!(Cmd::MergeAppend.applies_reduced_feature_set());
        assert!(!Cmd::Encrypt.applies_reduced_feature_set());
        assert!(!Cmd::Validate.applies_reduced_feature_set());
    }
}
