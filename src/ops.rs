//! Core command primitives the collaborating command layer drives:
//! validate, optimize, encryption management and the reduced feature
//! set.

use log::info;

use crate::config::Permissions;
use crate::context::Context;
use crate::encryption::{self, EncryptOptions};
use crate::error::{Result, ValidationError};
use crate::object::Object;

/// Catalog entries dropped by the reduced feature set.
const REDUCED_CATALOG_KEYS: [&[u8]; 7] = [
    b"AcroForm",
    b"Outlines",
    b"OpenAction",
    b"AA",
    b"StructTreeRoot",
    b"MarkInfo",
    b"Names",
];

/// Validate the object graph under the configured policy.
pub fn validate(ctx: &mut Context) -> Result<Vec<ValidationError>> {
    crate::validate::validate(ctx)
}

/// Optimize: drop unreachable objects, renumber contiguously and
/// Flate-encode plain streams. The subsequent write emits the compact
/// form.
pub fn optimize(ctx: &mut Context) -> Result<()> {
    let dropped = ctx.prune_unreferenced()?;
    if dropped > 0 {
        info!("optimize dropped {dropped} unreferenced objects");
    }
    ctx.renumber_objects()?;
    for object in ctx.objects.values_mut() {
        if let Object::Stream(stream) = object {
            stream.compress()?;
        }
    }
    Ok(())
}

/// Encrypt the document with the configuration's cipher, key length,
/// permissions and passwords. An already encrypted document is
/// decrypted first (its passwords must have authenticated on read).
pub fn encrypt(ctx: &mut Context) -> Result<()> {
    ctx.config.validate_key_length()?;
    if ctx.encryption_state.is_some() {
        decrypt(ctx)?;
    } else {
        ctx.materialize_all()?;
    }
    ctx.ensure_file_id();

    let options = EncryptOptions {
        user_pw: ctx
            .config
            .user_pw_new
            .clone()
            .unwrap_or_else(|| ctx.config.user_pw.clone()),
        owner_pw: ctx
            .config
            .owner_pw_new
            .clone()
            .unwrap_or_else(|| ctx.config.owner_pw.clone()),
        permissions: ctx.config.permissions(),
        use_aes: ctx.config.encrypt_using_aes,
        key_length: ctx.config.encrypt_key_length,
    };
    install_encryption(ctx, &options)
}

fn install_encryption(ctx: &mut Context, options: &EncryptOptions) -> Result<()> {
    let file_id = ctx.first_file_id();
    let (state, dict) = encryption::generate(options, &file_id)?;
    let id = ctx.add_object(dict);
    ctx.trailer.set("Encrypt", Object::Reference(id));
    ctx.encryption_state = Some(state);
    Ok(())
}

/// Remove encryption. Reading already authenticated and decrypts on
/// materialization, so this only has to materialize everything and
/// drop the handler.
pub fn decrypt(ctx: &mut Context) -> Result<()> {
    if !ctx.is_encrypted() {
        return Ok(());
    }
    ctx.materialize_all()?;
    if let Some(id) = ctx.encrypt_ref() {
        ctx.objects.remove(&id);
        ctx.xref.entries.remove(&id.0);
    }
    ctx.trailer.remove(b"Encrypt");
    ctx.encryption_state = None;
    Ok(())
}

/// Rekey with new passwords, preserving cipher, key length and
/// permissions.
pub fn change_passwords(ctx: &mut Context, user_pw: &str, owner_pw: &str) -> Result<()> {
    let Some(state) = ctx.encryption_state.as_ref() else {
        return Err(crate::error::EncryptionError::InvalidEncryptDict.into());
    };
    let options = EncryptOptions {
        user_pw: user_pw.to_string(),
        owner_pw: owner_pw.to_string(),
        permissions: state.permissions,
        use_aes: state.method.is_aes(),
        key_length: (state.key_length * 8) as u16,
    };
    decrypt(ctx)?;
    ctx.ensure_file_id();
    install_encryption(ctx, &options)
}

/// Replace the permission mask, keeping cipher and passwords.
pub fn set_permissions(ctx: &mut Context, permissions: i16) -> Result<()> {
    ctx.config.permissions = permissions;
    let Some(state) = ctx.encryption_state.as_ref() else {
        return Err(crate::error::EncryptionError::InvalidEncryptDict.into());
    };
    let options = EncryptOptions {
        user_pw: ctx.config.user_pw.clone(),
        owner_pw: ctx.config.owner_pw.clone(),
        permissions: Permissions::from_i16(permissions),
        use_aes: state.method.is_aes(),
        key_length: (state.key_length * 8) as u16,
    };
    decrypt(ctx)?;
    ctx.ensure_file_id();
    install_encryption(ctx, &options)
}

/// Effective permissions: everything when unencrypted or owner
/// authenticated, the P mask otherwise.
pub fn permissions(ctx: &Context) -> Permissions {
    match &ctx.encryption_state {
        None => Permissions::all(),
        Some(state) if state.owner_authenticated => Permissions::all(),
        Some(state) => state.permissions,
    }
}

/// For the reduced-feature commands, strip annotations and the other
/// interactive entries from the catalog and every page.
pub fn apply_reduced_feature_set(ctx: &mut Context) -> Result<()> {
    if !ctx.config.cmd.applies_reduced_feature_set() {
        return Ok(());
    }
    ctx.materialize_all()?;

    if let Ok(root) = ctx.trailer.get(b"Root").and_then(Object::as_reference) {
        if let Ok(catalog) = ctx.get_object_mut(root) {
            if let Ok(dict) = catalog.as_dict_mut() {
                for key in REDUCED_CATALOG_KEYS {
                    dict.remove(key);
                }
            }
        }
    }

    let ids: Vec<_> = ctx.objects.keys().copied().collect();
    for id in ids {
        let Some(object) = ctx.objects.get_mut(&id) else { continue };
        if let Ok(dict) = object.as_dict_mut() {
            if dict.has_type(b"Page") {
                dict.remove(b"Annots");
                dict.remove(b"AA");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cmd, Config, PERMISSIONS_NONE, ValidationMode};
    use crate::error::{EncryptionError, Error};
    use crate::reader::tests_support::{build_classical, simple_pdf};

    fn classical_config() -> Config {
        Config {
            write_object_stream: false,
            write_xref_stream: false,
            ..Config::default()
        }
    }

    #[test]
    fn optimize_drops_orphans_and_round_trips() {
        let doc = build_classical(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
                (3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>"),
                (4, "<< /Length 5 >>\nstream\nhello\nendstream"),
                (7, "<< /Orphan true >>"),
                (9, "(also unreferenced)"),
            ],
            "",
        );
        let mut ctx = Context::load_mem(&doc, classical_config()).unwrap();
        let before_in_use = 6;
        optimize(&mut ctx).unwrap();
        assert!(ctx.objects.len() <= before_in_use - 2);
        let bytes = ctx.render().unwrap();
        assert!(bytes.ends_with(b"%%EOF\n"));

        let mut reread = Context::load_mem(&bytes, Config::default()).unwrap();
        assert_eq!(reread.xref.in_use_count(), 4);
        let catalog = reread.catalog().unwrap();
        let pages_ref = catalog.get(b"Pages").unwrap().clone();
        let pages = reread.resolve(&pages_ref).unwrap();
        let kids = pages.as_dict().unwrap().get(b"Kids").unwrap().as_array().unwrap();
        assert_eq!(kids.len(), 1);
        // Content survives renumbering and re-encoding.
        let page_ref = kids[0].clone();
        let page = reread.resolve(&page_ref).unwrap();
        let contents_ref = page.as_dict().unwrap().get(b"Contents").unwrap().clone();
        let contents = reread.resolve(&contents_ref).unwrap();
        let stream = contents.as_stream().unwrap();
        assert_eq!(stream.decompressed_content(false).unwrap(), b"hello");
    }

    #[test]
    fn optimize_flate_encodes_plain_streams() {
        let mut ctx = Context::load_mem(&simple_pdf(), classical_config()).unwrap();
        optimize(&mut ctx).unwrap();
        let bytes = ctx.render().unwrap();
        let mut reread = Context::load_mem(&bytes, Config::default()).unwrap();
        let ids: Vec<_> = reread.xref.entries.keys().copied().collect();
        let mut found_stream = false;
        for number in ids {
            if let Ok(Object::Stream(stream)) = reread.get_object((number, 0)).map(Object::clone) {
                if stream.dict.has_type(b"ObjStm") || stream.dict.has_type(b"XRef") {
                    continue;
                }
                found_stream = true;
                assert_eq!(stream.decompressed_content(false).unwrap(), b"hello");
            }
        }
        assert!(found_stream);
    }

    fn encrypt_config(aes: bool, bits: u16) -> Config {
        Config {
            write_object_stream: false,
            write_xref_stream: false,
            encrypt_using_aes: aes,
            encrypt_key_length: bits,
            permissions: -44,
            user_pw: "user".into(),
            owner_pw: "owner".into(),
            ..Config::default()
        }
    }

    fn read_config(user_pw: &str, owner_pw: &str) -> Config {
        Config {
            user_pw: user_pw.into(),
            owner_pw: owner_pw.into(),
            ..Config::default()
        }
    }

    #[test]
    fn rc4_encrypt_decrypt_inverse() {
        let mut ctx = Context::load_mem(&simple_pdf(), encrypt_config(false, 128)).unwrap();
        encrypt(&mut ctx).unwrap();
        let bytes = ctx.render().unwrap();

        // The payload on disk is not the plaintext.
        assert!(!bytes.windows(5).any(|w| w == b"hello"));

        let mut with_user = Context::load_mem(&bytes, read_config("user", "")).unwrap();
        let stream = with_user.get_object((4, 0)).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, b"hello");
        assert!(!permissions(&with_user).contains(Permissions::MODIFY));

        let wrong = Context::load_mem(&bytes, read_config("wrong", ""));
        assert!(matches!(
            wrong,
            Err(Error::Encryption(EncryptionError::WrongPassword))
        ));

        // Owner password unlocks everything whatever P says.
        let mut with_owner = Context::load_mem(&bytes, read_config("", "owner")).unwrap();
        assert_eq!(permissions(&with_owner), Permissions::all());
        decrypt(&mut with_owner).unwrap();
        assert!(!with_owner.is_encrypted());
        let plain = with_owner.render().unwrap();
        let mut reread = Context::load_mem(&plain, Config::default()).unwrap();
        let stream = reread.get_object((4, 0)).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, b"hello");
    }

    #[test]
    fn aes256_reads_same_bytes_as_plain_twin() {
        let mut plain = Context::load_mem(&simple_pdf(), classical_config()).unwrap();
        let plain_content = plain.get_object((4, 0)).unwrap().as_stream().unwrap().content.clone();

        let mut ctx = Context::load_mem(&simple_pdf(), {
            let mut c = encrypt_config(true, 256);
            c.user_pw = "pw".into();
            c.owner_pw = String::new();
            c
        })
        .unwrap();
        encrypt(&mut ctx).unwrap();
        let encrypted_bytes = ctx.render().unwrap();

        let mut reread = Context::load_mem(&encrypted_bytes, read_config("pw", "")).unwrap();
        let state = reread.encryption_state.as_ref().unwrap();
        assert_eq!((state.v, state.r), (5, 6));
        let content = reread.get_object((4, 0)).unwrap().as_stream().unwrap().content.clone();
        assert_eq!(content, plain_content);

        // Rewrite under RC4 128: a V2 R3 file that round-trips.
        reread.config.encrypt_using_aes = false;
        reread.config.encrypt_key_length = 128;
        reread.config.user_pw = "pw".into();
        reread.config.owner_pw = String::new();
        encrypt(&mut reread).unwrap();
        let state = reread.encryption_state.as_ref().unwrap();
        assert_eq!((state.v, state.r), (2, 3));
        let rc4_bytes = reread.render().unwrap();

        let mut third = Context::load_mem(&rc4_bytes, read_config("pw", "")).unwrap();
        let content = third.get_object((4, 0)).unwrap().as_stream().unwrap().content.clone();
        assert_eq!(content, plain_content);
    }

    #[test]
    fn aes128_round_trip_with_object_streams() {
        let mut config = encrypt_config(true, 128);
        config.write_object_stream = true;
        config.write_xref_stream = true;
        let mut ctx = Context::load_mem(&simple_pdf(), config).unwrap();
        encrypt(&mut ctx).unwrap();
        let bytes = ctx.render().unwrap();

        let mut reread = Context::load_mem(&bytes, read_config("user", "")).unwrap();
        // Compressed objects resolved through the encrypted host.
        assert!(matches!(
            reread.xref.get(1),
            Some(crate::xref::XrefEntry::Compressed { .. })
        ));
        assert!(reread.catalog().unwrap().has_type(b"Catalog"));
        let stream = reread.get_object((4, 0)).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, b"hello");
    }

    #[test]
    fn change_passwords_preserves_method_and_permissions() {
        let mut ctx = Context::load_mem(&simple_pdf(), encrypt_config(false, 128)).unwrap();
        encrypt(&mut ctx).unwrap();
        let bytes = ctx.render().unwrap();

        let mut reread = Context::load_mem(&bytes, read_config("user", "owner")).unwrap();
        let old_permissions = reread.encryption_state.as_ref().unwrap().permissions;
        change_passwords(&mut reread, "newuser", "newowner").unwrap();
        let rekeyed = reread.render().unwrap();

        assert!(Context::load_mem(&rekeyed, read_config("user", "")).is_err());
        let mut third = Context::load_mem(&rekeyed, read_config("newuser", "")).unwrap();
        let state = third.encryption_state.as_ref().unwrap();
        assert_eq!((state.v, state.r), (2, 3));
        assert_eq!(state.permissions, old_permissions);
        let stream = third.get_object((4, 0)).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, b"hello");
    }

    #[test]
    fn set_permissions_rekeys_with_new_mask() {
        let mut ctx = Context::load_mem(&simple_pdf(), encrypt_config(false, 128)).unwrap();
        encrypt(&mut ctx).unwrap();
        let bytes = ctx.render().unwrap();

        let mut reread = Context::load_mem(&bytes, read_config("user", "owner")).unwrap();
        set_permissions(&mut reread, PERMISSIONS_NONE).unwrap();
        let rekeyed = reread.render().unwrap();

        let with_user = Context::load_mem(&rekeyed, read_config("user", "")).unwrap();
        let state = with_user.encryption_state.as_ref().unwrap();
        assert_eq!(state.permissions.as_p_value(), -3901);
    }

    #[test]
    fn invalid_key_length_is_rejected_before_any_work() {
        let mut config = encrypt_config(false, 256);
        config.validation_mode = ValidationMode::Strict;
        let mut ctx = Context::load_mem(&simple_pdf(), config).unwrap();
        assert!(matches!(
            encrypt(&mut ctx),
            Err(Error::Encryption(EncryptionError::InvalidKeyLength(256)))
        ));
    }

    #[test]
    fn reduced_feature_set_strips_annotations() {
        let doc = build_classical(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R /AcroForm 5 0 R /Outlines 6 0 R >>"),
                (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
                (3, "<< /Type /Page /Parent 2 0 R /Annots [7 0 R] >>"),
                (5, "<< /Fields [] >>"),
                (6, "<< /Type /Outlines /Count 0 >>"),
                (7, "<< /Type /Annot /Subtype /Link >>"),
            ],
            "",
        );
        for cmd in [Cmd::Split, Cmd::Trim, Cmd::ExtractPages, Cmd::MergeCreate, Cmd::MergeAppend, Cmd::ImportImages] {
            let config = Config {
                cmd,
                write_object_stream: false,
                write_xref_stream: false,
                ..Config::default()
            };
            let mut ctx = Context::load_mem(&doc, config).unwrap();
            apply_reduced_feature_set(&mut ctx).unwrap();
            optimize(&mut ctx).unwrap();
            let bytes = ctx.render().unwrap();
            assert!(!bytes.windows(7).any(|w| w == b"/Annots"), "{cmd:?}");
            assert!(!bytes.windows(9).any(|w| w == b"/AcroForm"), "{cmd:?}");

            let mut reread = Context::load_mem(&bytes, Config::default()).unwrap();
            assert!(reread.catalog().unwrap().has_type(b"Catalog"));
        }

        // A command outside the reduced set keeps everything.
        let config = Config {
            cmd: Cmd::Optimize,
            ..Config::default()
        };
        let mut ctx = Context::load_mem(&doc, config).unwrap();
        apply_reduced_feature_set(&mut ctx).unwrap();
        let catalog = ctx.catalog().unwrap();
        assert!(catalog.has(b"AcroForm"));
    }

    #[test]
    fn permissions_without_encryption_are_all() {
        let ctx = Context::load_mem(&simple_pdf(), Config::default()).unwrap();
        assert_eq!(permissions(&ctx), Permissions::all());
    }
}
