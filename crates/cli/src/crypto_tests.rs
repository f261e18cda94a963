// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn round_trip() -> anyhow::Result<()> {
    let blob = encrypt(b"account list goes here", "passphrase")?;
    let plain = decrypt(&blob, "passphrase")?;
    assert_eq!(plain, b"account list goes here");
    Ok(())
}

#[test]
fn blob_layout_has_header_then_sealed_payload() -> anyhow::Result<()> {
    let blob = encrypt(b"x", "p")?;
    assert_eq!(blob.len(), SALT_LEN + NONCE_LEN + 1 + TAG_LEN);
    Ok(())
}

#[test]
fn wrong_passphrase_is_rejected() -> anyhow::Result<()> {
    let blob = encrypt(b"secret", "right")?;
    assert!(decrypt(&blob, "wrong").is_err());
    Ok(())
}

#[test]
fn tampering_is_rejected() -> anyhow::Result<()> {
    let mut blob = encrypt(b"secret", "p")?;
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    assert!(decrypt(&blob, "p").is_err());
    Ok(())
}

#[test]
fn truncated_blob_is_rejected() {
    assert!(decrypt(&[0u8; 10], "p").is_err());
}

#[test]
fn salts_differ_between_encryptions() -> anyhow::Result<()> {
    let a = encrypt(b"same", "p")?;
    let b = encrypt(b"same", "p")?;
    assert_ne!(a[..SALT_LEN], b[..SALT_LEN]);
    Ok(())
}
