// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encryption for the account store.
//!
//! Key derivation is Argon2id (memory-hard), the cipher is AES-256-GCM.
//! Blob layout: `salt (16) || nonce (12) || ciphertext+tag`. The salt is
//! not secret; it only defeats precomputation.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
/// GCM appends a 16-byte tag to the ciphertext.
pub const TAG_LEN: usize = 16;

const ARGON2_TIME_COST: u32 = 3;
/// KiB: 64 MiB.
const ARGON2_MEMORY_COST: u32 = 65536;
const ARGON2_PARALLELISM: u32 = 4;

fn derive_key(passphrase: &str, salt: &[u8]) -> anyhow::Result<[u8; KEY_LEN]> {
    let params = argon2::Params::new(
        ARGON2_MEMORY_COST,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(KEY_LEN),
    )
    .map_err(|e| anyhow::anyhow!("bad KDF parameters: {e}"))?;
    let kdf = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    kdf.hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| anyhow::anyhow!("key derivation failed: {e}"))?;
    Ok(key)
}

/// Encrypt into a self-contained blob ready to write to disk.
pub fn encrypt(plaintext: &[u8], passphrase: &str) -> anyhow::Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut salt);
    rand::rng().fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| anyhow::anyhow!("cipher construction failed: {e}"))?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| anyhow::anyhow!("encryption failed"))?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`]. Fails on a wrong passphrase or
/// any tampering (the GCM tag covers both).
pub fn decrypt(blob: &[u8], passphrase: &str) -> anyhow::Result<Vec<u8>> {
    let min_len = SALT_LEN + NONCE_LEN + TAG_LEN;
    if blob.len() < min_len {
        anyhow::bail!("encrypted blob too short ({} bytes, minimum {min_len})", blob.len());
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| anyhow::anyhow!("cipher construction failed: {e}"))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| anyhow::anyhow!("decryption failed: wrong passphrase or corrupted store"))
}

#[cfg(test)]
#[path = "crypto_tests.rs"]
mod tests;
