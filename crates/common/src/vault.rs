//! Credential vault for provider access tokens.
//!
//! Tokens are sealed with AES-256-GCM and stored as
//! `hex(iv):hex(tag):hex(ciphertext)`. Every call to [`CredentialVault::encrypt`]
//! draws a fresh 96-bit nonce from the system CSPRNG.
//!
//! Rows written before the GCM format use a two-segment `hex(iv):hex(ciphertext)`
//! envelope in AES-256-CBC with PKCS#7 padding. Those can still be opened but
//! are never produced.

use aes::Aes256;
use aes::cipher::{BlockDecrypt, KeyInit, generic_array::GenericArray};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use thiserror::Error;

const GCM_NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;
const CBC_BLOCK_LEN: usize = 16;

/// Credential vault errors.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The stored value is not a recognised envelope.
    #[error("malformed credential envelope: {0}")]
    MalformedEnvelope(String),

    /// Authentication failed: wrong key or modified ciphertext.
    #[error("credential failed authentication")]
    TamperDetected,

    /// The legacy ciphertext did not decrypt to valid padding.
    #[error("legacy credential could not be decrypted")]
    LegacyDecryptFailed,

    /// The decrypted bytes are not UTF-8.
    #[error("credential is not valid UTF-8")]
    InvalidPlaintext,

    /// The key material could not be turned into a cipher key.
    #[error("invalid vault key")]
    InvalidKey,

    /// The system random source failed.
    #[error("failed to generate nonce")]
    Rng,
}

/// Symmetric vault for provider access tokens.
#[derive(Clone)]
pub struct CredentialVault {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Build a vault from configured key material.
    ///
    /// Exactly 64 hex characters are used as the raw 32-byte key. Anything
    /// else is stretched to 32 bytes with SHA-256.
    pub fn new(key_material: &str) -> Result<Self, VaultError> {
        if key_material.is_empty() {
            return Err(VaultError::InvalidKey);
        }

        let mut key = [0u8; 32];
        if key_material.len() == 64 && key_material.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode_to_slice(key_material, &mut key).map_err(|_| VaultError::InvalidKey)?;
        } else {
            let digest = Sha256::digest(key_material.as_bytes());
            key.copy_from_slice(&digest);
        }

        Ok(Self { key })
    }

    fn gcm_key(&self) -> Result<LessSafeKey, VaultError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key).map_err(|_| VaultError::InvalidKey)?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Seal a token into the three-segment GCM envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let key = self.gcm_key()?;

        let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| VaultError::Rng)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        // ring appends the tag to the buffer; the envelope keeps it separate.
        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::InvalidKey)?;
        let tag = in_out.split_off(in_out.len() - GCM_TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(tag),
            hex::encode(in_out)
        ))
    }

    /// Open an envelope in either the GCM or the legacy CBC format.
    pub fn decrypt(&self, envelope: &str) -> Result<String, VaultError> {
        let segments: Vec<&str> = envelope.split(':').collect();
        let plaintext = match segments.as_slice() {
            [iv, tag, ciphertext] => self.open_gcm(iv, tag, ciphertext)?,
            [iv, ciphertext] => self.open_legacy_cbc(iv, ciphertext)?,
            _ => {
                return Err(VaultError::MalformedEnvelope(format!(
                    "expected 2 or 3 segments, found {}",
                    segments.len()
                )));
            }
        };

        String::from_utf8(plaintext).map_err(|_| VaultError::InvalidPlaintext)
    }

    fn open_gcm(&self, iv: &str, tag: &str, ciphertext: &str) -> Result<Vec<u8>, VaultError> {
        let iv = decode_segment("iv", iv)?;
        let tag = decode_segment("tag", tag)?;
        let mut in_out = decode_segment("ciphertext", ciphertext)?;

        let nonce_bytes: [u8; GCM_NONCE_LEN] = iv
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::MalformedEnvelope(format!("iv must be {GCM_NONCE_LEN} bytes")))?;
        if tag.len() != GCM_TAG_LEN {
            return Err(VaultError::MalformedEnvelope(format!(
                "tag must be {GCM_TAG_LEN} bytes"
            )));
        }

        in_out.extend_from_slice(&tag);
        let key = self.gcm_key()?;
        let plaintext = key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| VaultError::TamperDetected)?;

        Ok(plaintext.to_vec())
    }

    fn open_legacy_cbc(&self, iv: &str, ciphertext: &str) -> Result<Vec<u8>, VaultError> {
        let iv = decode_segment("iv", iv)?;
        let ciphertext = decode_segment("ciphertext", ciphertext)?;

        if iv.len() != CBC_BLOCK_LEN {
            return Err(VaultError::MalformedEnvelope(format!(
                "legacy iv must be {CBC_BLOCK_LEN} bytes"
            )));
        }
        if ciphertext.is_empty() || ciphertext.len() % CBC_BLOCK_LEN != 0 {
            return Err(VaultError::MalformedEnvelope(
                "legacy ciphertext is not block aligned".to_string(),
            ));
        }

        let cipher = Aes256::new(GenericArray::from_slice(&self.key));
        let mut previous = iv;
        let mut decrypted = Vec::with_capacity(ciphertext.len());

        for chunk in ciphertext.chunks(CBC_BLOCK_LEN) {
            let mut block = GenericArray::clone_from_slice(chunk);
            cipher.decrypt_block(&mut block);
            decrypted.extend(block.iter().zip(&previous).map(|(b, p)| b ^ p));
            previous = chunk.to_vec();
        }

        strip_pkcs7(&mut decrypted)?;
        Ok(decrypted)
    }
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, VaultError> {
    hex::decode(segment).map_err(|_| VaultError::MalformedEnvelope(format!("{name} is not hex")))
}

fn strip_pkcs7(data: &mut Vec<u8>) -> Result<(), VaultError> {
    let pad_len = usize::from(*data.last().ok_or(VaultError::LegacyDecryptFailed)?);
    if pad_len == 0 || pad_len > CBC_BLOCK_LEN || pad_len > data.len() {
        return Err(VaultError::LegacyDecryptFailed);
    }
    let valid = data[data.len() - pad_len..]
        .iter()
        .all(|&b| usize::from(b) == pad_len);
    if !valid {
        return Err(VaultError::LegacyDecryptFailed);
    }
    data.truncate(data.len() - pad_len);
    Ok(())
}
