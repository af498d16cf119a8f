//! Cryptographic operations using age encryption.
//!
//! The installation identity is an age x25519 keypair. The private half is
//! stored in its armored text form (`AGE-SECRET-KEY-…`) at mode 0600; the
//! secrets document is encrypted to the identity's own recipient with fresh
//! ephemeral keying on every write.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use age::secrecy::ExposeSecret;
use age::x25519;

use crate::core::fsio;
use crate::error::{CryptoError, Result};

/// Generate a new identity and write it to `path` with mode 0600.
pub fn generate_identity(path: &Path) -> Result<x25519::Identity> {
    let identity = x25519::Identity::generate();

    let secret = identity.to_string();
    let contents = format!("{}\n", secret.expose_secret());
    fsio::atomic_write_mode(path, contents.as_bytes(), fsio::SECURE_FILE_MODE)?;

    Ok(identity)
}

/// Load the identity from its key file.
///
/// # Errors
///
/// Returns `CryptoError::IdentityNotFound` when the file is missing and
/// `CryptoError::InvalidIdentity` when it does not parse.
pub fn load_identity(path: &Path) -> Result<x25519::Identity> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CryptoError::IdentityNotFound(path.to_path_buf()).into());
        }
        Err(e) => return Err(e.into()),
    };

    contents
        .trim()
        .parse::<x25519::Identity>()
        .map_err(|e| CryptoError::InvalidIdentity(e.to_string()).into())
}

/// Encrypt plaintext to a single recipient.
pub fn encrypt(plaintext: &[u8], recipient: &x25519::Recipient) -> Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(recipient as &dyn age::Recipient))
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut ciphertext = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut ciphertext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    writer
        .write_all(plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(ciphertext)
}

/// Decrypt ciphertext with the installation identity.
pub fn decrypt(ciphertext: &[u8], identity: &x25519::Identity) -> Result<Vec<u8>> {
    let decryptor = age::Decryptor::new(ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn age::Identity))
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    let mut plaintext = Vec::new();
    reader
        .read_to_end(&mut plaintext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    Ok(plaintext)
}
