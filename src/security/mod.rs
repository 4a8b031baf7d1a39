use anyhow::{Result, Context, anyhow};
use log::debug;
use rand::{RngCore, rngs::OsRng};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use sha2::Sha256;
use hmac::{Hmac, Mac};
use base64::{engine::general_purpose, Engine as _};

pub mod codes;
pub mod password;

pub use codes::{generate_verification_code, generate_verification_token, CodeVerifier};
pub use password::{evaluate_password_strength, PasswordStrength, PasswordStrengthReport};

// Length of the AES-256 key
pub const AES_KEY_LEN: usize = 32;
// Length of the nonce for AES-GCM
const NONCE_LEN: usize = 12;

/// Generate a random AES-256 key
pub fn generate_encryption_key() -> [u8; AES_KEY_LEN] {
    let mut key = [0u8; AES_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Encrypt data with AES-256-GCM
pub fn encrypt(plaintext: &[u8], key: &[u8; AES_KEY_LEN]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| anyhow!("Failed to create AES cipher"))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher.encrypt(nonce, plaintext)
        .map_err(|_| anyhow!("Encryption failed"))?;

    // Nonce is stored in front of the ciphertext
    let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt data with AES-256-GCM
pub fn decrypt(ciphertext: &[u8], key: &[u8; AES_KEY_LEN]) -> Result<Vec<u8>> {
    if ciphertext.len() <= NONCE_LEN {
        return Err(anyhow!("Invalid ciphertext length"));
    }

    let (nonce_bytes, actual_ciphertext) = ciphertext.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| anyhow!("Failed to create AES cipher"))?;

    cipher.decrypt(nonce, actual_ciphertext)
        .map_err(|_| anyhow!("Decryption failed"))
}

/// Encrypt a string with AES-256-GCM and encode with base64
pub fn encrypt_string(plaintext: &str, key: &[u8; AES_KEY_LEN]) -> Result<String> {
    let encrypted = encrypt(plaintext.as_bytes(), key)?;
    Ok(general_purpose::STANDARD.encode(encrypted))
}

/// Decrypt a base64-encoded AES-256-GCM ciphertext
pub fn decrypt_string(ciphertext: &str, key: &[u8; AES_KEY_LEN]) -> Result<String> {
    let decoded = general_purpose::STANDARD.decode(ciphertext)
        .context("Failed to decode base64 ciphertext")?;

    let decrypted = decrypt(&decoded, key)?;

    String::from_utf8(decrypted)
        .context("Failed to convert decrypted data to UTF-8 string")
}

/// Calculate HMAC-SHA256 over `data`
pub fn calculate_hmac(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|_| anyhow!("Failed to create HMAC"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify HMAC-SHA256 in constant time
pub fn verify_hmac(data: &[u8], key: &[u8], expected_hmac: &[u8]) -> Result<bool> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|_| anyhow!("Failed to create HMAC"))?;
    mac.update(data);

    match mac.verify_slice(expected_hmac) {
        Ok(_) => Ok(true),
        Err(_) => {
            debug!("HMAC verification failed");
            Ok(false)
        }
    }
}

/// Derive an encryption key from a password using PBKDF2
pub fn derive_key_from_password(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; AES_KEY_LEN]> {
    use pbkdf2::pbkdf2;

    let mut key = [0u8; AES_KEY_LEN];

    pbkdf2::<Hmac<Sha256>>(
        password.as_bytes(),
        salt,
        iterations,
        &mut key,
    ).map_err(|_| anyhow!("Failed to derive key from password"))?;

    Ok(key)
}
