//! Cryptographic operations
//!
//! Key-pair generation, hybrid message encryption, and payload signatures
//! for federation. Messages are encrypted with a fresh AES-256-GCM key per
//! call; the key is wrapped with the recipient's RSA public key (OAEP,
//! SHA-256). Signatures are RSA-PSS over a SHA-256 digest.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pss, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Identifier of the hybrid encryption scheme.
///
/// Recorded on every encrypted payload so the scheme can evolve without
/// breaking stored messages.
pub const HYBRID_ALGORITHM: &str = "RSA-OAEP+AES256GCM";

/// RSA key size for user and server identities
pub const DEFAULT_KEY_BITS: usize = 4096;

/// AES-256-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// SHA-256 digest length in bytes
const DIGEST_LEN: usize = 32;

/// A PEM-encoded RSA key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// SPKI PEM public key
    pub public_key_pem: String,
    /// PKCS#8 PEM private key
    pub private_key_pem: String,
}

/// Hybrid-encrypted message payload
///
/// `cipher_text` is `base64(nonce || aes-gcm ciphertext)`; `wrapped_key`
/// is the base64 RSA-OAEP encryption of the AES key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub cipher_text: String,
    pub wrapped_key: String,
    pub algorithm: String,
}

/// Generate an RSA-4096 key pair for a federated identity
///
/// Generated once at registration; rotation is out of scope. Entropy
/// failure is treated as fatal and surfaces as an internal error.
pub fn generate_key_pair() -> Result<KeyPair, AppError> {
    generate_key_pair_with_bits(DEFAULT_KEY_BITS)
}

/// Generate a key pair with an explicit key size
///
/// The size is a deployment tunable for the server identity; user keys
/// always use [`DEFAULT_KEY_BITS`].
pub fn generate_key_pair_with_bits(bits: usize) -> Result<KeyPair, AppError> {
    let mut rng = rand::thread_rng();
    let private_key =
        RsaPrivateKey::new(&mut rng, bits).map_err(|e| AppError::Internal(e.into()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(e.into()))?
        .to_string();
    let public_key_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(KeyPair {
        public_key_pem,
        private_key_pem,
    })
}

/// Encrypt a message for a recipient
///
/// A fresh symmetric key and nonce are generated per call, so two
/// encryptions of identical plaintext never produce the same ciphertext.
pub fn encrypt_message(
    plaintext: &str,
    recipient_public_key_pem: &str,
) -> Result<EncryptedPayload, AppError> {
    let public_key = RsaPublicKey::from_public_key_pem(recipient_public_key_pem)
        .map_err(|e| AppError::Validation(format!("Invalid public key: {}", e)))?;

    let mut rng = rand::thread_rng();

    // Fresh symmetric key and nonce for this message only
    let mut symmetric_key = [0u8; 32];
    rng.fill_bytes(&mut symmetric_key);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&symmetric_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("cipher init failed: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("encryption failed: {}", e)))?;

    let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    framed.extend_from_slice(&nonce_bytes);
    framed.extend_from_slice(&ciphertext);

    let wrapped_key = public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &symmetric_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("key wrap failed: {}", e)))?;

    Ok(EncryptedPayload {
        cipher_text: BASE64.encode(framed),
        wrapped_key: BASE64.encode(wrapped_key),
        algorithm: HYBRID_ALGORITHM.to_string(),
    })
}

/// Decrypt a hybrid-encrypted message
///
/// Every failure mode (unknown algorithm, wrong key, tampered
/// ciphertext, malformed encoding) is reported as the same
/// [`AppError::Decryption`] so callers cannot be used as a padding or
/// key-confirmation oracle.
pub fn decrypt_message(
    payload: &EncryptedPayload,
    private_key_pem: &str,
) -> Result<String, AppError> {
    if payload.algorithm != HYBRID_ALGORITHM {
        return Err(AppError::Decryption);
    }

    let private_key =
        RsaPrivateKey::from_pkcs8_pem(private_key_pem).map_err(|_| AppError::Decryption)?;

    let wrapped = BASE64
        .decode(&payload.wrapped_key)
        .map_err(|_| AppError::Decryption)?;
    let symmetric_key = private_key
        .decrypt(Oaep::new::<Sha256>(), &wrapped)
        .map_err(|_| AppError::Decryption)?;
    if symmetric_key.len() != 32 {
        return Err(AppError::Decryption);
    }

    let framed = BASE64
        .decode(&payload.cipher_text)
        .map_err(|_| AppError::Decryption)?;
    if framed.len() < NONCE_LEN {
        return Err(AppError::Decryption);
    }
    let (nonce_bytes, ciphertext) = framed.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(&symmetric_key).map_err(|_| AppError::Decryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| AppError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| AppError::Decryption)
}

/// Maximum PSS salt length for a key, in bytes
fn max_salt_len(key_bytes: usize) -> usize {
    key_bytes.saturating_sub(DIGEST_LEN + 2)
}

/// Sign data with a private key
///
/// RSA-PSS over a SHA-256 digest with the salt length maximized for the
/// key size. Returns a base64-encoded signature.
pub fn sign(data: &[u8], private_key_pem: &str) -> Result<String, AppError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| AppError::Validation(format!("Invalid private key: {}", e)))?;

    let digest = Sha256::digest(data);
    let salt_len = max_salt_len(private_key.size());

    let mut rng = rand::thread_rng();
    let signature = private_key
        .sign_with_rng(&mut rng, Pss::new_with_salt::<Sha256>(salt_len), &digest)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("signing failed: {}", e)))?;

    Ok(BASE64.encode(signature))
}

/// Verify a signature
///
/// Never errors: malformed keys, malformed signatures, and tampered data
/// all uniformly return `false`.
pub fn verify(data: &[u8], signature_b64: &str, public_key_pem: &str) -> bool {
    let Ok(public_key) = RsaPublicKey::from_public_key_pem(public_key_pem) else {
        return false;
    };
    let Ok(signature) = BASE64.decode(signature_b64) else {
        return false;
    };

    let digest = Sha256::digest(data);
    let salt_len = max_salt_len(public_key.size());

    public_key
        .verify(Pss::new_with_salt::<Sha256>(salt_len), &digest, &signature)
        .is_ok()
}
