use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use k256::ecdh::{EphemeralSecret, diffie_hellman};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::collaborators::KeyEncryptor;

const EPHEMERAL_KEY_LEN: usize = 65;
const NONCE_LEN: usize = 12;

/// ECIES-style encryption to a secp256k1 public key.
///
/// Output is hex of `ephemeral_pubkey (65, uncompressed) || nonce (12) || ciphertext+tag`.
/// The AES-256-GCM key is `sha256(ecdh_shared_x)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Encryptor;

impl KeyEncryptor for Secp256k1Encryptor {
    fn encrypt(&self, plaintext: &str, public_key: &str) -> Result<String, String> {
        encrypt_to_public_key(plaintext, public_key)
    }
}

pub fn encrypt_to_public_key(plaintext: &str, public_key_hex: &str) -> Result<String, String> {
    let recipient = parse_public_key(public_key_hex)?;

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let shared = ephemeral.diffie_hellman(&recipient);
    let cipher = cipher_for(shared.raw_secret_bytes().as_slice())?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| "encryption failed".to_string())?;

    let ephemeral_public = ephemeral.public_key().to_encoded_point(false);
    let mut out = Vec::with_capacity(EPHEMERAL_KEY_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(hex::encode(out))
}

/// Inverse of [`encrypt_to_public_key`], for the holder of the network private key.
pub fn decrypt_with_secret_key(ciphertext_hex: &str, secret_key_hex: &str) -> Result<String, String> {
    let secret_bytes = decode_hex(secret_key_hex).map_err(|e| format!("invalid secret key: {e}"))?;
    let secret =
        SecretKey::from_slice(&secret_bytes).map_err(|e| format!("invalid secret key: {e}"))?;

    let raw = decode_hex(ciphertext_hex).map_err(|e| format!("invalid ciphertext: {e}"))?;
    if raw.len() <= EPHEMERAL_KEY_LEN + NONCE_LEN {
        return Err("ciphertext too short".to_string());
    }
    let (ephemeral_bytes, rest) = raw.split_at(EPHEMERAL_KEY_LEN);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    let ephemeral = PublicKey::from_sec1_bytes(ephemeral_bytes)
        .map_err(|e| format!("invalid ephemeral key: {e}"))?;
    let shared = diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
    let cipher = cipher_for(shared.raw_secret_bytes().as_slice())?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| "decryption failed".to_string())?;
    String::from_utf8(plaintext).map_err(|e| format!("plaintext is not utf-8: {e}"))
}

fn parse_public_key(input: &str) -> Result<PublicKey, String> {
    let bytes = decode_hex(input).map_err(|e| format!("invalid public key: {e}"))?;
    // Raw 64-byte keys are uncompressed points without the 0x04 tag.
    let bytes = if bytes.len() == 64 {
        let mut tagged = Vec::with_capacity(65);
        tagged.push(0x04);
        tagged.extend_from_slice(&bytes);
        tagged
    } else {
        bytes
    };
    PublicKey::from_sec1_bytes(&bytes).map_err(|e| format!("invalid public key: {e}"))
}

fn cipher_for(shared_x: &[u8]) -> Result<Aes256Gcm, String> {
    let key = Sha256::digest(shared_x);
    Aes256Gcm::new_from_slice(&key).map_err(|e| format!("cipher init failed: {e}"))
}

fn decode_hex(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = input.trim();
    hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (String, String) {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key().to_encoded_point(true);
        (
            hex::encode(secret.to_bytes()),
            format!("0x{}", hex::encode(public.as_bytes())),
        )
    }

    #[test]
    fn only_the_key_holder_can_recover_the_signature() {
        let (secret, public) = keypair();
        let (other_secret, _) = keypair();
        let signature = "0x6e1f4a8b0c";

        let sealed = encrypt_to_public_key(signature, &public).expect("encrypt");
        assert!(!sealed.contains("6e1f4a8b0c"));
        assert_eq!(
            decrypt_with_secret_key(&sealed, &secret).expect("decrypt"),
            signature
        );
        assert!(decrypt_with_secret_key(&sealed, &other_secret).is_err());
    }

    #[test]
    fn accepts_untagged_uncompressed_keys() {
        let secret = SecretKey::random(&mut OsRng);
        let uncompressed = secret.public_key().to_encoded_point(false);
        let untagged = hex::encode(&uncompressed.as_bytes()[1..]);

        let sealed = Secp256k1Encryptor
            .encrypt("payload", &untagged)
            .expect("encrypt");
        let recovered =
            decrypt_with_secret_key(&sealed, &hex::encode(secret.to_bytes())).expect("decrypt");
        assert_eq!(recovered, "payload");
    }

    #[test]
    fn rejects_malformed_public_key() {
        let err = encrypt_to_public_key("x", "0xnot-a-key").expect_err("must fail");
        assert!(err.starts_with("invalid public key"));
    }
}
