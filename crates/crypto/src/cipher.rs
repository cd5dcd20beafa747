// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::error::{CryptoError, Result};
use crate::keys::{strip_hex_prefix, PublicKey, SecretKey};
use aes::Aes256;
use alloy_primitives::keccak256;
use ctr::cipher::{generic_array::GenericArray, KeyIvInit, StreamCipher};
use k256::elliptic_curve::{group::Group, point::AffineCoordinates};
use tracing::trace;
use zeroize::Zeroizing;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

const AES_BLOCK_SIZE: usize = 16;
const SHARED_SECRET_LEN: usize = 32;

/// Encrypts `plaintext` for the holder of `recipient`'s private key.
///
/// Deterministic ECDH + AES-256-CTR:
/// 1. An ephemeral scalar is derived as `keccak256(recipient ‖ u64_be(len))`
/// 2. ECDH between the ephemeral scalar and the recipient key yields a point
/// 3. `keccak256(x)` of that point is the AES-256 key, its first 16 bytes the IV
/// 4. The payload is XORed with the CTR keystream
///
/// The output has exactly the length of the input and carries no nonce, tag or ephemeral key,
/// so it fits fixed-size ledger fields. The recipient rederives the same ephemeral key from
/// its own public key and the payload length.
///
/// # Security Trade-offs
///
/// - **No confidentiality.** Every input to the ephemeral scalar is public, so anyone holding
///   the recipient's public key can derive the AES key and decrypt. This is an obfuscating,
///   size-preserving encoding, not encryption against an observer
/// - Same recipient and same plaintext always give the same ciphertext
/// - Payloads of equal length for the same recipient share a keystream
/// - There is no integrity protection: tampered bytes decrypt to garbage without error
///
/// Use only where a size-preserving encoding is required.
pub fn encrypt(plaintext: &[u8], recipient: &PublicKey) -> Result<Vec<u8>> {
    trace!(len = plaintext.len(), "Encrypting payload");
    let ephemeral = derive_ephemeral_secret(recipient, plaintext.len())?;
    let shared_secret = derive_shared_secret(&ephemeral, recipient)?;
    Ok(apply_keystream(&shared_secret, plaintext))
}

/// Decrypts a payload produced by [`encrypt`] for the public half of `recipient`.
///
/// Decryption never fails structurally: a wrong key or a tampered payload yields wrong bytes.
/// The private key is not what keeps the payload secret: see the trade-offs on [`encrypt`].
pub fn decrypt(ciphertext: &[u8], recipient: &SecretKey) -> Result<Vec<u8>> {
    trace!(len = ciphertext.len(), "Decrypting payload");
    let ephemeral = derive_ephemeral_secret(&recipient.public_key(), ciphertext.len())?;
    let shared_secret = derive_shared_secret(recipient, &ephemeral.public_key())?;
    Ok(apply_keystream(&shared_secret, ciphertext))
}

/// Encrypts UTF-8 text and returns the ciphertext as lowercase hex.
pub fn encrypt_string(text: &str, recipient: &PublicKey) -> Result<String> {
    Ok(hex::encode(encrypt(text.as_bytes(), recipient)?))
}

/// Decrypts hex produced by [`encrypt_string`]. A leading `0x` is accepted.
pub fn decrypt_string(encrypted_hex: &str, recipient: &SecretKey) -> Result<String> {
    let encrypted = hex::decode(strip_hex_prefix(encrypted_hex))?;
    let decrypted = decrypt(&encrypted, recipient)?;
    String::from_utf8(decrypted).map_err(|_| CryptoError::InvalidUtf8)
}

/// Both sides must hash identical bytes here. The plaintext itself is unknown to the recipient,
/// so the payload length (preserved by the transform) stands in for it. Both values are public.
fn seed_material(recipient: &PublicKey, payload_len: usize) -> Vec<u8> {
    let mut material = Vec::with_capacity(65 + 8);
    material.extend_from_slice(&recipient.to_bytes());
    material.extend_from_slice(&(payload_len as u64).to_be_bytes());
    material
}

fn derive_ephemeral_secret(recipient: &PublicKey, payload_len: usize) -> Result<SecretKey> {
    let seed = Zeroizing::new(keccak256(seed_material(recipient, payload_len)).0);
    SecretKey::from_bytes(&seed[..]).map_err(|_| CryptoError::KeyDerivation)
}

/// `keccak256` of the ECDH x-coordinate.
///
/// The coordinate is hashed in its minimal big-endian form (leading zero bytes dropped), which
/// is how the desktop client has always encoded it.
pub(crate) fn derive_shared_secret(
    secret: &SecretKey,
    public: &PublicKey,
) -> Result<Zeroizing<[u8; SHARED_SECRET_LEN]>> {
    let shared = public.as_inner().to_projective() * *secret.as_inner().to_nonzero_scalar();
    if bool::from(shared.is_identity()) {
        return Err(CryptoError::SharedSecret);
    }

    let mut x = Zeroizing::new([0u8; SHARED_SECRET_LEN]);
    x.copy_from_slice(&shared.to_affine().x());
    let start = x.iter().position(|b| *b != 0).unwrap_or(x.len());

    Ok(Zeroizing::new(keccak256(&x[start..]).0))
}

/// CTR mode is its own inverse so this both encrypts and decrypts.
fn apply_keystream(shared_secret: &[u8; SHARED_SECRET_LEN], input: &[u8]) -> Vec<u8> {
    let key = GenericArray::from_slice(shared_secret);
    let iv = GenericArray::from_slice(&shared_secret[..AES_BLOCK_SIZE]);
    let mut cipher = Aes256Ctr::new(key, iv);

    let mut output = input.to_vec();
    cipher.apply_keystream(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use anyhow::Result;
    use proptest::prelude::*;

    #[test]
    fn test_notification_example() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let message = b"swarm-notification!0";

        let encrypted = encrypt(message, recipient.public_key())?;
        assert_eq!(encrypted.len(), 20);
        assert_ne!(&encrypted[..], &message[..]);

        let decrypted = decrypt(&encrypted, recipient.secret_key())?;
        assert_eq!(&decrypted[..], &message[..]);
        Ok(())
    }

    #[test]
    fn test_encrypt_is_deterministic() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let message = b"the same input twice";
        let first = encrypt(message, recipient.public_key())?;
        let second = encrypt(message, recipient.public_key())?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_different_recipients_get_different_ciphertexts() -> Result<()> {
        let alice = KeyPair::generate()?;
        let bob = KeyPair::generate()?;
        let message = b"one message for two recipients";
        assert_ne!(
            encrypt(message, alice.public_key())?,
            encrypt(message, bob.public_key())?
        );
        Ok(())
    }

    #[test]
    fn test_empty_payload() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let encrypted = encrypt(&[], recipient.public_key())?;
        assert!(encrypted.is_empty());
        assert!(decrypt(&encrypted, recipient.secret_key())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_multi_block_payload() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let message: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let encrypted = encrypt(&message, recipient.public_key())?;
        assert_eq!(encrypted.len(), message.len());
        assert_eq!(decrypt(&encrypted, recipient.secret_key())?, message);
        Ok(())
    }

    #[test]
    fn test_tampering_flips_only_the_touched_bit() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let message = b"swarm-notification!0";
        let encrypted = encrypt(message, recipient.public_key())?;

        for index in [0usize, 7, 19] {
            let mut tampered = encrypted.clone();
            tampered[index] ^= 0x01;
            let decrypted = decrypt(&tampered, recipient.secret_key())?;
            assert_eq!(decrypted.len(), message.len());
            for (i, (got, want)) in decrypted.iter().zip(message.iter()).enumerate() {
                if i == index {
                    assert_eq!(*got, *want ^ 0x01);
                } else {
                    assert_eq!(got, want);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_decrypt_with_unrelated_secret_is_not_detected() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let other = KeyPair::generate()?;
        let message = b"addressed to recipient";
        let encrypted = encrypt(message, recipient.public_key())?;

        // The unrelated key derives a different ephemeral scalar, and nothing flags the mismatch.
        let decrypted = decrypt(&encrypted, other.secret_key())?;
        assert_eq!(decrypted.len(), message.len());
        assert_ne!(&decrypted[..], &message[..]);
        Ok(())
    }

    #[test]
    fn test_public_key_alone_recovers_plaintext() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let message = b"swarm-notification!0";
        let encrypted = encrypt(message, recipient.public_key())?;

        let public = recipient.public_key();
        let ephemeral = derive_ephemeral_secret(public, encrypted.len())?;
        let shared_secret = derive_shared_secret(&ephemeral, public)?;
        assert_eq!(apply_keystream(&shared_secret, &encrypted), message.to_vec());
        Ok(())
    }

    #[test]
    fn test_equal_length_payloads_share_keystream() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let a = b"aaaaaaaaaaaaaaaa";
        let b = b"bbbbbbbbbbbbbbbb";
        let ca = encrypt(a, recipient.public_key())?;
        let cb = encrypt(b, recipient.public_key())?;
        let xor_cipher: Vec<u8> = ca.iter().zip(&cb).map(|(x, y)| x ^ y).collect();
        let xor_plain: Vec<u8> = a.iter().zip(b).map(|(x, y)| x ^ y).collect();
        assert_eq!(xor_cipher, xor_plain);
        Ok(())
    }

    #[test]
    fn test_shared_secret_agrees_in_both_roles() -> Result<()> {
        let alice = KeyPair::generate()?;
        let bob = KeyPair::generate()?;
        let from_alice = derive_shared_secret(alice.secret_key(), bob.public_key())?;
        let from_bob = derive_shared_secret(bob.secret_key(), alice.public_key())?;
        assert_eq!(*from_alice, *from_bob);
        Ok(())
    }

    #[test]
    fn test_string_roundtrip() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let encrypted = encrypt_string("ACT reference 0xabc", recipient.public_key())?;
        assert_eq!(encrypted.len(), 2 * "ACT reference 0xabc".len());

        let prefixed = format!("0x{encrypted}");
        assert_eq!(
            decrypt_string(&prefixed, recipient.secret_key())?,
            "ACT reference 0xabc"
        );
        Ok(())
    }

    #[test]
    fn test_decrypt_string_rejects_bad_hex() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let err = decrypt_string("zz", recipient.secret_key()).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidHex(_)));
        Ok(())
    }

    fn arb_keypair() -> impl Strategy<Value = KeyPair> {
        any::<[u8; 32]>().prop_filter_map("valid scalar", |bytes| {
            SecretKey::from_bytes(&bytes).ok().map(KeyPair::from_secret)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn length_is_preserved(pair in arb_keypair(), message in prop::collection::vec(any::<u8>(), 0..300)) {
            let encrypted = encrypt(&message, pair.public_key()).unwrap();
            prop_assert_eq!(encrypted.len(), message.len());
        }

        #[test]
        fn decrypt_inverts_encrypt(pair in arb_keypair(), message in prop::collection::vec(any::<u8>(), 0..300)) {
            let encrypted = encrypt(&message, pair.public_key()).unwrap();
            let decrypted = decrypt(&encrypted, pair.secret_key()).unwrap();
            prop_assert_eq!(decrypted, message);
        }
    }
}
