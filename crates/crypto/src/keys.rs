// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::error::{CryptoError, Result};
use alloy_primitives::{keccak256, Address};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{rngs::OsRng, RngCore};
use std::{fmt, str::FromStr};
use zeroize::Zeroizing;

/// Length of an uncompressed SEC1 public key: `0x04 ‖ X ‖ Y`.
pub const PUBLIC_KEY_LEN: usize = 65;
/// Length of a big-endian secp256k1 scalar.
pub const SECRET_KEY_LEN: usize = 32;

const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;
// Rejection sampling a 256 bit value into [1, n) fails with probability ~2^-128 per draw.
const MAX_GENERATION_ATTEMPTS: usize = 16;

/// Removes an optional `0x` presentation prefix from hex input.
pub(crate) fn strip_hex_prefix(input: &str) -> &str {
    let input = input.trim();
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// A secp256k1 public key. Serializes to the 65 byte uncompressed encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    /// Parse an uncompressed SEC1 encoded key, checking length and curve membership.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(CryptoError::InvalidKeyEncoding(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            )));
        }
        if bytes[0] != SEC1_UNCOMPRESSED_TAG {
            return Err(CryptoError::InvalidKeyEncoding(format!(
                "expected uncompressed point tag 0x04, got 0x{:02x}",
                bytes[0]
            )));
        }
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKeyEncoding("point is not on secp256k1".to_string()))
    }

    /// Parse a hex encoded key. A leading `0x` is accepted.
    pub fn from_hex(input: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(input))
            .map_err(|e| CryptoError::InvalidKeyEncoding(format!("not valid hex: {e}")))?;
        Self::parse(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Lowercase hex without prefix, matching the encoding the desktop client stores.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// The ledger account address controlled by this key.
    pub fn eth_address(&self) -> Address {
        let digest = keccak256(&self.to_bytes()[1..]);
        Address::from_slice(&digest[12..])
    }

    pub(crate) fn as_inner(&self) -> &k256::PublicKey {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;
    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// A secp256k1 private scalar. Zeroized on drop and never printed.
#[derive(Clone)]
pub struct SecretKey(k256::SecretKey);

impl SecretKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(CryptoError::InvalidKeyEncoding(format!(
                "expected {} byte scalar, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            )));
        }
        k256::SecretKey::from_slice(bytes).map(Self).map_err(|_| {
            CryptoError::InvalidKeyEncoding("scalar is zero or exceeds the curve order".to_string())
        })
    }

    pub fn from_hex(input: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(strip_hex_prefix(input))
                .map_err(|e| CryptoError::InvalidKeyEncoding(format!("not valid hex: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LEN]> {
        let mut out = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.to_bytes()[..]))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub(crate) fn as_inner(&self) -> &k256::SecretKey {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// A private scalar together with its public point.
///
/// Owned by whichever party generated it; only the public half is ever shared.
#[derive(Clone, Debug)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a key pair from the operating system entropy source.
    pub fn generate() -> Result<Self> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a key pair from the given entropy source.
    ///
    /// Fails only when the source cannot produce bytes.
    pub fn generate_with<R: RngCore>(rng: &mut R) -> Result<Self> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let mut candidate = Zeroizing::new([0u8; SECRET_KEY_LEN]);
            rng.try_fill_bytes(&mut candidate[..])
                .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
            if let Ok(secret) = k256::SecretKey::from_slice(&candidate[..]) {
                return Ok(Self::from_secret(SecretKey(secret)));
            }
        }
        Err(CryptoError::KeyGeneration(
            "entropy source did not yield a valid scalar".to_string(),
        ))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}
