// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thiserror::Error;

/// Failures of the key codec and the notification cipher.
///
/// Every variant is fatal to the single call that produced it. Nothing in this crate retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Could not derive ephemeral key: seed is not a valid secp256k1 scalar")]
    KeyDerivation,

    #[error("Could not derive shared secret: key agreement produced the point at infinity")]
    SharedSecret,

    #[error("Invalid hex input: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
