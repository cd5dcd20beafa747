// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod cipher;
mod error;
mod keys;

pub use cipher::{decrypt, decrypt_string, encrypt, encrypt_string};
pub use error::{CryptoError, Result};
pub use keys::{KeyPair, PublicKey, SecretKey, PUBLIC_KEY_LEN, SECRET_KEY_LEN};
