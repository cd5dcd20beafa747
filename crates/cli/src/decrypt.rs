// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use act_crypto::decrypt_string;
use act_evm::load_secret_key_from_env;
use anyhow::{Context, Result};

pub fn execute(key_env: &str, encrypted: &str) -> Result<()> {
    let key = load_secret_key_from_env(key_env)?;
    let text = decrypt_string(encrypted, &key)
        .context("Could not decrypt: input is not hex or the key does not match")?;
    println!("{text}");
    Ok(())
}
