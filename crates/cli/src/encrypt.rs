// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use act_crypto::{encrypt_string, PublicKey};
use anyhow::Result;

pub fn execute(recipient: &PublicKey, text: &str) -> Result<()> {
    println!("0x{}", encrypt_string(text, recipient)?);
    Ok(())
}
