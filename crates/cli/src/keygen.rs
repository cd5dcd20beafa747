// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use act_crypto::KeyPair;
use anyhow::Result;

pub fn execute() -> Result<()> {
    let pair = KeyPair::generate()?;
    println!("public_key:  {}", pair.public_key());
    println!("address:     {}", pair.public_key().eth_address());
    println!("private_key: 0x{}", pair.secret_key().to_hex().as_str());
    Ok(())
}
