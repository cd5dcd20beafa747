// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The data contract, either as a bare address or with the block it was deployed in.
#[derive(Debug, Clone, Hash, Eq, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Contract {
    Full {
        address: String,
        deploy_block: Option<u64>,
    },
    AddressOnly(String),
}

impl Contract {
    pub fn address(&self) -> &str {
        match self {
            Contract::Full { address, .. } => address,
            Contract::AddressOnly(address) => address,
        }
    }

    pub fn parsed_address(&self) -> Result<Address> {
        self.address()
            .parse()
            .with_context(|| format!("Invalid contract address '{}'", self.address()))
    }

    pub fn deploy_block(&self) -> Option<u64> {
        match self {
            Contract::Full { deploy_block, .. } => *deploy_block,
            Contract::AddressOnly(_) => None,
        }
    }
}
