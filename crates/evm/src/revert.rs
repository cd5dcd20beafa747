// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Typed lookup from revert selectors to decoders.
//!
//! The table is built once from the error types a contract declares and is immutable
//! afterwards. The builtin `Error(string)` and `Panic(uint256)` are always present.

use alloy::sol_types::{Panic, Revert, SolError};
use std::{collections::HashMap, fmt};

type Selector = [u8; 4];
type DecodeFn = fn(&[u8]) -> Option<String>;

#[derive(Clone, Copy)]
struct RevertSpec {
    name: &'static str,
    signature: &'static str,
    decode: DecodeFn,
}

/// A revert payload matched to a known error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedRevert {
    pub name: String,
    pub signature: String,
    pub details: String,
}

impl fmt::Display for DecodedRevert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.details.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.details)
        }
    }
}

#[derive(Clone)]
pub struct RevertTable {
    entries: HashMap<Selector, RevertSpec>,
}

impl RevertTable {
    pub fn builder() -> RevertTableBuilder {
        RevertTableBuilder::default()
    }

    /// Table holding only the builtin errors.
    pub fn builtin() -> Self {
        Self::builder().build()
    }

    pub fn contains(&self, selector: [u8; 4]) -> bool {
        self.entries.contains_key(&selector)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode revert data. Unknown selectors and malformed arguments yield `None`.
    pub fn decode(&self, data: &[u8]) -> Option<DecodedRevert> {
        let selector: Selector = data.get(..4)?.try_into().ok()?;
        let spec = self.entries.get(&selector)?;
        let details = (spec.decode)(data)?;
        Some(DecodedRevert {
            name: spec.name.to_string(),
            signature: spec.signature.to_string(),
            details,
        })
    }
}

impl Default for RevertTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for RevertTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut signatures: Vec<_> = self.entries.values().map(|s| s.signature).collect();
        signatures.sort_unstable();
        f.debug_struct("RevertTable")
            .field("errors", &signatures)
            .finish()
    }
}

pub struct RevertTableBuilder {
    entries: HashMap<Selector, RevertSpec>,
}

impl Default for RevertTableBuilder {
    fn default() -> Self {
        let mut builder = Self {
            entries: HashMap::new(),
        };
        builder.insert::<Revert>(decode_error_string);
        builder.insert::<Panic>(decode_panic);
        builder
    }
}

impl RevertTableBuilder {
    /// Register a custom error declared by the contract.
    pub fn error<E: SolError + fmt::Debug>(mut self) -> Self {
        self.insert::<E>(decode_custom::<E>);
        self
    }

    pub fn build(self) -> RevertTable {
        RevertTable {
            entries: self.entries,
        }
    }

    fn insert<E: SolError>(&mut self, decode: DecodeFn) {
        let signature = E::SIGNATURE;
        let name = signature.split('(').next().unwrap_or(signature);
        self.entries.insert(
            E::SELECTOR,
            RevertSpec {
                name,
                signature,
                decode,
            },
        );
    }
}

fn decode_error_string(data: &[u8]) -> Option<String> {
    Revert::abi_decode(data).ok().map(|revert| revert.reason)
}

fn decode_panic(data: &[u8]) -> Option<String> {
    let panic = Panic::abi_decode(data).ok()?;
    Some(match panic.kind() {
        Some(kind) => format!("{} ({:#x})", kind.as_str(), panic.code),
        None => format!("code {:#x}", panic.code),
    })
}

fn decode_custom<E: SolError + fmt::Debug>(data: &[u8]) -> Option<String> {
    E::abi_decode(data).ok().map(|err| format!("{err:?}"))
}
