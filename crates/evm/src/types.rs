// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::cancel::CancelSignal;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};

/// An unsigned contract call. Built fresh per submission and never mutated once sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    /// Fee cap supplied by the caller. `None` lets the service estimate.
    pub gas_price: Option<U256>,
    /// `0` means "estimate".
    pub gas_limit: u64,
    pub value: U256,
    pub description: String,
}

impl TxRequest {
    pub fn new(to: Address, data: impl Into<Bytes>, description: impl Into<String>) -> Self {
        Self {
            to,
            data: data.into(),
            gas_price: None,
            gas_limit: 0,
            value: U256::ZERO,
            description: description.into(),
        }
    }

    pub fn with_gas_price(mut self, gas_price: Option<U256>) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}

/// Outcome of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub status: bool,
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub logs: Vec<LogRecord>,
}

/// A raw ledger log, forwarded verbatim to subscribers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogRecord {
    pub transaction_hash: Option<TxHash>,
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
}

impl LogRecord {
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// Address + topic0 filter over an inclusive block range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFilter {
    pub contract_address: Address,
    pub event_signature: B256,
    pub from_block: u64,
    pub to_block: u64,
}

impl EventFilter {
    /// A filter covering `page_size` blocks starting at `from_block`. A zero page size is
    /// treated as one block.
    pub fn page(
        contract_address: Address,
        event_signature: B256,
        from_block: u64,
        page_size: u64,
    ) -> Self {
        let to_block = from_block.saturating_add(page_size.max(1) - 1);
        Self {
            contract_address,
            event_signature,
            from_block,
            to_block,
        }
    }
}

/// Per-call parameters for a submission.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    pub gas_price: Option<U256>,
    pub gas_limit: Option<u64>,
    pub cancel: CancelSignal,
}

impl CallContext {
    pub fn new(cancel: CancelSignal) -> Self {
        Self {
            cancel,
            ..Default::default()
        }
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_covers_page_size_blocks() {
        let filter = EventFilter::page(Address::ZERO, B256::ZERO, 1_000, 500);
        assert_eq!(filter.from_block, 1_000);
        assert_eq!(filter.to_block, 1_499);

        let filter = EventFilter::page(Address::ZERO, B256::ZERO, 100, 500);
        assert_eq!((filter.from_block, filter.to_block), (100, 599));
    }

    #[test]
    fn test_page_saturates_at_the_top() {
        let filter = EventFilter::page(Address::ZERO, B256::ZERO, u64::MAX - 10, 500);
        assert_eq!(filter.to_block, u64::MAX);
    }

    #[test]
    fn test_zero_page_size_is_a_single_block() {
        let filter = EventFilter::page(Address::ZERO, B256::ZERO, 42, 0);
        assert_eq!(filter.to_block, 42);
    }
}
