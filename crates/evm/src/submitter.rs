// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Sends a contract call, waits for it to be mined and turns failures into typed errors.

use crate::{
    revert::{DecodedRevert, RevertTable},
    types::{CallContext, Receipt, TxRequest},
};
use alloy::primitives::{Bytes, TxHash};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error reported by a [`TransactionService`]. Carries revert bytes when the node returned them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TxServiceError {
    pub message: String,
    pub revert_data: Option<Bytes>,
}

impl TxServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            revert_data: None,
        }
    }

    pub fn with_revert_data(mut self, data: impl Into<Bytes>) -> Self {
        self.revert_data = Some(data.into());
        self
    }
}

/// Signs, broadcasts and tracks transactions.
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Sign and broadcast `request`, raising the priority fee by `tip_boost_percent`.
    async fn send(&self, request: &TxRequest, tip_boost_percent: u32)
        -> Result<TxHash, TxServiceError>;

    /// Resolve once the transaction is mined.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, TxServiceError>;

    /// Replay `request` as a call against the latest state and return the revert payload,
    /// if any.
    async fn revert_data(&self, request: &TxRequest) -> Option<Bytes>;
}

/// Why a send or a receipt wait did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Service(#[from] TxServiceError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The transaction was never broadcast.
    #[error("{operation}: failed to send transaction: {cause}")]
    TransactionSend {
        operation: String,
        cause: CallFailure,
    },

    /// The transaction was mined with a failed status.
    #[error("{operation}: transaction {tx_hash} reverted")]
    TransactionReverted {
        operation: String,
        tx_hash: TxHash,
        receipt: Box<Receipt>,
    },

    /// The transaction may have been broadcast but its outcome is unknown.
    #[error("{operation}: no receipt for transaction {}: {cause}", display_hash(.tx_hash))]
    ReceiptTimeoutOrCancelled {
        operation: String,
        tx_hash: Option<TxHash>,
        cause: CallFailure,
    },

    /// Any of the above, with the revert payload decoded.
    #[error("{}: execution reverted: {reason}", .source.operation())]
    Revert {
        reason: DecodedRevert,
        #[source]
        source: Box<SubmitError>,
    },
}

fn display_hash(tx_hash: &Option<TxHash>) -> String {
    tx_hash
        .map(|h| h.to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

impl SubmitError {
    pub fn operation(&self) -> &str {
        match self {
            SubmitError::TransactionSend { operation, .. }
            | SubmitError::TransactionReverted { operation, .. }
            | SubmitError::ReceiptTimeoutOrCancelled { operation, .. } => operation,
            SubmitError::Revert { source, .. } => source.operation(),
        }
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            SubmitError::TransactionSend { .. } => None,
            SubmitError::TransactionReverted { tx_hash, .. } => Some(*tx_hash),
            SubmitError::ReceiptTimeoutOrCancelled { tx_hash, .. } => *tx_hash,
            SubmitError::Revert { source, .. } => source.tx_hash(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            SubmitError::TransactionSend { cause, .. }
            | SubmitError::ReceiptTimeoutOrCancelled { cause, .. } => {
                *cause == CallFailure::Cancelled
            }
            SubmitError::TransactionReverted { .. } => false,
            SubmitError::Revert { source, .. } => source.is_cancelled(),
        }
    }

    fn embedded_revert_data(&self) -> Option<Bytes> {
        match self {
            SubmitError::TransactionSend {
                cause: CallFailure::Service(e),
                ..
            }
            | SubmitError::ReceiptTimeoutOrCancelled {
                cause: CallFailure::Service(e),
                ..
            } => e.revert_data.clone(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitterConfig {
    /// When off, transactions are sent without a default gas limit and the service estimates.
    pub set_gas_limit: bool,
    pub default_gas_limit: u64,
    pub tip_boost_percent: u32,
}

impl SubmitterConfig {
    pub fn effective_default_gas_limit(&self) -> u64 {
        if self.set_gas_limit {
            self.default_gas_limit
        } else {
            0
        }
    }
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            set_gas_limit: false,
            default_gas_limit: 1_000_000,
            tip_boost_percent: 25,
        }
    }
}

pub struct TransactionSubmitter<S> {
    service: Arc<S>,
    reverts: RevertTable,
    config: SubmitterConfig,
}

impl<S> Clone for TransactionSubmitter<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            reverts: self.reverts.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: TransactionService> TransactionSubmitter<S> {
    pub fn new(service: Arc<S>, reverts: RevertTable, config: SubmitterConfig) -> Self {
        Self {
            service,
            reverts,
            config,
        }
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    pub fn build_request(
        &self,
        ctx: &CallContext,
        to: alloy::primitives::Address,
        call_data: Bytes,
        description: &str,
    ) -> TxRequest {
        let gas_limit = ctx
            .gas_limit
            .unwrap_or(0)
            .max(self.config.effective_default_gas_limit());
        TxRequest::new(to, call_data, description)
            .with_gas_price(ctx.gas_price)
            .with_gas_limit(gas_limit)
    }

    /// Submit a call to `to` and wait until it is mined.
    ///
    /// No retries happen here. When the failure carries or reproduces revert data known to
    /// the [`RevertTable`], the error is wrapped in [`SubmitError::Revert`].
    pub async fn submit(
        &self,
        ctx: &CallContext,
        to: alloy::primitives::Address,
        call_data: Bytes,
        description: &str,
    ) -> Result<Receipt, SubmitError> {
        let request = self.build_request(ctx, to, call_data, description);
        debug!(
            operation = description,
            to = %request.to,
            gas_limit = request.gas_limit,
            gas_price = ?request.gas_price,
            "Submitting transaction"
        );

        match self.send_and_confirm(ctx, &request).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => Err(self.decode_revert(ctx, &request, err).await),
        }
    }

    async fn send_and_confirm(
        &self,
        ctx: &CallContext,
        request: &TxRequest,
    ) -> Result<Receipt, SubmitError> {
        let operation = request.description.clone();

        if ctx.cancel.is_cancelled() {
            return Err(SubmitError::TransactionSend {
                operation,
                cause: CallFailure::Cancelled,
            });
        }

        let tx_hash = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(SubmitError::ReceiptTimeoutOrCancelled {
                    operation,
                    tx_hash: None,
                    cause: CallFailure::Cancelled,
                });
            }
            sent = self.service.send(request, self.config.tip_boost_percent) => {
                sent.map_err(|e| SubmitError::TransactionSend {
                    operation: operation.clone(),
                    cause: e.into(),
                })?
            }
        };
        info!(tx = %tx_hash, operation = %operation, "Transaction sent");

        let receipt = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(SubmitError::ReceiptTimeoutOrCancelled {
                    operation,
                    tx_hash: Some(tx_hash),
                    cause: CallFailure::Cancelled,
                });
            }
            mined = self.service.wait_for_receipt(tx_hash) => {
                mined.map_err(|e| SubmitError::ReceiptTimeoutOrCancelled {
                    operation: operation.clone(),
                    tx_hash: Some(tx_hash),
                    cause: e.into(),
                })?
            }
        };

        if !receipt.status {
            warn!(tx = %tx_hash, operation = %operation, block = ?receipt.block_number, "Transaction reverted");
            return Err(SubmitError::TransactionReverted {
                operation,
                tx_hash,
                receipt: Box::new(receipt),
            });
        }

        info!(
            tx = %receipt.transaction_hash,
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            operation = %operation,
            "Transaction confirmed"
        );
        Ok(receipt)
    }

    async fn decode_revert(
        &self,
        ctx: &CallContext,
        request: &TxRequest,
        err: SubmitError,
    ) -> SubmitError {
        let data = match err.embedded_revert_data() {
            Some(data) => Some(data),
            None if ctx.cancel.is_cancelled() => None,
            None => self.service.revert_data(request).await,
        };

        match data.and_then(|data| self.reverts.decode(&data)) {
            Some(reason) => {
                warn!(operation = err.operation(), %reason, "Decoded revert reason");
                SubmitError::Revert {
                    reason,
                    source: Box::new(err),
                }
            }
            None => err,
        }
    }
}
