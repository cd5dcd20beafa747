// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! alloy-backed implementations of [`TransactionService`] and [`LogProvider`].

use crate::{
    helpers::EthProvider,
    submitter::{TransactionService, TxServiceError},
    subscriber::{LogProvider, LogSubscription, Unsubscribe},
    types::{EventFilter, LogRecord, Receipt, TxRequest},
};
use alloy::{
    network::{ReceiptResponse, TransactionBuilder},
    primitives::{Bytes, TxHash, B256},
    providers::{Provider, WalletProvider},
    pubsub::Subscription,
    rpc::types::{Filter, Log, TransactionReceipt, TransactionRequest},
    transports::TransportError,
};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::{collections::HashSet, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace};

const LOG_CHANNEL_CAPACITY: usize = 256;

fn service_error(err: TransportError) -> TxServiceError {
    let revert_data = err.as_error_resp().and_then(|payload| payload.as_revert_data());
    TxServiceError {
        message: err.to_string(),
        revert_data,
    }
}

/// Fees to send with, given the node's EIP-1559 estimate.
///
/// The priority fee is raised by `tip_boost_percent` and the fee cap by the same absolute
/// amount. A caller-supplied `gas_price` replaces the fee cap and bounds the tip.
pub fn boosted_fees(
    estimated_max_fee: u128,
    estimated_tip: u128,
    tip_boost_percent: u32,
    gas_price: Option<u128>,
) -> (u128, u128) {
    let boost = estimated_tip.saturating_mul(tip_boost_percent as u128) / 100;
    let tip = estimated_tip.saturating_add(boost);
    let max_fee = gas_price.unwrap_or_else(|| estimated_max_fee.saturating_add(boost));
    (max_fee, tip.min(max_fee))
}

pub(crate) fn to_log_record(log: &Log) -> LogRecord {
    LogRecord {
        transaction_hash: log.transaction_hash,
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        block_number: log.block_number,
        log_index: log.log_index,
    }
}

fn to_receipt(receipt: &TransactionReceipt) -> Receipt {
    Receipt {
        status: receipt.status(),
        transaction_hash: receipt.transaction_hash(),
        block_number: receipt.block_number(),
        gas_used: receipt.gas_used(),
        logs: receipt.inner.logs().iter().map(to_log_record).collect(),
    }
}

/// Sends transactions from the provider's wallet.
pub struct AlloyTransactionService<P> {
    provider: EthProvider<P>,
    poll_interval: Duration,
}

impl<P: Provider + WalletProvider + Clone + 'static> AlloyTransactionService<P> {
    pub fn new(provider: EthProvider<P>, poll_interval: Duration) -> Self {
        Self {
            provider,
            poll_interval,
        }
    }

    fn base_request(&self, request: &TxRequest) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.provider.provider().default_signer_address())
            .with_to(request.to)
            .with_input(request.data.clone())
            .with_value(request.value)
    }
}

#[async_trait]
impl<P: Provider + WalletProvider + Clone + 'static> TransactionService
    for AlloyTransactionService<P>
{
    async fn send(
        &self,
        request: &TxRequest,
        tip_boost_percent: u32,
    ) -> Result<TxHash, TxServiceError> {
        let provider = self.provider.provider();
        let estimate = provider
            .estimate_eip1559_fees()
            .await
            .map_err(service_error)?;

        let (max_fee, tip) = boosted_fees(
            estimate.max_fee_per_gas,
            estimate.max_priority_fee_per_gas,
            tip_boost_percent,
            request.gas_price.map(|price| price.saturating_to::<u128>()),
        );

        let mut tx = self
            .base_request(request)
            .with_chain_id(self.provider.chain_id())
            .with_max_fee_per_gas(max_fee)
            .with_max_priority_fee_per_gas(tip);
        if request.gas_limit > 0 {
            tx = tx.with_gas_limit(request.gas_limit);
        }

        debug!(
            operation = %request.description,
            max_fee,
            tip,
            gas_limit = request.gas_limit,
            "Broadcasting transaction"
        );
        let pending = provider.send_transaction(tx).await.map_err(service_error)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, TxServiceError> {
        let provider = self.provider.provider();
        loop {
            match provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(service_error)?
            {
                Some(receipt) => return Ok(to_receipt(&receipt)),
                None => {
                    trace!(tx = %tx_hash, "Receipt not available yet");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn revert_data(&self, request: &TxRequest) -> Option<Bytes> {
        match self.provider.provider().call(self.base_request(request)).await {
            Ok(_) => None,
            Err(err) => err.as_error_resp().and_then(|payload| payload.as_revert_data()),
        }
    }
}

/// Follows contract logs through `eth_subscribe`, replaying the first page from history.
pub struct AlloyLogProvider<P> {
    provider: EthProvider<P>,
}

impl<P: Provider + Clone + 'static> AlloyLogProvider<P> {
    pub fn new(provider: EthProvider<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> LogProvider for AlloyLogProvider<P> {
    async fn current_block_number(&self) -> anyhow::Result<u64> {
        self.provider
            .provider()
            .get_block_number()
            .await
            .map_err(|e| anyhow!("{}", e))
    }

    async fn subscribe_filtered_logs(
        &self,
        filter: &EventFilter,
    ) -> anyhow::Result<LogSubscription> {
        let provider = self.provider.provider();
        let live_filter = Filter::new()
            .address(filter.contract_address)
            .event_signature(filter.event_signature);

        // Subscribe before reading history so nothing mined in between is missed.
        let subscription = provider
            .subscribe_logs(&live_filter)
            .await
            .context("eth_subscribe for logs failed")?;
        let id = *subscription.local_id();

        let head = provider
            .get_block_number()
            .await
            .map_err(|e| anyhow!("{}", e))?;
        let historical = if filter.from_block <= head {
            let page = live_filter
                .clone()
                .from_block(filter.from_block)
                .to_block(filter.to_block.min(head));
            provider
                .get_logs(&page)
                .await
                .context("eth_getLogs for the first page failed")?
        } else {
            vec![]
        };

        info!(
            from_block = filter.from_block,
            to_block = filter.to_block.min(head),
            replayed = historical.len(),
            "Replaying historical logs before live stream"
        );

        let (log_tx, logs) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let (err_tx, errors) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(pump_logs(historical, subscription, log_tx, err_tx, stop_rx));

        Ok(LogSubscription {
            logs,
            errors,
            unsubscriber: Box::new(AlloyUnsubscriber {
                provider: self.provider.clone(),
                id,
                stop: stop_tx,
            }),
        })
    }
}

type LogKey = (Option<u64>, Option<u64>);

fn log_key(log: &Log) -> LogKey {
    (log.block_number, log.log_index)
}

async fn pump_logs(
    historical: Vec<Log>,
    mut subscription: Subscription<Log>,
    logs: mpsc::Sender<LogRecord>,
    errors: mpsc::Sender<anyhow::Error>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut replayed: HashSet<LogKey> = HashSet::with_capacity(historical.len());
    for log in historical {
        replayed.insert(log_key(&log));
        tokio::select! {
            _ = &mut stop => return,
            sent = logs.send(to_log_record(&log)) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }

    loop {
        tokio::select! {
            _ = &mut stop => return,
            received = subscription.recv() => match received {
                Ok(log) => {
                    if replayed.remove(&log_key(&log)) {
                        trace!(block = ?log.block_number, "Skipping log already replayed");
                        continue;
                    }
                    tokio::select! {
                        _ = &mut stop => return,
                        sent = logs.send(to_log_record(&log)) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(err) => {
                    let _ = errors
                        .send(anyhow!("Log subscription stream failed: {err}"))
                        .await;
                    return;
                }
            }
        }
    }
}

struct AlloyUnsubscriber<P> {
    provider: EthProvider<P>,
    id: B256,
    stop: oneshot::Sender<()>,
}

#[async_trait]
impl<P: Provider + Clone + 'static> Unsubscribe for AlloyUnsubscriber<P> {
    async fn unsubscribe(self: Box<Self>) {
        let AlloyUnsubscriber { provider, id, stop } = *self;
        let _ = stop.send(());
        match provider.provider().unsubscribe(id).await {
            Ok(_) => info!("Unsubscribed from log stream"),
            Err(err) => error!("Cannot unsubscribe from log stream: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, LogData};

    #[test]
    fn test_tip_is_boosted_by_percent() {
        let (max_fee, tip) = boosted_fees(100, 40, 25, None);
        assert_eq!(tip, 50);
        assert_eq!(max_fee, 110);
    }

    #[test]
    fn test_zero_boost_keeps_estimate() {
        assert_eq!(boosted_fees(100, 40, 0, None), (100, 40));
    }

    #[test]
    fn test_caller_gas_price_caps_fees() {
        let (max_fee, tip) = boosted_fees(100, 40, 25, Some(45));
        assert_eq!(max_fee, 45);
        assert_eq!(tip, 45);

        let (max_fee, tip) = boosted_fees(100, 40, 25, Some(500));
        assert_eq!(max_fee, 500);
        assert_eq!(tip, 50);
    }

    #[test]
    fn test_boost_saturates() {
        let (max_fee, tip) = boosted_fees(u128::MAX, u128::MAX, 100, None);
        assert_eq!(max_fee, u128::MAX);
        assert_eq!(tip, u128::MAX);
    }

    #[test]
    fn test_log_conversion_keeps_fields() {
        let topics = vec![B256::repeat_byte(0x01), B256::repeat_byte(0x02)];
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0x33),
                data: LogData::new_unchecked(topics.clone(), Bytes::from_static(b"payload")),
            },
            block_number: Some(9),
            log_index: Some(3),
            transaction_hash: Some(TxHash::repeat_byte(0x44)),
            ..Default::default()
        };

        let record = to_log_record(&log);
        assert_eq!(record.address, Address::repeat_byte(0x33));
        assert_eq!(record.topics, topics);
        assert_eq!(record.data, Bytes::from_static(b"payload"));
        assert_eq!(record.block_number, Some(9));
        assert_eq!(record.log_index, Some(3));
        assert_eq!(record.transaction_hash, Some(TxHash::repeat_byte(0x44)));
        assert_eq!(log_key(&log), (Some(9), Some(3)));
    }
}
