// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Client for the data contract that relays ACT references between accounts.

use crate::{
    cancel::CancelSignal,
    revert::RevertTable,
    submitter::{
        CallFailure, SubmitError, SubmitterConfig, TransactionService, TransactionSubmitter,
        TxServiceError,
    },
    subscriber::{
        EventSubscriber, LogProvider, SubscriberConfig, SubscriberError, SubscriptionHandle,
    },
    types::{CallContext, LogRecord, Receipt},
};
use act_crypto::{CryptoError, SecretKey};
use alloy::{
    primitives::{Address, Bytes, LogData, TxHash, B256},
    sol,
    sol_types::{SolCall, SolEvent},
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, trace};

sol! {
    interface IDataContract {
        #[derive(Debug)]
        event DataSentToTarget(
            address indexed sender,
            address indexed target,
            bytes owner,
            bytes actRef,
            string topic
        );

        #[derive(Debug)]
        error InvalidTarget(address target);

        #[derive(Debug)]
        error EmptyActRef();

        function sendDataToTarget(address target, bytes owner, bytes actRef, string topic);
    }
}

pub use IDataContract::DataSentToTarget;

pub const NOTIFY_OPERATION: &str = "sendDataToTarget";

/// Revert decoders for every error the data contract declares.
pub fn data_contract_reverts() -> RevertTable {
    RevertTable::builder()
        .error::<IDataContract::InvalidTarget>()
        .error::<IDataContract::EmptyActRef>()
        .build()
}

pub fn encode_notify_call(target: Address, owner: Bytes, act_ref: Bytes, topic: String) -> Bytes {
    IDataContract::sendDataToTargetCall {
        target,
        owner,
        actRef: act_ref,
        topic,
    }
    .abi_encode()
    .into()
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    #[error("Log is not a DataSentToTarget event")]
    UnexpectedEvent,
    #[error("Failed to decode DataSentToTarget: {0}")]
    Decode(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// A decoded `DataSentToTarget` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub sender: Address,
    pub target: Address,
    pub owner: Bytes,
    pub act_ref: Bytes,
    pub topic: String,
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
}

impl Notification {
    pub fn from_log(log: &LogRecord) -> Result<Self, NotificationError> {
        if log.topic0() != Some(&DataSentToTarget::SIGNATURE_HASH) {
            return Err(NotificationError::UnexpectedEvent);
        }
        let data = LogData::new(log.topics.clone(), log.data.clone())
            .ok_or_else(|| NotificationError::Decode("too many topics".to_string()))?;
        let event = DataSentToTarget::decode_log_data(&data)
            .map_err(|e| NotificationError::Decode(e.to_string()))?;

        Ok(Self {
            sender: event.sender,
            target: event.target,
            owner: event.owner,
            act_ref: event.actRef,
            topic: event.topic,
            transaction_hash: log.transaction_hash,
            block_number: log.block_number,
        })
    }

    pub fn is_for(&self, account: Address) -> bool {
        self.target == account
    }

    /// Recover the reference encrypted for the holder of `key`.
    pub fn decrypt_act_ref(&self, key: &SecretKey) -> Result<Vec<u8>, NotificationError> {
        Ok(act_crypto::decrypt(&self.act_ref, key)?)
    }
}

/// Service slot of a client that only reads notifications. It cannot send transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

pub struct DataContractClient<S, L> {
    address: Address,
    owner: Address,
    event_signature: B256,
    submitter: Option<TransactionSubmitter<S>>,
    subscriber: EventSubscriber<L>,
}

impl<S, L> DataContractClient<S, L> {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Account the client sends transactions from.
    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn event_signature(&self) -> B256 {
        self.event_signature
    }
}

impl<L: LogProvider + 'static> DataContractClient<ReadOnly, L> {
    /// A client that can follow notifications without a signing account.
    pub fn read_only(address: Address, logs: Arc<L>, subscriber_config: SubscriberConfig) -> Self {
        Self {
            address,
            owner: Address::ZERO,
            event_signature: DataSentToTarget::SIGNATURE_HASH,
            submitter: None,
            subscriber: EventSubscriber::new(
                logs,
                SubscriberConfig {
                    contract_address: address,
                    ..subscriber_config
                },
            ),
        }
    }
}

impl<S: TransactionService, L: LogProvider + 'static> DataContractClient<S, L> {
    pub fn new(
        address: Address,
        owner: Address,
        service: Arc<S>,
        logs: Arc<L>,
        submitter_config: SubmitterConfig,
        subscriber_config: SubscriberConfig,
    ) -> Self {
        let subscriber_config = SubscriberConfig {
            contract_address: address,
            ..subscriber_config
        };
        Self {
            address,
            owner,
            event_signature: DataSentToTarget::SIGNATURE_HASH,
            submitter: Some(TransactionSubmitter::new(
                service,
                data_contract_reverts(),
                submitter_config,
            )),
            subscriber: EventSubscriber::new(logs, subscriber_config),
        }
    }
}

impl<S: TransactionService, L> DataContractClient<S, L> {
    /// Emit a notification that `target` can access `act_ref` published by `owner`.
    pub async fn notify(
        &self,
        ctx: &CallContext,
        target: Address,
        owner: Bytes,
        act_ref: Bytes,
        topic: String,
    ) -> Result<Receipt, SubmitError> {
        let Some(submitter) = &self.submitter else {
            return Err(SubmitError::TransactionSend {
                operation: NOTIFY_OPERATION.to_string(),
                cause: CallFailure::Service(TxServiceError::new(
                    "client has no transaction service",
                )),
            });
        };
        trace!(from = %self.owner, %target, %topic, "Encoding notification");
        let call_data = encode_notify_call(target, owner, act_ref, topic);
        let receipt = submitter
            .submit(ctx, self.address, call_data, NOTIFY_OPERATION)
            .await?;
        info!(tx = %receipt.transaction_hash, %target, "Notification sent");
        Ok(receipt)
    }
}

impl<S, L: LogProvider + 'static> DataContractClient<S, L> {
    /// Forward every `DataSentToTarget` log into `sink` until cancelled.
    pub async fn subscribe_notifications(
        &self,
        cancel: &CancelSignal,
        sink: mpsc::Sender<LogRecord>,
    ) -> Result<SubscriptionHandle, SubscriberError> {
        self.subscriber
            .subscribe(self.event_signature, cancel, sink)
            .await
    }
}
