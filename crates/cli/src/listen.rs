// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::{cancel_on_ctrl_c, subscriber_config};
use act_config::AppConfig;
use act_crypto::SecretKey;
use act_evm::{
    load_secret_key_from_env, AlloyLogProvider, DataContractClient, Notification, ProviderConfig,
    ReadOnly, SubscriptionEnd,
};
use alloy::primitives::Address;
use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// One line per notification. The reference is shown decrypted when a key is available.
pub fn format_notification(notification: &Notification, key: Option<&SecretKey>) -> String {
    let mut line = format!(
        "block={} tx={} from={} to={} topic={:?} owner={} act_ref={}",
        notification
            .block_number
            .map(|b| b.to_string())
            .unwrap_or_else(|| "pending".to_string()),
        notification
            .transaction_hash
            .map(|h| h.to_string())
            .unwrap_or_default(),
        notification.sender,
        notification.target,
        notification.topic,
        notification.owner,
        notification.act_ref,
    );
    if let Some(key) = key {
        match notification.decrypt_act_ref(key) {
            Ok(reference) => line.push_str(&format!(" decrypted=0x{}", hex::encode(reference))),
            Err(err) => line.push_str(&format!(" decrypt_error={err:?}")),
        }
    }
    line
}

pub async fn execute(
    config: &AppConfig,
    recipient: Option<Address>,
    key_env: Option<String>,
) -> Result<()> {
    let key = key_env
        .as_deref()
        .map(load_secret_key_from_env)
        .transpose()?;
    let recipient = recipient.or_else(|| key.as_ref().map(|k| k.public_key().eth_address()));

    let provider_config = ProviderConfig::from_chain(&config.chain)?;
    if !provider_config.supports_subscriptions() {
        bail!("Listening needs a ws:// or wss:// rpc_url for chain {}", config.chain.name);
    }
    let provider = provider_config.create_readonly_provider().await?;
    provider.ensure_chain_id(config.chain.chain_id)?;

    let client = DataContractClient::<ReadOnly, _>::read_only(
        config.contract_address()?,
        Arc::new(AlloyLogProvider::new(provider)),
        subscriber_config(config)?,
    );

    let cancel = cancel_on_ctrl_c();
    let (tx, mut rx) = mpsc::channel(config.subscription.sink_capacity);
    let handle = client.subscribe_notifications(&cancel, tx).await?;
    info!(recipient = ?recipient, "Listening for notifications, press Ctrl-C to stop");

    while let Some(log) = rx.recv().await {
        match Notification::from_log(&log) {
            Ok(notification) => {
                if recipient.map_or(true, |r| notification.is_for(r)) {
                    println!("{}", format_notification(&notification, key.as_ref()));
                }
            }
            Err(err) => warn!(tx = ?log.transaction_hash, "Skipping log: {err}"),
        }
    }

    match handle.closed().await {
        SubscriptionEnd::Cancelled | SubscriptionEnd::ConsumerGone => Ok(()),
        SubscriptionEnd::StreamError(reason) => bail!("Notification stream failed: {reason}"),
    }
}
