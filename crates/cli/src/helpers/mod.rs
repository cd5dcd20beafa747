// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use act_config::AppConfig;
use act_crypto::PublicKey;
use act_evm::{
    cancel_pair, AlloyLogProvider, AlloyTransactionService, CancelSignal, DataContractClient,
    EthProvider, SubmitterConfig, SubscriberConfig,
};
use alloy::{
    primitives::{Address, Bytes},
    providers::{Provider, WalletProvider},
};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

pub mod telemetry;

/// Parse a 65 byte uncompressed public key given as hex.
pub fn parse_public_key(s: &str) -> Result<PublicKey> {
    PublicKey::from_hex(s).context("expected a 65 byte uncompressed secp256k1 public key in hex")
}

pub fn parse_address(s: &str) -> Result<Address> {
    s.parse().context("expected a 20 byte hex address")
}

/// Parse `0x` prefixed hex into bytes.
pub fn parse_hex_bytes(s: &str) -> Result<Bytes> {
    let Some(digits) = s.strip_prefix("0x") else {
        bail!("hex value must start with '0x'");
    };
    Ok(hex::decode(digits)?.into())
}

/// Only letters, digits and underscores, so the name can be exported from a shell.
pub fn parse_env_name(s: &str) -> Result<String> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("'{s}' is not a valid environment variable name");
    }
    Ok(s.to_string())
}

pub fn submitter_config(config: &AppConfig) -> SubmitterConfig {
    SubmitterConfig {
        set_gas_limit: config.submitter.set_gas_limit,
        default_gas_limit: config.submitter.default_gas_limit,
        tip_boost_percent: config.submitter.tip_boost_percent,
    }
}

pub fn subscriber_config(config: &AppConfig) -> Result<SubscriberConfig> {
    Ok(SubscriberConfig {
        contract_address: config.contract_address()?,
        page_size: config.subscription.page_size,
        start_block: config.start_block(),
    })
}

/// Wire a data contract client to a signing provider.
pub fn build_client<P>(
    config: &AppConfig,
    provider: EthProvider<P>,
) -> Result<DataContractClient<AlloyTransactionService<P>, AlloyLogProvider<P>>>
where
    P: Provider + WalletProvider + Clone + 'static,
{
    let owner = provider.provider().default_signer_address();
    let service = AlloyTransactionService::new(
        provider.clone(),
        config.submitter.receipt_poll_interval(),
    );
    Ok(DataContractClient::new(
        config.contract_address()?,
        owner,
        Arc::new(service),
        Arc::new(AlloyLogProvider::new(provider)),
        submitter_config(config),
        subscriber_config(config)?,
    ))
}

/// A signal that fires on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancelSignal {
    let (canceller, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            canceller.cancel();
        }
    });
    cancel
}
