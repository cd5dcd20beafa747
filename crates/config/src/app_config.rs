// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::chain_config::ChainConfig;
use crate::contract::Contract;
use crate::load_config::{find_in_parent, resolve_config_path};
use crate::yaml::load_yaml_with_env;
use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, time::Duration};

pub const DEFAULT_CONFIG_NAME: &str = "act.config.yaml";
pub const ENV_PREFIX: &str = "ACT_";
/// Environment variable holding the transaction signing key.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmitterSettings {
    /// Send a default gas limit instead of letting the node estimate.
    pub set_gas_limit: bool,
    pub default_gas_limit: u64,
    pub tip_boost_percent: u32,
    pub receipt_poll_interval_ms: u64,
}

impl Default for SubmitterSettings {
    fn default() -> Self {
        Self {
            set_gas_limit: false,
            default_gas_limit: 1_000_000,
            tip_boost_percent: 25,
            receipt_poll_interval_ms: 1_000,
        }
    }
}

impl SubmitterSettings {
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    pub page_size: u64,
    /// Overrides the contract deploy block as the first block to follow.
    pub start_block: Option<u64>,
    pub sink_capacity: usize,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            page_size: 500,
            start_block: None,
            sink_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub contract: Contract,
    #[serde(default)]
    pub submitter: SubmitterSettings,
    #[serde(default)]
    pub subscription: SubscriptionSettings,
    #[serde(default)]
    config_file: PathBuf,
}

impl AppConfig {
    pub fn config_file(&self) -> &PathBuf {
        &self.config_file
    }

    pub fn contract_address(&self) -> Result<Address> {
        self.contract.parsed_address()
    }

    /// First block to follow: explicit override, then the deploy block, else the chain head.
    pub fn start_block(&self) -> Option<u64> {
        self.subscription
            .start_block
            .or_else(|| self.contract.deploy_block())
    }

    pub fn validate(&self) -> Result<()> {
        self.chain.rpc()?;
        self.contract_address()?;
        if self.subscription.page_size == 0 {
            bail!("subscription.page_size must be at least 1");
        }
        if self.subscription.sink_capacity == 0 {
            bail!("subscription.sink_capacity must be at least 1");
        }
        if self.submitter.receipt_poll_interval_ms == 0 {
            bail!("submitter.receipt_poll_interval_ms must be at least 1");
        }
        Ok(())
    }
}

#[derive(Default, Serialize)]
struct Defaults {
    submitter: SubmitterSettings,
    subscription: SubscriptionSettings,
}

#[derive(Serialize)]
struct CliOverrides {
    config_file: PathBuf,
}

/// Load the config at `config_file`, or the first `act.config.yaml` found from the current
/// directory upwards, or the one in the OS config directory.
///
/// `ACT_` prefixed environment variables override file values; nested keys are separated
/// by `__`, for example `ACT_CHAIN__RPC_URL`.
pub fn load_config(config_file: Option<String>) -> Result<AppConfig> {
    let resolved_config_path = resolve_config_path(
        find_in_parent,
        env::current_dir()?,
        OsDirs::config_dir(),
        DEFAULT_CONFIG_NAME,
        config_file.map(PathBuf::from),
    );

    let loaded_yaml =
        load_yaml_with_env(&resolved_config_path).context("Configuration file not found")?;

    let config: AppConfig = Figment::from(Serialized::defaults(&Defaults::default()))
        .merge(Yaml::string(&loaded_yaml))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .merge(Serialized::defaults(&CliOverrides {
            config_file: resolved_config_path,
        }))
        .extract()
        .context("Could not parse configuration")?;

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub struct OsDirs;
impl OsDirs {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("act")
    }
}
