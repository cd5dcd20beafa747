// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use act_config::{ChainConfig, RpcAuth, RPC};
use alloy::{
    network::EthereumWallet,
    providers::{Provider, ProviderBuilder, WalletProvider},
    signers::local::PrivateKeySigner,
    transports::{
        http::{
            reqwest::{
                header::{HeaderMap, HeaderValue, AUTHORIZATION},
                Client,
            },
            Http,
        },
        ws::{WebSocketConfig, WsConnect},
        Authorization,
    },
};
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::{env, sync::Arc};
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub trait AuthConversions {
    fn to_header_value(&self) -> Option<HeaderValue>;
    fn to_ws_auth(&self) -> Option<Authorization>;
}

impl AuthConversions for RpcAuth {
    fn to_header_value(&self) -> Option<HeaderValue> {
        match self {
            RpcAuth::None => None,
            RpcAuth::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{}:{}", username, password));
                HeaderValue::from_str(&format!("Basic {}", credentials)).ok()
            }
            RpcAuth::Bearer(token) => HeaderValue::from_str(&format!("Bearer {}", token)).ok(),
        }
    }

    fn to_ws_auth(&self) -> Option<Authorization> {
        match self {
            RpcAuth::None => None,
            RpcAuth::Basic { username, password } => Some(Authorization::basic(username, password)),
            RpcAuth::Bearer(token) => Some(Authorization::bearer(token)),
        }
    }
}

/// A connected provider together with the chain it reported.
pub struct EthProvider<P> {
    provider: Arc<P>,
    chain_id: u64,
}

impl<P> Clone for EthProvider<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            chain_id: self.chain_id,
        }
    }
}

impl<P: Provider + Clone> EthProvider<P> {
    pub async fn new(provider: P) -> Result<Self> {
        let chain_id = provider.get_chain_id().await?;
        Ok(Self {
            provider: Arc::new(provider),
            chain_id,
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Fail if the node serves a different chain than the configuration expects.
    pub fn ensure_chain_id(&self, expected: Option<u64>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.chain_id => bail!(
                "RPC node reports chain id {} but the configuration expects {}",
                self.chain_id,
                expected
            ),
            _ => Ok(()),
        }
    }
}

pub struct ProviderConfig {
    rpc: RPC,
    auth: RpcAuth,
}

impl ProviderConfig {
    pub fn new(rpc: RPC, auth: RpcAuth) -> Self {
        Self { rpc, auth }
    }

    pub fn from_chain(chain: &ChainConfig) -> Result<Self> {
        Ok(Self::new(chain.rpc()?, chain.rpc_auth.clone()))
    }

    pub fn rpc(&self) -> &RPC {
        &self.rpc
    }

    /// Notifications are streamed through `eth_subscribe`, which needs a websocket transport.
    pub fn supports_subscriptions(&self) -> bool {
        self.rpc.is_websocket()
    }

    pub async fn create_readonly_provider(&self) -> Result<EthProvider<impl Provider + Clone>> {
        debug!(rpc = %self.rpc.url(), "Connecting read-only provider");
        let provider = if self.rpc.is_websocket() {
            ProviderBuilder::new()
                .connect_ws(self.create_ws_connect()?)
                .await
                .context("Failed to connect to WebSocket RPC. Check if the node is running and URL is correct.")?
        } else {
            if !self.rpc.is_local() && !self.rpc.is_secure() {
                warn!(rpc = %self.rpc.url(), "Using an unencrypted RPC connection");
            }
            ProviderBuilder::new().connect_client(self.create_http_client()?)
        };

        EthProvider::new(provider).await
    }

    pub async fn create_signer_provider(
        &self,
        signer: &PrivateKeySigner,
    ) -> Result<EthProvider<impl Provider + WalletProvider + Clone>> {
        debug!(rpc = %self.rpc.url(), account = %signer.address(), "Connecting signer provider");
        let wallet = EthereumWallet::from(signer.clone());

        let provider = if self.rpc.is_websocket() {
            ProviderBuilder::new()
                .wallet(wallet)
                .connect_ws(self.create_ws_connect()?)
                .await
                .context("Failed to connect to WebSocket RPC. Check if the node is running and URL is correct.")?
        } else {
            ProviderBuilder::new()
                .wallet(wallet)
                .connect_client(self.create_http_client()?)
        };

        EthProvider::new(provider).await
    }

    fn create_ws_connect(&self) -> Result<WsConnect> {
        let config = WebSocketConfig::default()
            .max_frame_size(Some(16 * 1024 * 1024))
            .max_message_size(Some(16 * 1024 * 1024));

        let mut ws_connect = WsConnect::new(self.rpc.as_ws_url()?).with_config(config);

        if let Some(auth) = self.auth.to_ws_auth() {
            ws_connect = ws_connect.with_auth(auth);
        }

        Ok(ws_connect)
    }

    fn create_http_client(&self) -> Result<alloy::rpc::client::RpcClient> {
        let mut headers = HeaderMap::new();
        if let Some(auth_header) = self.auth.to_header_value() {
            headers.insert(AUTHORIZATION, auth_header);
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let http = Http::with_client(client, self.rpc.as_http_url()?.parse()?);
        Ok(alloy::rpc::client::RpcClient::new(http, self.rpc.is_local()))
    }
}

/// Read a hex private key from `var` and scrub it from the process environment.
fn take_env_secret(var: &str) -> Result<Zeroizing<String>> {
    let value = Zeroizing::new(
        env::var(var).with_context(|| format!("Environment variable {var} is not set"))?,
    );
    env::remove_var(var);
    Ok(value)
}

/// Load the transaction signer. The variable is removed from the environment once read.
pub fn load_signer_from_env(var: &str) -> Result<PrivateKeySigner> {
    let private_key = take_env_secret(var)?;
    private_key
        .trim()
        .parse()
        .with_context(|| format!("{var} does not hold a valid private key"))
}

/// Load a notification key. The variable is removed from the environment once read.
pub fn load_secret_key_from_env(var: &str) -> Result<act_crypto::SecretKey> {
    let secret = take_env_secret(var)?;
    act_crypto::SecretKey::from_hex(&secret)
        .with_context(|| format!("{var} does not hold a valid secp256k1 private key"))
}
