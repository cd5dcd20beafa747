// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcProtocol {
    Http,
    Https,
    Ws,
    Wss,
}

impl RpcProtocol {
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(RpcProtocol::Http),
            "https" => Some(RpcProtocol::Https),
            "ws" => Some(RpcProtocol::Ws),
            "wss" => Some(RpcProtocol::Wss),
            _ => None,
        }
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self, RpcProtocol::Ws | RpcProtocol::Wss)
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, RpcProtocol::Https | RpcProtocol::Wss)
    }
}

/// A validated node endpoint that can be reached over http(s) or ws(s).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RPC {
    protocol: RpcProtocol,
    url: Url,
}

impl RPC {
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).context("Invalid URL format")?;
        let Some(protocol) = RpcProtocol::from_scheme(parsed.scheme()) else {
            bail!("Invalid protocol. Expected: http://, https://, ws://, wss://");
        };

        if parsed.host_str().is_none() {
            bail!("URL must contain a host");
        }

        Ok(RPC {
            protocol,
            url: parsed,
        })
    }

    pub fn protocol(&self) -> RpcProtocol {
        self.protocol
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn as_http_url(&self) -> Result<String> {
        let scheme = if self.protocol.is_secure() {
            "https"
        } else {
            "http"
        };
        self.with_scheme(scheme)
    }

    pub fn as_ws_url(&self) -> Result<String> {
        let scheme = if self.protocol.is_secure() {
            "wss"
        } else {
            "ws"
        };
        self.with_scheme(scheme)
    }

    fn with_scheme(&self, scheme: &str) -> Result<String> {
        if self.url.scheme() == scheme {
            return Ok(self.url.to_string());
        }
        let mut parsed = self.url.clone();
        parsed
            .set_scheme(scheme)
            .map_err(|_| anyhow!("Cannot switch {} to {}", self.url, scheme))?;
        Ok(parsed.to_string())
    }

    pub fn is_websocket(&self) -> bool {
        self.protocol.is_websocket()
    }

    pub fn is_secure(&self) -> bool {
        self.protocol.is_secure()
    }

    pub fn is_local(&self) -> bool {
        match self.hostname() {
            "localhost" | "127.0.0.1" | "[::1]" | "::1" => true,
            host => host.starts_with("127."),
        }
    }
}

impl FromStr for RPC {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        RPC::from_url(s)
    }
}

impl fmt::Display for RPC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Credentials sent with every RPC request.
#[derive(Debug, Hash, Eq, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(tag = "type", content = "credentials")]
pub enum RpcAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_conversions() -> Result<()> {
        let http = RPC::from_url("http://localhost:8545/")?;
        assert_eq!(http.as_http_url()?, "http://localhost:8545/");
        assert_eq!(http.as_ws_url()?, "ws://localhost:8545/");
        assert!(!http.is_secure());
        assert!(!http.is_websocket());

        let wss = RPC::from_url("wss://example.com/")?;
        assert_eq!(wss.as_http_url()?, "https://example.com/");
        assert_eq!(wss.as_ws_url()?, "wss://example.com/");
        assert!(wss.is_secure());
        assert!(wss.is_websocket());

        Ok(())
    }

    #[test]
    fn test_rejects_unknown_scheme_and_missing_host() {
        assert!(RPC::from_url("ftp://example.com").is_err());
        assert!(RPC::from_url("not a url").is_err());
        assert!(RPC::from_url("http://").is_err());
    }

    #[test]
    fn test_is_local() -> Result<()> {
        assert!(RPC::from_url("ws://localhost:8545")?.is_local());
        assert!(RPC::from_url("http://127.0.0.2:8545")?.is_local());
        assert!(!RPC::from_url("https://rpc.gnosischain.com")?.is_local());
        Ok(())
    }

    #[test]
    fn test_rpc_auth_yaml_shape() -> Result<()> {
        let auth: RpcAuth = serde_yaml::from_str(
            r#"
type: Basic
credentials:
  username: alice
  password: secret
"#,
        )?;
        assert_eq!(
            auth,
            RpcAuth::Basic {
                username: "alice".to_string(),
                password: "secret".to_string()
            }
        );

        let auth: RpcAuth = serde_yaml::from_str("type: Bearer\ncredentials: abc")?;
        assert_eq!(auth, RpcAuth::Bearer("abc".to_string()));
        Ok(())
    }
}
