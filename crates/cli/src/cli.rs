// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::telemetry::setup_simple_tracing;
use crate::helpers::{parse_address, parse_env_name, parse_hex_bytes, parse_public_key};
use crate::notify::NotifyArgs;
use crate::{decrypt, encrypt, keygen, listen, notify};
use act_config::{load_config, AppConfig};
use act_crypto::PublicKey;
use alloy::primitives::{Address, Bytes};
use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, instrument, Level};

#[derive(Parser, Debug)]
#[command(name = "act")]
#[command(about = "Send and receive ACT reference notifications over the ledger", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,

    /// Indicate error levels by adding additional `-v` arguments. Eg. `act -vvv` will give you
    /// trace level output
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true
    )]
    pub verbose: u8,

    /// Silence all output. This argument cannot be used alongside `-v`
    #[arg(
        short,
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "verbose",
        global = true
    )]
    quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,  //
                1 => Level::INFO,  // -v
                2 => Level::DEBUG, // -vv
                _ => Level::TRACE, // -vvv
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn execute(self) -> Result<()> {
        setup_simple_tracing(self.log_level());

        match self.command {
            Commands::Keygen => keygen::execute()?,
            Commands::Encrypt { to, text } => encrypt::execute(&to, &text)?,
            Commands::Decrypt { key_env, encrypted } => decrypt::execute(&key_env, &encrypted)?,
            Commands::Notify {
                target,
                owner,
                act_ref,
                topic,
                encrypt_for,
                gas_limit,
                gas_price,
            } => {
                let config = load(self.config)?;
                notify::execute(
                    &config,
                    NotifyArgs {
                        target,
                        owner,
                        act_ref,
                        topic,
                        encrypt_for,
                        gas_limit,
                        gas_price,
                    },
                )
                .await?
            }
            Commands::Listen { recipient, key_env } => {
                let config = load(self.config)?;
                listen::execute(&config, recipient, key_env).await?
            }
        }

        Ok(())
    }
}

fn load(config_file: Option<String>) -> Result<AppConfig> {
    let config = load_config(config_file)?;
    info!("Config loaded from: {:?}", config.config_file());
    Ok(config)
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a notification key pair
    Keygen,

    /// Encode text for a public key. Not confidential: the public key alone decodes it
    Encrypt {
        /// Recipient public key, 65 byte uncompressed hex
        #[arg(long, value_parser = parse_public_key)]
        to: PublicKey,

        text: String,
    },

    /// Decrypt hex produced by `act encrypt`
    Decrypt {
        /// Environment variable holding the recipient private key
        #[arg(long = "key-env", value_parser = parse_env_name)]
        key_env: String,

        encrypted: String,
    },

    /// Notify an account about an ACT reference. Signs with the key in PRIVATE_KEY
    Notify {
        /// Account that receives access
        #[arg(long, value_parser = parse_address)]
        target: Address,

        /// Publisher public key or identifier, as 0x hex
        #[arg(long, value_parser = parse_hex_bytes)]
        owner: Bytes,

        /// ACT reference, as 0x hex
        #[arg(long = "act-ref", value_parser = parse_hex_bytes)]
        act_ref: Bytes,

        #[arg(long)]
        topic: String,

        /// Encode the reference for this public key before sending. Size-preserving and
        /// deterministic; anyone with the public key can decode it, so this is not confidential
        #[arg(long = "encrypt-for", value_parser = parse_public_key)]
        encrypt_for: Option<PublicKey>,

        /// Minimum gas limit for this call
        #[arg(long = "gas-limit")]
        gas_limit: Option<u64>,

        /// Fee cap in wei
        #[arg(long = "gas-price")]
        gas_price: Option<u128>,
    },

    /// Print notifications as they arrive until interrupted
    Listen {
        /// Only show notifications addressed to this account
        #[arg(long = "for", value_parser = parse_address)]
        recipient: Option<Address>,

        /// Environment variable holding a private key used to decrypt references
        #[arg(long = "key-env", value_parser = parse_env_name)]
        key_env: Option<String>,
    },
}
