// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::{build_client, cancel_on_ctrl_c};
use act_config::{AppConfig, PRIVATE_KEY_ENV};
use act_crypto::PublicKey;
use act_evm::{load_signer_from_env, CallContext, ProviderConfig};
use alloy::primitives::{Address, Bytes, U256};
use anyhow::Result;
use tracing::info;

pub struct NotifyArgs {
    pub target: Address,
    pub owner: Bytes,
    pub act_ref: Bytes,
    pub topic: String,
    pub encrypt_for: Option<PublicKey>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
}

/// The reference as it goes on the ledger: encrypted when a recipient key is given.
pub fn prepare_act_ref(act_ref: Bytes, encrypt_for: Option<&PublicKey>) -> Result<Bytes> {
    match encrypt_for {
        Some(recipient) => Ok(act_crypto::encrypt(&act_ref, recipient)?.into()),
        None => Ok(act_ref),
    }
}

pub async fn execute(config: &AppConfig, args: NotifyArgs) -> Result<()> {
    let act_ref = prepare_act_ref(args.act_ref, args.encrypt_for.as_ref())?;

    let signer = load_signer_from_env(PRIVATE_KEY_ENV)?;
    let provider = ProviderConfig::from_chain(&config.chain)?
        .create_signer_provider(&signer)
        .await?;
    provider.ensure_chain_id(config.chain.chain_id)?;
    let client = build_client(config, provider)?;

    let mut ctx = CallContext::new(cancel_on_ctrl_c());
    if let Some(gas_limit) = args.gas_limit {
        ctx = ctx.with_gas_limit(gas_limit);
    }
    if let Some(gas_price) = args.gas_price {
        ctx = ctx.with_gas_price(U256::from(gas_price));
    }

    info!(contract = %client.address(), from = %client.owner(), target = %args.target, "Sending notification");
    let receipt = client
        .notify(&ctx, args.target, args.owner, act_ref, args.topic)
        .await?;

    println!("{}", receipt.transaction_hash);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use act_crypto::KeyPair;

    #[test]
    fn test_prepare_act_ref_plain() -> Result<()> {
        let reference = Bytes::from_static(b"0123456789abcdef0123456789abcdef");
        assert_eq!(prepare_act_ref(reference.clone(), None)?, reference);
        Ok(())
    }

    #[test]
    fn test_prepare_act_ref_encrypted_for_recipient() -> Result<()> {
        let recipient = KeyPair::generate()?;
        let reference = Bytes::from_static(b"0123456789abcdef0123456789abcdef");

        let sealed = prepare_act_ref(reference.clone(), Some(recipient.public_key()))?;
        assert_eq!(sealed.len(), reference.len());
        assert_ne!(sealed, reference);
        assert_eq!(
            act_crypto::decrypt(&sealed, recipient.secret_key())?,
            reference.to_vec()
        );
        Ok(())
    }
}
