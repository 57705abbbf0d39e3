use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use async_trait::async_trait;

use crate::defaults::ENTRY_POINT_V07;
use crate::error::BootkitError;
use crate::validator::ValidatorPlugins;

/// Account implementation version the derivation is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelVersion {
    /// Kernel v3.1, the version this demo stack targets.
    #[default]
    V3_1,
}

impl KernelVersion {
    /// Version string as used in derivation and wire payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V3_1 => "0.3.1",
        }
    }
}

/// A derived smart account: exists in memory immediately, on-chain only
/// lazily on first submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmartAccount {
    /// Deterministic, content-addressed account address.
    pub address: Address,
    /// Implementation version the address was derived under.
    pub version: KernelVersion,
}

/// The external account-factory collaborator.
#[async_trait]
pub trait AccountFactory: Send + Sync {
    /// Derives the smart account for a validator configuration.
    ///
    /// Derivation is deterministic: an unchanged configuration and version
    /// always yield the same address. `deployed_address` pins the result to
    /// an already-deployed account, re-deriving only its configuration.
    ///
    /// # Errors
    /// `AccountDerivationFailed` when the configuration violates a role
    /// invariant or the factory otherwise rejects it.
    async fn derive_account(
        &self,
        plugins: &ValidatorPlugins,
        version: KernelVersion,
        deployed_address: Option<Address>,
    ) -> Result<SmartAccount, BootkitError>;
}

/// Local counterfactual factory: content-addresses the validator
/// configuration the way the on-chain factory would, without touching the
/// network.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelFactory;

#[async_trait]
impl AccountFactory for KernelFactory {
    async fn derive_account(
        &self,
        plugins: &ValidatorPlugins,
        version: KernelVersion,
        deployed_address: Option<Address>,
    ) -> Result<SmartAccount, BootkitError> {
        plugins
            .validate()
            .map_err(|err| err.coerce(BootkitError::AccountDerivationFailed))?;

        if let Some(address) = deployed_address {
            return Ok(SmartAccount { address, version });
        }

        let mut preimage = Vec::new();
        preimage.extend_from_slice(version.as_str().as_bytes());
        preimage.extend_from_slice(plugins.sudo.address().as_slice());
        preimage.extend_from_slice(&plugins.sudo.enable_data());
        if let Some(regular) = &plugins.regular {
            preimage.extend_from_slice(regular.address().as_slice());
            preimage.extend_from_slice(&regular.enable_data());
        }
        preimage.extend_from_slice(plugins.action.executor.as_slice());
        preimage.extend_from_slice(&plugins.action.selector);

        let digest = keccak256(&preimage);
        Ok(SmartAccount {
            address: Address::from_slice(&digest[12..]),
            version,
        })
    }
}

sol! {
    /// Typed data the sudo validator signs to authorize installing the
    /// regular/recovery plugin on an already-derived account.
    struct PluginEnable {
        address account;
        address regularValidator;
        address action;
    }
}

/// Digest of the plugin-enable authorization for `account`.
///
/// Bound to the chain and the entry point so the captured signature cannot be
/// replayed elsewhere.
#[must_use]
pub fn plugin_enable_digest(
    account: Address,
    plugins: &ValidatorPlugins,
    chain_id: u64,
) -> B256 {
    let domain = Eip712Domain::new(
        Some("Kernel".into()),
        Some("0.3.1".into()),
        Some(U256::from(chain_id)),
        Some(ENTRY_POINT_V07),
        None,
    );
    let message = PluginEnable {
        account,
        regularValidator: plugins
            .regular
            .as_ref()
            .map_or(Address::ZERO, crate::validator::Validator::address),
        action: plugins.action.executor,
    };
    message.eip712_signing_hash(&domain)
}
