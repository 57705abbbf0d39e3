use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Bytes;
use tracing::debug;

use crate::account::SmartAccount;
use crate::defaults::ENTRY_POINT_V07;
use crate::error::BootkitError;
use crate::operation::{OperationHandle, Receipt, UserOperation};
use crate::relay::RelayService;
use crate::validator::ValidatorPlugins;
use crate::Network;

/// A client bound to one smart account: sponsors, signs and submits
/// operations on its behalf.
#[derive(Clone)]
pub struct AccountClient {
    account: SmartAccount,
    plugins: ValidatorPlugins,
    network: Network,
    relay: Arc<dyn RelayService>,
}

impl AccountClient {
    /// Binds `account` and its validator configuration to a relay.
    #[must_use]
    pub fn new(
        account: SmartAccount,
        plugins: ValidatorPlugins,
        network: Network,
        relay: Arc<dyn RelayService>,
    ) -> Self {
        Self {
            account,
            plugins,
            network,
            relay,
        }
    }

    /// The account this client submits for.
    #[must_use]
    pub const fn account(&self) -> &SmartAccount {
        &self.account
    }

    /// The validator configuration the account was derived from.
    #[must_use]
    pub const fn plugins(&self) -> &ValidatorPlugins {
        &self.plugins
    }

    /// Sponsors, signs and submits `call_data` as a user operation.
    ///
    /// # Errors
    /// `SponsorshipFailed` when the paymaster declines;
    /// `OperationSubmissionFailed` when the bundler rejects the operation.
    pub async fn send_user_operation(
        &self,
        call_data: Bytes,
    ) -> Result<OperationHandle, BootkitError> {
        submit_operation(
            &*self.relay,
            self.network,
            &self.account,
            &self.plugins,
            call_data,
        )
        .await
    }

    /// Waits for the receipt of a previously submitted operation.
    ///
    /// # Errors
    /// `OperationTimedOut` once `timeout` elapses without a receipt.
    pub async fn await_confirmation(
        &self,
        handle: OperationHandle,
        timeout: Duration,
    ) -> Result<Receipt, BootkitError> {
        self.relay.await_confirmation(handle, timeout).await
    }
}

/// A client bound to no account at all: every submission names its target
/// account explicitly, the way a guardian acts on an account it does not own
/// a default binding for.
#[derive(Clone)]
pub struct RelayClient {
    network: Network,
    relay: Arc<dyn RelayService>,
}

impl RelayClient {
    /// Account-less client over a relay.
    #[must_use]
    pub fn new(network: Network, relay: Arc<dyn RelayService>) -> Self {
        Self { network, relay }
    }

    /// Submits `call_data` on behalf of the account named per call.
    ///
    /// # Errors
    /// Same failure surface as [`AccountClient::send_user_operation`].
    pub async fn send_user_operation(
        &self,
        target: &AccountClient,
        call_data: Bytes,
    ) -> Result<OperationHandle, BootkitError> {
        submit_operation(
            &*self.relay,
            self.network,
            &target.account,
            &target.plugins,
            call_data,
        )
        .await
    }

    /// Waits for the receipt of a previously submitted operation.
    ///
    /// # Errors
    /// `OperationTimedOut` once `timeout` elapses without a receipt.
    pub async fn await_confirmation(
        &self,
        handle: OperationHandle,
        timeout: Duration,
    ) -> Result<Receipt, BootkitError> {
        self.relay.await_confirmation(handle, timeout).await
    }
}

/// Shared submission path: sponsor first, sign with the configuration's
/// active validator, then hand off to the bundler.
async fn submit_operation(
    relay: &dyn RelayService,
    network: Network,
    account: &SmartAccount,
    plugins: &ValidatorPlugins,
    call_data: Bytes,
) -> Result<OperationHandle, BootkitError> {
    let mut operation = UserOperation::new(account.address, call_data);

    let sponsorship = relay
        .sponsor(&operation)
        .await
        .map_err(|err| err.coerce(BootkitError::SponsorshipFailed))?;
    operation.apply_sponsorship(sponsorship);

    let digest = operation.hash(network.chain_id(), ENTRY_POINT_V07);
    operation.signature = plugins.active_validator().sign_digest(digest).await?;

    let handle = relay
        .submit(&operation)
        .await
        .map_err(|err| err.coerce(BootkitError::OperationSubmissionFailed))?;
    debug!(sender = %account.address, %handle, "user operation submitted");
    Ok(handle)
}
