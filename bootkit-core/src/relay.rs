use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::defaults::{ENTRY_POINT_V07, RECEIPT_POLL_INTERVAL};
use crate::error::BootkitError;
use crate::operation::{OperationHandle, Receipt, Sponsorship, UserOperation};
use crate::request::Request;
use crate::Network;

/// The external bundler + paymaster collaborator.
#[async_trait]
pub trait RelayService: Send + Sync {
    /// Asks the paymaster to sponsor `operation`.
    ///
    /// # Errors
    /// `SponsorshipFailed` when the paymaster declines.
    async fn sponsor(
        &self,
        operation: &UserOperation,
    ) -> Result<Sponsorship, BootkitError>;

    /// Submits `operation` through the bundler, returning its handle
    /// immediately, before on-chain inclusion.
    ///
    /// # Errors
    /// `OperationSubmissionFailed` when the bundler rejects the operation.
    async fn submit(
        &self,
        operation: &UserOperation,
    ) -> Result<OperationHandle, BootkitError>;

    /// Exchanges a handle for a receipt, failing (never hanging) once
    /// `timeout` elapses without one.
    ///
    /// # Errors
    /// `OperationTimedOut` once `timeout` elapses without a receipt.
    async fn await_confirmation(
        &self,
        handle: OperationHandle,
        timeout: Duration,
    ) -> Result<Receipt, BootkitError>;
}

/// JSON-RPC relay client over a bundler and a paymaster endpoint.
///
/// Transient failures are the relay's responsibility to retry internally; a
/// failed round trip here fails the stage, per the orchestrator's
/// no-retry policy.
pub struct BundlerClient {
    bundler_url: String,
    paymaster_url: String,
    poll_interval: Duration,
    request: Request,
}

#[derive(Debug, Serialize)]
struct RpcRequest<T> {
    jsonrpc: &'static str,
    id: u32,
    method: &'static str,
    params: T,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl BundlerClient {
    /// Client against the network's default bundler + paymaster endpoints.
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self::with_urls(network.bundler_url(), network.paymaster_url())
    }

    /// Client against explicit endpoints.
    #[must_use]
    pub fn with_urls(bundler_url: String, paymaster_url: String) -> Self {
        Self {
            bundler_url,
            paymaster_url,
            poll_interval: RECEIPT_POLL_INTERVAL,
            request: Request::new(),
        }
    }

    /// Overrides the receipt poll cadence.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn call<P, R>(
        &self,
        url: &str,
        method: &'static str,
        params: P,
    ) -> Result<Option<R>, BootkitError>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let (status, response_text) =
            self.request.post_json(url, &body).await?;

        let parsed: RpcResponse<R> = serde_json::from_str(&response_text)
            .map_err(|err| {
                BootkitError::SerializationError(format!(
                    "{method}: failed to parse response from {url} with status {status}: {err}, received: {}",
                    response_text.chars().take(20).collect::<String>()
                ))
            })?;

        if let Some(error) = parsed.error {
            return Err(BootkitError::NetworkError(format!(
                "{method}: relay error {}: {}",
                error.code, error.message
            )));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl RelayService for BundlerClient {
    async fn sponsor(
        &self,
        operation: &UserOperation,
    ) -> Result<Sponsorship, BootkitError> {
        debug!(sender = %operation.sender, "requesting sponsorship");
        self.call(
            &self.paymaster_url,
            "zd_sponsorUserOperation",
            (operation, ENTRY_POINT_V07),
        )
        .await
        .map_err(|err| err.coerce(BootkitError::SponsorshipFailed))?
        .ok_or_else(|| {
            BootkitError::SponsorshipFailed(
                "paymaster returned no sponsorship".to_string(),
            )
        })
    }

    async fn submit(
        &self,
        operation: &UserOperation,
    ) -> Result<OperationHandle, BootkitError> {
        debug!(sender = %operation.sender, "submitting user operation");
        self.call(
            &self.bundler_url,
            "eth_sendUserOperation",
            (operation, ENTRY_POINT_V07),
        )
        .await
        .map_err(|err| err.coerce(BootkitError::OperationSubmissionFailed))?
        .ok_or_else(|| {
            BootkitError::OperationSubmissionFailed(
                "bundler returned no operation hash".to_string(),
            )
        })
    }

    async fn await_confirmation(
        &self,
        handle: OperationHandle,
        timeout: Duration,
    ) -> Result<Receipt, BootkitError> {
        let deadline = Instant::now() + timeout;
        loop {
            let receipt: Option<Receipt> = self
                .call(&self.bundler_url, "eth_getUserOperationReceipt", (handle,))
                .await?;
            if let Some(receipt) = receipt {
                debug!(%handle, block = receipt.block_number, "operation confirmed");
                return Ok(receipt);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(BootkitError::OperationTimedOut {
                    handle: handle.to_string(),
                    waited_ms: u64::try_from(timeout.as_millis())
                        .unwrap_or(u64::MAX),
                });
            }
            let remaining = deadline - now;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}
