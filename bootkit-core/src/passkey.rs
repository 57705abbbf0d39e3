use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credential::{Credential, CredentialProvider};
use crate::error::BootkitError;
use crate::request::Request;
use crate::Network;

/// HTTP credential provider backed by a passkey server.
///
/// The WebAuthn ceremony runs behind the server; this client only carries the
/// label in and the issued key material out.
pub struct PasskeyServerClient {
    base_url: String,
    request: Request,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasskeyBody<'a> {
    passkey_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasskeyResponse {
    credential_id: Bytes,
    public_key: B256,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssertionBody<'a> {
    credential_id: &'a Bytes,
    challenge: B256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssertionResponse {
    signature: Bytes,
}

impl PasskeyServerClient {
    /// Client against the network's default passkey server.
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self::with_base_url(network.passkey_server_url())
    }

    /// Client against an explicit passkey server URL.
    #[must_use]
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            base_url,
            request: Request::new(),
        }
    }

    async fn fetch<T, R>(&self, path: &str, body: T) -> Result<R, BootkitError>
    where
        T: Serialize + Send + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{path}", self.base_url);
        let (status, response_text) =
            self.request.post_json(&url, &body).await?;

        if !status.is_success() {
            return Err(BootkitError::NetworkError(format!(
                "{url} responded with status {status}: {}",
                response_text.chars().take(20).collect::<String>()
            )));
        }

        serde_json::from_str(&response_text).map_err(|err| {
            BootkitError::SerializationError(format!(
                "failed to parse response from {url} with status {status}: {err}, received: {}",
                response_text.chars().take(20).collect::<String>()
            ))
        })
    }

    async fn passkey(
        &self,
        path: &str,
        label: &str,
    ) -> Result<Credential, BootkitError> {
        let response: PasskeyResponse = self
            .fetch(path, PasskeyBody { passkey_name: label })
            .await?;
        Ok(Credential {
            label: label.to_string(),
            credential_id: response.credential_id,
            public_key: response.public_key,
        })
    }
}

#[async_trait]
impl CredentialProvider for PasskeyServerClient {
    async fn enroll(&self, label: &str) -> Result<Credential, BootkitError> {
        debug!(label, "enrolling passkey");
        self.passkey("register", label)
            .await
            .map_err(|err| err.coerce(BootkitError::CredentialEnrollmentFailed))
    }

    async fn authenticate(&self, label: &str) -> Result<Credential, BootkitError> {
        debug!(label, "authenticating passkey");
        self.passkey("login", label)
            .await
            .map_err(|err| {
                err.coerce(BootkitError::CredentialAuthenticationFailed)
            })
    }

    async fn sign(
        &self,
        credential: &Credential,
        challenge: B256,
    ) -> Result<Bytes, BootkitError> {
        let response: AssertionResponse = self
            .fetch(
                "sign",
                AssertionBody {
                    credential_id: &credential.credential_id,
                    challenge,
                },
            )
            .await
            .map_err(|err| err.coerce(BootkitError::SigningFailed))?;
        Ok(response.signature)
    }
}
