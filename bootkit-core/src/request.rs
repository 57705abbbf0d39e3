use std::time::Duration;

use reqwest::StatusCode;
use serde::ser::Serialize;

use crate::error::BootkitError;

/// Shared JSON POST helper for the relay and passkey-server clients.
///
/// Owns the round trip: sends the body, reads the response text and maps
/// transport and body-read failures onto the crate's error taxonomy. Status
/// handling and payload parsing stay with the caller.
pub struct Request {
    client: reqwest::Client,
}

impl Request {
    pub(crate) fn new() -> Self {
        let client = reqwest::Client::new();
        Self { client }
    }

    pub(crate) async fn post_json<T>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(StatusCode, String), BootkitError>
    where
        T: Serialize + Send + Sync,
    {
        #[cfg(not(test))]
        assert!(url.starts_with("https"));

        let response = self
            .client
            .post(url)
            .timeout(Duration::from_secs(5))
            .header(
                "User-Agent",
                format!("bootkit-core/{}", env!("CARGO_PKG_VERSION")),
            )
            .json(body)
            .send()
            .await
            .map_err(|err| {
                BootkitError::NetworkError(format!(
                    "failed to reach {url}: {err}"
                ))
            })?;
        let status = response.status();

        let text = response.text().await.map_err(|err| {
            BootkitError::SerializationError(format!(
                "failed to read response body from {url} with status {status}: {err}"
            ))
        })?;
        Ok((status, text))
    }
}
