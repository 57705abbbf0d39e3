use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BootkitError;

/// Opaque reference to a passkey key pair held by the credential provider.
///
/// Issued once during enrollment (or looked up during authentication) and
/// immutable afterwards; the orchestrator only threads it through the
/// bootstrap sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// User-chosen (or generated) label the key pair is scoped to.
    pub label: String,
    /// Provider-assigned identifier for the key pair.
    pub credential_id: Bytes,
    /// Compressed public key material backing the credential.
    pub public_key: B256,
}

/// The external passkey collaborator.
///
/// Enrollment, authentication and assertion (signing) all happen behind this
/// seam; the WebAuthn ceremony itself is the provider's problem.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Enrolls a new passkey scoped to `label`.
    ///
    /// # Errors
    /// `CredentialEnrollmentFailed` when the ceremony does not complete.
    async fn enroll(&self, label: &str) -> Result<Credential, BootkitError>;

    /// Authenticates against an existing passkey scoped to `label`.
    ///
    /// # Errors
    /// `CredentialAuthenticationFailed` when no matching passkey asserts.
    async fn authenticate(&self, label: &str) -> Result<Credential, BootkitError>;

    /// Produces a WebAuthn assertion over `challenge` with `credential`.
    ///
    /// # Errors
    /// `SigningFailed` when the provider cannot produce an assertion.
    async fn sign(
        &self,
        credential: &Credential,
        challenge: B256,
    ) -> Result<Bytes, BootkitError>;
}

/// Resolves the effective passkey label.
///
/// An empty label becomes `"<app-name> - <ISO-8601 timestamp>"`, matching the
/// format the demo UI generates, and is distinct on every call.
#[must_use]
pub fn default_label(app_name: &str, label: &str) -> String {
    if label.is_empty() {
        format!(
            "{app_name} - {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    } else {
        label.to_string()
    }
}
