use thiserror::Error;

/// Error outputs from the bootstrap & recovery orchestrator.
///
/// Every stage failure surfaces exactly one of these; no collaborator error is
/// swallowed silently and no stage retries on its own.
#[derive(Debug, Error)]
pub enum BootkitError {
    /// The credential provider could not enroll a new passkey.
    #[error("credential_enrollment_failed: {0}")]
    CredentialEnrollmentFailed(String),
    /// The credential provider could not authenticate an existing passkey.
    #[error("credential_authentication_failed: {0}")]
    CredentialAuthenticationFailed(String),
    /// The account factory rejected the validator configuration.
    #[error("account_derivation_failed: {0}")]
    AccountDerivationFailed(String),
    /// The paymaster declined to sponsor the operation.
    #[error("sponsorship_failed: {0}")]
    SponsorshipFailed(String),
    /// The relay rejected the submitted operation.
    #[error("operation_submission_failed: {0}")]
    OperationSubmissionFailed(String),
    /// No receipt arrived within the confirmation bound.
    #[error("operation_timed_out: no receipt for {handle} after {waited_ms}ms")]
    OperationTimedOut {
        /// Hash of the pending operation.
        handle: String,
        /// How long the confirmation wait lasted before giving up.
        waited_ms: u64,
    },
    /// The recovery pre-authorization handshake could not be completed.
    #[error("recovery_handshake_failed: {0}")]
    RecoveryHandshakeFailed(String),
    /// A validator could not produce a signature.
    #[error("signing_failed: {0}")]
    SigningFailed(String),
    /// The validator configuration violates a role or weight invariant.
    #[error("invalid_validator_config: {0}")]
    InvalidValidatorConfig(String),
    /// Another stage is already in flight for this session.
    #[error("stage_in_progress: {0} rejected, a stage is already in flight")]
    StageInProgress(&'static str),
    /// The operation is not permitted from the session's current stage.
    #[error("invalid_stage: {operation} is not allowed while the session is {stage}")]
    InvalidStage {
        /// The rejected operation.
        operation: &'static str,
        /// The stage the session was observed in.
        stage: String,
    },
    /// Network connection error with details.
    #[error("network_error: {0}")]
    NetworkError(String),
    /// Unexpected error serializing or parsing a collaborator payload.
    #[error("serialization_error: {0}")]
    SerializationError(String),
}

impl BootkitError {
    /// Re-tags `self` with `wrap` unless it already carries that variant.
    ///
    /// Stage boundaries use this to map collaborator errors into the stage's
    /// own failure without double-wrapping errors that are already precise.
    #[must_use]
    pub(crate) fn coerce(self, wrap: fn(String) -> Self) -> Self {
        let probe = wrap(String::new());
        if std::mem::discriminant(&self) == std::mem::discriminant(&probe) {
            self
        } else {
            wrap(self.to_string())
        }
    }
}
