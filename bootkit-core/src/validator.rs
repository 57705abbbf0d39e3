use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

use crate::credential::{Credential, CredentialProvider};
use crate::defaults::{RECOVERY_EXECUTOR, WEBAUTHN_VALIDATOR};
use crate::error::BootkitError;
use crate::operation::RecoveryExecutor;
use alloy_sol_types::SolCall;

/// Fixed sentinel returned by every stand-in signing operation.
///
/// Never valid on-chain; it only satisfies the shape requirements of the
/// account-derivation algorithm.
#[must_use]
pub fn placeholder_signature() -> Bytes {
    Bytes::from_static(&[0u8; 32])
}

/// Generates a throwaway replacement signer for exercising recovery.
#[must_use]
pub fn random_replacement_signer() -> PrivateKeySigner {
    PrivateKeySigner::random()
}

/// Passkey-backed validator: the interactive "sudo" signer.
#[derive(Clone)]
pub struct PasskeyValidator {
    credential: Credential,
    provider: Arc<dyn CredentialProvider>,
}

impl PasskeyValidator {
    /// Binds a credential to the provider that can produce assertions for it.
    #[must_use]
    pub fn new(credential: Credential, provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credential,
            provider,
        }
    }

    /// The credential this validator signs with.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        &self.credential
    }

    fn enable_data(&self) -> Bytes {
        let mut data =
            Vec::with_capacity(32 + self.credential.credential_id.len());
        data.extend_from_slice(self.credential.public_key.as_slice());
        data.extend_from_slice(&self.credential.credential_id);
        data.into()
    }
}

impl fmt::Debug for PasskeyValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasskeyValidator")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

/// A guardian signer and its voting weight.
#[derive(Debug, Clone)]
pub struct Guardian {
    /// Key the guardian signs with.
    pub signer: PrivateKeySigner,
    /// Weight counted toward the scheme's threshold.
    pub weight: u32,
}

/// Weighted multi-key ECDSA validator: the "regular" (guardian) signer.
#[derive(Debug, Clone)]
pub struct WeightedEcdsaValidator {
    guardians: Vec<Guardian>,
    threshold: u32,
}

impl WeightedEcdsaValidator {
    /// Builds a weighted guardian scheme.
    ///
    /// # Errors
    /// Rejects an empty guardian set, and any set whose summed weights fall
    /// below `threshold` — such a scheme could never authorize anything.
    pub fn new(
        guardians: Vec<Guardian>,
        threshold: u32,
    ) -> Result<Self, BootkitError> {
        if guardians.is_empty() {
            return Err(BootkitError::InvalidValidatorConfig(
                "guardian set is empty".to_string(),
            ));
        }
        let total: u32 = guardians.iter().map(|guardian| guardian.weight).sum();
        if total < threshold {
            return Err(BootkitError::InvalidValidatorConfig(format!(
                "guardian weights sum to {total}, below threshold {threshold}"
            )));
        }
        Ok(Self {
            guardians,
            threshold,
        })
    }

    /// Single-guardian scheme with weight and threshold of one.
    #[must_use]
    pub fn single(signer: PrivateKeySigner) -> Self {
        Self {
            guardians: vec![Guardian { signer, weight: 1 }],
            threshold: 1,
        }
    }

    /// Addresses of every guardian in the scheme.
    #[must_use]
    pub fn guardian_addresses(&self) -> Vec<Address> {
        self.guardians
            .iter()
            .map(|guardian| guardian.signer.address())
            .collect()
    }

    fn enable_data(&self) -> Bytes {
        let mut data = Vec::with_capacity(4 + self.guardians.len() * 24);
        data.extend_from_slice(&self.threshold.to_be_bytes());
        for guardian in &self.guardians {
            data.extend_from_slice(guardian.signer.address().as_slice());
            data.extend_from_slice(&guardian.weight.to_be_bytes());
        }
        data.into()
    }

    fn sign_digest(&self, digest: B256) -> Result<Bytes, BootkitError> {
        // Every guardian signs; the threshold was validated at construction.
        let mut signatures = Vec::with_capacity(self.guardians.len() * 65);
        for guardian in &self.guardians {
            let signature = guardian
                .signer
                .sign_hash_sync(&digest)
                .map_err(|err| BootkitError::SigningFailed(err.to_string()))?;
            signatures.extend_from_slice(&signature.as_bytes());
        }
        Ok(signatures.into())
    }
}

/// Non-signing stand-in: structurally identical to the validator it shadows,
/// but its signing operations always return the fixed placeholder sentinel.
///
/// Used only to satisfy the derivation algorithm's shape requirements during
/// the recovery handshake; its output is never submitted on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandInValidator {
    address: Address,
    enable_data: Bytes,
}

impl StandInValidator {
    /// Copies the identity material (address + enable data) of `real`.
    #[must_use]
    pub fn from_validator(real: &Validator) -> Self {
        Self {
            address: real.address(),
            enable_data: real.enable_data(),
        }
    }
}

/// The fixed recovery entry point installed under the "action" role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryAction {
    /// Executor contract the action dispatches to.
    pub executor: Address,
    /// Selector of the executor's `doRecovery` routine.
    pub selector: [u8; 4],
}

impl RecoveryAction {
    /// Recovery action for the v0.7 entry point.
    #[must_use]
    pub const fn v07() -> Self {
        Self {
            executor: RECOVERY_EXECUTOR,
            selector: RecoveryExecutor::doRecoveryCall::SELECTOR,
        }
    }
}

/// A pluggable authorization policy attached to a smart-account role.
#[derive(Clone)]
pub enum Validator {
    /// Interactive passkey validator.
    Passkey(PasskeyValidator),
    /// Weighted guardian scheme.
    WeightedEcdsa(WeightedEcdsaValidator),
    /// Non-signing shape copy of a real validator.
    StandIn(StandInValidator),
}

impl Validator {
    /// Address of the on-chain validator module.
    #[must_use]
    pub const fn address(&self) -> Address {
        match self {
            Self::Passkey(_) => WEBAUTHN_VALIDATOR,
            Self::WeightedEcdsa(_) => crate::defaults::RECOVERY_VALIDATOR,
            Self::StandIn(stand_in) => stand_in.address,
        }
    }

    /// Identity material consumed by account derivation.
    #[must_use]
    pub fn enable_data(&self) -> Bytes {
        match self {
            Self::Passkey(validator) => validator.enable_data(),
            Self::WeightedEcdsa(validator) => validator.enable_data(),
            Self::StandIn(stand_in) => stand_in.enable_data.clone(),
        }
    }

    /// Signs `digest` with the validator's authorization policy.
    ///
    /// The stand-in variant never signs: it returns the fixed sentinel.
    ///
    /// # Errors
    /// Returns `SigningFailed` when the underlying signer errors.
    pub async fn sign_digest(&self, digest: B256) -> Result<Bytes, BootkitError> {
        match self {
            Self::Passkey(validator) => {
                validator
                    .provider
                    .sign(&validator.credential, digest)
                    .await
            }
            Self::WeightedEcdsa(validator) => validator.sign_digest(digest),
            Self::StandIn(_) => Ok(placeholder_signature()),
        }
    }

    /// Whether this is the non-signing stand-in.
    #[must_use]
    pub const fn is_stand_in(&self) -> bool {
        matches!(self, Self::StandIn(_))
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passkey(validator) => {
                f.debug_tuple("Passkey").field(validator).finish()
            }
            Self::WeightedEcdsa(validator) => {
                f.debug_tuple("WeightedEcdsa").field(validator).finish()
            }
            Self::StandIn(stand_in) => {
                f.debug_tuple("StandIn").field(stand_in).finish()
            }
        }
    }
}

/// Role assignment an account is derived from: exactly one sudo validator,
/// an optional regular (guardian) validator and the fixed recovery action.
#[derive(Debug, Clone)]
pub struct ValidatorPlugins {
    /// Primary signer role.
    pub sudo: Validator,
    /// Guardian signer role.
    pub regular: Option<Validator>,
    /// Recovery entry point role.
    pub action: RecoveryAction,
    /// Pre-captured sudo authorization for installing the regular plugin.
    pub plugin_enable_signature: Option<Bytes>,
}

impl ValidatorPlugins {
    /// Assembles a role configuration without a pre-captured enable signature.
    #[must_use]
    pub const fn new(
        sudo: Validator,
        regular: Option<Validator>,
        action: RecoveryAction,
    ) -> Self {
        Self {
            sudo,
            regular,
            action,
            plugin_enable_signature: None,
        }
    }

    /// Attaches a captured plugin-enable signature.
    #[must_use]
    pub fn with_enable_signature(mut self, signature: Bytes) -> Self {
        self.plugin_enable_signature = Some(signature);
        self
    }

    /// Checks the role invariants an account can be derived under.
    ///
    /// # Errors
    /// A stand-in sudo without a pre-captured enable signature could never
    /// authorize anything, interactively or otherwise, and is rejected.
    pub fn validate(&self) -> Result<(), BootkitError> {
        if self.sudo.is_stand_in() && self.plugin_enable_signature.is_none() {
            return Err(BootkitError::InvalidValidatorConfig(
                "stand-in sudo requires a plugin enable signature".to_string(),
            ));
        }
        if self.plugin_enable_signature.is_some() && self.regular.is_none() {
            return Err(BootkitError::InvalidValidatorConfig(
                "plugin enable signature without a regular validator".to_string(),
            ));
        }
        Ok(())
    }

    /// The validator that signs operations for this configuration.
    ///
    /// With a pre-captured enable signature attached the regular (guardian)
    /// validator signs — that is the whole point of the non-interactive
    /// recovery pre-authorization; otherwise the sudo does.
    #[must_use]
    pub fn active_validator(&self) -> &Validator {
        if self.plugin_enable_signature.is_some() {
            if let Some(regular) = &self.regular {
                return regular;
            }
        }
        &self.sudo
    }
}
