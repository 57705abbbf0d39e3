use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use tracing::{info, warn};

use crate::account::{plugin_enable_digest, AccountFactory, KernelVersion};
use crate::client::{AccountClient, RelayClient};
use crate::credential::{default_label, CredentialProvider};
use crate::defaults::{
    APP_NAME, CONFIRMATION_TIMEOUT, DEMO_NFT_CONTRACT, RECOVERY_VALIDATOR,
};
use crate::error::BootkitError;
use crate::operation::{encode_execute, encode_mint, encode_recovery, Receipt};
use crate::relay::RelayService;
use crate::validator::{
    PasskeyValidator, RecoveryAction, StandInValidator, Validator,
    ValidatorPlugins, WeightedEcdsaValidator,
};
use crate::Network;

/// Stages a session moves through, in strict order.
///
/// `Failed` is terminal for the attempt; only a fresh `register`/`login`
/// leaves it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStage {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// Waiting on the credential provider.
    CredentialPending,
    /// The account address is known; the client is not ready yet.
    AccountDerived,
    /// The client accepts submissions.
    ClientReady,
    /// A user operation is in flight.
    OperationPending,
    /// The last user operation was confirmed on-chain.
    OperationConfirmed,
    /// A recovery operation is in flight.
    RecoveryPending,
    /// The last recovery operation was confirmed on-chain.
    RecoveryConfirmed,
    /// The attempt failed; carries the stage error's rendering.
    Failed(String),
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CredentialPending => write!(f, "credential_pending"),
            Self::AccountDerived => write!(f, "account_derived"),
            Self::ClientReady => write!(f, "client_ready"),
            Self::OperationPending => write!(f, "operation_pending"),
            Self::OperationConfirmed => write!(f, "operation_confirmed"),
            Self::RecoveryPending => write!(f, "recovery_pending"),
            Self::RecoveryConfirmed => write!(f, "recovery_confirmed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// UI-observable snapshot, readable while a stage is in flight.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    stage: SessionStage,
    status: String,
    address: Option<Address>,
}

/// Clients built by bootstrap; guarded by the stage lock.
#[derive(Default)]
struct SessionInner {
    primary: Option<AccountClient>,
    recovery: Option<AccountClient>,
}

/// One user session of the bootstrap & recovery orchestrator.
///
/// The session is the explicit context object every stage runs against:
/// owned by the caller, no process-wide state. Stages run strictly
/// sequentially; a `try_lock` re-entrancy guard rejects a second in-flight
/// stage instead of racing it.
pub struct Session {
    network: Network,
    app_name: String,
    version: KernelVersion,
    confirmation_timeout: Duration,
    provider: Arc<dyn CredentialProvider>,
    factory: Arc<dyn AccountFactory>,
    relay: Arc<dyn RelayService>,
    guardian: WeightedEcdsaValidator,
    inner: tokio::sync::Mutex<SessionInner>,
    snapshot: Mutex<Snapshot>,
}

impl Session {
    /// Builds a session over the three collaborators and a guardian scheme.
    #[must_use]
    pub fn new(
        network: Network,
        provider: Arc<dyn CredentialProvider>,
        factory: Arc<dyn AccountFactory>,
        relay: Arc<dyn RelayService>,
        guardian: WeightedEcdsaValidator,
    ) -> Self {
        Self {
            network,
            app_name: APP_NAME.to_string(),
            version: KernelVersion::default(),
            confirmation_timeout: CONFIRMATION_TIMEOUT,
            provider,
            factory,
            relay,
            guardian,
            inner: tokio::sync::Mutex::default(),
            snapshot: Mutex::default(),
        }
    }

    /// Overrides the app name used in generated passkey labels.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Overrides the confirmation wait bound.
    #[must_use]
    pub const fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Current stage of the session.
    #[must_use]
    pub fn stage(&self) -> SessionStage {
        self.snapshot_guard().stage.clone()
    }

    /// Current status line, rendered verbatim by the UI (may embed markup).
    #[must_use]
    pub fn status(&self) -> String {
        self.snapshot_guard().status.clone()
    }

    /// The derived smart account address, once known.
    #[must_use]
    pub fn account_address(&self) -> Option<Address> {
        self.snapshot_guard().address
    }

    /// Whether the client accepts submissions right now. False while an
    /// operation is in flight.
    #[must_use]
    pub fn is_client_ready(&self) -> bool {
        matches!(
            self.stage(),
            SessionStage::ClientReady
                | SessionStage::OperationConfirmed
                | SessionStage::RecoveryConfirmed
        )
    }

    /// Registers a new passkey and bootstraps the account, including the
    /// recovery pre-authorization handshake.
    ///
    /// An empty `label` becomes `"<app-name> - <ISO-8601 timestamp>"`.
    ///
    /// # Errors
    /// `CredentialEnrollmentFailed` when enrollment fails (no partial account
    /// state is retained); bootstrap errors as in [`Self::login`].
    pub async fn register(&self, label: &str) -> Result<Address, BootkitError> {
        let mut inner = self.try_begin("register")?;
        self.start_attempt(&mut inner);

        let label = default_label(&self.app_name, label);
        info!(%label, "registering passkey credential");
        let credential = match self.provider.enroll(&label).await {
            Ok(credential) => credential,
            Err(err) => {
                return Err(self.fail(
                    err.coerce(BootkitError::CredentialEnrollmentFailed),
                ))
            }
        };

        let primary = Validator::Passkey(PasskeyValidator::new(
            credential,
            Arc::clone(&self.provider),
        ));
        self.bootstrap(&mut inner, primary, true).await
    }

    /// Authenticates against an existing passkey and bootstraps the account
    /// without the recovery handshake.
    ///
    /// # Errors
    /// `CredentialAuthenticationFailed` when authentication fails;
    /// `AccountDerivationFailed` when the factory rejects the configuration.
    pub async fn login(&self, label: &str) -> Result<Address, BootkitError> {
        let mut inner = self.try_begin("login")?;
        self.start_attempt(&mut inner);

        let label = default_label(&self.app_name, label);
        info!(%label, "authenticating passkey credential");
        let credential = match self.provider.authenticate(&label).await {
            Ok(credential) => credential,
            Err(err) => {
                return Err(self.fail(
                    err.coerce(BootkitError::CredentialAuthenticationFailed),
                ))
            }
        };

        let primary = Validator::Passkey(PasskeyValidator::new(
            credential,
            Arc::clone(&self.provider),
        ));
        self.bootstrap(&mut inner, primary, false).await
    }

    /// Encodes `mint(account)` against the demo contract, wrapped in the
    /// account's execute envelope, submits it through the primary client and
    /// waits for confirmation.
    ///
    /// # Errors
    /// Rejected with `StageInProgress`/`InvalidStage` at the UI boundary;
    /// otherwise fails the session with the submitting stage's error.
    pub async fn send_mint_operation(&self) -> Result<Receipt, BootkitError> {
        let inner = self.try_begin("send_mint_operation")?;
        self.ensure_submittable("send_mint_operation")?;
        let client = inner.primary.as_ref().ok_or_else(|| {
            BootkitError::InvalidStage {
                operation: "send_mint_operation",
                stage: self.stage().to_string(),
            }
        })?;

        self.set_stage(SessionStage::OperationPending);
        self.set_status("Sending UserOp...");

        let call_data = encode_execute(
            DEMO_NFT_CONTRACT,
            U256::ZERO,
            encode_mint(client.account().address),
        );
        let handle = match client.send_user_operation(call_data).await {
            Ok(handle) => handle,
            Err(err) => return Err(self.fail(err)),
        };

        let receipt = match client
            .await_confirmation(handle, self.confirmation_timeout)
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.fail(err)),
        };

        self.set_status(format!(
            "UserOp completed. <a href=\"{}\" target=\"_blank\" \
             rel=\"noopener noreferrer\" class=\"text-blue-500 \
             hover:text-blue-700\">Click here to view.</a>",
            self.network.explorer_user_op_url(&handle)
        ));
        self.set_stage(SessionStage::OperationConfirmed);
        info!(%handle, "user operation confirmed");
        Ok(receipt)
    }

    /// Swaps the recovery validator's signer for `replacement_signer`.
    ///
    /// Encodes `doRecovery(recovery_validator, replacement)` and submits it
    /// through an account-less client that names the recovery account per
    /// call, signed by the guardian alone.
    ///
    /// # Errors
    /// `InvalidStage` when the session was bootstrapped without the
    /// handshake; otherwise fails the session with the stage's error.
    pub async fn recover(
        &self,
        replacement_signer: Address,
    ) -> Result<Receipt, BootkitError> {
        let inner = self.try_begin("recover")?;
        self.ensure_submittable("recover")?;
        let client = inner.recovery.as_ref().ok_or_else(|| {
            BootkitError::InvalidStage {
                operation: "recover",
                stage: self.stage().to_string(),
            }
        })?;

        self.set_stage(SessionStage::RecoveryPending);
        self.set_status("Sending recovery UserOp...");

        let call_data = encode_recovery(
            RECOVERY_VALIDATOR,
            Bytes::copy_from_slice(replacement_signer.as_slice()),
        );
        let unbound = RelayClient::new(self.network, Arc::clone(&self.relay));
        let handle = match unbound.send_user_operation(client, call_data).await {
            Ok(handle) => handle,
            Err(err) => return Err(self.fail(err)),
        };

        let receipt = match unbound
            .await_confirmation(handle, self.confirmation_timeout)
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.fail(err)),
        };

        self.set_status(format!(
            "Recovery completed. <a href=\"{}\" target=\"_blank\" \
             rel=\"noopener noreferrer\" class=\"text-blue-500 \
             hover:text-blue-700\">Click here to view.</a>",
            self.network.explorer_user_op_url(&handle)
        ));
        self.set_stage(SessionStage::RecoveryConfirmed);
        info!(%handle, replacement = %replacement_signer, "recovery confirmed");
        Ok(receipt)
    }

    /// Derives the account, builds the client(s) and publishes readiness.
    ///
    /// `ClientReady` is set strictly after the address is known and the
    /// client can accept submissions.
    async fn bootstrap(
        &self,
        inner: &mut SessionInner,
        primary: Validator,
        with_recovery: bool,
    ) -> Result<Address, BootkitError> {
        let guardian = Validator::WeightedEcdsa(self.guardian.clone());
        let action = RecoveryAction::v07();
        let plugins = ValidatorPlugins::new(
            primary.clone(),
            Some(guardian.clone()),
            action,
        );

        let account = match self
            .factory
            .derive_account(&plugins, self.version, None)
            .await
        {
            Ok(account) => account,
            Err(err) => {
                return Err(self.fail(
                    err.coerce(BootkitError::AccountDerivationFailed),
                ))
            }
        };
        self.set_address(Some(account.address));
        self.set_stage(SessionStage::AccountDerived);
        info!(address = %account.address, "smart account derived");

        inner.primary = Some(AccountClient::new(
            account,
            plugins.clone(),
            self.network,
            Arc::clone(&self.relay),
        ));

        if with_recovery {
            // Pre-authorize guardian-only recovery: the interactive sudo
            // signature is captured now so recovery later needs none.
            let stand_in =
                Validator::StandIn(StandInValidator::from_validator(&primary));
            let digest = plugin_enable_digest(
                account.address,
                &plugins,
                self.network.chain_id(),
            );
            let enable_signature = match primary.sign_digest(digest).await {
                Ok(signature) => signature,
                Err(err) => {
                    return Err(self.fail(
                        err.coerce(BootkitError::RecoveryHandshakeFailed),
                    ))
                }
            };

            let recovery_plugins =
                ValidatorPlugins::new(stand_in, Some(guardian), action)
                    .with_enable_signature(enable_signature);
            let recovery_account = match self
                .factory
                .derive_account(
                    &recovery_plugins,
                    self.version,
                    Some(account.address),
                )
                .await
            {
                Ok(recovery_account) => recovery_account,
                Err(err) => {
                    return Err(self.fail(
                        err.coerce(BootkitError::RecoveryHandshakeFailed),
                    ))
                }
            };

            inner.recovery = Some(AccountClient::new(
                recovery_account,
                recovery_plugins,
                self.network,
                Arc::clone(&self.relay),
            ));
            info!(address = %recovery_account.address, "recovery pre-authorization captured");
        }

        self.set_status(format!(
            "Account address: {}",
            self.network.explorer_account_url(account.address)
        ));
        self.set_stage(SessionStage::ClientReady);
        Ok(account.address)
    }

    /// Acquires the stage lock without waiting: one in-flight stage.
    fn try_begin(
        &self,
        operation: &'static str,
    ) -> Result<tokio::sync::MutexGuard<'_, SessionInner>, BootkitError> {
        self.inner
            .try_lock()
            .map_err(|_| BootkitError::StageInProgress(operation))
    }

    /// UI-boundary stage gate for submission operations. Rejection leaves
    /// the session untouched; it is not a stage failure.
    fn ensure_submittable(
        &self,
        operation: &'static str,
    ) -> Result<(), BootkitError> {
        if self.is_client_ready() {
            Ok(())
        } else {
            Err(BootkitError::InvalidStage {
                operation,
                stage: self.stage().to_string(),
            })
        }
    }

    /// Resets the session for a fresh attempt; no partial state survives.
    fn start_attempt(&self, inner: &mut SessionInner) {
        inner.primary = None;
        inner.recovery = None;
        let mut snapshot = self.snapshot_guard();
        snapshot.stage = SessionStage::CredentialPending;
        snapshot.status.clear();
        snapshot.address = None;
    }

    /// Marks the attempt failed and surfaces the error to the UI.
    fn fail(&self, err: BootkitError) -> BootkitError {
        warn!(error = %err, "stage failed");
        let rendered = err.to_string();
        let mut snapshot = self.snapshot_guard();
        snapshot.stage = SessionStage::Failed(rendered.clone());
        snapshot.status = rendered;
        err
    }

    fn set_stage(&self, stage: SessionStage) {
        self.snapshot_guard().stage = stage;
    }

    fn set_status(&self, status: impl Into<String>) {
        self.snapshot_guard().status = status.into();
    }

    fn set_address(&self, address: Option<Address>) {
        self.snapshot_guard().address = address;
    }

    fn snapshot_guard(&self) -> MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
