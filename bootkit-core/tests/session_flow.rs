//! End-to-end session tests against in-memory collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tokio::sync::Notify;

use bootkit_core::{
    placeholder_signature, random_replacement_signer, AccountFactory,
    BootkitError, Credential, CredentialProvider, DemoNft, KernelAccount,
    KernelFactory, KernelVersion, Network, OperationHandle, Receipt,
    RecoveryExecutor, RelayService, Session, SessionStage, SmartAccount,
    Sponsorship, UserOperation, ValidatorPlugins, WeightedEcdsaValidator,
    DEMO_NFT_CONTRACT, ENTRY_POINT_V07, RECOVERY_VALIDATOR,
};

#[derive(Default)]
struct MockProvider {
    fail_enroll: bool,
    labels: Mutex<Vec<String>>,
    sign_count: AtomicUsize,
}

impl MockProvider {
    fn failing_enrollment() -> Self {
        Self {
            fail_enroll: true,
            ..Self::default()
        }
    }

    fn signatures_issued(&self) -> usize {
        self.sign_count.load(Ordering::SeqCst)
    }

    fn seen_labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialProvider for MockProvider {
    async fn enroll(&self, label: &str) -> Result<Credential, BootkitError> {
        if self.fail_enroll {
            return Err(BootkitError::CredentialEnrollmentFailed(
                "user dismissed the ceremony".to_string(),
            ));
        }
        self.labels.lock().unwrap().push(label.to_string());
        Ok(Credential {
            label: label.to_string(),
            credential_id: Bytes::from_static(b"mock-credential"),
            public_key: keccak256(label.as_bytes()),
        })
    }

    async fn authenticate(
        &self,
        label: &str,
    ) -> Result<Credential, BootkitError> {
        self.labels.lock().unwrap().push(label.to_string());
        Ok(Credential {
            label: label.to_string(),
            credential_id: Bytes::from_static(b"mock-credential"),
            public_key: keccak256(label.as_bytes()),
        })
    }

    async fn sign(
        &self,
        _credential: &Credential,
        challenge: B256,
    ) -> Result<Bytes, BootkitError> {
        self.sign_count.fetch_add(1, Ordering::SeqCst);
        let mut signature = vec![0x01];
        signature.extend_from_slice(challenge.as_slice());
        signature.extend_from_slice(&[0x02; 32]);
        Ok(signature.into())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ConfirmMode {
    Confirm,
    TimeOut,
}

struct MockRelay {
    submitted: Mutex<Vec<UserOperation>>,
    confirm_mode: ConfirmMode,
    submit_gate: Option<Arc<Notify>>,
    confirm_gate: Option<Arc<Notify>>,
}

impl MockRelay {
    fn confirming() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            confirm_mode: ConfirmMode::Confirm,
            submit_gate: None,
            confirm_gate: None,
        }
    }

    fn timing_out() -> Self {
        Self {
            confirm_mode: ConfirmMode::TimeOut,
            ..Self::confirming()
        }
    }

    fn with_submit_gate(mut self, gate: Arc<Notify>) -> Self {
        self.submit_gate = Some(gate);
        self
    }

    fn with_confirm_gate(mut self, gate: Arc<Notify>) -> Self {
        self.confirm_gate = Some(gate);
        self
    }

    fn submitted(&self) -> Vec<UserOperation> {
        self.submitted.lock().unwrap().clone()
    }
}

fn handle_for(operation: &UserOperation) -> OperationHandle {
    OperationHandle(operation.hash(Network::Sepolia.chain_id(), ENTRY_POINT_V07))
}

#[async_trait]
impl RelayService for MockRelay {
    async fn sponsor(
        &self,
        _operation: &UserOperation,
    ) -> Result<Sponsorship, BootkitError> {
        Ok(Sponsorship {
            paymaster_and_data: Bytes::from_static(&[0xaa; 20]),
            ..Sponsorship::default()
        })
    }

    async fn submit(
        &self,
        operation: &UserOperation,
    ) -> Result<OperationHandle, BootkitError> {
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        self.submitted.lock().unwrap().push(operation.clone());
        Ok(handle_for(operation))
    }

    async fn await_confirmation(
        &self,
        handle: OperationHandle,
        timeout: Duration,
    ) -> Result<Receipt, BootkitError> {
        if let Some(gate) = &self.confirm_gate {
            gate.notified().await;
        }
        match self.confirm_mode {
            ConfirmMode::Confirm => Ok(Receipt {
                user_op_hash: handle,
                transaction_hash: B256::repeat_byte(0x99),
                block_number: 1,
                success: true,
            }),
            ConfirmMode::TimeOut => {
                tokio::time::sleep(timeout).await;
                Err(BootkitError::OperationTimedOut {
                    handle: handle.to_string(),
                    waited_ms: u64::try_from(timeout.as_millis())
                        .unwrap_or(u64::MAX),
                })
            }
        }
    }
}

fn session_with(
    provider: Arc<MockProvider>,
    relay: Arc<MockRelay>,
    guardian: WeightedEcdsaValidator,
) -> Session {
    Session::new(
        Network::Sepolia,
        provider,
        Arc::new(KernelFactory),
        relay,
        guardian,
    )
    .with_confirmation_timeout(Duration::from_millis(50))
}

fn guardian() -> WeightedEcdsaValidator {
    WeightedEcdsaValidator::single(random_replacement_signer())
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached within 1s");
}

#[tokio::test]
async fn test_register_reports_ready_with_address() {
    let provider = Arc::new(MockProvider::default());
    let relay = Arc::new(MockRelay::confirming());
    let session = session_with(Arc::clone(&provider), relay, guardian());

    let address = session.register("").await.unwrap();

    assert_eq!(session.stage(), SessionStage::ClientReady);
    assert!(session.is_client_ready());
    assert_eq!(session.account_address(), Some(address));
    assert!(session.status().contains("jiffyscan.xyz/account/"));

    let labels = provider.seen_labels();
    assert!(labels[0].starts_with("Web3pay - "));
}

#[tokio::test]
async fn test_register_generates_distinct_default_labels() {
    let provider = Arc::new(MockProvider::default());
    let relay = Arc::new(MockRelay::confirming());
    let session = session_with(Arc::clone(&provider), relay, guardian());

    session.register("").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    session.register("").await.unwrap();

    let labels = provider.seen_labels();
    assert_eq!(labels.len(), 2);
    assert_ne!(labels[0], labels[1]);
}

#[tokio::test]
async fn test_enrollment_failure_aborts_without_partial_state() {
    let provider = Arc::new(MockProvider::failing_enrollment());
    let relay = Arc::new(MockRelay::confirming());
    let session =
        session_with(provider, Arc::clone(&relay), guardian());

    let err = session.register("alice").await.unwrap_err();
    assert!(matches!(err, BootkitError::CredentialEnrollmentFailed(_)));

    assert!(matches!(session.stage(), SessionStage::Failed(_)));
    assert!(!session.is_client_ready());
    assert_eq!(session.account_address(), None);
    assert!(relay.submitted().is_empty());
}

struct SlowFactory;

#[async_trait]
impl AccountFactory for SlowFactory {
    async fn derive_account(
        &self,
        plugins: &ValidatorPlugins,
        version: KernelVersion,
        deployed_address: Option<Address>,
    ) -> Result<SmartAccount, BootkitError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        KernelFactory
            .derive_account(plugins, version, deployed_address)
            .await
    }
}

#[tokio::test]
async fn test_ready_is_never_observed_before_address() {
    let session = Arc::new(Session::new(
        Network::Sepolia,
        Arc::new(MockProvider::default()),
        Arc::new(SlowFactory),
        Arc::new(MockRelay::confirming()),
        guardian(),
    ));

    let runner = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.register("").await })
    };

    loop {
        let stage = session.stage();
        if stage == SessionStage::ClientReady {
            assert!(session.account_address().is_some());
        }
        if runner.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    runner.await.unwrap().unwrap();
    assert_eq!(session.stage(), SessionStage::ClientReady);
    assert!(session.account_address().is_some());
}

#[tokio::test]
async fn test_mint_status_transitions_after_confirmation_only() {
    let provider = Arc::new(MockProvider::default());
    let confirm_gate = Arc::new(Notify::new());
    let relay = Arc::new(
        MockRelay::confirming().with_confirm_gate(Arc::clone(&confirm_gate)),
    );
    let session = Arc::new(session_with(
        provider,
        Arc::clone(&relay),
        guardian(),
    ));

    session.register("").await.unwrap();

    let runner = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.send_mint_operation().await })
    };

    {
        let session = Arc::clone(&session);
        wait_for(move || session.stage() == SessionStage::OperationPending)
            .await;
    }
    assert_eq!(session.status(), "Sending UserOp...");
    // In flight is not ready: the gate must read false until confirmation.
    assert!(!session.is_client_ready());

    confirm_gate.notify_one();
    let receipt = runner.await.unwrap().unwrap();

    assert_eq!(session.stage(), SessionStage::OperationConfirmed);
    assert!(session.is_client_ready());
    let handle = handle_for(&relay.submitted()[0]);
    assert_eq!(receipt.user_op_hash, handle);
    assert!(session.status().contains("UserOp completed."));
    assert!(session.status().contains(&handle.to_string()));
}

#[tokio::test]
async fn test_mint_targets_demo_contract_via_execute() {
    let provider = Arc::new(MockProvider::default());
    let relay = Arc::new(MockRelay::confirming());
    let session = session_with(provider, Arc::clone(&relay), guardian());

    let account = session.register("").await.unwrap();
    session.send_mint_operation().await.unwrap();

    let submitted = relay.submitted();
    assert_eq!(submitted.len(), 1);

    // The operation executes against the fixed demo contract, with the mint
    // calldata carried inside the account's execute envelope.
    let execute =
        KernelAccount::executeCall::abi_decode(&submitted[0].call_data)
            .unwrap();
    assert_eq!(execute.to, DEMO_NFT_CONTRACT);
    let mint = DemoNft::mintCall::abi_decode(&execute.data).unwrap();
    assert_eq!(mint.to, account);
}

#[tokio::test]
async fn test_second_mint_while_pending_is_rejected_without_submission() {
    let provider = Arc::new(MockProvider::default());
    let submit_gate = Arc::new(Notify::new());
    let relay = Arc::new(
        MockRelay::confirming().with_submit_gate(Arc::clone(&submit_gate)),
    );
    let session = Arc::new(session_with(
        provider,
        Arc::clone(&relay),
        guardian(),
    ));

    session.register("").await.unwrap();

    let runner = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.send_mint_operation().await })
    };

    {
        let session = Arc::clone(&session);
        wait_for(move || session.stage() == SessionStage::OperationPending)
            .await;
    }

    let err = session.send_mint_operation().await.unwrap_err();
    assert!(matches!(err, BootkitError::StageInProgress(_)));

    submit_gate.notify_one();
    runner.await.unwrap().unwrap();
    assert_eq!(relay.submitted().len(), 1);
}

#[tokio::test]
async fn test_confirmation_timeout_leaves_session_failed() {
    let provider = Arc::new(MockProvider::default());
    let relay = Arc::new(MockRelay::timing_out());
    let session = session_with(provider, relay, guardian());

    session.register("").await.unwrap();
    let err = session.send_mint_operation().await.unwrap_err();

    assert!(matches!(err, BootkitError::OperationTimedOut { .. }));
    assert!(matches!(session.stage(), SessionStage::Failed(_)));
    assert_ne!(session.stage(), SessionStage::OperationConfirmed);
    assert!(session.status().contains("operation_timed_out"));
}

#[tokio::test]
async fn test_stand_in_never_signs_during_mint() {
    let provider = Arc::new(MockProvider::default());
    let relay = Arc::new(MockRelay::confirming());
    let session = session_with(
        Arc::clone(&provider),
        Arc::clone(&relay),
        guardian(),
    );

    session.register("").await.unwrap();
    // The handshake captured exactly one interactive sudo signature.
    assert_eq!(provider.signatures_issued(), 1);

    session.send_mint_operation().await.unwrap();

    // The mint was signed by the real passkey validator, not the stand-in.
    assert_eq!(provider.signatures_issued(), 2);
    let submitted = relay.submitted();
    assert_eq!(submitted.len(), 1);
    assert_ne!(submitted[0].signature, placeholder_signature());
}

#[tokio::test]
async fn test_recover_encodes_do_recovery_exactly() {
    let provider = Arc::new(MockProvider::default());
    let relay = Arc::new(MockRelay::confirming());
    let session = session_with(
        Arc::clone(&provider),
        Arc::clone(&relay),
        guardian(),
    );

    let account = session.register("").await.unwrap();
    let signatures_before = provider.signatures_issued();

    let replacement = random_replacement_signer().address();
    session.recover(replacement).await.unwrap();

    assert_eq!(session.stage(), SessionStage::RecoveryConfirmed);

    let submitted = relay.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].sender, account);

    let call =
        RecoveryExecutor::doRecoveryCall::abi_decode(&submitted[0].call_data)
            .unwrap();
    assert_eq!(call._validator, RECOVERY_VALIDATOR);
    assert_eq!(
        call._data,
        Bytes::copy_from_slice(replacement.as_slice())
    );

    // Guardian-only: no further interactive passkey signature was needed.
    assert_eq!(provider.signatures_issued(), signatures_before);
    assert_ne!(submitted[0].signature, placeholder_signature());
    assert_eq!(submitted[0].signature.len(), 65);
}

#[tokio::test]
async fn test_login_skips_recovery_handshake() {
    let provider = Arc::new(MockProvider::default());
    let relay = Arc::new(MockRelay::confirming());
    let session = session_with(
        Arc::clone(&provider),
        Arc::clone(&relay),
        guardian(),
    );

    session.login("alice").await.unwrap();
    assert_eq!(session.stage(), SessionStage::ClientReady);
    assert_eq!(provider.signatures_issued(), 0);

    let err = session
        .recover(random_replacement_signer().address())
        .await
        .unwrap_err();
    assert!(matches!(err, BootkitError::InvalidStage { .. }));
    // A UI-boundary rejection, not a stage failure.
    assert_eq!(session.stage(), SessionStage::ClientReady);
    assert!(relay.submitted().is_empty());

    session.send_mint_operation().await.unwrap();
    assert_eq!(session.stage(), SessionStage::OperationConfirmed);
}

#[tokio::test]
async fn test_same_credential_and_guardian_derive_same_address() {
    let shared_guardian = guardian();
    let relay = Arc::new(MockRelay::confirming());

    let first = session_with(
        Arc::new(MockProvider::default()),
        Arc::clone(&relay),
        shared_guardian.clone(),
    );
    let second = session_with(
        Arc::new(MockProvider::default()),
        relay,
        shared_guardian,
    );

    let registered = first.register("alice").await.unwrap();
    let logged_in = second.login("alice").await.unwrap();
    assert_eq!(registered, logged_in);
}
