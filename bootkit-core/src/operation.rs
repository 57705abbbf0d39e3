use std::fmt;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};

sol! {
    /// Demo NFT surface exercised by the mint flow.
    #[derive(Debug, PartialEq, Eq)]
    interface DemoNft {
        function mint(address to) external;
        function balanceOf(address owner) external view returns (uint256 balance);
    }

    /// Recovery executor routine addressed at the recovery action's own
    /// entry point. Swaps the active signer of `_validator` for the one
    /// carried in `_data`.
    #[derive(Debug, PartialEq, Eq)]
    interface RecoveryExecutor {
        function doRecovery(address _validator, bytes calldata _data) external;
    }

    /// The smart account's own execution surface. Ordinary calls are routed
    /// through it; recovery calldata goes out raw, addressed at the recovery
    /// executor directly.
    #[derive(Debug, PartialEq, Eq)]
    interface KernelAccount {
        function execute(address to, uint256 value, bytes calldata data) external;
    }
}

/// Encodes a call to the demo contract's `mint(to)` entry point.
#[must_use]
pub fn encode_mint(to: Address) -> Bytes {
    DemoNft::mintCall { to }.abi_encode().into()
}

/// Encodes a call to the demo contract's `balanceOf(owner)` view.
#[must_use]
pub fn encode_balance_of(owner: Address) -> Bytes {
    DemoNft::balanceOfCall { owner }.abi_encode().into()
}

/// Wraps `data` in the account's `execute(to, value, data)` envelope, so the
/// operation names the contract it targets.
#[must_use]
pub fn encode_execute(target: Address, value: U256, data: Bytes) -> Bytes {
    KernelAccount::executeCall {
        to: target,
        value,
        data,
    }
    .abi_encode()
    .into()
}

/// Encodes `doRecovery(validator, data)`, argument order preserved.
#[must_use]
pub fn encode_recovery(validator: Address, data: Bytes) -> Bytes {
    RecoveryExecutor::doRecoveryCall {
        _validator: validator,
        _data: data,
    }
    .abi_encode()
    .into()
}

/// An account-abstraction transaction as submitted through the relay.
///
/// Only the fields this orchestrator actually populates; gas limits arrive
/// with the sponsorship and everything else is the relay's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The smart account the operation executes from.
    pub sender: Address,
    /// Anti-replay nonce; left for the relay to fill on fresh accounts.
    pub nonce: U256,
    /// ABI-encoded call the account will execute.
    pub call_data: Bytes,
    /// Paymaster sponsorship payload, empty until sponsored.
    #[serde(default)]
    pub paymaster_and_data: Bytes,
    /// Execution gas limit, set by the sponsorship.
    #[serde(default)]
    pub call_gas_limit: U256,
    /// Verification gas limit, set by the sponsorship.
    #[serde(default)]
    pub verification_gas_limit: U256,
    /// Signature produced by the account's active validator.
    #[serde(default)]
    pub signature: Bytes,
}

impl UserOperation {
    /// Builds an unsponsored, unsigned operation for `sender`.
    #[must_use]
    pub fn new(sender: Address, call_data: Bytes) -> Self {
        Self {
            sender,
            nonce: U256::ZERO,
            call_data,
            paymaster_and_data: Bytes::new(),
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            signature: Bytes::new(),
        }
    }

    /// Folds a granted sponsorship into the operation.
    pub fn apply_sponsorship(&mut self, sponsorship: Sponsorship) {
        self.paymaster_and_data = sponsorship.paymaster_and_data;
        self.call_gas_limit = sponsorship.call_gas_limit;
        self.verification_gas_limit = sponsorship.verification_gas_limit;
    }

    /// Digest the active validator signs: binds the operation to a chain and
    /// an entry point so a signature cannot be replayed across either.
    #[must_use]
    pub fn hash(&self, chain_id: u64, entry_point: Address) -> B256 {
        let mut preimage = Vec::with_capacity(160);
        preimage.extend_from_slice(self.sender.as_slice());
        preimage.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        preimage.extend_from_slice(keccak256(&self.call_data).as_slice());
        preimage.extend_from_slice(keccak256(&self.paymaster_and_data).as_slice());
        preimage.extend_from_slice(&chain_id.to_be_bytes());
        preimage.extend_from_slice(entry_point.as_slice());
        keccak256(&preimage)
    }
}

/// Identifier returned on submission, before on-chain inclusion.
///
/// Exchanged for a [`Receipt`] through `RelayService::await_confirmation`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OperationHandle(pub B256);

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Paymaster grant covering an operation's fees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsorship {
    /// Paymaster payload the operation must carry.
    pub paymaster_and_data: Bytes,
    /// Execution gas limit granted by the paymaster.
    #[serde(default)]
    pub call_gas_limit: U256,
    /// Verification gas limit granted by the paymaster.
    #[serde(default)]
    pub verification_gas_limit: U256,
}

/// Proof of on-chain inclusion for a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Handle of the confirmed operation.
    pub user_op_hash: OperationHandle,
    /// Transaction the bundler included the operation in.
    pub transaction_hash: B256,
    /// Block the transaction landed in.
    pub block_number: u64,
    /// Whether the inner call succeeded.
    pub success: bool,
}
