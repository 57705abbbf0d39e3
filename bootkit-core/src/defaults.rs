use std::time::Duration;

use alloy_primitives::{address, Address};

use crate::Network;

/// App name used when deriving default passkey labels.
pub const APP_NAME: &str = "Web3pay";

/// ERC-4337 entry point, v0.7.
pub const ENTRY_POINT_V07: Address =
    address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");

/// Demo NFT contract exposing `mint(address)` / `balanceOf(address)`.
pub const DEMO_NFT_CONTRACT: Address =
    address!("0x34bE7f35132E97915633BC1fc020364EA5134863");

/// WebAuthn validator module backing passkey validators.
pub const WEBAUTHN_VALIDATOR: Address =
    address!("0xD990393C670dCcE8b4d8F858FB98c9912dBFAa06");

/// ECDSA validator module named as the first argument of `doRecovery`.
pub const RECOVERY_VALIDATOR: Address =
    address!("0x845ADb2C711129d4f3966735eD98a9F09fC4cE57");

/// Recovery executor installed as the recovery action's entry point.
pub const RECOVERY_EXECUTOR: Address =
    address!("0x2f65dB8039fe5CAEE0a8680D2879deB800F31Ae1");

/// Upper bound on waiting for a submitted operation's receipt.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(100);

/// Cadence at which the relay is polled for a receipt while waiting.
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const PROJECT_ID_SEPOLIA: &str = "ddf3ddac-ac6e-492c-8e58-214c7e9f0e01";
const PROJECT_ID_AMOY: &str = "779a8e75-8332-4e4f-b6e5-acfec9f777d9";

impl Network {
    /// EIP-155 chain id for the network.
    #[must_use]
    pub const fn chain_id(self) -> u64 {
        match self {
            Self::Sepolia => 11_155_111,
            Self::PolygonAmoy => 80_002,
        }
    }

    const fn project_id(self) -> &'static str {
        match self {
            Self::Sepolia => PROJECT_ID_SEPOLIA,
            Self::PolygonAmoy => PROJECT_ID_AMOY,
        }
    }

    const fn explorer_slug(self) -> &'static str {
        match self {
            Self::Sepolia => "sepolia",
            Self::PolygonAmoy => "polygon-amoy",
        }
    }

    /// Bundler endpoint operations are submitted to.
    #[must_use]
    pub fn bundler_url(self) -> String {
        format!(
            "https://rpc.zerodev.app/api/v2/bundler/{}",
            self.project_id()
        )
    }

    /// Paymaster endpoint sponsorship requests go to.
    #[must_use]
    pub fn paymaster_url(self) -> String {
        format!(
            "https://rpc.zerodev.app/api/v2/paymaster/{}",
            self.project_id()
        )
    }

    /// Passkey server backing the credential provider.
    #[must_use]
    pub fn passkey_server_url(self) -> String {
        format!(
            "https://passkeys.zerodev.app/api/v3/{}",
            self.project_id()
        )
    }

    /// Block-explorer link for a smart account.
    #[must_use]
    pub fn explorer_account_url(self, account: Address) -> String {
        format!(
            "https://jiffyscan.xyz/account/{account}?network={}",
            self.explorer_slug()
        )
    }

    /// Block-explorer link for a submitted user operation.
    #[must_use]
    pub fn explorer_user_op_url(self, handle: &crate::OperationHandle) -> String {
        format!(
            "https://jiffyscan.xyz/userOpHash/{handle}?network={}",
            self.explorer_slug()
        )
    }
}
