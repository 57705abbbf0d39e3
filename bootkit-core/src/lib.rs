#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

//! Client-side orchestration for passkey-backed smart accounts.
//!
//! The crate drives the account bootstrap sequence (credential acquisition,
//! validator assembly, counterfactual account derivation, recovery-plugin
//! pre-authorization) and the sponsored user-operation lifecycle against three
//! external collaborators: a credential provider, an account factory and a
//! bundler/paymaster relay. All heavy protocol machinery lives behind those
//! collaborator seams; this crate owns the sequencing, the session state
//! machine and the parameter plumbing.

use strum::EnumString;

/// Networks the demo stack is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Network {
    Sepolia,
    PolygonAmoy,
}

mod account;
pub use account::*;

mod client;
pub use client::*;

mod credential;
pub use credential::*;

mod defaults;
pub use defaults::*;

mod error;
pub use error::*;

mod operation;
pub use operation::*;

mod passkey;
pub use passkey::*;

mod relay;
pub use relay::*;

mod session;
pub use session::*;

mod validator;
pub use validator::*;

// private modules
mod request;
