//! Service-account credentials and the RS256 signer built on them.

mod service_account;
mod signer;

pub use service_account::ServiceAccount;
pub use signer::{CryptoSigner, ServiceAccountSigner, SignedBytes, ALGORITHM_RS256};
