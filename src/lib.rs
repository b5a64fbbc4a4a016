//! Firebase Authentication for trusted server environments.
//!
//! - [`auth`]: custom token minting, ID token verification, service account access tokens and
//!   an HTTP client authorized with them.
//! - [`cache`]: the key-value store tokens and certificates are kept in, with in-memory and
//!   file-backed adapters.
//! - [`credential`]: service account credentials and the RS256 signer.
//! - [`util`]: base64url, compact JWT and clock helpers.

pub mod auth;
pub mod cache;
pub mod credential;
pub mod util;

#[cfg(test)]
pub mod test_support;
