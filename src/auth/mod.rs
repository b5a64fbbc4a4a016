//! Server-side Firebase Authentication primitives.
//!
//! [`FirebaseAuth`] bundles the three token flows a backend needs:
//!
//! - minting custom tokens a client SDK exchanges for a Firebase session,
//! - verifying ID tokens presented by clients,
//! - obtaining the service account's own OAuth2 access token for Google APIs.
//!
//! Access tokens and signing certificates are kept in a pluggable [`crate::cache::Cache`].
//!
//! ```no_run
//! use firebase_admin_auth::auth::initialize_auth;
//! use firebase_admin_auth::credential::ServiceAccount;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let account = ServiceAccount::from_json(&std::fs::read_to_string("service-account.json")?)?;
//! let auth = initialize_auth(account, None)?;
//!
//! let custom_token = auth.create_custom_token("user123", None).await?;
//! let claims = auth.verify_id_token("<id token from client>").await?;
//! println!("{custom_token} {}", claims.uid);
//! # Ok(())
//! # }
//! ```

mod access_token;
mod api;
pub mod config;
mod custom_token;
pub(crate) mod error;
mod http_client;
mod types;
mod verifier;

#[doc(inline)]
pub use access_token::AccessTokenManager;

#[doc(inline)]
pub use api::{initialize_auth, FirebaseAuth, FirebaseAuthBuilder};

#[doc(inline)]
pub use config::AuthConfig;

#[doc(inline)]
pub use custom_token::{TokenGenerator, RESERVED_CLAIMS};

#[doc(inline)]
pub use error::{AuthError, AuthErrorCode, AuthResult};

#[doc(inline)]
pub use http_client::{ApiRequest, AuthorizedHttpClient};

#[doc(inline)]
pub use types::{AccessToken, DecodedIdToken, FirebaseInfo};

#[doc(inline)]
pub use verifier::{parse_max_age, CertificateSet, TokenVerifier};
