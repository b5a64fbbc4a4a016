use std::sync::Arc;

use async_trait::async_trait;
use rsa::signature::{SignatureEncoding, Signer};

use crate::auth::error::{signing_error, AuthResult};
use crate::credential::ServiceAccount;
use crate::util::base64::base64_url_encode_bytes;

pub const ALGORITHM_RS256: &str = "RS256";

/// A signature over a buffer: base64url (unpadded) for embedding in a JWT, plus the raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedBytes {
    pub signature: String,
    pub output: Vec<u8>,
}

/// Produces JWS signatures on behalf of an account.
#[async_trait]
pub trait CryptoSigner: Send + Sync {
    /// JWS algorithm name; fixed for the lifetime of the signer.
    fn algorithm(&self) -> &str;

    /// Identity used as `iss` and `sub` of minted tokens.
    fn account_id(&self) -> &str;

    /// Identifier of the signing key, advertised as `kid` when present.
    fn key_id(&self) -> Option<&str> {
        None
    }

    async fn sign(&self, input: &[u8]) -> AuthResult<SignedBytes>;
}

/// RS256 signer backed by a service-account private key.
#[derive(Clone, Debug)]
pub struct ServiceAccountSigner {
    service_account: Arc<ServiceAccount>,
}

impl ServiceAccountSigner {
    pub fn new(service_account: Arc<ServiceAccount>) -> Self {
        Self { service_account }
    }

    pub fn service_account(&self) -> &ServiceAccount {
        &self.service_account
    }
}

#[async_trait]
impl CryptoSigner for ServiceAccountSigner {
    fn algorithm(&self) -> &str {
        ALGORITHM_RS256
    }

    fn account_id(&self) -> &str {
        self.service_account.client_email()
    }

    fn key_id(&self) -> Option<&str> {
        Some(self.service_account.private_key_id())
    }

    async fn sign(&self, input: &[u8]) -> AuthResult<SignedBytes> {
        let key = self.service_account.signing_key()?;
        let output = key
            .try_sign(input)
            .map_err(|err| signing_error(format!("RSASSA-PKCS1-v1_5 signing failed: {err}")))?
            .to_vec();

        Ok(SignedBytes {
            signature: base64_url_encode_bytes(&output),
            output,
        })
    }
}
