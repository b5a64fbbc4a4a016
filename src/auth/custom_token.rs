use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::config::{FIREBASE_AUDIENCE, ONE_HOUR};
use crate::auth::error::{invalid_argument, signing_error, AuthResult};
use crate::credential::CryptoSigner;
use crate::util::jwt::{encode_segment, signing_input};
use crate::util::time::{unix_seconds, Clock};

/// Claim names developers may not set on a custom token.
pub const RESERVED_CLAIMS: [&str; 14] = [
    "acr",
    "amr",
    "at_hash",
    "aud",
    "auth_time",
    "azp",
    "cnf",
    "c_hash",
    "exp",
    "iat",
    "iss",
    "jti",
    "nbf",
    "nonce",
];

#[derive(Serialize)]
struct CustomTokenHeader<'a> {
    alg: &'a str,
    typ: &'static str,
}

#[derive(Serialize)]
struct CustomTokenPayload<'a> {
    aud: &'static str,
    iat: i64,
    exp: i64,
    iss: &'a str,
    sub: &'a str,
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<&'a Map<String, Value>>,
}

/// Mints custom sign-in tokens for handoff to a client SDK.
///
/// Every call produces a fresh token; nothing is cached.
#[derive(Clone)]
pub struct TokenGenerator {
    signer: Arc<dyn CryptoSigner>,
    clock: Arc<dyn Clock>,
}

impl TokenGenerator {
    pub fn new(signer: Arc<dyn CryptoSigner>, clock: Arc<dyn Clock>) -> Self {
        Self { signer, clock }
    }

    /// Builds and signs a custom token asserting `uid`.
    ///
    /// `developer_claims` end up under the token's `claims` key and are omitted entirely when
    /// absent or empty.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty `uid` or a reserved claim name, `Signing` if the signer
    /// fails.
    pub async fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, Value>>,
    ) -> AuthResult<String> {
        if uid.is_empty() {
            return Err(invalid_argument("`uid` argument must be a non-empty string."));
        }

        let claims = developer_claims.filter(|claims| !claims.is_empty());
        if let Some(claims) = claims {
            if let Some(key) = claims
                .keys()
                .find(|key| RESERVED_CLAIMS.contains(&key.as_str()))
            {
                return Err(invalid_argument(format!(
                    "Developer claim \"{key}\" is reserved and cannot be specified."
                )));
            }
        }

        let account = self.signer.account_id();
        let iat = unix_seconds(self.clock.now());
        let header = CustomTokenHeader {
            alg: self.signer.algorithm(),
            typ: "JWT",
        };
        let payload = CustomTokenPayload {
            aud: FIREBASE_AUDIENCE,
            iat,
            exp: iat + ONE_HOUR.as_secs() as i64,
            iss: account,
            sub: account,
            uid,
            claims,
        };

        let header = encode_segment(&header)
            .map_err(|err| signing_error(format!("Failed to encode token header: {err}")))?;
        let payload = encode_segment(&payload)
            .map_err(|err| signing_error(format!("Failed to encode token payload: {err}")))?;
        let input = signing_input(&header, &payload);
        let signed = self.signer.sign(input.as_bytes()).await?;

        Ok(format!("{input}.{}", signed.signature))
    }
}
