use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::auth::config::{
    ACCESS_TOKEN_CACHE_KEY, ACCESS_TOKEN_SCOPES, DEFAULT_EXPIRY_THRESHOLD, JWT_BEARER_GRANT_TYPE,
    ONE_HOUR,
};
use crate::auth::error::{signing_error, upstream_unavailable, AuthError, AuthResult};
use crate::auth::types::{AccessToken, PersistedAccessToken};
use crate::cache::{Cache, PutOptions};
use crate::credential::CryptoSigner;
use crate::util::jwt::{encode_segment, signing_input};
use crate::util::time::{millis_to_system_time, unix_seconds, Clock};

#[derive(Serialize)]
struct AssertionHeader<'a> {
    alg: &'a str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Serialize)]
struct AssertionPayload<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    scope: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Obtains and caches the service account's OAuth2 access token.
///
/// Tokens are reused from the cache until they come within `expiry_threshold` of expiring.
/// Refreshing is demand-driven and takes no lock: concurrent callers may each exchange an
/// assertion, and the cache converges on one of the (equally valid) results.
#[derive(Clone)]
pub struct AccessTokenManager {
    signer: Arc<dyn CryptoSigner>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    http: Client,
    token_endpoint: Url,
    expiry_threshold: Duration,
}

impl AccessTokenManager {
    pub fn new(
        signer: Arc<dyn CryptoSigner>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
        http: Client,
        token_endpoint: Url,
    ) -> Self {
        Self {
            signer,
            cache,
            clock,
            http,
            token_endpoint,
            expiry_threshold: DEFAULT_EXPIRY_THRESHOLD,
        }
    }

    pub fn with_expiry_threshold(mut self, threshold: Duration) -> Self {
        self.expiry_threshold = threshold;
        self
    }

    /// Returns a usable access token, refreshing it when forced, missing or close to expiry.
    ///
    /// # Errors
    /// `Signing` if the assertion cannot be signed, `UpstreamUnavailable` on transport failure
    /// and `TokenExchange` when the authorization server rejects the grant. No retry is
    /// attempted.
    pub async fn get_token(&self, force_refresh: bool) -> AuthResult<AccessToken> {
        let cached = self.cached_token().await;
        match cached {
            Some(token)
                if !force_refresh
                    && !token.needs_refresh(self.clock.now(), self.expiry_threshold) =>
            {
                log::debug!("reusing cached access token");
                Ok(token)
            }
            _ => self.refresh_token().await,
        }
    }

    /// Drops the cached token so the next call performs a fresh exchange.
    pub async fn invalidate(&self) {
        if let Err(err) = self.cache.delete(ACCESS_TOKEN_CACHE_KEY).await {
            log::warn!("failed to delete cached access token: {err}");
        }
    }

    async fn refresh_token(&self) -> AuthResult<AccessToken> {
        log::debug!("refreshing access token from {}", self.token_endpoint);
        let response = self.exchange_assertion().await?;
        // Kept at millisecond precision so the token matches what the cache stores.
        let expiration_time = self
            .clock
            .now()
            .checked_add(Duration::from_secs(response.expires_in))
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .and_then(|since_epoch| u64::try_from(since_epoch.as_millis()).ok())
            .map(millis_to_system_time)
            .ok_or_else(|| {
                upstream_unavailable(
                    None,
                    format!("Access token expires_in {} is out of range", response.expires_in),
                )
            })?;
        let token = AccessToken {
            access_token: response.access_token,
            expiration_time,
        };

        // Another caller may have installed a token in the meantime; only overwrite when both
        // the value and the expiry differ from what is there now.
        let should_write = match self.cached_token().await {
            Some(current) => {
                current.access_token != token.access_token
                    && current.expiration_time != token.expiration_time
            }
            None => true,
        };
        if should_write {
            self.store_token(&token).await;
        }
        Ok(token)
    }

    async fn exchange_assertion(&self) -> AuthResult<TokenResponse> {
        let assertion = self.create_assertion().await?;
        let response = self
            .http
            .post(self.token_endpoint.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|err| {
                upstream_unavailable(None, format!("Network error exchanging assertion: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<unreadable body: {err}>"));
            log::warn!("access token exchange failed with status {status}");
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<TokenResponse>().await.map_err(|err| {
            upstream_unavailable(
                Some(status.as_u16()),
                format!("Invalid access token response: {err}"),
            )
        })
    }

    /// Self-issued JWT-bearer assertion, valid for one hour.
    pub(crate) async fn create_assertion(&self) -> AuthResult<String> {
        let account = self.signer.account_id();
        let iat = unix_seconds(self.clock.now());
        let header = AssertionHeader {
            alg: self.signer.algorithm(),
            typ: "JWT",
            kid: self.signer.key_id(),
        };
        let payload = AssertionPayload {
            iss: account,
            sub: account,
            aud: self.token_endpoint.as_str(),
            iat,
            exp: iat + ONE_HOUR.as_secs() as i64,
            scope: ACCESS_TOKEN_SCOPES.join(" "),
        };

        let header = encode_segment(&header)
            .map_err(|err| signing_error(format!("Failed to encode assertion header: {err}")))?;
        let payload = encode_segment(&payload)
            .map_err(|err| signing_error(format!("Failed to encode assertion payload: {err}")))?;
        let input = signing_input(&header, &payload);
        let signed = self.signer.sign(input.as_bytes()).await?;
        Ok(format!("{input}.{}", signed.signature))
    }

    async fn cached_token(&self) -> Option<AccessToken> {
        let raw = match self.cache.get(ACCESS_TOKEN_CACHE_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                log::warn!("access token cache read failed, treating as miss: {err}");
                return None;
            }
        };
        match serde_json::from_str::<PersistedAccessToken>(&raw) {
            Ok(persisted) => Some(persisted.into_runtime()),
            Err(err) => {
                log::warn!("ignoring unreadable cached access token: {err}");
                None
            }
        }
    }

    async fn store_token(&self, token: &AccessToken) {
        let persisted = PersistedAccessToken::from_runtime(token);
        let json = match serde_json::to_string(&persisted) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("failed to serialize access token for caching: {err}");
                return;
            }
        };
        if let Err(err) = self
            .cache
            .put(ACCESS_TOKEN_CACHE_KEY, json, PutOptions::default())
            .await
        {
            log::warn!("failed to cache access token: {err}");
        }
    }
}
