use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use crate::auth::access_token::AccessTokenManager;
use crate::auth::config::{parse_endpoint, AuthConfig};
use crate::auth::custom_token::TokenGenerator;
use crate::auth::error::{configuration_error, AuthResult};
use crate::auth::http_client::AuthorizedHttpClient;
use crate::auth::types::{AccessToken, DecodedIdToken};
use crate::auth::verifier::TokenVerifier;
use crate::cache::{Cache, MemoryCache};
use crate::credential::{CryptoSigner, ServiceAccount, ServiceAccountSigner};
use crate::util::time::{Clock, SystemClock};

/// Server-side entry point: mints custom tokens, verifies ID tokens and holds the service
/// account's access token.
///
/// Cloning is cheap; clones share the cache and HTTP connection pool.
#[derive(Clone)]
pub struct FirebaseAuth {
    service_account: Arc<ServiceAccount>,
    config: AuthConfig,
    cache: Arc<dyn Cache>,
    custom_tokens: TokenGenerator,
    access_tokens: AccessTokenManager,
    verifier: TokenVerifier,
    http_client: AuthorizedHttpClient,
}

impl FirebaseAuth {
    pub fn builder(service_account: ServiceAccount) -> FirebaseAuthBuilder {
        FirebaseAuthBuilder::new(service_account)
    }

    pub fn project_id(&self) -> &str {
        self.service_account.project_id()
    }

    pub fn service_account(&self) -> &ServiceAccount {
        &self.service_account
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<dyn Cache> {
        self.cache.clone()
    }

    /// Mints a one-hour custom token for `uid`. See [`TokenGenerator::create_custom_token`].
    pub async fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, Value>>,
    ) -> AuthResult<String> {
        self.custom_tokens
            .create_custom_token(uid, developer_claims)
            .await
    }

    pub async fn verify_id_token(&self, id_token: &str) -> AuthResult<DecodedIdToken> {
        self.verifier.verify_id_token(id_token).await
    }

    /// Returns a cached access token, or exchanges a new assertion when none is usable.
    pub async fn access_token(&self, force_refresh: bool) -> AuthResult<AccessToken> {
        self.access_tokens.get_token(force_refresh).await
    }

    pub async fn invalidate_access_token(&self) {
        self.access_tokens.invalidate().await;
    }

    pub async fn invalidate_certificates(&self) {
        self.verifier.invalidate_certificates().await;
    }

    pub fn http_client(&self) -> &AuthorizedHttpClient {
        &self.http_client
    }
}

/// Builds a [`FirebaseAuth`] with production defaults for anything not overridden.
pub struct FirebaseAuthBuilder {
    service_account: Arc<ServiceAccount>,
    signer: Option<Arc<dyn CryptoSigner>>,
    cache: Option<Arc<dyn Cache>>,
    clock: Option<Arc<dyn Clock>>,
    http: Option<Client>,
    config: Option<AuthConfig>,
    token_endpoint: Option<String>,
    certificate_endpoint: Option<String>,
    identity_toolkit_endpoint: Option<String>,
    expiry_threshold: Option<Duration>,
    clock_skew: Option<Duration>,
}

impl FirebaseAuthBuilder {
    fn new(service_account: ServiceAccount) -> Self {
        Self {
            service_account: Arc::new(service_account),
            signer: None,
            cache: None,
            clock: None,
            http: None,
            config: None,
            token_endpoint: None,
            certificate_endpoint: None,
            identity_toolkit_endpoint: None,
            expiry_threshold: None,
            clock_skew: None,
        }
    }

    /// Replaces the signer derived from the service account key.
    pub fn with_signer(mut self, signer: Arc<dyn CryptoSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Overrides the cache shared by the access token and certificate stores.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Starts from `config` instead of the environment-derived defaults.
    pub fn with_config(mut self, config: AuthConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the OAuth2 endpoint assertions are exchanged at.
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Overrides the URL the ID token signing certificates are fetched from.
    pub fn with_certificate_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.certificate_endpoint = Some(endpoint.into());
        self
    }

    /// Overrides the base URL of the authorized HTTP client.
    pub fn with_identity_toolkit_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.identity_toolkit_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_expiry_threshold(mut self, threshold: Duration) -> Self {
        self.expiry_threshold = Some(threshold);
        self
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = Some(skew);
        self
    }

    pub fn build(self) -> AuthResult<FirebaseAuth> {
        let mut config = match self.config {
            Some(config) => config,
            None => AuthConfig::from_env()?,
        };
        if let Some(endpoint) = self.token_endpoint {
            config.token_endpoint = parse_endpoint("token", &endpoint)?;
        }
        if let Some(endpoint) = self.certificate_endpoint {
            config.certificate_endpoint = parse_endpoint("certificate", &endpoint)?;
        }
        if let Some(endpoint) = self.identity_toolkit_endpoint {
            config.identity_toolkit_endpoint = parse_endpoint("identity toolkit", &endpoint)?;
        }
        if let Some(threshold) = self.expiry_threshold {
            config.expiry_threshold = threshold;
        }
        if let Some(skew) = self.clock_skew {
            config.clock_skew = skew;
        }

        if self.service_account.project_id().is_empty() {
            return Err(configuration_error("Service account has no project_id"));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::with_clock(clock.clone())));
        let http = match self.http {
            Some(http) => http,
            None => default_http_client()?,
        };
        let signer = self.signer.unwrap_or_else(|| {
            Arc::new(ServiceAccountSigner::new(self.service_account.clone()))
        });

        let custom_tokens = TokenGenerator::new(signer.clone(), clock.clone());
        let access_tokens = AccessTokenManager::new(
            signer,
            cache.clone(),
            clock.clone(),
            http.clone(),
            config.token_endpoint.clone(),
        )
        .with_expiry_threshold(config.expiry_threshold);
        let verifier = TokenVerifier::new(
            self.service_account.project_id(),
            cache.clone(),
            clock,
            http.clone(),
            config.certificate_endpoint.clone(),
        )
        .with_clock_skew(config.clock_skew);
        let http_client = AuthorizedHttpClient::new(
            access_tokens.clone(),
            http,
            config.identity_toolkit_endpoint.clone(),
        );

        log::debug!(
            "initialized auth for project {}",
            self.service_account.project_id()
        );

        Ok(FirebaseAuth {
            service_account: self.service_account,
            config,
            cache,
            custom_tokens,
            access_tokens,
            verifier,
            http_client,
        })
    }
}

/// Builds a [`FirebaseAuth`] from a service account, using environment-derived endpoints.
///
/// Without a `cache` the instance keeps tokens and certificates in process memory.
pub fn initialize_auth(
    service_account: ServiceAccount,
    cache: Option<Arc<dyn Cache>>,
) -> AuthResult<FirebaseAuth> {
    let mut builder = FirebaseAuth::builder(service_account);
    if let Some(cache) = cache {
        builder = builder.with_cache(cache);
    }
    builder.build()
}

fn default_http_client() -> AuthResult<Client> {
    Client::builder()
        .user_agent(format!("firebase-admin-auth/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| configuration_error(format!("Failed to build HTTP client: {err}")))
}
