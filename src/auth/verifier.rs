use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use x509_parser::pem::parse_x509_pem;
use x509_parser::public_key::PublicKey;

use crate::auth::config::{id_token_issuer, CLIENT_CERT_CACHE_KEY, DEFAULT_CLOCK_SKEW};
use crate::auth::error::{
    invalid_claim, malformed_token, upstream_unavailable, AuthError, AuthResult,
};
use crate::auth::types::DecodedIdToken;
use crate::cache::{Cache, PutOptions};
use crate::util::time::{millis_to_system_time, unix_seconds, Clock};

const MAX_SUBJECT_LENGTH: usize = 128;

/// Published signing certificates, keyed by `kid`.
pub type CertificateSet = HashMap<String, String>;

/// Cache representation of a certificate set together with its `max-age` derived deadline.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCertificates {
    /// Milliseconds since the UNIX epoch.
    expires_at: u64,
    certificates: CertificateSet,
}

/// Verifies Firebase ID tokens against Google's rotating public certificates.
///
/// The certificate set is cached for as long as the upstream `Cache-Control: max-age` allows.
/// A response without `max-age` is used for the current call only.
#[derive(Clone)]
pub struct TokenVerifier {
    project_id: String,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    http: Client,
    certificate_endpoint: Url,
    clock_skew: Duration,
}

impl TokenVerifier {
    pub fn new(
        project_id: impl Into<String>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
        http: Client,
        certificate_endpoint: Url,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            cache,
            clock,
            http,
            certificate_endpoint,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    /// Tolerance applied to `exp`, `iat` and `auth_time` checks.
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Verifies the signature and standard claims of `id_token` and returns its claims.
    ///
    /// A `kid` missing from the cached set yields `UnknownSigningKey`; callers that want to ride
    /// out a key rotation can call [`TokenVerifier::invalidate_certificates`] and retry once.
    ///
    /// # Errors
    /// `UpstreamUnavailable`, `MalformedToken`, `UnknownSigningKey`, `InvalidSignature`,
    /// `TokenExpired` or `InvalidClaim`.
    pub async fn verify_id_token(&self, id_token: &str) -> AuthResult<DecodedIdToken> {
        let certificates = self.certificates().await?;

        let header = decode_header(id_token)
            .map_err(|err| malformed_token(format!("Unable to decode ID token header: {err}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(malformed_token(format!(
                "ID token has incorrect algorithm {:?}; expected RS256",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| malformed_token("kid does not exist on provided ID Token."))?;
        let certificate = certificates
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownSigningKey { kid: kid.clone() })?;
        let key = decoding_key_from_certificate(&kid, certificate)?;

        let issuer = id_token_issuer(&self.project_id);
        let mut validation = Validation::new(Algorithm::RS256);
        // Temporal claims are checked below against the injected clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

        let mut claims = decode::<DecodedIdToken>(id_token, &key, &validation)
            .map_err(map_jwt_error)?
            .claims;
        self.check_claims(&claims)?;
        claims.aud = self.project_id.clone();
        claims.uid = claims.sub.clone();
        Ok(claims)
    }

    /// Drops the cached certificate set so the next verification fetches it again.
    pub async fn invalidate_certificates(&self) {
        if let Err(err) = self.cache.delete(CLIENT_CERT_CACHE_KEY).await {
            log::warn!("failed to delete cached certificates: {err}");
        }
    }

    fn check_claims(&self, claims: &DecodedIdToken) -> AuthResult<()> {
        let now = unix_seconds(self.clock.now());
        let skew = self.clock_skew.as_secs() as i64;

        if claims.exp <= now - skew {
            return Err(AuthError::TokenExpired {
                expired_at: claims.exp,
            });
        }
        if claims.iat > now + skew {
            return Err(invalid_claim(format!(
                "ID token issued in the future (iat {})",
                claims.iat
            )));
        }
        if let Some(auth_time) = claims.auth_time {
            if auth_time > now + skew {
                return Err(invalid_claim(format!(
                    "ID token auth_time {auth_time} is in the future"
                )));
            }
        }
        if claims.sub.is_empty() {
            return Err(invalid_claim("ID token has an empty \"sub\" claim"));
        }
        if claims.sub.len() > MAX_SUBJECT_LENGTH {
            return Err(invalid_claim(format!(
                "ID token \"sub\" claim is longer than {MAX_SUBJECT_LENGTH} characters"
            )));
        }
        Ok(())
    }

    async fn certificates(&self) -> AuthResult<CertificateSet> {
        if let Some(certificates) = self.cached_certificates().await {
            log::debug!("using cached signing certificates");
            return Ok(certificates);
        }

        log::debug!("fetching signing certificates from {}", self.certificate_endpoint);
        let response = self
            .http
            .get(self.certificate_endpoint.clone())
            .send()
            .await
            .map_err(|err| {
                upstream_unavailable(
                    None,
                    format!("Failed to fetch Google client certificates: {err}"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("certificate fetch failed with status {status}");
            return Err(upstream_unavailable(
                Some(status.as_u16()),
                "Failed to fetch Google client certificates.",
            ));
        }

        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age);
        let certificates = response.json::<CertificateSet>().await.map_err(|err| {
            upstream_unavailable(
                Some(status.as_u16()),
                format!("Invalid certificate response: {err}"),
            )
        })?;

        match max_age {
            Some(max_age) => self.store_certificates(&certificates, max_age).await,
            None => log::debug!("certificate response has no max-age; not caching"),
        }
        Ok(certificates)
    }

    async fn cached_certificates(&self) -> Option<CertificateSet> {
        let raw = match self.cache.get(CLIENT_CERT_CACHE_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                log::warn!("certificate cache read failed, treating as miss: {err}");
                return None;
            }
        };
        let persisted = match serde_json::from_str::<PersistedCertificates>(&raw) {
            Ok(persisted) => persisted,
            Err(err) => {
                log::warn!("ignoring unreadable cached certificates: {err}");
                return None;
            }
        };
        // The backing store may not honor expiration hints.
        if self.clock.now() >= millis_to_system_time(persisted.expires_at) {
            return None;
        }
        Some(persisted.certificates)
    }

    async fn store_certificates(&self, certificates: &CertificateSet, max_age: Duration) {
        let expires_at = self
            .clock
            .now()
            .checked_add(max_age)
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .and_then(|since_epoch| u64::try_from(since_epoch.as_millis()).ok());
        let Some(expires_at) = expires_at else {
            log::warn!("certificate max-age {max_age:?} is out of range; not caching");
            return;
        };
        let expiration = millis_to_system_time(expires_at);
        let persisted = PersistedCertificates {
            expires_at,
            certificates: certificates.clone(),
        };
        let json = match serde_json::to_string(&persisted) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("failed to serialize certificates for caching: {err}");
                return;
            }
        };
        if let Err(err) = self
            .cache
            .put(CLIENT_CERT_CACHE_KEY, json, PutOptions::expires_at(expiration))
            .await
        {
            log::warn!("failed to cache certificates: {err}");
        }
    }
}

/// Extracts the `max-age` directive from a `Cache-Control` header value.
pub fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value
            .trim()
            .trim_matches('"')
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    })
}

fn decoding_key_from_certificate(kid: &str, certificate: &str) -> AuthResult<DecodingKey> {
    let (_, pem) = parse_x509_pem(certificate.as_bytes()).map_err(|err| {
        upstream_unavailable(None, format!("Certificate for kid \"{kid}\" is not PEM: {err}"))
    })?;
    let x509 = pem.parse_x509().map_err(|err| {
        upstream_unavailable(
            None,
            format!("Certificate for kid \"{kid}\" is not X.509: {err}"),
        )
    })?;

    let spki = x509.public_key();
    match spki.parsed() {
        Ok(PublicKey::RSA(_)) => Ok(DecodingKey::from_rsa_der(&spki.subject_public_key.data)),
        _ => Err(upstream_unavailable(
            None,
            format!("Certificate for kid \"{kid}\" does not hold an RSA public key"),
        )),
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => {
            AuthError::InvalidSignature("signature does not match the published certificate".into())
        }
        ErrorKind::InvalidAudience => invalid_claim("ID token has incorrect \"aud\" claim"),
        ErrorKind::InvalidIssuer => invalid_claim("ID token has incorrect \"iss\" claim"),
        ErrorKind::MissingRequiredClaim(claim) => {
            invalid_claim(format!("ID token is missing the \"{claim}\" claim"))
        }
        ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
            upstream_unavailable(None, format!("Published certificate is unusable: {err}"))
        }
        _ => malformed_token(format!("Unable to decode ID token: {err}")),
    }
}
