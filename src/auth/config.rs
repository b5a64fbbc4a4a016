use std::time::Duration;

use url::Url;

use crate::auth::error::{configuration_error, AuthResult};

pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/token";
pub const CLIENT_CERT_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// `aud` of every custom token.
pub const FIREBASE_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";
pub const ID_TOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

pub const ACCESS_TOKEN_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/identitytoolkit",
    "https://www.googleapis.com/auth/userinfo.email",
];
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

pub const ACCESS_TOKEN_CACHE_KEY: &str = "access_token";
pub const CLIENT_CERT_CACHE_KEY: &str = "google_client_cert";

pub const ONE_HOUR: Duration = Duration::from_secs(60 * 60);
/// Cached access tokens this close to expiry are refreshed instead of served.
pub const DEFAULT_EXPIRY_THRESHOLD: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::ZERO;

const TOKEN_URL_ENV: &str = "FIREBASE_AUTH_TOKEN_URL";
const CERT_URL_ENV: &str = "FIREBASE_AUTH_CERT_URL";
const API_URL_ENV: &str = "FIREBASE_AUTH_API_URL";

/// Endpoints and timing knobs shared by the token subsystems.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub token_endpoint: Url,
    pub certificate_endpoint: Url,
    pub identity_toolkit_endpoint: Url,
    pub expiry_threshold: Duration,
    pub clock_skew: Duration,
}

impl AuthConfig {
    /// Google production endpoints.
    pub fn new() -> AuthResult<Self> {
        Ok(Self {
            token_endpoint: parse_endpoint("token", GOOGLE_TOKEN_ENDPOINT)?,
            certificate_endpoint: parse_endpoint("certificate", CLIENT_CERT_URL)?,
            identity_toolkit_endpoint: parse_endpoint("identity toolkit", IDENTITY_TOOLKIT_URL)?,
            expiry_threshold: DEFAULT_EXPIRY_THRESHOLD,
            clock_skew: DEFAULT_CLOCK_SKEW,
        })
    }

    /// Production endpoints, each overridable through `FIREBASE_AUTH_TOKEN_URL`,
    /// `FIREBASE_AUTH_CERT_URL` and `FIREBASE_AUTH_API_URL`.
    pub fn from_env() -> AuthResult<Self> {
        let mut config = Self::new()?;
        if let Ok(value) = std::env::var(TOKEN_URL_ENV) {
            config.token_endpoint = parse_endpoint("token", &value)?;
        }
        if let Ok(value) = std::env::var(CERT_URL_ENV) {
            config.certificate_endpoint = parse_endpoint("certificate", &value)?;
        }
        if let Ok(value) = std::env::var(API_URL_ENV) {
            config.identity_toolkit_endpoint = parse_endpoint("identity toolkit", &value)?;
        }
        Ok(config)
    }
}

pub(crate) fn parse_endpoint(name: &str, value: &str) -> AuthResult<Url> {
    Url::parse(value)
        .map_err(|err| configuration_error(format!("Invalid {name} endpoint '{value}': {err}")))
}

pub(crate) fn id_token_issuer(project_id: &str) -> String {
    format!("{ID_TOKEN_ISSUER_PREFIX}{project_id}")
}
