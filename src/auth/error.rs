use std::fmt;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    InvalidArgument,
    MalformedToken,
    UnknownSigningKey,
    InvalidSignature,
    TokenExpired,
    InvalidClaim,
    UpstreamUnavailable,
    TokenExchange,
    Signing,
    Configuration,
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorCode::InvalidArgument => "auth/invalid-argument",
            AuthErrorCode::MalformedToken => "auth/malformed-token",
            AuthErrorCode::UnknownSigningKey => "auth/unknown-signing-key",
            AuthErrorCode::InvalidSignature => "auth/invalid-signature",
            AuthErrorCode::TokenExpired => "auth/token-expired",
            AuthErrorCode::InvalidClaim => "auth/invalid-claim",
            AuthErrorCode::UpstreamUnavailable => "auth/upstream-unavailable",
            AuthErrorCode::TokenExchange => "auth/token-exchange-failed",
            AuthErrorCode::Signing => "auth/signing-failed",
            AuthErrorCode::Configuration => "auth/configuration",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthError {
    /// Caller misuse: empty uid, reserved developer claim.
    InvalidArgument(String),
    MalformedToken(String),
    UnknownSigningKey { kid: String },
    InvalidSignature(String),
    TokenExpired { expired_at: i64 },
    InvalidClaim(String),
    /// Transport failure or non-success response from an upstream endpoint.
    UpstreamUnavailable { status: Option<u16>, message: String },
    /// The authorization server refused the assertion grant.
    TokenExchange { status: u16, body: String },
    Signing(String),
    Configuration(String),
}

impl AuthError {
    pub fn code(&self) -> AuthErrorCode {
        match self {
            AuthError::InvalidArgument(_) => AuthErrorCode::InvalidArgument,
            AuthError::MalformedToken(_) => AuthErrorCode::MalformedToken,
            AuthError::UnknownSigningKey { .. } => AuthErrorCode::UnknownSigningKey,
            AuthError::InvalidSignature(_) => AuthErrorCode::InvalidSignature,
            AuthError::TokenExpired { .. } => AuthErrorCode::TokenExpired,
            AuthError::InvalidClaim(_) => AuthErrorCode::InvalidClaim,
            AuthError::UpstreamUnavailable { .. } => AuthErrorCode::UpstreamUnavailable,
            AuthError::TokenExchange { .. } => AuthErrorCode::TokenExchange,
            AuthError::Signing(_) => AuthErrorCode::Signing,
            AuthError::Configuration(_) => AuthErrorCode::Configuration,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// Whether repeating the same call later could succeed.
    ///
    /// Nothing in this crate retries on its own; this only informs the calling layer.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::UpstreamUnavailable { .. } => true,
            AuthError::TokenExchange { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidArgument(message) => write!(f, "Invalid argument: {message}"),
            AuthError::MalformedToken(message) => write!(f, "Malformed token: {message}"),
            AuthError::UnknownSigningKey { kid } => {
                write!(f, "No published certificate matches key id \"{kid}\"")
            }
            AuthError::InvalidSignature(message) => {
                write!(f, "Token signature is invalid: {message}")
            }
            AuthError::TokenExpired { expired_at } => {
                write!(f, "Token expired at {expired_at} (seconds since epoch)")
            }
            AuthError::InvalidClaim(message) => write!(f, "Invalid token claim: {message}"),
            AuthError::UpstreamUnavailable { status, message } => match status {
                Some(status) => write!(f, "Upstream returned HTTP {status}: {message}"),
                None => write!(f, "Upstream unavailable: {message}"),
            },
            AuthError::TokenExchange { status, body } => {
                write!(f, "Access token exchange failed with HTTP {status}: {body}")
            }
            AuthError::Signing(message) => write!(f, "Signing failed: {message}"),
            AuthError::Configuration(message) => write!(f, "Invalid configuration: {message}"),
        }
    }
}

impl std::error::Error for AuthError {}

pub(crate) fn invalid_argument(message: impl Into<String>) -> AuthError {
    AuthError::InvalidArgument(message.into())
}

pub(crate) fn malformed_token(message: impl Into<String>) -> AuthError {
    AuthError::MalformedToken(message.into())
}

pub(crate) fn invalid_claim(message: impl Into<String>) -> AuthError {
    AuthError::InvalidClaim(message.into())
}

pub(crate) fn signing_error(message: impl Into<String>) -> AuthError {
    AuthError::Signing(message.into())
}

pub(crate) fn configuration_error(message: impl Into<String>) -> AuthError {
    AuthError::Configuration(message.into())
}

pub(crate) fn upstream_unavailable(status: Option<u16>, message: impl Into<String>) -> AuthError {
    AuthError::UpstreamUnavailable {
        status,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_namespaced() {
        let err = invalid_argument("uid must be non-empty");
        assert_eq!(err.code_str(), "auth/invalid-argument");
        assert!(err.to_string().contains("uid must be non-empty"));
    }

    #[test]
    fn only_upstream_failures_are_retryable() {
        assert!(upstream_unavailable(None, "timeout").is_retryable());
        assert!(AuthError::TokenExchange {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!AuthError::TokenExchange {
            status: 400,
            body: "{\"error\":\"invalid_grant\"}".into()
        }
        .is_retryable());
        assert!(!malformed_token("x").is_retryable());
    }
}
