use std::time::{Duration, SystemTime};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::util::time::{millis_to_system_time, system_time_to_millis};

/// OAuth2 bearer credential used to authorize calls to the identity API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub expiration_time: SystemTime,
}

impl AccessToken {
    /// Time left before expiry as seen at `now`; zero once expired.
    pub fn remaining(&self, now: SystemTime) -> Duration {
        self.expiration_time
            .duration_since(now)
            .unwrap_or(Duration::ZERO)
    }

    /// `true` if the token should not be handed out at `now` given the safety `threshold`.
    pub fn needs_refresh(&self, now: SystemTime, threshold: Duration) -> bool {
        self.remaining(now) <= threshold
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expiration_time", &self.expiration_time)
            .finish()
    }
}

/// Cache representation of an [`AccessToken`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedAccessToken {
    access_token: String,
    /// Milliseconds since the UNIX epoch.
    expiration_time: u64,
}

impl PersistedAccessToken {
    pub(crate) fn from_runtime(token: &AccessToken) -> Self {
        Self {
            access_token: token.access_token.clone(),
            expiration_time: system_time_to_millis(token.expiration_time),
        }
    }

    pub(crate) fn into_runtime(self) -> AccessToken {
        AccessToken {
            access_token: self.access_token,
            expiration_time: millis_to_system_time(self.expiration_time),
        }
    }
}

/// Sign-in details Firebase adds to every ID token under the `firebase` claim.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FirebaseInfo {
    #[serde(default)]
    pub identities: Map<String, Value>,
    #[serde(default)]
    pub sign_in_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_second_factor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_factor_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claims of an ID token whose signature and standard claims have been verified.
///
/// Only produced by `TokenVerifier::verify_id_token`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DecodedIdToken {
    pub iss: String,
    /// The project id. An array-valued `aud` is accepted and reduced to the project id once
    /// verified.
    #[serde(deserialize_with = "audience")]
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    /// Same as `sub`.
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default)]
    pub firebase: FirebaseInfo,
    /// Custom claims and anything else the issuer included.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn audience<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Audience {
        One(String),
        Many(Vec<String>),
    }

    match Audience::deserialize(deserializer)? {
        Audience::One(aud) => Ok(aud),
        Audience::Many(audiences) => audiences
            .into_iter()
            .next()
            .ok_or_else(|| D::Error::custom("\"aud\" is an empty array")),
    }
}

impl DecodedIdToken {
    pub fn tenant(&self) -> Option<&str> {
        self.firebase.tenant.as_deref()
    }

    pub fn sign_in_provider(&self) -> &str {
        &self.firebase.sign_in_provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::UNIX_EPOCH;

    #[test]
    fn access_token_threshold_is_inclusive() {
        let now = UNIX_EPOCH + Duration::from_secs(10_000);
        let token = AccessToken {
            access_token: "t".into(),
            expiration_time: now + Duration::from_secs(300),
        };
        assert!(token.needs_refresh(now, Duration::from_secs(300)));
        assert!(!token.needs_refresh(now - Duration::from_secs(1), Duration::from_secs(300)));
        assert!(token.needs_refresh(now + Duration::from_secs(900), Duration::from_secs(300)));
    }

    #[test]
    fn persisted_access_token_uses_camel_case_millis() {
        let token = AccessToken {
            access_token: "ya29.token".into(),
            expiration_time: UNIX_EPOCH + Duration::from_millis(1_700_000_000_500),
        };
        let persisted = PersistedAccessToken::from_runtime(&token);
        let json = serde_json::to_value(&persisted).unwrap();
        assert_eq!(
            json,
            json!({"accessToken": "ya29.token", "expirationTime": 1_700_000_000_500u64})
        );
        assert_eq!(persisted.into_runtime(), token);
    }

    #[test]
    fn access_token_debug_hides_secret() {
        let token = AccessToken {
            access_token: "ya29.secret".into(),
            expiration_time: UNIX_EPOCH,
        };
        assert!(!format!("{token:?}").contains("ya29.secret"));
        assert_eq!(token.authorization_header(), "Bearer ya29.secret");
    }

    #[test]
    fn decoded_id_token_keeps_custom_claims() {
        let decoded: DecodedIdToken = serde_json::from_value(json!({
            "iss": "https://securetoken.google.com/p",
            "aud": "p",
            "exp": 2,
            "iat": 1,
            "sub": "user-1",
            "admin": true,
            "firebase": {
                "identities": {"email": ["a@example.com"]},
                "sign_in_provider": "password",
                "tenant": "tenant-a"
            }
        }))
        .unwrap();
        assert_eq!(decoded.extra.get("admin"), Some(&json!(true)));
        assert_eq!(decoded.sign_in_provider(), "password");
        assert_eq!(decoded.tenant(), Some("tenant-a"));
    }

    #[test]
    fn array_audience_is_accepted() {
        let decoded: DecodedIdToken = serde_json::from_value(json!({
            "iss": "https://securetoken.google.com/p",
            "aud": ["p", "other"],
            "exp": 2,
            "iat": 1,
            "sub": "user-1"
        }))
        .unwrap();
        assert_eq!(decoded.aud, "p");

        let empty = serde_json::from_value::<DecodedIdToken>(json!({
            "iss": "https://securetoken.google.com/p",
            "aud": [],
            "exp": 2,
            "iat": 1,
            "sub": "user-1"
        }));
        assert!(empty.is_err());
    }
}
