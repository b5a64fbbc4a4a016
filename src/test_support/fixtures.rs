use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use crate::credential::ServiceAccount;

pub const TEST_PROJECT_ID: &str = "demo-project";
pub const TEST_PRIVATE_KEY_ID: &str = "0123456789abcdef0123456789abcdef01234567";
pub const TEST_CLIENT_EMAIL: &str = "firebase-adminsdk@demo-project.iam.gserviceaccount.com";

/// PKCS#8 key of the test service account.
pub const SERVICE_ACCOUNT_KEY_PEM: &str =
    include_str!("../../tests/fixtures/service_account_key.pem");
pub const SERVICE_ACCOUNT_PUBLIC_PEM: &str =
    include_str!("../../tests/fixtures/service_account_public.pem");
/// Key standing in for the secure token service that issues ID tokens.
pub const SECURETOKEN_KEY_PEM: &str = include_str!("../../tests/fixtures/securetoken_key.pem");
/// Self-signed certificate for [`SECURETOKEN_KEY_PEM`].
pub const SECURETOKEN_CERT_PEM: &str = include_str!("../../tests/fixtures/securetoken_cert.pem");

pub fn test_service_account() -> ServiceAccount {
    ServiceAccount::new(
        TEST_PROJECT_ID,
        TEST_PRIVATE_KEY_ID,
        SERVICE_ACCOUNT_KEY_PEM,
        TEST_CLIENT_EMAIL,
    )
}

/// Claims of a freshly issued password sign-in ID token, valid for an hour from `issued_at`.
pub fn id_token_claims(project_id: &str, uid: &str, issued_at: i64) -> Value {
    json!({
        "iss": format!("https://securetoken.google.com/{project_id}"),
        "aud": project_id,
        "auth_time": issued_at,
        "iat": issued_at,
        "exp": issued_at + 3600,
        "sub": uid,
        "user_id": uid,
        "email": format!("{uid}@example.com"),
        "email_verified": true,
        "firebase": {
            "identities": {"email": [format!("{uid}@example.com")]},
            "sign_in_provider": "password"
        }
    })
}

/// RS256-signs `claims` with the PEM-encoded private key.
pub fn sign_id_token(kid: Option<&str>, claims: &Value, key_pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(key_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}
