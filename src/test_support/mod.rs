//! Test utilities shared across crate-level unit tests.

pub mod clock;
pub mod fixtures;
pub mod http;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use clock::ManualClock;
pub use fixtures::{
    id_token_claims, sign_id_token, test_service_account, SECURETOKEN_CERT_PEM,
    SECURETOKEN_KEY_PEM, SERVICE_ACCOUNT_KEY_PEM, SERVICE_ACCOUNT_PUBLIC_PEM, TEST_PROJECT_ID,
};
pub use http::start_mock_server;

/// A directory path under the system temp dir that no other test in this process uses.
///
/// The directory itself is not created.
pub fn temp_dir(prefix: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let unique = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "firebase-admin-auth-{prefix}-{}-{unique}",
        std::process::id()
    ))
}
