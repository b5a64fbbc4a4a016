use httpmock::MockServer;

/// Start a fresh `httpmock::MockServer` without blocking the calling tokio runtime.
pub async fn start_mock_server() -> MockServer {
    MockServer::start_async().await
}
