use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, Url};
use serde::Serialize;

use crate::auth::access_token::AccessTokenManager;
use crate::auth::error::{invalid_argument, upstream_unavailable, AuthResult};

/// A call against a Google API, relative to the identity toolkit base URL by default.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    path: String,
    base_url: Option<Url>,
    headers: HeaderMap,
    body: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            base_url: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Sends the request to `base_url` instead of the client's default.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> AuthResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| invalid_argument(format!("Invalid header name '{name}': {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| invalid_argument(format!("Invalid value for header {name}: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json<T: Serialize + ?Sized>(self, body: &T) -> AuthResult<Self> {
        let body = serde_json::to_string(body)
            .map_err(|err| invalid_argument(format!("Request body is not serializable: {err}")))?;
        Ok(self.with_body(body))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// HTTP client that authorizes every request with the service account's access token.
#[derive(Clone)]
pub struct AuthorizedHttpClient {
    tokens: AccessTokenManager,
    http: Client,
    base_url: Url,
}

impl AuthorizedHttpClient {
    pub fn new(tokens: AccessTokenManager, http: Client, base_url: Url) -> Self {
        Self {
            tokens,
            http,
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends `request` and returns the raw response, whatever its status.
    ///
    /// An `Authorization` header already present on the request is left as is.
    pub async fn send(&self, request: ApiRequest) -> AuthResult<Response> {
        let token = self.tokens.get_token(false).await?;
        let url = resolve_url(request.base_url.as_ref().unwrap_or(&self.base_url), &request.path)?;

        let mut headers = request.headers;
        if !headers.contains_key(AUTHORIZATION) {
            let value = HeaderValue::from_str(&token.authorization_header()).map_err(|err| {
                upstream_unavailable(None, format!("Access token is not a valid header: {err}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        if request.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        log::debug!("{} {}", request.method, url);
        let mut builder = self.http.request(request.method, url).headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder
            .send()
            .await
            .map_err(|err| upstream_unavailable(None, format!("Request failed: {err}")))
    }
}

/// Appends `path` to `base`, keeping any path prefix `base` already carries.
fn resolve_url(base: &Url, path: &str) -> AuthResult<Url> {
    let base = base.as_str().trim_end_matches('/');
    let joined = if path.is_empty() || path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    };
    Url::parse(&joined).map_err(|err| invalid_argument(format!("Invalid request URL '{joined}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthErrorCode;
    use crate::cache::MemoryCache;
    use crate::credential::ServiceAccountSigner;
    use crate::test_support::{start_mock_server, test_service_account, ManualClock};
    use httpmock::prelude::*;
    use httpmock::MockServer;
    use serde_json::json;
    use std::sync::Arc;

    fn client(server: &MockServer) -> AuthorizedHttpClient {
        let clock = Arc::new(ManualClock::default());
        let tokens = AccessTokenManager::new(
            Arc::new(ServiceAccountSigner::new(Arc::new(test_service_account()))),
            Arc::new(MemoryCache::with_clock(clock.clone())),
            clock,
            Client::new(),
            Url::parse(&server.url("/token")).unwrap(),
        );
        AuthorizedHttpClient::new(tokens, Client::new(), Url::parse(&server.url("/v1")).unwrap())
    }

    async fn mock_token(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .json_body(json!({"access_token": "ya29.api", "expires_in": 3600}));
            })
            .await;
    }

    #[test]
    fn paths_are_appended_to_base() {
        let base = Url::parse("https://identitytoolkit.googleapis.com/v1").unwrap();
        assert_eq!(
            resolve_url(&base, "/projects/p/accounts:lookup").unwrap().as_str(),
            "https://identitytoolkit.googleapis.com/v1/projects/p/accounts:lookup"
        );
        assert_eq!(
            resolve_url(&base, "accounts:update").unwrap().as_str(),
            "https://identitytoolkit.googleapis.com/v1/accounts:update"
        );
    }

    #[tokio::test]
    async fn bearer_token_and_json_content_type_are_attached() {
        let server = start_mock_server().await;
        mock_token(&server).await;
        let api = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/projects/demo-project/accounts:lookup")
                    .header("authorization", "Bearer ya29.api")
                    .header("content-type", "application/json")
                    .json_body(json!({"localId": ["user-1"]}));
                then.status(200).json_body(json!({"users": []}));
            })
            .await;

        let request = ApiRequest::post("/projects/demo-project/accounts:lookup")
            .with_json(&json!({"localId": ["user-1"]}))
            .unwrap();
        let response = client(&server).send(request).await.unwrap();

        assert_eq!(response.status(), 200);
        api.assert_async().await;
    }

    #[tokio::test]
    async fn caller_supplied_authorization_is_kept() {
        let server = start_mock_server().await;
        mock_token(&server).await;
        let api = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/projects/demo-project/config")
                    .header("authorization", "Bearer caller-token");
                then.status(200);
            })
            .await;

        let request = ApiRequest::get("/projects/demo-project/config")
            .with_header("Authorization", "Bearer caller-token")
            .unwrap();
        client(&server).send(request).await.unwrap();
        api.assert_async().await;
    }

    #[tokio::test]
    async fn per_request_base_url_overrides_default() {
        let server = start_mock_server().await;
        mock_token(&server).await;
        let api = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v2/projects/demo-project/tenants")
                    .header("authorization", "Bearer ya29.api");
                then.status(404);
            })
            .await;

        let request = ApiRequest::get("/projects/demo-project/tenants")
            .with_base_url(Url::parse(&server.url("/v2")).unwrap());
        let response = client(&server).send(request).await.unwrap();

        assert_eq!(response.status(), 404);
        api.assert_async().await;
    }

    #[tokio::test]
    async fn token_exchange_failure_is_propagated() {
        let server = start_mock_server().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(401).body("{\"error\":\"invalid_client\"}");
            })
            .await;

        let err = client(&server)
            .send(ApiRequest::get("/projects/demo-project/config"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::TokenExchange);
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let err = ApiRequest::get("/").with_header("bad header", "x").unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::InvalidArgument);
    }
}
