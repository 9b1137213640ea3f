use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::{DEFAULT_USER_AGENT, SessionConfig, endpoints};
use crate::errors::{FlAuthError, Result};
use crate::models::{GoogleLoginRequest, LoginRequest, LoginResponse, RefreshResponse};
use crate::request::{ApiRequest, ApiResponse};

/// Raw backend calls, without any session handling
#[derive(Debug, Clone)]
pub struct AuthApi {
    config: SessionConfig,
    http: Client,
}

impl AuthApi {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .build()?;

        Ok(Self { config, http })
    }

    /// Use a caller-provided HTTP client (shared pool, custom TLS, ...)
    pub fn with_http(config: SessionConfig, http: Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Send a request as-is and buffer the response, whatever its status
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.config.endpoint(request.path())?;

        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = ApiResponse::read(builder.send().await?).await?;
        debug!(status = %response.status(), "Received response");
        Ok(response)
    }

    /// Exchange email and password for a token pair
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        debug!("Logging in with password");
        let request = json_request(ApiRequest::post(endpoints::LOGIN).json(&LoginRequest { email, password })?);
        self.send(&request).await?.into_result()?.json()
    }

    /// Exchange a Google authorization code for a token pair
    #[instrument(skip(self, code))]
    pub async fn google_login(&self, code: &str) -> Result<LoginResponse> {
        debug!("Logging in with Google authorization code");
        let request = json_request(ApiRequest::post(endpoints::GOOGLE).json(&GoogleLoginRequest { code })?);
        self.send(&request).await?.into_result()?.json()
    }

    /// Obtain a new access token, authorizing with the refresh token
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        debug!("Refreshing access token");
        let request = json_request(
            ApiRequest::post(endpoints::REFRESH)
                .json_value(serde_json::json!({}))
                .with_bearer(refresh_token)?,
        );

        let body: RefreshResponse = self.send(&request).await?.into_result()?.json()?;
        body.access_token
            .filter(|token| !token.is_empty())
            .ok_or(FlAuthError::MissingAccessToken)
    }
}

fn json_request(request: ApiRequest) -> ApiRequest {
    request.header(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    )
}
