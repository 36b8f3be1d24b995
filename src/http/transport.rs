/// reqwest-backed client for the review service.
use crate::error::AppError;
use crate::http::client::{ApiClient, ApiRequest, ApiResponse, ClientConfig, HttpMethod};
use reqwest::Client;

/// HTTP client that talks to a live deployment of the service.
pub struct HttpApiClient {
    client: Client,
    config: ClientConfig,
}

impl HttpApiClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self, AppError> {
        if config.base_url.is_empty() {
            return Err(AppError::Config(
                "HTTP client requires a base URL. Specify one with --base-url.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
impl ApiClient for HttpApiClient {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, AppError> {
        let url = self.url_for(request.path());

        let mut req = match request.method() {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };

        if let Some(token) = &request.bearer {
            req = req.bearer_auth(token);
        }

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AppError::Http(format!("{} failed: {}", request.endpoint, e)))?;

        let status = response.status().as_u16();

        // The body is drained so the timing covers the whole response and the
        // connection can go back to the pool.
        response.bytes().await.map_err(|e| {
            AppError::Http(format!(
                "{} failed while reading body: {}",
                request.endpoint, e
            ))
        })?;

        Ok(ApiResponse { status })
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }
}
