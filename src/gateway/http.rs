//! `reqwest`-backed gateway.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ApiResponse, Endpoint, Gateway, Method};
use crate::error::PanelError;

/// Gateway talking JSON over HTTP to the panel backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, PanelError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| PanelError::Config(format!("invalid backend_url {base_url:?}: {err}")))?;
        // The backend keeps the login in a session cookie.
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| PanelError::Config(format!("http client: {err}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn request(&self, endpoint: Endpoint, method: Method, body: Option<Value>) -> ApiResponse {
        let url = match self.base_url.join(endpoint.path()) {
            Ok(url) => url,
            Err(err) => {
                warn!(%endpoint, error = %err, "invalid endpoint");
                return ApiResponse::network_error();
            }
        };

        let mut builder = self
            .client
            .request(method.into(), url)
            .header(CONTENT_TYPE, "application/json");
        if !endpoint.query().is_empty() {
            builder = builder.query(endpoint.query());
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, %endpoint, error = %err, "request failed");
                return ApiResponse::network_error();
            }
        };

        // HTTP error statuses still carry a JSON body with the backend's verdict.
        let status = response.status();
        match response.json::<Value>().await {
            Ok(body) => {
                debug!(%method, %endpoint, %status, "backend responded");
                ApiResponse::from_json(body)
            }
            Err(err) => {
                warn!(%method, %endpoint, %status, error = %err, "response was not JSON");
                ApiResponse::network_error()
            }
        }
    }
}
