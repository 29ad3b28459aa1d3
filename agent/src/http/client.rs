//! HTTP client implementation

use std::time::Duration;

use openapi_client::models::WhoAmIResponse;
use reqwest::{header, Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::AgentError;
use crate::models::device::Session;

/// Path of the device actions service relative to the API endpoint
const DEFAULT_ACTIONS_PATH: &str = "/device-actions/v1";

/// HTTP client for backend communication
pub struct HttpClient {
    client: Client,
    base_url: String,
    actions_url: String,
    token: RwLock<Option<SecretString>>,
}

impl HttpClient {
    /// Create a new HTTP client
    ///
    /// `actions_url` defaults to the device actions service under `base_url`.
    pub async fn new(base_url: &str, actions_url: Option<&str>) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("hupagent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let actions_url = match actions_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("{}{}", base_url, DEFAULT_ACTIONS_PATH),
        };

        Ok(Self {
            client,
            base_url,
            actions_url,
            token: RwLock::new(None),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the device actions URL
    pub fn actions_url(&self) -> &str {
        &self.actions_url
    }

    /// Build an absolute API URL with query parameters
    pub fn api_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, AgentError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| AgentError::ConfigError(format!("Invalid API URL: {}", e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Validate an API key and keep it for subsequent requests
    pub async fn login_with_token(&self, api_key: &SecretString) -> Result<Session, AgentError> {
        let url = self.api_url("/actor/v1/whoami", &[])?;
        debug!("GET {} (login)", url);

        let response = self
            .client
            .get(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            )
            .send()
            .await?;

        let response = check_status(response, "GET").await?;
        let actor: WhoAmIResponse = response.json().await?;

        let mut token = self.token.write().await;
        *token = Some(api_key.clone());

        info!("Authenticated as {} {}", actor.actor_type, actor.id);
        Ok(Session {
            actor_id: actor.id,
            actor_type: actor.actor_type,
        })
    }

    async fn bearer(&self) -> Result<String, AgentError> {
        let token = self.token.read().await;
        match token.as_ref() {
            Some(token) => Ok(format!("Bearer {}", token.expose_secret())),
            None => Err(AgentError::AuthError("Not authenticated".to_string())),
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, AgentError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, self.bearer().await?)
            .send()
            .await?;

        let response = check_status(response, "GET").await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Make a GET request, mapping 404 to `None`
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Option<T>, AgentError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, self.bearer().await?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response, "GET").await?;
        let body = response.json().await?;
        Ok(Some(body))
    }

    /// Make a POST request, discarding the response body
    pub async fn post<B: Serialize>(&self, url: Url, body: &B) -> Result<(), AgentError> {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, self.bearer().await?)
            .json(body)
            .send()
            .await?;

        check_status(response, "POST").await?;
        Ok(())
    }
}

async fn check_status(response: Response, method: &str) -> Result<Response, AgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("HTTP {} failed: {} - {}", method, status, body);

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AgentError::AuthError(format!("{}: {}", status, body)));
    }
    Err(AgentError::ApiError(format!("{}: {}", status, body)))
}
