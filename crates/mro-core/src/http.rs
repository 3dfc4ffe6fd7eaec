//! Shared plumbing for the hosted-service clients (Cohere, Pinecone, Groq).

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ConfigError;
use crate::error::ServiceError;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ConfigError::HttpClient)
}

/// Sends the request and decodes a JSON body. Non-2xx responses become
/// [`ServiceError::Status`] carrying the response body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, ServiceError> {
    let response = request
        .send()
        .await
        .map_err(|source| ServiceError::Http { service, source })?;
    let status = response.status();
    debug!(service, status = %status, "response received");
    let body = response
        .text()
        .await
        .map_err(|source| ServiceError::Http { service, source })?;
    if !status.is_success() {
        return Err(ServiceError::Status {
            service,
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| ServiceError::Decode {
        service,
        message: e.to_string(),
    })
}
