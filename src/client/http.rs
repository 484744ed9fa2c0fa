use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::{HttpMethod, MultipartField, PartValue, Transport, TransportResponse};

/// Production transport on a pooled reqwest client.
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("restform/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http_client })
    }

    /// Client with the default timeouts (30s request, 10s connect).
    ///
    /// A stalled request therefore resolves to a transport error instead of
    /// leaving a form waiting forever.
    pub fn with_defaults() -> Result<Self> {
        Self::new(Duration::from_secs(30), Duration::from_secs(10))
    }

    fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    async fn into_response(response: reqwest::Response) -> Result<TransportResponse> {
        let status = response.status().as_u16();
        let text = response.text().await.context("Failed to read response body")?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn options(&self, url: &str) -> Result<TransportResponse> {
        debug!("OPTIONS {}", url);
        let response = self
            .http_client
            .request(reqwest::Method::OPTIONS, url)
            .query(&[("context", "true")])
            .send()
            .await
            .with_context(|| format!("OPTIONS request to {} failed", url))?;
        Self::into_response(response).await
    }

    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<TransportResponse> {
        debug!("GET {} ({} query params)", url, query.len());
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET request to {} failed", url))?;
        Self::into_response(response).await
    }

    async fn send_json(
        &self,
        method: HttpMethod,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse> {
        debug!("{} {} (json)", method, url);
        let response = self
            .http_client
            .request(Self::to_reqwest_method(method), url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("{} request to {} failed", method, url))?;
        Self::into_response(response).await
    }

    async fn send_multipart(
        &self,
        method: HttpMethod,
        url: &str,
        parts: Vec<MultipartField>,
    ) -> Result<TransportResponse> {
        debug!("{} {} (multipart, {} parts)", method, url, parts.len());
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            form = match part.value {
                PartValue::Text(text) => form.text(part.name, text),
                PartValue::File {
                    filename,
                    bytes,
                    mime,
                } => {
                    let file_part = reqwest::multipart::Part::bytes(bytes)
                        .file_name(filename)
                        .mime_str(&mime)
                        .context("Invalid mime type for file part")?;
                    form.part(part.name, file_part)
                }
            };
        }
        let response = self
            .http_client
            .request(Self::to_reqwest_method(method), url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("{} request to {} failed", method, url))?;
        Self::into_response(response).await
    }
}
