pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::HttpTransport;

/// HTTP methods the form engine can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "DELETE")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Change methods retrieve current instance data before rendering.
    pub fn fetches_instance(&self) -> bool {
        matches!(self, HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a multipart submission, modeled so tests can inspect the
/// payload without touching reqwest types.
#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone)]
pub enum PartValue {
    Text(String),
    File {
        filename: String,
        bytes: Vec<u8>,
        mime: String,
    },
}

/// A completed HTTP exchange. Network-level failures surface as `Err` from
/// the transport; non-2xx statuses come back in `status` for the caller to
/// classify.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_validation_error(&self) -> bool {
        self.status == 400
    }
}

/// Wire seam between the engine and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Capability introspection (`OPTIONS <url>?context=true`).
    async fn options(&self, url: &str) -> Result<TransportResponse>;

    /// `GET` with query parameters.
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<TransportResponse>;

    /// JSON-bodied request.
    async fn send_json(
        &self,
        method: HttpMethod,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse>;

    /// Multipart-bodied request (forms containing file fields).
    async fn send_multipart(
        &self,
        method: HttpMethod,
        url: &str,
        parts: Vec<MultipartField>,
    ) -> Result<TransportResponse>;
}
